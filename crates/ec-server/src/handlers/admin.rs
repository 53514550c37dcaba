use axum::extract::{Multipart, Path, State};
use axum::Json;

use ec_protocol::admin::{
    CreateOrUpdateUserRequest, EnableUserRequest, ReloadUserListResponse, ResetTaskRequest,
};
use ec_store::ArtifactKind;
use ec_types::{CoordError, PaperNumber, Question, TaskRef, Version};

use crate::error::ApiResult;
use crate::state::AppState;
use crate::user_list::load_user_list;

pub async fn create_or_update_user(
    State(state): State<AppState>,
    Json(request): Json<CreateOrUpdateUserRequest>,
) -> ApiResult<()> {
    state
        .authority
        .create_or_update_user(&request.username, &request.password, request.is_admin)?;
    Ok(())
}

pub async fn enable_user(
    State(state): State<AppState>,
    Json(request): Json<EnableUserRequest>,
) -> ApiResult<()> {
    state
        .authority
        .enable_user(&request.username, request.enabled)?;
    if !request.enabled {
        state.catalog.reset_user_in_flight(&request.username)?;
    }
    Ok(())
}

/// `POST /admin/reload-users`. Diffs `user_list_path` against the live set:
/// unknown names are created enabled, names dropped from the file are
/// disabled and have their in-flight claims reverted (spec.md §4.8,
/// grounded on `serverUserInit.py`'s `reloadUsers`).
pub async fn reload_user_list(
    State(state): State<AppState>,
) -> ApiResult<Json<ReloadUserListResponse>> {
    let path = state.user_list_path.clone();
    let on_disk = load_user_list(&path)?;
    let live: std::collections::BTreeSet<String> =
        state.authority.list_usernames()?.into_iter().collect();

    let mut added = Vec::new();
    for (username, entry) in &on_disk {
        if !live.contains(username) {
            state
                .authority
                .create_or_update_user(username, &entry.password, entry.is_admin)?;
            added.push(username.clone());
        }
    }

    let mut removed = Vec::new();
    for username in &live {
        if !on_disk.contains_key(username) {
            state.authority.enable_user(username, false)?;
            state.catalog.reset_user_in_flight(username)?;
            removed.push(username.clone());
        }
    }

    log::info!("reloaded user list: +{} -{}", added.len(), removed.len());
    Ok(Json(ReloadUserListResponse { added, removed }))
}

pub async fn admin_reset_task(
    State(state): State<AppState>,
    Json(request): Json<ResetTaskRequest>,
) -> ApiResult<()> {
    let task_ref = match request {
        ResetTaskRequest::Id { paper_number } => TaskRef::Id(PaperNumber(paper_number)),
        ResetTaskRequest::Mark {
            paper_number,
            question,
            version,
        } => TaskRef::Mark(PaperNumber(paper_number), Question(question), Version(version)),
    };
    state.catalog.admin_reset_task(task_ref)?;
    Ok(())
}

/// `PUT /admin/pages/{paper}/{page}/{version}`. Multi-part: a `control`
/// JSON part naming the source filename, and an `image` binary part. Used
/// to substitute a page after a bad scan, which demotes any `Done` task
/// depending on it back to `Todo` (spec.md §4.3).
pub async fn replace_page_image(
    State(state): State<AppState>,
    Path((paper, page, version)): Path<(u32, u32, u32)>,
    mut multipart: Multipart,
) -> ApiResult<()> {
    let mut source_filename: Option<String> = None;
    let mut image_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CoordError::BadRequest(e.to_string()))?
    {
        let name = field
            .name()
            .ok_or_else(|| CoordError::BadRequest("multipart field missing name".into()))?
            .to_string();
        match name.as_str() {
            "control" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| CoordError::BadRequest(e.to_string()))?;
                #[derive(serde::Deserialize)]
                struct Control {
                    source_filename: String,
                }
                let control: Control = serde_json::from_slice(&bytes)
                    .map_err(|e| CoordError::BadRequest(e.to_string()))?;
                source_filename = Some(control.source_filename);
            }
            "image" => {
                image_bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| CoordError::BadRequest(e.to_string()))?
                        .to_vec(),
                );
            }
            _ => {}
        }
    }

    let source_filename =
        source_filename.ok_or_else(|| CoordError::BadRequest("missing control part".into()))?;
    let image_bytes =
        image_bytes.ok_or_else(|| CoordError::BadRequest("missing image part".into()))?;

    let content_hash = ec_store::ArtifactStore::hash(&image_bytes).0;
    let artifact_id = state.artifacts.put(ArtifactKind::OriginalPage, &image_bytes)?;

    state.catalog.ingest_page(
        PaperNumber(paper),
        page,
        Version(version),
        artifact_id.0,
        content_hash,
        source_filename,
    )?;
    Ok(())
}
