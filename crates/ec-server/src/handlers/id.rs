use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use ec_protocol::id::{ClaimIdResponse, DoneIdTask, IdProgressResponse, ReturnIdRequest};
use ec_store::ArtifactKind;
use ec_types::{CoordError, PaperNumber};

use crate::auth_middleware::AuthedUser;
use crate::error::ApiResult;
use crate::multipart_response::{ImagePart, MultipartImageResponse};
use crate::state::AppState;

pub async fn progress(State(state): State<AppState>) -> ApiResult<Json<IdProgressResponse>> {
    let (done, total) = state.progress.id_progress()?;
    Ok(Json(IdProgressResponse { done, total }))
}

/// `GET /ID/tasks/available`. `204 No Content` style emptiness ("no task
/// available", distinct from an error, spec.md §7) is represented as a
/// `null` JSON body rather than a distinct HTTP status, matching the
/// envelope convention used for the other claim endpoints.
pub async fn claim_next(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
) -> ApiResult<Json<Option<ClaimIdResponse>>> {
    let claimed = state.id_queue.claim_next(&user)?;
    Ok(Json(claimed.map(|c| ClaimIdResponse {
        paper_number: c.paper_number.0,
        image_ids: c.id_page_artifact_ids,
    })))
}

/// `GET /ID/tasks/:paper/images`. Separate from `claim_next` so a client
/// that already holds the task (or an admin reviewing a `Done` one) can
/// re-fetch the pixels without claiming again (spec.md §6).
pub async fn read_images(
    State(state): State<AppState>,
    Path(paper): Path<u32>,
) -> ApiResult<axum::response::Response> {
    let artifact_ids = state.catalog.id_task_images(PaperNumber(paper))?;
    let mut images = Vec::with_capacity(artifact_ids.len());
    for (index, artifact_id) in artifact_ids.iter().enumerate() {
        let bytes = state
            .artifacts
            .get(ArtifactKind::OriginalPage, &ec_store::ArtifactId(artifact_id.clone()))?;
        images.push(ImagePart {
            name: format!("image-{index}"),
            bytes,
        });
    }
    let metadata_json = serde_json::to_vec(&artifact_ids).map_err(|_| CoordError::ServerError)?;
    Ok(MultipartImageResponse { metadata_json, images }.into_response())
}

pub async fn list_done(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
) -> ApiResult<Json<Vec<DoneIdTask>>> {
    let tasks = state.id_queue.list_done(&user)?;
    Ok(Json(
        tasks
            .into_iter()
            .map(|t| DoneIdTask {
                paper_number: t.paper_number.0,
                student_id: t.student_id,
                student_name: t.student_name,
            })
            .collect(),
    ))
}

pub async fn return_identified(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(paper): Path<u32>,
    Json(request): Json<ReturnIdRequest>,
) -> ApiResult<()> {
    state.id_queue.return_identified(
        &user,
        PaperNumber(paper),
        request.student_id,
        request.student_name,
        request.already_done,
    )?;
    Ok(())
}

pub async fn abandon(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(paper): Path<u32>,
) -> ApiResult<()> {
    state.id_queue.abandon(&user, PaperNumber(paper))?;
    Ok(())
}
