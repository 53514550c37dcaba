use axum::extract::{Multipart, Path, State};
use axum::response::IntoResponse;
use axum::Json;

use ec_protocol::mark::{
    ClaimMarkResponse, DoneMarkTask, MarkProgressResponse, MaxMarkResponse, ReturnMarkRequest,
    SetTagsRequest, WholePaperQuestion, WholePaperResponse,
};
use ec_store::{ArtifactKind, ArtifactStore};
use ec_types::{CoordError, PaperNumber, Question, Version};

use crate::auth_middleware::AuthedUser;
use crate::error::ApiResult;
use crate::multipart_response::{ImagePart, MultipartImageResponse};
use crate::state::AppState;

pub async fn progress(
    State(state): State<AppState>,
    Path((question, version)): Path<(u32, u32)>,
) -> ApiResult<Json<MarkProgressResponse>> {
    let (done, total) = state
        .progress
        .mark_progress(Question(question), Version(version))?;
    Ok(Json(MarkProgressResponse { done, total }))
}

pub async fn max_mark(
    State(state): State<AppState>,
    Path((question, version)): Path<(u32, u32)>,
) -> ApiResult<Json<MaxMarkResponse>> {
    let max_mark = state
        .mark_queue
        .max_mark(Question(question), Version(version))?;
    Ok(Json(MaxMarkResponse { max_mark }))
}

/// `GET /MK/tasks/available/{question}/{version}`. Empty queue is `null`,
/// same convention as the ID queue; a claimed task carries its page images
/// as a multi-part response instead of bare metadata, since the marker
/// needs the pixels to annotate (spec.md §6).
pub async fn claim_next(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path((question, version)): Path<(u32, u32)>,
) -> ApiResult<axum::response::Response> {
    let Some(claimed) = state
        .mark_queue
        .claim_next(&user, Question(question), Version(version))?
    else {
        return Ok(Json(Option::<ClaimMarkResponse>::None).into_response());
    };

    let metadata = ClaimMarkResponse {
        paper_number: claimed.paper_number.0,
        question,
        version,
        image_ids: claimed.page_artifact_ids.clone(),
        tags: claimed.tags,
        integrity_check: claimed.integrity_check,
    };
    let metadata_json = serde_json::to_vec(&metadata).map_err(|_| CoordError::ServerError)?;

    let mut images = Vec::with_capacity(claimed.page_artifact_ids.len());
    for (index, artifact_id) in claimed.page_artifact_ids.iter().enumerate() {
        let bytes = state
            .artifacts
            .get(ArtifactKind::OriginalPage, &ec_store::ArtifactId(artifact_id.clone()))?;
        images.push(ImagePart {
            name: format!("image-{index}"),
            bytes,
        });
    }

    Ok(MultipartImageResponse { metadata_json, images }.into_response())
}

/// `GET /MK/tasks/:paper/:question/:version/images`. Separate from
/// `claim_next` so a marker who already holds the task (or an admin
/// reviewing a `Done` one) can re-fetch the pixels without claiming again
/// (spec.md §6).
pub async fn read_images(
    State(state): State<AppState>,
    Path((paper, question, version)): Path<(u32, u32, u32)>,
) -> ApiResult<axum::response::Response> {
    let artifact_ids = state
        .catalog
        .mark_task_images(PaperNumber(paper), Question(question), Version(version))?;
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
    Path((question, version)): Path<(u32, u32)>,
) -> ApiResult<Json<Vec<DoneMarkTask>>> {
    let tasks = state
        .mark_queue
        .list_done(Question(question), Version(version))?;
    Ok(Json(
        tasks
            .into_iter()
            .map(|t| DoneMarkTask {
                paper_number: t.paper_number.0,
                question: t.question.0,
                version: t.version.0,
                score: t.score,
                tags: t.tags,
            })
            .collect(),
    ))
}

/// `PATCH /MK/tasks/{paper}/{question}/{version}`. Multi-part request: a
/// `control` JSON part plus `annotated_image` and `annotation_record`
/// binary parts. Each binary part's content digest is checked against the
/// control part's declared digest before anything is written to the
/// artifact store, so a truncated or mismatched upload never reaches the
/// catalog as a completed task.
pub async fn return_mark(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path((paper, question, version)): Path<(u32, u32, u32)>,
    mut multipart: Multipart,
) -> ApiResult<()> {
    let mut control: Option<ReturnMarkRequest> = None;
    let mut annotated_image: Option<Vec<u8>> = None;
    let mut annotation_record: Option<Vec<u8>> = None;

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
                control = Some(
                    serde_json::from_slice(&bytes)
                        .map_err(|e| CoordError::BadRequest(e.to_string()))?,
                );
            }
            "annotated_image" => {
                annotated_image = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| CoordError::BadRequest(e.to_string()))?
                        .to_vec(),
                );
            }
            "annotation_record" => {
                annotation_record = Some(
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

    let control = control.ok_or_else(|| CoordError::BadRequest("missing control part".into()))?;
    let annotated_image = annotated_image
        .ok_or_else(|| CoordError::BadRequest("missing annotated_image part".into()))?;
    let annotation_record = annotation_record
        .ok_or_else(|| CoordError::BadRequest("missing annotation_record part".into()))?;

    if ArtifactStore::hash(&annotated_image).0 != control.annotated_image_digest {
        return Err(CoordError::IntegrityMismatch("annotated image digest mismatch".into()).into());
    }
    if ArtifactStore::hash(&annotation_record).0 != control.annotation_record_digest {
        return Err(
            CoordError::IntegrityMismatch("annotation record digest mismatch".into()).into(),
        );
    }

    let annotated_id = state.artifacts.put(ArtifactKind::Annotated, &annotated_image)?;
    let record_id = state
        .artifacts
        .put(ArtifactKind::AnnotationRecord, &annotation_record)?;

    state.mark_queue.return_marked(
        &user,
        PaperNumber(paper),
        Question(question),
        Version(version),
        control.score,
        control.marking_seconds,
        control.tags,
        annotated_id.0,
        record_id.0,
        control.integrity_check,
    )?;
    Ok(())
}

pub async fn abandon(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path((paper, question, version)): Path<(u32, u32, u32)>,
) -> ApiResult<()> {
    state
        .mark_queue
        .abandon(&user, PaperNumber(paper), Question(question), Version(version))?;
    Ok(())
}

pub async fn set_tags(
    State(state): State<AppState>,
    Path((paper, question, version)): Path<(u32, u32, u32)>,
    Json(request): Json<SetTagsRequest>,
) -> ApiResult<()> {
    state.mark_queue.set_tags(
        PaperNumber(paper),
        Question(question),
        Version(version),
        request.tags,
    )?;
    Ok(())
}

pub async fn whole_paper(
    State(state): State<AppState>,
    Path(paper): Path<u32>,
) -> ApiResult<Json<WholePaperResponse>> {
    let paper_spec = state.catalog.get_paper(PaperNumber(paper))?;
    let mut questions = Vec::with_capacity(paper_spec.question_groups.len());
    for group in &paper_spec.question_groups {
        let task = state
            .catalog
            .get_mark_task(PaperNumber(paper), group.question, group.version)?;
        let (state_label, score) = match task {
            Some(t) => (state_label(&t.state), t.score),
            None => ("Todo".to_string(), None),
        };
        questions.push(WholePaperQuestion {
            question: group.question.0,
            version: group.version.0,
            state: state_label,
            score,
        });
    }
    Ok(Json(WholePaperResponse {
        paper_number: paper,
        questions,
    }))
}

fn state_label(state: &ec_catalog::TaskState) -> String {
    match state {
        ec_catalog::TaskState::Todo => "Todo".to_string(),
        ec_catalog::TaskState::OutWith(user) => format!("OutWith({user})"),
        ec_catalog::TaskState::Done => "Done".to_string(),
    }
}
