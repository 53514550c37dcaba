use axum::extract::State;
use axum::Json;

use ec_protocol::info::{InfoResponse, SpecResponse, API_VERSION};

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn info(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        short_name: state.short_name.clone(),
        api_version: API_VERSION.to_string(),
    })
}

/// `GET /spec`. The "full spec, server-side secrets removed" view (spec.md
/// §6): counts derived from the registered papers, nothing that touches
/// the authority's tables or the artifact store's on-disk layout.
pub async fn spec(State(state): State<AppState>) -> ApiResult<Json<SpecResponse>> {
    let papers = state.catalog.all_papers()?;
    let question_count = papers
        .iter()
        .flat_map(|p| p.question_groups.iter().map(|g| (g.question, g.version)))
        .collect::<std::collections::BTreeSet<_>>()
        .len();
    Ok(Json(SpecResponse {
        short_name: state.short_name.clone(),
        api_version: API_VERSION.to_string(),
        paper_count: papers.len(),
        question_count,
    }))
}

pub async fn ping() -> &'static str {
    "pong"
}
