use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkProgressResponse {
    pub done: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaxMarkResponse {
    pub max_mark: u32,
}

/// Metadata part of a `GET /MK/tasks/available` response; the raw page
/// images follow as ordered multi-part binary sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimMarkResponse {
    pub paper_number: u32,
    pub question: u32,
    pub version: u32,
    pub image_ids: Vec<String>,
    pub tags: Vec<String>,
    pub integrity_check: String,
}

/// Control part of the multi-part `PATCH /MK/tasks/{paper}/{question}/{version}`
/// body; the annotated image and annotation record ride alongside as the
/// two binary parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnMarkRequest {
    pub score: u32,
    pub marking_seconds: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    pub integrity_check: String,
    /// Content digests of the annotated image and annotation record, so
    /// the dispatcher can verify what arrived matches what was declared
    /// before it ever reaches the artifact store.
    pub annotated_image_digest: String,
    pub annotation_record_digest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetTagsRequest {
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoneMarkTask {
    pub paper_number: u32,
    pub question: u32,
    pub version: u32,
    pub score: Option<u32>,
    pub tags: Vec<String>,
}

/// `GET /MK/whole_paper/{paper}` — every question group's current state
/// for one paper, for the "whole paper" review view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WholePaperResponse {
    pub paper_number: u32,
    pub questions: Vec<WholePaperQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WholePaperQuestion {
    pub question: u32,
    pub version: u32,
    pub state: String,
    pub score: Option<u32>,
}
