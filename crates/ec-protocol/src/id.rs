use ec_types::PaperNumber;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdProgressResponse {
    pub done: usize,
    pub total: usize,
}

/// Metadata part of a `GET /ID/tasks/available` response; the raw id-page
/// images follow as ordered multi-part binary sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimIdResponse {
    pub paper_number: u32,
    pub image_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnIdRequest {
    pub student_id: String,
    pub student_name: String,
    #[serde(default)]
    pub already_done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoneIdTask {
    pub paper_number: u32,
    pub student_id: Option<String>,
    pub student_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperRef {
    pub paper_number: PaperNumber,
}
