use serde::{Deserialize, Serialize};

pub const API_VERSION: &str = "1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResponse {
    pub short_name: String,
    pub api_version: String,
}

/// Full spec view, secrets removed: no password hashes, no master secret,
/// no session tokens — just the layout an operator/client might want to
/// display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecResponse {
    pub short_name: String,
    pub api_version: String,
    pub paper_count: usize,
    pub question_count: usize,
}
