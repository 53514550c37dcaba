use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrUpdateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnableUserRequest {
    pub username: String,
    pub enabled: bool,
}

/// Body is empty; the dispatcher diffs the on-disk user list against the
/// live set itself (spec.md §4.8).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReloadUserListRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadUserListResponse {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ResetTaskRequest {
    Id { paper_number: u32 },
    Mark { paper_number: u32, question: u32, version: u32 },
}
