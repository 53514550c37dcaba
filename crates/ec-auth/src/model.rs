use serde::{Deserialize, Serialize};

/// A user's durable record: credentials and enablement. Token lifecycle is
/// tracked separately (spec.md §3: "token lifecycle is independent of the
/// user record").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
    pub enabled: bool,
    pub is_admin: bool,
}

impl UserRecord {
    pub fn new(username: impl Into<String>, password_hash: String, is_admin: bool) -> Self {
        Self {
            username: username.into(),
            password_hash,
            enabled: true,
            is_admin,
        }
    }
}

/// The masked form of an active session token, as stored on disk. The
/// client only ever sees the unmasked hex value returned from
/// [`crate::Authority::issue_token`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub masked: u128,
    pub issued_at: chrono::DateTime<chrono::Utc>,
}
