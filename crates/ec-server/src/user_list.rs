//! Loads the on-disk user list, the same shape `serverUserInit.py`'s
//! `reloadUsers` reads (extended with an `is_admin` flag per account, since
//! this coordinator — unlike the original single-tier marker pool — has an
//! admin surface that needs at least one account seeded into it from
//! outside the running process), used to seed accounts at startup and to
//! diff against the live set on `POST /admin/users/reload`.
//!
//! ```json
//! {"alice": {"password": "s3cret!!", "is_admin": true},
//!  "bob":   {"password": "hunter22"}}
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use ec_types::{CoordError, CoordResult};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct UserListEntry {
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

pub fn load_user_list(path: &Path) -> CoordResult<BTreeMap<String, UserListEntry>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        log::error!("reading user list {}: {e}", path.display());
        CoordError::ServerError
    })?;
    serde_json::from_str(&contents)
        .map_err(|e| CoordError::BadRequest(format!("malformed user list {}: {e}", path.display())))
}
