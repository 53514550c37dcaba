use std::sync::Arc;

use ec_types::{CoordError, CoordResult};
use redb::{Database, ReadableTable, TableDefinition};

use crate::model::{StoredToken, UserRecord};
use crate::password::{hash_password, verify_password as verify_hash, DEFAULT_ITERATIONS};
use crate::token::{mask_client_token, mint};

const USERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("auth/users");
const TOKENS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("auth/tokens");

/// Issues, validates, and revokes per-user session tokens; verifies
/// passwords. The only component allowed to read the users/tokens tables.
pub struct Authority {
    db: Arc<Database>,
    master_secret: u128,
    iterations: u32,
}

impl Authority {
    /// `db` is shared with `ec-catalog` — same file, disjoint tables.
    pub fn new(db: Arc<Database>, master_secret: u128) -> CoordResult<Self> {
        let write_txn = db.begin_write().map_err(|_| CoordError::ServerError)?;
        {
            let _ = write_txn
                .open_table(USERS_TABLE)
                .map_err(|_| CoordError::ServerError)?;
            let _ = write_txn
                .open_table(TOKENS_TABLE)
                .map_err(|_| CoordError::ServerError)?;
        }
        write_txn.commit().map_err(|_| CoordError::ServerError)?;
        Ok(Self {
            db,
            master_secret,
            iterations: DEFAULT_ITERATIONS,
        })
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    fn get_user(&self, username: &str) -> CoordResult<Option<UserRecord>> {
        let txn = self.db.begin_read().map_err(|_| CoordError::ServerError)?;
        let table = txn
            .open_table(USERS_TABLE)
            .map_err(|_| CoordError::ServerError)?;
        match table.get(username).map_err(|_| CoordError::ServerError)? {
            Some(bytes) => {
                let record: UserRecord =
                    bincode::deserialize(bytes.value()).map_err(|_| CoordError::ServerError)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn put_user(&self, user: &UserRecord) -> CoordResult<()> {
        let write_txn = self.db.begin_write().map_err(|_| CoordError::ServerError)?;
        {
            let mut table = write_txn
                .open_table(USERS_TABLE)
                .map_err(|_| CoordError::ServerError)?;
            let bytes = bincode::serialize(user).map_err(|_| CoordError::ServerError)?;
            table
                .insert(user.username.as_str(), bytes.as_slice())
                .map_err(|_| CoordError::ServerError)?;
        }
        write_txn.commit().map_err(|_| CoordError::ServerError)?;
        Ok(())
    }

    /// Creates a brand new user, or updates the password/admin flag of an
    /// existing one. Never touches `enabled` or the active token.
    pub fn create_or_update_user(
        &self,
        username: &str,
        password: &str,
        is_admin: bool,
    ) -> CoordResult<()> {
        let mut record = self.get_user(username)?.unwrap_or_else(|| {
            UserRecord::new(username, String::new(), is_admin)
        });
        record.password_hash = hash_password(password, self.iterations);
        record.is_admin = is_admin;
        self.put_user(&record)
    }

    pub fn enable_user(&self, username: &str, enabled: bool) -> CoordResult<()> {
        let mut record = self
            .get_user(username)?
            .ok_or_else(|| CoordError::NotFound(username.to_string()))?;
        record.enabled = enabled;
        self.put_user(&record)?;
        if !enabled {
            self.revoke(username)?;
        }
        Ok(())
    }

    pub fn is_enabled(&self, username: &str) -> CoordResult<bool> {
        Ok(self.get_user(username)?.map(|u| u.enabled).unwrap_or(false))
    }

    /// `false` for an unknown user, same as `is_enabled` — a missing
    /// record carries no privilege.
    pub fn is_admin(&self, username: &str) -> CoordResult<bool> {
        Ok(self.get_user(username)?.map(|u| u.is_admin).unwrap_or(false))
    }

    /// Every username ever created, enabled or not. Used to diff the live
    /// set against the on-disk user list on reload (spec.md §4.8).
    pub fn list_usernames(&self) -> CoordResult<Vec<String>> {
        let txn = self.db.begin_read().map_err(|_| CoordError::ServerError)?;
        let table = txn
            .open_table(USERS_TABLE)
            .map_err(|_| CoordError::ServerError)?;
        let mut names = Vec::new();
        for entry in table.iter().map_err(|_| CoordError::ServerError)? {
            let (key, _) = entry.map_err(|_| CoordError::ServerError)?;
            names.push(key.value().to_string());
        }
        Ok(names)
    }

    /// `false` if the user is unknown, disabled, or the hash mismatches.
    /// Every one of those cases is indistinguishable to the caller.
    pub fn verify_password(&self, username: &str, password: &str) -> bool {
        match self.get_user(username) {
            Ok(Some(user)) if user.enabled => verify_hash(password, &user.password_hash),
            _ => false,
        }
    }

    /// Mints a token for `username`. Fails if one is already active; the
    /// caller must `revoke` first (this is what `reset_user_in_flight`
    /// plus `revoke` accomplish on a second login — see `ec-catalog`).
    pub fn issue_token(&self, username: &str) -> CoordResult<String> {
        let txn = self.db.begin_read().map_err(|_| CoordError::ServerError)?;
        {
            let table = txn
                .open_table(TOKENS_TABLE)
                .map_err(|_| CoordError::ServerError)?;
            if table
                .get(username)
                .map_err(|_| CoordError::ServerError)?
                .is_some()
            {
                return Err(CoordError::Conflict(format!(
                    "{username} already holds an active token"
                )));
            }
        }
        drop(txn);

        let minted = mint(self.master_secret);
        let stored = StoredToken {
            masked: minted.masked,
            issued_at: chrono::Utc::now(),
        };
        let write_txn = self.db.begin_write().map_err(|_| CoordError::ServerError)?;
        {
            let mut table = write_txn
                .open_table(TOKENS_TABLE)
                .map_err(|_| CoordError::ServerError)?;
            let bytes = bincode::serialize(&stored).map_err(|_| CoordError::ServerError)?;
            table
                .insert(username, bytes.as_slice())
                .map_err(|_| CoordError::ServerError)?;
        }
        write_txn.commit().map_err(|_| CoordError::ServerError)?;
        log::info!("issued session token for {username}");
        Ok(minted.client_hex)
    }

    /// Whether `username` currently holds any active token, irrespective
    /// of its value. Used by `ec-catalog` to fail claims fast for users
    /// who are not logged in (spec.md §4.3).
    pub fn has_active_token(&self, username: &str) -> bool {
        let Ok(txn) = self.db.begin_read() else {
            return false;
        };
        let Ok(table) = txn.open_table(TOKENS_TABLE) else {
            return false;
        };
        matches!(table.get(username), Ok(Some(_)))
    }

    /// Constant-time check of `token` against the stored masked value.
    pub fn validate(&self, username: &str, token: &str) -> bool {
        let Some(masked_claim) = mask_client_token(token, self.master_secret) else {
            return false;
        };
        let Ok(txn) = self.db.begin_read() else {
            return false;
        };
        let Ok(table) = txn.open_table(TOKENS_TABLE) else {
            return false;
        };
        let Ok(Some(bytes)) = table.get(username) else {
            return false;
        };
        let Ok(stored) = bincode::deserialize::<StoredToken>(bytes.value()) else {
            return false;
        };
        use subtle::ConstantTimeEq;
        masked_claim.to_be_bytes().ct_eq(&stored.masked.to_be_bytes()).into()
    }

    /// Clears the stored token. Idempotent.
    pub fn revoke(&self, username: &str) -> CoordResult<()> {
        let write_txn = self.db.begin_write().map_err(|_| CoordError::ServerError)?;
        {
            let mut table = write_txn
                .open_table(TOKENS_TABLE)
                .map_err(|_| CoordError::ServerError)?;
            table
                .remove(username)
                .map_err(|_| CoordError::ServerError)?;
        }
        write_txn.commit().map_err(|_| CoordError::ServerError)?;
        log::info!("revoked session token for {username}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fresh_authority() -> (Authority, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Arc::new(Database::create(dir.path().join("auth.redb")).unwrap());
        (Authority::new(db, 0x1234_5678).unwrap(), dir)
    }

    #[test]
    fn unknown_user_fails_password_check() {
        let (authority, _dir) = fresh_authority();
        assert!(!authority.verify_password("nobody", "whatever"));
    }

    #[test]
    fn disabled_user_fails_password_check_even_with_right_password() {
        let (authority, _dir) = fresh_authority();
        authority.create_or_update_user("alice", "s3cret!!", false).unwrap();
        authority.enable_user("alice", false).unwrap();
        assert!(!authority.verify_password("alice", "s3cret!!"));
    }

    #[test]
    fn issue_token_twice_conflicts() {
        let (authority, _dir) = fresh_authority();
        authority.create_or_update_user("bob", "hunter22", false).unwrap();
        let _first = authority.issue_token("bob").unwrap();
        let second = authority.issue_token("bob");
        assert!(matches!(second, Err(CoordError::Conflict(_))));
    }

    #[test]
    fn revoke_then_reissue_succeeds_with_new_token() {
        let (authority, _dir) = fresh_authority();
        authority.create_or_update_user("carol", "hunter23", false).unwrap();
        let first = authority.issue_token("carol").unwrap();
        authority.revoke("carol").unwrap();
        let second = authority.issue_token("carol").unwrap();

        assert!(!authority.validate("carol", &first));
        assert!(authority.validate("carol", &second));
    }

    #[test]
    fn revoke_is_idempotent() {
        let (authority, _dir) = fresh_authority();
        authority.create_or_update_user("dave", "hunter24", false).unwrap();
        authority.revoke("dave").unwrap();
        authority.revoke("dave").unwrap();
    }

    #[test]
    fn is_admin_reflects_the_flag_and_defaults_false_for_unknown_users() {
        let (authority, _dir) = fresh_authority();
        authority.create_or_update_user("erin", "hunter25", true).unwrap();
        authority.create_or_update_user("frank", "hunter26", false).unwrap();

        assert!(authority.is_admin("erin").unwrap());
        assert!(!authority.is_admin("frank").unwrap());
        assert!(!authority.is_admin("nobody").unwrap());
    }
}
