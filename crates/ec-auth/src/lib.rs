//! Authority: password verification and opaque session-token lifecycle.
//!
//! No persistent state of its own beyond a key-value store of per-user
//! password hashes and active tokens (spec.md §4.1); the actual storage is
//! a pair of `redb` tables opened by the caller and handed in, so this
//! crate and `ec-catalog` share one on-disk database file without a
//! circular dependency between the two crates.

pub mod manager;
pub mod model;
pub mod password;
pub mod token;

pub use manager::Authority;
pub use model::UserRecord;
