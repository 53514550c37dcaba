//! Operator configuration: CLI flags layered over an optional on-disk JSON
//! config file, in the shape of `form-config::OperatorConfig` — a `clap`
//! `Args` struct with an explicit `from_file` loader — minus the wallet and
//! mnemonic machinery this server has no use for.

pub mod master_secret;

use std::path::PathBuf;

use clap::Args;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid master secret hex: {0}")]
    InvalidMasterSecret(String),
}

/// Everything the coordinator daemon needs to start. CLI flags and the JSON
/// config file share this same shape; a flag passed on the command line
/// overrides the corresponding field loaded from the file.
#[derive(Debug, Clone, Serialize, Deserialize, Args)]
pub struct CoordinatorConfig {
    /// Address to bind the HTTPS listener to.
    #[clap(long, default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Port to bind the HTTPS listener to.
    #[clap(long, default_value = "41984")]
    pub port: u16,

    /// PEM-encoded TLS certificate chain.
    #[clap(long = "tls-cert")]
    pub tls_cert_path: PathBuf,

    /// PEM-encoded TLS private key.
    #[clap(long = "tls-key")]
    pub tls_key_path: PathBuf,

    /// JSON list of `{username, password, is_admin}` records, applied at
    /// startup and on SIGHUP-triggered reload (spec.md §4.8 `reload_user_list`).
    #[clap(long = "user-list")]
    pub user_list_path: PathBuf,

    /// Path to the catalog's `redb` database file. Shared with the
    /// authority's users/tokens tables.
    #[clap(long = "catalog-db", default_value = "exam-coordinator/catalog.redb")]
    pub catalog_db_path: PathBuf,

    /// Root directory of the content-addressed artifact store.
    #[clap(long = "artifact-root", default_value = "exam-coordinator/artifacts")]
    pub artifact_store_root: PathBuf,

    /// Hex-encoded 128-bit master secret used to mask session tokens at
    /// rest. If omitted, one is generated on first startup and persisted
    /// alongside the catalog database so restarts don't invalidate every
    /// live token.
    #[clap(long = "master-secret")]
    pub master_secret_hex: Option<String>,

    /// PBKDF2-HMAC-SHA256 iteration count for password hashing.
    #[clap(long = "pbkdf2-iterations", default_value = "100000")]
    pub pbkdf2_iterations: u32,

    /// Per-request deadline, in seconds, enforced by the dispatcher's
    /// timeout layer (spec.md §5).
    #[clap(long = "request-timeout-secs", default_value = "30")]
    pub request_timeout_secs: u64,
}

impl CoordinatorConfig {
    /// Loads a config from a JSON file. Fields present on the CLI should be
    /// merged in by the caller afterward (`clap`'s own parse already
    /// produced the CLI half of this same struct).
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let bytes = std::fs::read(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn save_to_file(&self, path: impl Into<PathBuf>) -> std::io::Result<()> {
        let path = path.into();
        let bytes = serde_json::to_vec_pretty(self).expect("config always serializes");
        std::fs::write(path, bytes)
    }
}
