//! Loads or mints the server-wide master secret used to mask session
//! tokens at rest (spec.md §4.1). Generated once and persisted next to the
//! catalog database so a restart doesn't invalidate every live token.

use std::path::Path;

use rand::RngCore;

use crate::ConfigError;

pub fn resolve(explicit_hex: Option<&str>, persisted_path: &Path) -> Result<u128, ConfigError> {
    if let Some(hex_str) = explicit_hex {
        return parse_hex(hex_str);
    }

    if let Ok(existing) = std::fs::read_to_string(persisted_path) {
        return parse_hex(existing.trim());
    }

    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    let secret = u128::from_be_bytes(bytes);
    if let Some(parent) = persisted_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(persisted_path, hex::encode(bytes));
    Ok(secret)
}

fn parse_hex(hex_str: &str) -> Result<u128, ConfigError> {
    let bytes = hex::decode(hex_str).map_err(|_| ConfigError::InvalidMasterSecret(hex_str.to_string()))?;
    if bytes.len() != 16 {
        return Err(ConfigError::InvalidMasterSecret(hex_str.to_string()));
    }
    let mut arr = [0u8; 16];
    arr.copy_from_slice(&bytes);
    Ok(u128::from_be_bytes(arr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_secret_round_trips() {
        let secret = resolve(Some("000102030405060708090a0b0c0d0e0f"), Path::new("/dev/null/unused")).unwrap();
        assert_eq!(secret, 0x0001_0203_0405_0607_0809_0a0b_0c0d_0e0f);
    }

    #[test]
    fn persisted_secret_survives_reresolve() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master_secret.hex");
        let first = resolve(None, &path).unwrap();
        let second = resolve(None, &path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(resolve(Some("not-hex"), Path::new("/dev/null/unused")).is_err());
    }
}
