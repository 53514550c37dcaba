//! Salted, adaptive password hashing. Mirrors the source's
//! `passlib.CryptContext(schemes=["pbkdf2_sha256", "bcrypt"])`: PBKDF2-HMAC-SHA256
//! is the scheme actually used here (bcrypt is not pulled in as a dependency
//! since nothing in this deployment needs to read pre-existing bcrypt
//! hashes), with a configurable iteration count.
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Hashes `password` with a fresh random salt. The returned string encodes
/// scheme, iteration count, salt, and hash, hex-separated, so the iteration
/// count can be raised later without invalidating stored hashes.
pub fn hash_password(password: &str, iterations: u32) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let mut out = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut out);
    format!(
        "pbkdf2-sha256${iterations}${}${}",
        hex::encode(salt),
        hex::encode(out)
    )
}

/// Verifies `password` against a hash produced by [`hash_password`].
/// Constant-time in the digest comparison; malformed stored hashes verify
/// false rather than panicking.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt_hex), Some(hash_hex)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if scheme != "pbkdf2-sha256" {
        return false;
    }
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    let Ok(expected) = hex::decode(hash_hex) else {
        return false;
    };
    if expected.len() != HASH_LEN {
        return false;
    }

    let mut actual = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut actual);
    actual.ct_eq(&expected[..]).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let hash = hash_password("correct horse battery staple", 1_000);
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn rejects_garbage_hash() {
        assert!(!verify_password("anything", "not-a-real-hash"));
        assert!(!verify_password("anything", "pbkdf2-sha256$notanumber$aa$bb"));
    }

    #[test]
    fn same_password_hashes_differently_each_time() {
        let a = hash_password("hunter2", 1_000);
        let b = hash_password("hunter2", 1_000);
        assert_ne!(a, b, "salts must differ");
        assert!(verify_password("hunter2", &a));
        assert!(verify_password("hunter2", &b));
    }
}
