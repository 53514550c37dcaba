//! Session token minting and masking.
//!
//! Mirrors `original_source/plom/server/authenticate.py`'s `create_token`/
//! `validate_token`: the client gets a random 128-bit value as hex; the
//! value actually written to disk is that value XORed with a server-wide
//! master secret, so a read of the token table alone does not reveal live
//! tokens.
use rand::RngCore;

/// A freshly minted token: the hex value returned to the client, and the
/// masked value persisted in the token table.
pub struct MintedToken {
    pub client_hex: String,
    pub masked: u128,
}

/// Generates a new 128-bit token and masks it against `master_secret`.
pub fn mint(master_secret: u128) -> MintedToken {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    let client = u128::from_be_bytes(bytes);
    MintedToken {
        client_hex: hex::encode(bytes),
        masked: client ^ master_secret,
    }
}

/// Parses a client-supplied hex token into its integer form, masking it
/// against `master_secret` for comparison against the stored value.
pub fn mask_client_token(client_hex: &str, master_secret: u128) -> Option<u128> {
    let bytes = hex::decode(client_hex).ok()?;
    if bytes.len() != 16 {
        return None;
    }
    let mut arr = [0u8; 16];
    arr.copy_from_slice(&bytes);
    Some(u128::from_be_bytes(arr) ^ master_secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_and_validate_round_trip() {
        let secret = 0xdead_beef_u128;
        let minted = mint(secret);
        let masked_again = mask_client_token(&minted.client_hex, secret).unwrap();
        assert_eq!(masked_again, minted.masked);
    }

    #[test]
    fn wrong_secret_does_not_validate() {
        let minted = mint(1);
        let masked_with_wrong_secret = mask_client_token(&minted.client_hex, 2).unwrap();
        assert_ne!(masked_with_wrong_secret, minted.masked);
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(mask_client_token("not-hex", 1).is_none());
        assert!(mask_client_token("aa", 1).is_none());
    }
}
