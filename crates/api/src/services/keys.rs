//! Random opaque credentials: refresh tokens and partner API keys.

use rand::RngCore;

/// Bytes of entropy in a refresh token.
pub const REFRESH_TOKEN_BYTES: usize = 32;
/// Bytes of entropy in a partner API key.
pub const API_KEY_BYTES: usize = 32;
/// Bytes of entropy in a partner secret key.
pub const SECRET_KEY_BYTES: usize = 64;

/// `len` random bytes from the thread-local CSPRNG, hex encoded.
#[must_use]
pub fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// A new partner key pair: `(api_key, secret_key)`.
#[must_use]
pub fn partner_key_pair() -> (String, String) {
    (random_hex(API_KEY_BYTES), random_hex(SECRET_KEY_BYTES))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_hex_length_and_alphabet() {
        let token = random_hex(REFRESH_TOKEN_BYTES);
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_random_hex_differs_between_calls() {
        assert_ne!(random_hex(16), random_hex(16));
    }

    #[test]
    fn test_partner_key_pair_sizes() {
        let (api_key, secret_key) = partner_key_pair();
        assert_eq!(api_key.len(), 64);
        assert_eq!(secret_key.len(), 128);
    }
}
