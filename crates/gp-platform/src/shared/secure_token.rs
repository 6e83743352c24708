//! Random tokens for QR payloads and access codes

use base64::Engine;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};

const ACCESS_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// 32 random bytes, url-safe base64 without padding (43 chars)
pub fn url_safe_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Uppercase alphanumeric code a guard can type on a phone
pub fn access_code(len: usize) -> String {
    let mut rng = OsRng;
    (0..len)
        .map(|_| ACCESS_CODE_CHARSET[rng.gen_range(0..ACCESS_CODE_CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_safe_token() {
        let token = url_safe_token();
        assert_eq!(token.len(), 43);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(token, url_safe_token());
    }

    #[test]
    fn test_access_code() {
        let code = access_code(8);
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
