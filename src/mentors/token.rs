//! Mentor access token generation.
//!
//! 80 random bytes, URL-safe base64 without padding. Long enough that the
//! token doubles as the mentor's websocket path segment without any other
//! auth handshake.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

const TOKEN_BYTES: usize = 80;

pub fn access_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_url_safe_and_unpadded() {
        let token = access_token();
        // 80 bytes -> 107 base64 chars with no padding.
        assert_eq!(token.len(), 107);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn tokens_do_not_repeat() {
        assert_ne!(access_token(), access_token());
    }
}
