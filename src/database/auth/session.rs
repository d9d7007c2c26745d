use base64::prelude::*;
use serde::{Deserialize, Serialize};

pub const TOKEN_LEN: usize = 16;

/// The session token handed to a client after login or registration
#[derive(Debug, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
}

impl Session {
    pub fn new(session_token: [u8; TOKEN_LEN]) -> Self {
        Self {
            token: BASE64_STANDARD.encode(session_token),
        }
    }
}

/// Pulls the token out of an Authorization header value. Both `Bearer <token>` and a bare token
/// are accepted.
pub fn token_from_header(header: &str) -> Option<&str> {
    let header = header.trim();
    let token = match header.split_once(char::is_whitespace) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ if header.eq_ignore_ascii_case("bearer") => "",
        _ => header,
    };

    if token.is_empty() { None } else { Some(token) }
}

/// Decodes a client token, rejecting anything that is not exactly one session id
pub fn decode_token(token: &str) -> Option<[u8; TOKEN_LEN]> {
    let bytes = BASE64_STANDARD.decode(token).ok()?;
    bytes.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_decode_back() {
        let id = [7u8; TOKEN_LEN];
        let session = Session::new(id);
        assert_eq!(decode_token(&session.token), Some(id));
    }

    #[test]
    fn header_forms() {
        assert_eq!(token_from_header("Bearer abc"), Some("abc"));
        assert_eq!(token_from_header("abc"), Some("abc"));
        assert_eq!(token_from_header("Bearer   "), None);
        assert_eq!(token_from_header("Bearer"), None);
        assert_eq!(token_from_header("  bearer\tabc  "), Some("abc"));
        assert_eq!(token_from_header(""), None);
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        assert_eq!(decode_token("not base64!"), None);
        assert_eq!(decode_token(&BASE64_STANDARD.encode([1u8; 4])), None);
    }
}
