//! Navigation tokens
//!
//! A token is the standard base64 encoding of the JSON array of
//! [`StateObject`]s from the root state to the active leaf. It is the only
//! artifact of the engine that leaves the process (URLs, cross-dashboard
//! links), so the format must stay stable.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use percent_encoding::percent_decode_str;

use crate::error::{DashError, Result};
use crate::state::StateObject;

/// JSON-stringify then base64-encode
pub fn encode_path(path: &[StateObject]) -> Result<String> {
    let json = serde_json::to_string(path)?;
    Ok(STANDARD.encode(json.as_bytes()))
}

/// Token made safe for a URL query component
pub fn to_uri_component(token: &str) -> String {
    url::form_urlencoded::byte_serialize(token.as_bytes()).collect()
}

/// Undo the percent-escapes `to_uri_component` (or a browser) may have added.
/// `+` is kept as is: it is a base64 digit here, not an encoded space.
fn unescape(token: &str) -> Result<String> {
    percent_decode_str(token.trim())
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|e| DashError::InvalidToken {
            details: format!("bad percent-encoding: {e}"),
        })
}

/// base64-decode then JSON-parse.
///
/// Accepts standard, URI-escaped and URL-safe base64.
pub fn decode_path(token: &str) -> Result<Vec<StateObject>> {
    let token = unescape(token)?;
    if token.is_empty() {
        return Err(DashError::InvalidToken {
            details: "empty token".to_string(),
        });
    }

    let bytes = STANDARD
        .decode(token.as_bytes())
        .or_else(|_| URL_SAFE_NO_PAD.decode(token.trim_end_matches('=').as_bytes()))
        .map_err(|e| DashError::InvalidToken {
            details: format!("not base64: {e}"),
        })?;

    serde_json::from_slice(&bytes).map_err(|e| DashError::InvalidToken {
        details: format!("not a state path: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;
    use crate::params::{StateParams, ENTITY_ID};

    fn path() -> Vec<StateObject> {
        vec![
            StateObject::new("default", StateParams::new().with("deviceId", "d1")),
            StateObject::new(
                "detail",
                StateParams::new()
                    .with("deviceId", "d1")
                    .with(ENTITY_ID, EntityId::new("DEVICE", "7f3a")),
            ),
        ]
    }

    #[test]
    fn decode_inverts_encode() {
        let token = encode_path(&path()).unwrap();
        assert_eq!(decode_path(&token).unwrap(), path());
    }

    #[test]
    fn token_is_base64_of_json_array() {
        let token = encode_path(&[StateObject::new("default", StateParams::new())]).unwrap();
        let json = String::from_utf8(STANDARD.decode(token).unwrap()).unwrap();
        assert_eq!(json, r#"[{"id":"default","params":{}}]"#);
    }

    #[test]
    fn uri_escaped_tokens_decode() {
        let token = encode_path(&path()).unwrap();
        let escaped = to_uri_component(&token);
        assert_eq!(decode_path(&escaped).unwrap(), path());
    }

    #[test]
    fn lowercase_escapes_decode() {
        let token = encode_path(&path()).unwrap();
        let escaped = to_uri_component(&token)
            .replace("%2B", "%2b")
            .replace("%2F", "%2f")
            .replace("%3D", "%3d");
        assert_eq!(decode_path(&escaped).unwrap(), path());
    }

    #[test]
    fn invalid_utf8_escape_is_rejected() {
        let err = decode_path("%FF%FE").unwrap_err();
        assert!(err.to_string().contains("DASH-020"));
    }

    #[test]
    fn url_safe_tokens_decode() {
        let json = serde_json::to_string(&path()).unwrap();
        let token = URL_SAFE_NO_PAD.encode(json.as_bytes());
        assert_eq!(decode_path(&token).unwrap(), path());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_path("").is_err());
        assert!(decode_path("!!!not-base64!!!").is_err());
        let not_a_path = STANDARD.encode(br#"{"id": "x"}"#);
        let err = decode_path(&not_a_path).unwrap_err();
        assert!(err.to_string().contains("DASH-020"));
    }
}
