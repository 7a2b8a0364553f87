//! JSON encoding at the wire boundary.
//!
//! Field renames needed by the wire format (e.g. the GNAP `continue` key)
//! live as serde attributes on the types themselves; payload text is never
//! rewritten.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Encode a request model. The returned bytes are exactly what is sent and
/// what the content digest is computed over.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| Error::Protocol(format!("Failed to encode request: {}", e)))
}

pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| {
        Error::Protocol(format!(
            "Failed to decode {}: {}",
            std::any::type_name::<T>().rsplit("::").next().unwrap_or("response"),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use open_payments_types::{GrantResponse, WalletAddress};

    #[test]
    fn test_decode_malformed_is_protocol_error() {
        let err = decode::<WalletAddress>(b"{\"id\": 42}").unwrap_err();
        assert!(matches!(err, Error::Protocol(msg) if msg.contains("WalletAddress")));
    }

    #[test]
    fn test_decode_grant_with_continue_key() {
        let body = br#"{"continue":{"access_token":{"value":"t"},"uri":"https://as.example/continue/1","wait":0}}"#;
        let resp: GrantResponse = decode(body).unwrap();
        assert_eq!(resp.continuation.unwrap().uri, "https://as.example/continue/1");
    }
}
