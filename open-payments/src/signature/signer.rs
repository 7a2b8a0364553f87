//! RFC 9421 HTTP Message Signatures with Ed25519
//!
//! Signs outgoing Open Payments requests so authorization and resource
//! servers can verify the body and the caller's registered key.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::Utc;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

use super::types::{
    AUTHORIZATION_SCHEME, CONTENT_DIGEST, CONTENT_LENGTH, CONTENT_TYPE, CONTENT_TYPE_JSON,
    SIGNATURE_LABEL, SignedHeaders, build_signature_base, content_digest, covered_components,
};
use crate::error::{Error, Result};
use crate::http::Method;
use crate::keys::KeyProvider;

/// Signs outgoing HTTP requests with the client's Ed25519 key.
#[derive(Clone)]
pub struct RequestSigner {
    key_provider: Arc<dyn KeyProvider>,
}

impl RequestSigner {
    pub fn new(key_provider: Arc<dyn KeyProvider>) -> Self {
        Self { key_provider }
    }

    pub fn key_id(&self) -> &str {
        self.key_provider.key_id()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key_provider.verifying_key()
    }

    /// Sign an outgoing request and return the headers to attach.
    ///
    /// * `method`      : request method
    /// * `target_uri`  : the exact URL the request is sent to
    /// * `bearer_token`: GNAP access token, if the request carries one
    /// * `body`        : request body bytes, exactly as they will be sent
    pub fn sign_request(
        &self,
        method: Method,
        target_uri: &Url,
        bearer_token: Option<&str>,
        body: Option<&[u8]>,
    ) -> Result<SignedHeaders> {
        self.sign_request_at(method, target_uri, bearer_token, body, Utc::now().timestamp())
    }

    /// [`sign_request`](Self::sign_request) with an explicit `created` time.
    pub fn sign_request_at(
        &self,
        method: Method,
        target_uri: &Url,
        bearer_token: Option<&str>,
        body: Option<&[u8]>,
        created: i64,
    ) -> Result<SignedHeaders> {
        // 1. Content-Digest first: it is itself a covered component
        let digest = body.map(content_digest);

        // 2. Covered components and their values
        let components = covered_components(body.is_some());
        let mut values: HashMap<&str, String> = HashMap::new();
        values.insert(CONTENT_TYPE, CONTENT_TYPE_JSON.to_string());
        if let (Some(body), Some(digest)) = (body, &digest) {
            values.insert(CONTENT_DIGEST, digest.clone());
            values.insert(CONTENT_LENGTH, body.len().to_string());
        }

        // 3. Signature base, ending in the @signature-params line
        let base = build_signature_base(
            method.as_str(),
            target_uri.as_str(),
            &components,
            &values,
            bearer_token,
            self.key_provider.key_id(),
            created,
        )?;

        log::debug!(
            "[SIGN] Signature base ({} bytes):\n{}",
            base.canonical.len(),
            redact_token(&base.canonical, bearer_token)
        );

        // 4. Sign
        let signature = self.sign(&base.canonical)?;

        log::info!(
            "[SIGN] Signed request {} {} with key {}",
            method.as_str(),
            target_uri,
            self.key_provider.key_id()
        );

        Ok(SignedHeaders {
            signature_input: format!("{}={}", SIGNATURE_LABEL, base.params),
            signature: format!("{}=:{}:", SIGNATURE_LABEL, BASE64.encode(&signature)),
            content_length: body.map(|b| b.len()),
            content_digest: digest,
            authorization: bearer_token.map(|t| format!("{} {}", AUTHORIZATION_SCHEME, t)),
            signature_base: base.canonical,
        })
    }

    /// Ed25519 signature over the UTF-8 bytes of a canonical signature base.
    pub fn sign(&self, signature_base: &str) -> Result<Vec<u8>> {
        self.key_provider.sign(signature_base.as_bytes())
    }
}

/// Verify a `signature` header value (`sig1=:<b64>:`) against a signature base.
pub fn verify_signature_base(
    verifying_key: &VerifyingKey,
    signature_base: &str,
    signature_header: &str,
) -> Result<()> {
    let encoded = signature_header
        .strip_prefix(SIGNATURE_LABEL)
        .and_then(|rest| rest.strip_prefix("=:"))
        .and_then(|rest| rest.strip_suffix(':'))
        .ok_or_else(|| {
            Error::Signing(format!("Malformed signature header: {}", signature_header))
        })?;
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| Error::Signing(format!("Signature is not valid base64: {}", e)))?;
    let signature = Signature::from_slice(&bytes)
        .map_err(|e| Error::Signing(format!("Signature has wrong length: {}", e)))?;
    verifying_key
        .verify(signature_base.as_bytes(), &signature)
        .map_err(|e| Error::Signing(format!("Signature verification failed: {}", e)))
}

fn redact_token(base: &str, token: Option<&str>) -> String {
    match token {
        Some(t) if !t.is_empty() => base.replace(t, "<redacted>"),
        _ => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::test_support::{TEST_KEY_ID, test_key_provider};

    fn signer() -> RequestSigner {
        RequestSigner::new(test_key_provider())
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn auth_url() -> Url {
        url("https://auth.example.dev/")
    }

    #[test]
    fn test_sign_post_with_body() {
        let body = br#"{"walletAddress":"https://ilp.example.dev/alice"}"#;
        let headers = signer()
            .sign_request_at(
                Method::Post,
                &url("https://ilp.example.dev/incoming-payments"),
                Some("tok-123"),
                Some(body),
                1_700_000_000,
            )
            .unwrap();

        assert_eq!(
            headers.signature_input,
            format!(
                "sig1=(\"@method\" \"@target-uri\" \"authorization\" \"content-digest\" \"content-length\" \"content-type\");keyid=\"{}\";created=1700000000",
                TEST_KEY_ID
            )
        );
        assert_eq!(headers.content_digest.as_deref(), Some(content_digest(body).as_str()));
        assert_eq!(headers.content_length, Some(body.len()));
        assert_eq!(headers.authorization.as_deref(), Some("GNAP tok-123"));
        assert!(headers.signature.starts_with("sig1=:"));
        assert!(headers.signature.ends_with(':'));
    }

    #[test]
    fn test_sign_without_body_or_token() {
        let headers = signer()
            .sign_request_at(Method::Post, &auth_url(), None, None, 42)
            .unwrap();
        assert_eq!(
            headers.signature_input,
            format!(
                "sig1=(\"@method\" \"@target-uri\" \"content-type\");keyid=\"{}\";created=42",
                TEST_KEY_ID
            )
        );
        assert!(headers.content_digest.is_none());
        assert!(headers.authorization.is_none());
        assert!(!headers.signature_base.contains("authorization"));
    }

    #[test]
    fn test_signature_input_matches_signature_params_line() {
        let headers = signer()
            .sign_request_at(Method::Post, &auth_url(), Some("t"), Some(b"{}"), 7)
            .unwrap();
        let params_line = headers.signature_base.lines().last().unwrap();
        let params = params_line.strip_prefix("\"@signature-params\": ").unwrap();
        assert_eq!(headers.signature_input, format!("sig1={}", params));
    }

    #[test]
    fn test_signature_round_trip_verifies() {
        let signer = signer();
        let headers = signer
            .sign_request_at(Method::Post, &auth_url(), None, Some(b"{\"a\":1}"), 99)
            .unwrap();
        let key = signer.verifying_key();
        assert!(verify_signature_base(&key, &headers.signature_base, &headers.signature).is_ok());
    }

    #[test]
    fn test_tampered_base_fails_verification() {
        let signer = signer();
        let headers = signer
            .sign_request_at(Method::Post, &auth_url(), None, Some(b"{\"a\":1}"), 99)
            .unwrap();

        let mut tampered = headers.signature_base.clone().into_bytes();
        tampered[3] ^= 0x01;
        let tampered = String::from_utf8(tampered).unwrap();
        let key = signer.verifying_key();
        assert!(verify_signature_base(&key, &tampered, &headers.signature).is_err());
    }

    #[test]
    fn test_tampered_signature_fails_verification() {
        let signer = signer();
        let headers = signer
            .sign_request_at(
                Method::Get,
                &url("https://ilp.example.dev/quotes/1"),
                Some("t"),
                None,
                5,
            )
            .unwrap();

        let b64 = headers.signature.strip_prefix("sig1=:").unwrap().strip_suffix(':').unwrap();
        let mut raw = BASE64.decode(b64).unwrap();
        raw[0] ^= 0x80;
        let flipped = format!("sig1=:{}:", BASE64.encode(&raw));
        let key = signer.verifying_key();
        assert!(verify_signature_base(&key, &headers.signature_base, &flipped).is_err());
    }

    #[test]
    fn test_signing_is_deterministic_for_fixed_created() {
        let a = signer()
            .sign_request_at(Method::Post, &auth_url(), None, Some(b"{}"), 1)
            .unwrap();
        let b = signer()
            .sign_request_at(Method::Post, &auth_url(), None, Some(b"{}"), 1)
            .unwrap();
        assert_eq!(a.signature, b.signature);
    }

    #[test]
    fn test_header_list_carries_every_signed_component() {
        let headers = signer()
            .sign_request_at(
                Method::Post,
                &url("https://ilp.example.dev/quotes"),
                Some("t"),
                Some(b"{}"),
                1,
            )
            .unwrap();
        let list = headers.to_header_list();
        let names: Vec<&str> = list.iter().map(|(k, _)| k.as_str()).collect();
        for name in [
            "authorization",
            "content-digest",
            "content-length",
            "content-type",
            "signature",
            "signature-input",
        ] {
            assert!(names.contains(&name), "missing header {}", name);
        }
    }
}
