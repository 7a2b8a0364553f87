use base64::{Engine, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha512};
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Label under which the signature and its input are emitted.
pub const SIGNATURE_LABEL: &str = "sig1";

/// Token scheme prefixed to bearer tokens in `authorization`.
pub const AUTHORIZATION_SCHEME: &str = "GNAP";

pub const CONTENT_TYPE_JSON: &str = "application/json";

pub const METHOD: &str = "@method";
pub const TARGET_URI: &str = "@target-uri";
pub const AUTHORIZATION: &str = "authorization";
pub const CONTENT_DIGEST: &str = "content-digest";
pub const CONTENT_LENGTH: &str = "content-length";
pub const CONTENT_TYPE: &str = "content-type";

/// Headers produced by signing one request.
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    /// e.g. `sig1=("@method" "@target-uri" "content-type");keyid="k1";created=1700000000`
    pub signature_input: String,
    /// e.g. `sig1=:<base64 of 64-byte Ed25519 signature>:`
    pub signature: String,
    /// `sha-512=:<base64>:`, only when a body is present.
    pub content_digest: Option<String>,
    pub content_length: Option<usize>,
    /// `GNAP <token>`, only when a bearer token is present.
    pub authorization: Option<String>,
    /// The canonical string that was signed.
    pub signature_base: String,
}

impl SignedHeaders {
    /// All headers to attach to the outbound request.
    pub fn to_header_list(&self) -> Vec<(String, String)> {
        let mut headers = vec![
            ("accept".to_string(), CONTENT_TYPE_JSON.to_string()),
            (CONTENT_TYPE.to_string(), CONTENT_TYPE_JSON.to_string()),
        ];
        if let Some(auth) = &self.authorization {
            headers.push((AUTHORIZATION.to_string(), auth.clone()));
        }
        if let Some(digest) = &self.content_digest {
            headers.push((CONTENT_DIGEST.to_string(), digest.clone()));
        }
        if let Some(len) = self.content_length {
            headers.push((CONTENT_LENGTH.to_string(), len.to_string()));
        }
        headers.push(("signature".to_string(), self.signature.clone()));
        headers.push(("signature-input".to_string(), self.signature_input.clone()));
        headers
    }
}

/// Canonical signature base plus the `@signature-params` value it ends with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureBase {
    pub canonical: String,
    pub params: String,
}

/// Compute Content-Digest for a request body using SHA-512.
/// Returns the header value in RFC 9530 format: `sha-512=:<base64>:`
pub fn content_digest(body: &[u8]) -> String {
    let hash = Sha512::digest(body);
    format!("sha-512=:{}:", STANDARD.encode(hash))
}

/// Body-derived components covered for a request, in signing order.
pub fn covered_components(has_body: bool) -> Vec<&'static str> {
    if has_body {
        vec![CONTENT_DIGEST, CONTENT_LENGTH, CONTENT_TYPE]
    } else {
        vec![CONTENT_TYPE]
    }
}

/// Build the RFC 9421 signature base.
///
/// Lines are emitted as `@method`, `@target-uri`, then `authorization` when
/// a bearer token is given, then `covered_components` in the order given,
/// each value taken from `component_values`. The final line is
/// `"@signature-params": (<names>);keyid="<key_id>";created=<created>`.
pub fn build_signature_base(
    method: &str,
    target_uri: &str,
    covered_components: &[&str],
    component_values: &HashMap<&str, String>,
    bearer_token: Option<&str>,
    key_id: &str,
    created: i64,
) -> Result<SignatureBase> {
    let mut lines: Vec<(String, String)> = vec![
        (METHOD.to_string(), method.to_uppercase()),
        (TARGET_URI.to_string(), target_uri.to_string()),
    ];
    if let Some(token) = bearer_token {
        lines.push((AUTHORIZATION.to_string(), format!("{} {}", AUTHORIZATION_SCHEME, token)));
    }
    for component in covered_components {
        let value = component_values.get(component).ok_or_else(|| {
            Error::Signing(format!("No value supplied for covered component '{}'", component))
        })?;
        lines.push((component.to_string(), value.clone()));
    }

    let names = lines
        .iter()
        .map(|(name, _)| format!("\"{}\"", name))
        .collect::<Vec<_>>()
        .join(" ");
    let params = format!("({});keyid=\"{}\";created={}", names, key_id, created);

    let mut canonical = lines
        .iter()
        .map(|(name, value)| format!("\"{}\": {}", name, value))
        .collect::<Vec<_>>()
        .join("\n");
    canonical.push_str(&format!("\n\"@signature-params\": {}", params));

    Ok(SignatureBase { canonical, params })
}
