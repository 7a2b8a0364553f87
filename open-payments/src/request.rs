//! Sign-and-send plumbing shared by the grant negotiator and the payment
//! client.

use std::sync::Arc;
use url::Url;

use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse, Method, Transport};
use crate::signature::RequestSigner;

/// Parse a server-supplied URL.
pub(crate) fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Error::Protocol(format!("Invalid URL '{}': {}", raw, e)))
}

/// Append a path segment to a base URL, tolerating a trailing slash on the
/// base (`https://rs.example` + `quotes` -> `https://rs.example/quotes`).
pub(crate) fn join_url(base: &str, segment: &str) -> Result<Url> {
    parse_url(&format!("{}/{}", base.trim_end_matches('/'), segment))
}

/// Sign a request, send it, and return the response untouched.
pub(crate) async fn send_signed(
    transport: &Arc<dyn Transport>,
    signer: &RequestSigner,
    method: Method,
    url: Url,
    bearer_token: Option<&str>,
    body: Option<Vec<u8>>,
) -> Result<HttpResponse> {
    let signed = signer.sign_request(method, &url, bearer_token, body.as_deref())?;
    transport
        .send(HttpRequest {
            method,
            url,
            headers: signed.to_header_list(),
            body,
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://ilp.example.dev/", "incoming-payments").unwrap().as_str(),
            "https://ilp.example.dev/incoming-payments"
        );
        assert_eq!(
            join_url("https://ilp.example.dev", "quotes").unwrap().as_str(),
            "https://ilp.example.dev/quotes"
        );
    }

    #[test]
    fn test_parse_url_rejects_garbage() {
        assert!(matches!(parse_url("not a url"), Err(Error::Protocol(_))));
    }
}
