//! Transport seam between the signing/grant logic and the network.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};

/// Global shared HTTP client singleton.
///
/// Reuses a single connection pool across every transport built with
/// [`ReqwestTransport::shared`]. `Client::clone()` is an `Arc` increment.
static SHARED_CLIENT: Lazy<Client> = Lazy::new(|| {
    build_client(Duration::from_secs(120)).unwrap_or_else(|e| {
        log::warn!("[HTTP] Falling back to default client: {}", e);
        Client::new()
    })
});

fn build_client(timeout: Duration) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .pool_max_idle_per_host(5)
        .pool_idle_timeout(Duration::from_secs(90))
        .timeout(timeout)
        .build()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Pass success responses through; map everything else to an error kind.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::from_status(self.status, &self.body))
        }
    }
}

/// Performs a single request. Implementations never sign, retry or
/// interpret bodies.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// [`Transport`] backed by reqwest.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn shared() -> Self {
        Self {
            client: SHARED_CLIENT.clone(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = build_client(timeout)
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };
        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| {
                Error::Network(format!(
                    "{} {} failed: {}",
                    request.method.as_str(),
                    request.url,
                    e
                ))
            })?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("Failed to read response body: {}", e)))?;

        log::debug!(
            "[HTTP] {} {} -> {} ({} bytes)",
            request.method.as_str(),
            request.url,
            status,
            body.len()
        );

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays queued responses in order and records every request.
    #[derive(Default)]
    pub struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<HttpResponse>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_json(&self, status: u16, body: serde_json::Value) {
            self.responses.lock().unwrap().push_back(Ok(HttpResponse {
                status,
                body: body.to_string().into_bytes(),
            }));
        }

        pub fn push_raw(&self, status: u16, body: &str) {
            self.responses.lock().unwrap().push_back(Ok(HttpResponse {
                status,
                body: body.as_bytes().to_vec(),
            }));
        }

        pub fn push_error(&self, error: Error) {
            self.responses.lock().unwrap().push_back(Err(error));
        }

        pub fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Network("no scripted response".to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_for_status() {
        let ok = HttpResponse { status: 201, body: vec![] };
        assert!(ok.error_for_status().is_ok());

        let unauthorized = HttpResponse { status: 401, body: b"invalid token".to_vec() };
        assert!(matches!(unauthorized.error_for_status(), Err(Error::Authorization(_))));

        let missing = HttpResponse { status: 404, body: vec![] };
        assert!(matches!(
            missing.error_for_status(),
            Err(Error::HttpStatus { status: 404, .. })
        ));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = HttpRequest {
            method: Method::Get,
            url: Url::parse("https://example.com/").unwrap(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: None,
        };
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("signature"), None);
    }
}
