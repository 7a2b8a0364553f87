//! Error taxonomy for Open Payments operations.
//!
//! Callers branch on the variant to decide whether to retry, re-negotiate a
//! grant, send the user through an interaction, or give up.

use open_payments_types::AccessError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport unreachable or timed out.
    #[error("network error: {0}")]
    Network(String),

    /// Key loading, encoding or signing failed. Not retryable.
    #[error("signing error: {0}")]
    Signing(String),

    /// Response body did not match the expected grammar, or the server
    /// returned something it is not allowed to (e.g. widened access).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// 401/403 from a server, or a local scope/expiry check failed before
    /// the request was sent.
    #[error("authorization error: {0}")]
    Authorization(String),

    /// The grant is waiting on the resource owner. Not a failure: send the
    /// user to `redirect` and continue the grant afterwards.
    #[error("interaction required at {redirect}")]
    InteractionRequired { redirect: String },

    /// The grant cannot be continued for another `retry_after` seconds.
    /// Zero means it may be continued now.
    #[error("grant not ready to continue; retry in {retry_after}s")]
    PrematureContinuation { retry_after: u64 },

    /// The authorization server resolved the continuation without a grant.
    #[error("grant denied: {0}")]
    GrantDenied(String),

    /// The requested amount exceeds the spend limit on the grant.
    #[error("spend limit exceeded: {0}")]
    LimitExceeded(String),

    /// Any other non-success status.
    #[error("unexpected HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("invalid access descriptor: {0}")]
    InvalidAccess(#[from] AccessError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the same call may succeed if repeated later unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_) | Error::PrematureContinuation { .. })
    }

    /// Map a non-success response status to the matching error kind.
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let body = String::from_utf8_lossy(body).into_owned();
        match status {
            401 | 403 => Error::Authorization(format!("server returned {}: {}", status, body)),
            _ => Error::HttpStatus { status, body },
        }
    }
}
