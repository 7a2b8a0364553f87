use chrono::{DateTime, Duration, Utc};
use open_payments_types::{
    AccessAction, AccessDescriptor, AccessTokenResponse, AccessType, ContinueResponse,
    GrantResponse,
};

use crate::error::{Error, Result};

/// Server-supplied intervals are clamped to this before date arithmetic.
const MAX_INTERVAL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

fn after(start: DateTime<Utc>, secs: u64) -> DateTime<Utc> {
    start
        .checked_add_signed(Duration::seconds(secs.min(MAX_INTERVAL_SECS) as i64))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Resource access token issued by an authorization server.
///
/// The resolved `access` list is what the server actually granted, which may
/// be narrower than what was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: String,
    manage: String,
    expires_in: Option<u64>,
    access: Vec<AccessDescriptor>,
    issued_at: DateTime<Utc>,
}

impl AccessToken {
    /// Rebuild a token obtained elsewhere (e.g. persisted by the caller).
    pub fn new(
        value: impl Into<String>,
        manage: impl Into<String>,
        expires_in: Option<u64>,
        access: Vec<AccessDescriptor>,
    ) -> Self {
        Self {
            value: value.into(),
            manage: manage.into(),
            expires_in,
            access,
            issued_at: Utc::now(),
        }
    }

    pub fn with_issued_at(mut self, issued_at: DateTime<Utc>) -> Self {
        self.issued_at = issued_at;
        self
    }

    fn from_response(response: AccessTokenResponse, issued_at: DateTime<Utc>) -> Self {
        Self {
            value: response.value,
            manage: response.manage,
            expires_in: response.expires_in,
            access: response.access,
            issued_at,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Token management URI (rotation/revocation).
    pub fn manage(&self) -> &str {
        &self.manage
    }

    pub fn access(&self) -> &[AccessDescriptor] {
        &self.access
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_in.map(|secs| after(self.issued_at, secs))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|at| now >= at)
    }

    /// Find the granted descriptor that permits `access_type` with any of
    /// `actions` on `wallet_id`, checking expiry first.
    ///
    /// A descriptor with no identifier applies to any wallet the server
    /// allows; one with an identifier must match. Exact matches win.
    pub fn authorize(
        &self,
        access_type: AccessType,
        actions: &[AccessAction],
        wallet_id: &str,
    ) -> Result<&AccessDescriptor> {
        self.authorize_at(access_type, actions, wallet_id, Utc::now())
    }

    pub(crate) fn authorize_at(
        &self,
        access_type: AccessType,
        actions: &[AccessAction],
        wallet_id: &str,
        now: DateTime<Utc>,
    ) -> Result<&AccessDescriptor> {
        if self.is_expired_at(now) {
            return Err(Error::Authorization(format!(
                "access token expired at {}",
                self.expires_at().map(|t| t.to_rfc3339()).unwrap_or_default()
            )));
        }

        let candidates: Vec<&AccessDescriptor> = self
            .access
            .iter()
            .filter(|a| a.access_type() == access_type)
            .filter(|a| actions.iter().any(|action| a.allows(*action)))
            .collect();

        candidates
            .iter()
            .find(|a| a.identifier() == Some(wallet_id))
            .or_else(|| candidates.iter().find(|a| a.identifier().is_none()))
            .copied()
            .ok_or_else(|| {
                let wanted = actions
                    .iter()
                    .map(|a| a.as_str())
                    .collect::<Vec<_>>()
                    .join("|");
                let granted = self
                    .access
                    .iter()
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                Error::Authorization(format!(
                    "token does not grant {}:{} on {} (granted: [{}])",
                    access_type, wanted, wallet_id, granted
                ))
            })
    }
}

/// Handle for resuming a grant at the authorization server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continue {
    uri: String,
    access_token: String,
    wait: u64,
    received_at: DateTime<Utc>,
    requested: Vec<AccessDescriptor>,
}

impl Continue {
    fn from_response(
        response: ContinueResponse,
        received_at: DateTime<Utc>,
        requested: &[AccessDescriptor],
    ) -> Self {
        Self {
            uri: response.uri,
            access_token: response.access_token.value,
            wait: response.wait,
            received_at,
            requested: requested.to_vec(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Continuation token. Only valid against [`uri`](Self::uri).
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Minimum seconds between receipt and the next continuation call.
    pub fn wait(&self) -> u64 {
        self.wait
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }

    /// Access originally requested for this grant.
    pub fn requested(&self) -> &[AccessDescriptor] {
        &self.requested
    }

    pub fn ready_at(&self) -> DateTime<Utc> {
        after(self.received_at, self.wait)
    }

    pub fn is_ready_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.ready_at()
    }

    /// Whole seconds remaining until the continuation may be called, rounded
    /// up. Zero means the continuation may be called now.
    pub fn seconds_until_ready(&self, now: DateTime<Utc>) -> u64 {
        let remaining = self.ready_at() - now;
        if remaining <= Duration::zero() {
            return 0;
        }
        let whole = remaining.num_seconds();
        if remaining > Duration::seconds(whole) {
            whole as u64 + 1
        } else {
            whole as u64
        }
    }
}

/// Interaction the resource owner must complete out-of-band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    /// Where to send the resource owner.
    pub redirect: String,
    /// Server nonce used to verify the interaction finish hash.
    pub finish: Option<String>,
}

/// Outcome of a grant request or continuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    /// Token issued; nothing left to negotiate.
    Issued(AccessToken),
    /// Token issued and the grant stays open for further continuation.
    IssuedContinuable {
        access_token: AccessToken,
        continuation: Continue,
    },
    /// No token yet. With `interact`, the resource owner must visit the
    /// redirect; without it, continue again after `continuation.wait()`.
    Pending {
        interact: Option<Interaction>,
        continuation: Continue,
    },
}

impl Grant {
    /// Validate a raw response against the access that was requested.
    pub(crate) fn from_response(
        response: GrantResponse,
        requested: &[AccessDescriptor],
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let GrantResponse {
            access_token,
            interact,
            continuation,
        } = response;

        match (access_token, interact, continuation) {
            (Some(_), Some(_), _) => Err(Error::Protocol(
                "grant response carries both access_token and interact".to_string(),
            )),
            (Some(token), None, continuation) => {
                for granted in &token.access {
                    if !requested.iter().any(|r| r.covers(granted)) {
                        return Err(Error::Protocol(format!(
                            "authorization server granted access that was not requested: {}",
                            granted
                        )));
                    }
                }
                let access_token = AccessToken::from_response(token, now);
                Ok(match continuation {
                    Some(c) => Grant::IssuedContinuable {
                        access_token,
                        continuation: Continue::from_response(c, now, requested),
                    },
                    None => Grant::Issued(access_token),
                })
            }
            (None, interact, Some(c)) => Ok(Grant::Pending {
                interact: interact.map(|i| Interaction {
                    redirect: i.redirect,
                    finish: i.finish,
                }),
                continuation: Continue::from_response(c, now, requested),
            }),
            (None, Some(_), None) => Err(Error::Protocol(
                "grant response asks for interaction but has no continue".to_string(),
            )),
            (None, None, None) => Err(Error::GrantDenied(
                "grant response carries neither access_token nor continue".to_string(),
            )),
        }
    }

    /// The issued token, or the reason there is none yet.
    ///
    /// A pending grant without interaction yields `PrematureContinuation`;
    /// a `retry_after` of zero means the grant may be continued now.
    pub fn access_token(&self) -> Result<&AccessToken> {
        match self {
            Grant::Issued(token) => Ok(token),
            Grant::IssuedContinuable { access_token, .. } => Ok(access_token),
            Grant::Pending {
                interact: Some(interaction),
                ..
            } => Err(Error::InteractionRequired {
                redirect: interaction.redirect.clone(),
            }),
            Grant::Pending {
                interact: None,
                continuation,
            } => Err(Error::PrematureContinuation {
                retry_after: continuation.seconds_until_ready(Utc::now()),
            }),
        }
    }

    pub fn continuation(&self) -> Option<&Continue> {
        match self {
            Grant::Issued(_) => None,
            Grant::IssuedContinuable { continuation, .. } | Grant::Pending { continuation, .. } => {
                Some(continuation)
            }
        }
    }

    /// Redirect URI to present to the resource owner, if interaction is needed.
    pub fn redirect(&self) -> Option<&str> {
        match self {
            Grant::Pending {
                interact: Some(interaction),
                ..
            } => Some(&interaction.redirect),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Grant::Pending { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use open_payments_types::{ContinueToken, InteractResponse};

    fn incoming_create() -> AccessDescriptor {
        AccessDescriptor::incoming_payment([AccessAction::Create]).unwrap()
    }

    fn token_response(access: Vec<AccessDescriptor>) -> AccessTokenResponse {
        AccessTokenResponse {
            value: "tok".to_string(),
            manage: "https://auth.example.dev/token/1".to_string(),
            expires_in: Some(600),
            access,
        }
    }

    fn continue_response(wait: u64) -> ContinueResponse {
        ContinueResponse {
            access_token: ContinueToken {
                value: "cont".to_string(),
            },
            uri: "https://auth.example.dev/continue/1".to_string(),
            wait,
        }
    }

    #[test]
    fn test_token_only_is_issued() {
        let resp = GrantResponse {
            access_token: Some(token_response(vec![incoming_create()])),
            ..Default::default()
        };
        let grant = Grant::from_response(resp, &[incoming_create()], Utc::now()).unwrap();
        assert!(matches!(grant, Grant::Issued(_)));
        assert_eq!(grant.access_token().unwrap().value(), "tok");
        assert!(grant.continuation().is_none());
    }

    #[test]
    fn test_token_with_continue_is_continuable() {
        let resp = GrantResponse {
            access_token: Some(token_response(vec![incoming_create()])),
            continuation: Some(continue_response(0)),
            ..Default::default()
        };
        let grant = Grant::from_response(resp, &[incoming_create()], Utc::now()).unwrap();
        assert!(matches!(grant, Grant::IssuedContinuable { .. }));
        assert!(grant.access_token().is_ok());
    }

    #[test]
    fn test_interact_is_pending_with_redirect() {
        let resp = GrantResponse {
            interact: Some(InteractResponse {
                redirect: "https://auth.example.dev/interact/abc".to_string(),
                finish: Some("f".to_string()),
            }),
            continuation: Some(continue_response(5)),
            ..Default::default()
        };
        let grant = Grant::from_response(resp, &[incoming_create()], Utc::now()).unwrap();
        assert!(grant.is_pending());
        assert_eq!(grant.redirect(), Some("https://auth.example.dev/interact/abc"));
        assert_eq!(grant.continuation().unwrap().requested(), &[incoming_create()]);
        assert!(matches!(
            grant.access_token(),
            Err(Error::InteractionRequired { redirect })
                if redirect == "https://auth.example.dev/interact/abc"
        ));
    }

    #[test]
    fn test_contradictory_response_rejected() {
        let resp = GrantResponse {
            access_token: Some(token_response(vec![incoming_create()])),
            interact: Some(InteractResponse {
                redirect: "https://auth.example.dev/interact/abc".to_string(),
                finish: None,
            }),
            continuation: Some(continue_response(0)),
        };
        assert!(matches!(
            Grant::from_response(resp, &[incoming_create()], Utc::now()),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_empty_response_is_denied() {
        assert!(matches!(
            Grant::from_response(GrantResponse::default(), &[incoming_create()], Utc::now()),
            Err(Error::GrantDenied(_))
        ));
    }

    #[test]
    fn test_widened_access_rejected() {
        let widened =
            AccessDescriptor::incoming_payment([AccessAction::Create, AccessAction::ListAll])
                .unwrap();
        let resp = GrantResponse {
            access_token: Some(token_response(vec![widened])),
            ..Default::default()
        };
        assert!(matches!(
            Grant::from_response(resp, &[incoming_create()], Utc::now()),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_wait_interval() {
        let now = Utc::now();
        let cont = Continue::from_response(continue_response(5), now, &[]);
        assert_eq!(cont.seconds_until_ready(now), 5);
        assert_eq!(cont.seconds_until_ready(now + Duration::milliseconds(4500)), 1);
        assert_eq!(cont.seconds_until_ready(now + Duration::seconds(5)), 0);
        assert!(cont.is_ready_at(now + Duration::seconds(5)));
    }

    #[test]
    fn test_pending_without_interaction_reports_retry_after() {
        let resp = GrantResponse {
            continuation: Some(continue_response(0)),
            ..Default::default()
        };
        let grant = Grant::from_response(resp, &[incoming_create()], Utc::now()).unwrap();
        assert!(grant.redirect().is_none());
        match grant.access_token() {
            Err(err @ Error::PrematureContinuation { retry_after: 0 }) => {
                assert!(err.to_string().contains("retry in 0s"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_sub_millisecond_remainder_is_not_ready() {
        let now = Utc::now();
        let cont = Continue::from_response(continue_response(5), now, &[]);
        let almost = cont.ready_at() - Duration::microseconds(500);
        assert!(!cont.is_ready_at(almost));
        assert_eq!(cont.seconds_until_ready(almost), 1);
    }

    #[test]
    fn test_authorize_scope_and_expiry() {
        let wallet = "https://ilp.example.dev/alice";
        let access = vec![
            AccessDescriptor::outgoing_payment([AccessAction::Create, AccessAction::Read], wallet)
                .unwrap(),
        ];
        let issued = Utc::now();
        let token = AccessToken::new("tok", "https://auth.example.dev/token/1", Some(60), access)
            .with_issued_at(issued);

        let create = [AccessAction::Create];
        assert!(
            token
                .authorize_at(AccessType::OutgoingPayment, &create, wallet, issued)
                .is_ok()
        );
        assert!(matches!(
            token.authorize_at(AccessType::Quote, &[AccessAction::Create], wallet, issued),
            Err(Error::Authorization(_))
        ));
        assert!(matches!(
            token.authorize_at(
                AccessType::OutgoingPayment,
                &create,
                "https://ilp.example.dev/bob",
                issued
            ),
            Err(Error::Authorization(_))
        ));
        assert!(matches!(
            token.authorize_at(
                AccessType::OutgoingPayment,
                &[AccessAction::Create],
                wallet,
                issued + Duration::seconds(61)
            ),
            Err(Error::Authorization(msg)) if msg.contains("expired")
        ));
    }

    #[test]
    fn test_token_without_expiry_never_expires() {
        let token = AccessToken::new("tok", "https://auth.example.dev/token/1", None, vec![]);
        assert!(!token.is_expired_at(Utc::now() + Duration::days(3650)));
    }
}
