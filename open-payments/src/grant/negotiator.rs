use chrono::{DateTime, Utc};
use open_payments_types::{
    AccessDescriptor, AccessError, AccessTokenRequest, ContinueRequest, GrantRequest, GrantResponse,
    InteractFinish, InteractRequest,
};
use std::sync::Arc;

use super::types::{Continue, Grant};
use crate::codec;
use crate::error::{Error, Result};
use crate::http::{Method, Transport};
use crate::request::{parse_url, send_signed};
use crate::signature::RequestSigner;

/// Drives GNAP grant requests and continuations against authorization
/// servers on behalf of one client wallet.
#[derive(Clone)]
pub struct GrantNegotiator {
    transport: Arc<dyn Transport>,
    signer: RequestSigner,
    client_wallet: String,
}

impl GrantNegotiator {
    pub fn new(
        transport: Arc<dyn Transport>,
        signer: RequestSigner,
        client_wallet: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            signer,
            client_wallet: client_wallet.into(),
        }
    }

    pub fn client_wallet(&self) -> &str {
        &self.client_wallet
    }

    /// Request a grant for `access` at `auth_server`.
    ///
    /// Pass `interaction` to ask for a redirect-based interaction; the
    /// server then answers with [`Grant::Pending`] and a redirect URI.
    pub async fn request_grant(
        &self,
        auth_server: &str,
        access: Vec<AccessDescriptor>,
        interaction: Option<InteractFinish>,
    ) -> Result<Grant> {
        if access.is_empty() {
            return Err(AccessError::NoAccess.into());
        }

        let url = parse_url(auth_server)?;
        let interactive = interaction.is_some();
        let request = GrantRequest {
            access_token: AccessTokenRequest {
                access: access.clone(),
            },
            client: self.client_wallet.clone(),
            interact: interaction.map(|finish| InteractRequest::redirect(Some(finish))),
        };
        let body = codec::encode(&request)?;

        log::info!(
            "[GRANT] Requesting {} at {} ({})",
            describe(&access),
            url,
            if interactive { "interactive" } else { "non-interactive" }
        );

        let response = send_signed(
            &self.transport,
            &self.signer,
            Method::Post,
            url,
            None,
            Some(body),
        )
        .await?
        .error_for_status()?;
        let grant = Grant::from_response(
            codec::decode::<GrantResponse>(&response.body)?,
            &access,
            Utc::now(),
        )?;

        log_outcome(&grant);
        Ok(grant)
    }

    /// Continue a pending grant, optionally with the `interact_ref` returned
    /// to the finish URI after the resource owner approved.
    pub async fn continue_grant(
        &self,
        continuation: &Continue,
        interact_ref: Option<&str>,
    ) -> Result<Grant> {
        self.continue_grant_at(continuation, interact_ref, Utc::now()).await
    }

    /// [`continue_grant`](Self::continue_grant) evaluated at `now`.
    pub async fn continue_grant_at(
        &self,
        continuation: &Continue,
        interact_ref: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Grant> {
        if !continuation.is_ready_at(now) {
            let retry_after = continuation.seconds_until_ready(now);
            log::warn!(
                "[GRANT] Continuation at {} is not ready for another {}s",
                continuation.uri(),
                retry_after
            );
            return Err(Error::PrematureContinuation { retry_after });
        }

        let url = parse_url(continuation.uri())?;
        let body = interact_ref
            .map(|r| {
                codec::encode(&ContinueRequest {
                    interact_ref: r.to_string(),
                })
            })
            .transpose()?;

        log::info!("[GRANT] Continuing grant at {}", url);

        let response = send_signed(
            &self.transport,
            &self.signer,
            Method::Post,
            url,
            Some(continuation.access_token()),
            body,
        )
        .await?
        .error_for_status()?;

        let grant = Grant::from_response(
            codec::decode::<GrantResponse>(&response.body)?,
            continuation.requested(),
            Utc::now(),
        )?;

        log_outcome(&grant);
        Ok(grant)
    }
}

fn describe(access: &[AccessDescriptor]) -> String {
    access.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ")
}

fn log_outcome(grant: &Grant) {
    match grant {
        Grant::Issued(token) => {
            log::info!("[GRANT] Token issued for {}", describe(token.access()))
        }
        Grant::IssuedContinuable { access_token, .. } => {
            log::info!(
                "[GRANT] Token issued for {} (continuable)",
                describe(access_token.access())
            )
        }
        Grant::Pending { interact: Some(i), continuation } => log::info!(
            "[GRANT] Interaction required at {} (continue after {}s)",
            i.redirect,
            continuation.wait()
        ),
        Grant::Pending { interact: None, continuation } => {
            log::info!("[GRANT] Grant pending, continue after {}s", continuation.wait())
        }
    }
}
