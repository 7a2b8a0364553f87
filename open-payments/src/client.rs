//! Open Payments client
//!
//! Sequences wallet discovery, grant negotiation and payment resource
//! creation. Every resource call checks the supplied token locally (scope,
//! expiry, spend limits) before anything is sent.

use chrono::{DateTime, SecondsFormat, Utc};
use open_payments_types::{
    AccessAction, AccessDescriptor, AccessType, Amount, IncomingPayment, IncomingPaymentRequest,
    InteractFinish, Limits, OutgoingPayment, OutgoingPaymentRequest, Quote, QuoteRequest,
    WalletAddress,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::codec;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::grant::{AccessToken, Grant, GrantNegotiator};
use crate::http::{HttpRequest, Method, ReqwestTransport, Transport};
use crate::keys::{KeyProvider, create_key_provider};
use crate::request::{join_url, parse_url, send_signed};
use crate::signature::{CONTENT_TYPE_JSON, RequestSigner};

/// Fixes one side of a quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteAmount {
    /// Amount leaving the sender's wallet.
    Debit(Amount),
    /// Amount arriving at the receiver.
    Receive(Amount),
}

#[derive(Clone)]
pub struct OpenPaymentsClient {
    transport: Arc<dyn Transport>,
    signer: RequestSigner,
    negotiator: GrantNegotiator,
}

impl OpenPaymentsClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        key_provider: Arc<dyn KeyProvider>,
        client_wallet: impl Into<String>,
    ) -> Self {
        let signer = RequestSigner::new(key_provider);
        let negotiator = GrantNegotiator::new(transport.clone(), signer.clone(), client_wallet);
        Self {
            transport,
            signer,
            negotiator,
        }
    }

    /// Build a client from environment configuration, loading the key.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = ReqwestTransport::with_timeout(config.http_timeout)?;
        let key_provider = create_key_provider(config)?;
        Ok(Self::new(Arc::new(transport), key_provider, &config.wallet_address))
    }

    pub fn negotiator(&self) -> &GrantNegotiator {
        &self.negotiator
    }

    pub fn client_wallet(&self) -> &str {
        self.negotiator.client_wallet()
    }

    // =====================================================
    // Wallet discovery
    // =====================================================

    /// Fetch public wallet metadata. Unsigned.
    pub async fn fetch_wallet_address(&self, uri: &str) -> Result<WalletAddress> {
        let url = parse_url(uri)?;
        log::info!("[OPEN-PAYMENTS] Fetching wallet address {}", url);

        let response = self
            .transport
            .send(HttpRequest {
                method: Method::Get,
                url,
                headers: vec![("accept".to_string(), CONTENT_TYPE_JSON.to_string())],
                body: None,
            })
            .await?
            .error_for_status()?;

        let wallet: WalletAddress = codec::decode(&response.body)?;
        log::info!(
            "[OPEN-PAYMENTS] Wallet {} uses {} (scale {}), auth server {}",
            wallet.id,
            wallet.asset_code,
            wallet.asset_scale,
            wallet.auth_server
        );
        Ok(wallet)
    }

    // =====================================================
    // Grants
    // =====================================================

    /// Non-interactive grant to create and read incoming payments on `wallet`.
    pub async fn request_incoming_payment_grant(&self, wallet: &WalletAddress) -> Result<Grant> {
        let access = AccessDescriptor::incoming_payment([
            AccessAction::Create,
            AccessAction::Read,
            AccessAction::ReadAll,
            AccessAction::Complete,
        ])?;
        self.negotiator.request_grant(&wallet.auth_server, vec![access], None).await
    }

    /// Non-interactive grant to create and read quotes on `wallet`.
    pub async fn request_quote_grant(&self, wallet: &WalletAddress) -> Result<Grant> {
        let access = AccessDescriptor::quote([AccessAction::Create, AccessAction::Read])?;
        self.negotiator.request_grant(&wallet.auth_server, vec![access], None).await
    }

    /// Grant to create and read outgoing payments from `wallet`, optionally
    /// capped by `limits`. Authorization servers normally require
    /// `interaction` for this access type.
    pub async fn request_outgoing_payment_grant(
        &self,
        wallet: &WalletAddress,
        limits: Option<Limits>,
        interaction: Option<InteractFinish>,
    ) -> Result<Grant> {
        let mut access = AccessDescriptor::outgoing_payment(
            [AccessAction::Create, AccessAction::Read],
            &wallet.id,
        )?;
        if let Some(limits) = limits {
            access = access.with_limits(limits)?;
        }
        self.negotiator
            .request_grant(&wallet.auth_server, vec![access], interaction)
            .await
    }

    // =====================================================
    // Incoming payments
    // =====================================================

    /// Create an incoming payment on `wallet` for `amount` in the wallet's
    /// own asset (minor units).
    pub async fn create_incoming_payment(
        &self,
        wallet: &WalletAddress,
        token: &AccessToken,
        amount: u64,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<IncomingPayment> {
        token.authorize(AccessType::IncomingPayment, &[AccessAction::Create], &wallet.id)?;

        let request = IncomingPaymentRequest {
            wallet_address: wallet.id.clone(),
            incoming_amount: Some(wallet.amount(amount)),
            expires_at: expires_at.map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true)),
            metadata: None,
        };
        let payment: IncomingPayment = self
            .post_resource(&wallet.resource_server, "incoming-payments", token, &request)
            .await?;

        log::info!(
            "[OPEN-PAYMENTS] Created incoming payment {} for {}",
            payment.id,
            wallet.amount(amount)
        );
        Ok(payment)
    }

    pub async fn get_incoming_payment(
        &self,
        wallet: &WalletAddress,
        payment_url: &str,
        token: &AccessToken,
    ) -> Result<IncomingPayment> {
        token.authorize(
            AccessType::IncomingPayment,
            &[AccessAction::Read, AccessAction::ReadAll],
            &wallet.id,
        )?;
        self.get_resource(payment_url, token).await
    }

    // =====================================================
    // Quotes
    // =====================================================

    /// Quote a payment from `wallet` to `receiver` (an incoming payment URL),
    /// letting the receiver's incoming amount fix the quote.
    pub async fn create_quote(
        &self,
        wallet: &WalletAddress,
        receiver: &str,
        token: &AccessToken,
    ) -> Result<Quote> {
        self.quote(wallet, QuoteRequest::ilp(&wallet.id, receiver), token).await
    }

    /// Quote with a fixed debit or receive amount.
    pub async fn create_quote_with_amount(
        &self,
        wallet: &WalletAddress,
        receiver: &str,
        token: &AccessToken,
        amount: QuoteAmount,
    ) -> Result<Quote> {
        let mut request = QuoteRequest::ilp(&wallet.id, receiver);
        match amount {
            QuoteAmount::Debit(a) => request.debit_amount = Some(a),
            QuoteAmount::Receive(a) => request.receive_amount = Some(a),
        }
        self.quote(wallet, request, token).await
    }

    async fn quote(
        &self,
        wallet: &WalletAddress,
        request: QuoteRequest,
        token: &AccessToken,
    ) -> Result<Quote> {
        token.authorize(AccessType::Quote, &[AccessAction::Create], &wallet.id)?;

        let quote: Quote = self
            .post_resource(&wallet.resource_server, "quotes", token, &request)
            .await?;

        log::info!(
            "[OPEN-PAYMENTS] Quote {}: debit {} -> receive {}",
            quote.id,
            quote.debit_amount,
            quote.receive_amount
        );
        Ok(quote)
    }

    pub async fn get_quote(
        &self,
        wallet: &WalletAddress,
        quote_url: &str,
        token: &AccessToken,
    ) -> Result<Quote> {
        token.authorize(
            AccessType::Quote,
            &[AccessAction::Read, AccessAction::ReadAll],
            &wallet.id,
        )?;
        self.get_resource(quote_url, token).await
    }

    // =====================================================
    // Outgoing payments
    // =====================================================

    /// Execute `quote` from `wallet`.
    ///
    /// Fails with `LimitExceeded` without contacting the server when the
    /// quote would exceed the grant's spend limits.
    pub async fn create_outgoing_payment(
        &self,
        wallet: &WalletAddress,
        quote: &Quote,
        token: &AccessToken,
    ) -> Result<OutgoingPayment> {
        let access = authorize_outgoing(token, wallet)?;
        if let Some(limits) = access.limits() {
            check_limit("debit", &quote.debit_amount, limits.debit_amount.as_ref())?;
            check_limit("receive", &quote.receive_amount, limits.receive_amount.as_ref())?;
        }

        let request = OutgoingPaymentRequest::FromQuote {
            wallet_address: wallet.id.clone(),
            quote_id: quote.id.clone(),
            metadata: None,
        };
        let payment: OutgoingPayment = self
            .post_resource(&wallet.resource_server, "outgoing-payments", token, &request)
            .await?;

        log::info!(
            "[OPEN-PAYMENTS] Created outgoing payment {} to {} (debit {})",
            payment.id,
            payment.receiver,
            payment.debit_amount
        );
        Ok(payment)
    }

    /// Pay an incoming payment directly with a fixed debit amount, without a
    /// separate quote.
    pub async fn create_outgoing_payment_from_incoming(
        &self,
        wallet: &WalletAddress,
        incoming_payment: &str,
        debit_amount: Amount,
        token: &AccessToken,
    ) -> Result<OutgoingPayment> {
        let access = authorize_outgoing(token, wallet)?;
        if let Some(limits) = access.limits() {
            check_limit("debit", &debit_amount, limits.debit_amount.as_ref())?;
        }

        let request = OutgoingPaymentRequest::FromIncomingPayment {
            wallet_address: wallet.id.clone(),
            incoming_payment: incoming_payment.to_string(),
            debit_amount,
            metadata: None,
        };
        let payment: OutgoingPayment = self
            .post_resource(&wallet.resource_server, "outgoing-payments", token, &request)
            .await?;

        log::info!(
            "[OPEN-PAYMENTS] Created outgoing payment {} to {} (debit {})",
            payment.id,
            incoming_payment,
            payment.debit_amount
        );
        Ok(payment)
    }

    pub async fn get_outgoing_payment(
        &self,
        wallet: &WalletAddress,
        payment_url: &str,
        token: &AccessToken,
    ) -> Result<OutgoingPayment> {
        token.authorize(
            AccessType::OutgoingPayment,
            &[AccessAction::Read, AccessAction::ReadAll],
            &wallet.id,
        )?;
        self.get_resource(payment_url, token).await
    }

    // =====================================================
    // Signed resource calls
    // =====================================================

    async fn post_resource<B: Serialize, T: DeserializeOwned>(
        &self,
        resource_server: &str,
        collection: &str,
        token: &AccessToken,
        body: &B,
    ) -> Result<T> {
        let url = join_url(resource_server, collection)?;
        let body = codec::encode(body)?;
        let response = send_signed(
            &self.transport,
            &self.signer,
            Method::Post,
            url,
            Some(token.value()),
            Some(body),
        )
        .await?
        .error_for_status()?;
        codec::decode(&response.body)
    }

    async fn get_resource<T: DeserializeOwned>(
        &self,
        resource_url: &str,
        token: &AccessToken,
    ) -> Result<T> {
        let url = parse_url(resource_url)?;
        let response = send_signed(
            &self.transport,
            &self.signer,
            Method::Get,
            url,
            Some(token.value()),
            None,
        )
        .await?
        .error_for_status()?;
        codec::decode(&response.body)
    }
}

/// Outgoing payments need a descriptor pinned to the paying wallet.
fn authorize_outgoing<'a>(
    token: &'a AccessToken,
    wallet: &WalletAddress,
) -> Result<&'a AccessDescriptor> {
    let access = token.authorize(
        AccessType::OutgoingPayment,
        &[AccessAction::Create],
        &wallet.id,
    )?;
    if access.identifier() != Some(wallet.id.as_str()) {
        return Err(Error::Authorization(format!(
            "outgoing-payment access is not bound to wallet {}",
            wallet.id
        )));
    }
    Ok(access)
}

fn check_limit(side: &str, amount: &Amount, limit: Option<&Amount>) -> Result<()> {
    let Some(limit) = limit else {
        return Ok(());
    };
    if !amount.same_asset(limit) {
        return Err(Error::LimitExceeded(format!(
            "{} amount {} is not in the limit's asset {}",
            side, amount, limit
        )));
    }
    if amount.value > limit.value {
        log::warn!(
            "[OPEN-PAYMENTS] {} amount {} exceeds grant limit {}",
            side,
            amount,
            limit
        );
        return Err(Error::LimitExceeded(format!(
            "{} amount {} exceeds grant limit {}",
            side, amount, limit
        )));
    }
    Ok(())
}
