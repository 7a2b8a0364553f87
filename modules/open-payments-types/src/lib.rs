//! Shared wire types for Open Payments resource servers and GNAP
//! authorization servers.

use serde::{Deserialize, Serialize};

mod access;
mod amount;

pub use access::{AccessAction, AccessDescriptor, AccessType, Limits};
pub use amount::{Amount, AssetScale, MAX_ASSET_SCALE};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("duplicate action '{0}' in access descriptor")]
    DuplicateAction(AccessAction),
    #[error("access descriptor for '{0}' has no actions")]
    EmptyActions(AccessType),
    #[error("limits are only allowed on outgoing-payment access, not '{0}'")]
    LimitsNotAllowed(AccessType),
    #[error("asset scale {0} is out of range (0-254)")]
    InvalidAssetScale(u64),
    #[error("grant request carries no access descriptors")]
    NoAccess,
}

// =====================================================
// Wallet Address
// =====================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAddress {
    pub id: String,
    #[serde(default)]
    pub public_name: Option<String>,
    pub asset_code: String,
    pub asset_scale: AssetScale,
    pub auth_server: String,
    pub resource_server: String,
}

impl WalletAddress {
    /// An amount in this wallet's own asset.
    pub fn amount(&self, value: u64) -> Amount {
        Amount::new(value, self.asset_code.clone(), self.asset_scale)
    }
}

// =====================================================
// Grant Request Types
// =====================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantRequest {
    pub access_token: AccessTokenRequest,
    /// Wallet address of the client; the AS resolves its keys from
    /// `<client>/jwks.json`.
    pub client: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interact: Option<InteractRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenRequest {
    pub access: Vec<AccessDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractRequest {
    pub start: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish: Option<InteractFinish>,
}

impl InteractRequest {
    pub fn redirect(finish: Option<InteractFinish>) -> Self {
        Self {
            start: vec!["redirect".to_string()],
            finish,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractFinish {
    pub method: String,
    pub uri: String,
    pub nonce: String,
}

impl InteractFinish {
    pub fn redirect(uri: impl Into<String>, nonce: impl Into<String>) -> Self {
        Self {
            method: "redirect".to_string(),
            uri: uri.into(),
            nonce: nonce.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinueRequest {
    pub interact_ref: String,
}

// =====================================================
// Grant Response Types
// =====================================================

/// Raw authorization server response. Every field is optional on the wire;
/// the client validates the combination before use.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrantResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<AccessTokenResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interact: Option<InteractResponse>,
    /// `continue` on the wire.
    #[serde(rename = "continue", default, skip_serializing_if = "Option::is_none")]
    pub continuation: Option<ContinueResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub value: String,
    pub manage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    pub access: Vec<AccessDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractResponse {
    pub redirect: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinueResponse {
    pub access_token: ContinueToken,
    pub uri: String,
    #[serde(default)]
    pub wait: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinueToken {
    pub value: String,
}

// =====================================================
// Payment Resources
// =====================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    #[serde(rename = "type")]
    pub method_type: String,
    #[serde(default)]
    pub ilp_address: Option<String>,
    #[serde(default)]
    pub shared_secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingPayment {
    pub id: String,
    pub wallet_address: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub incoming_amount: Option<Amount>,
    pub received_amount: Amount,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub methods: Vec<PaymentMethod>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: String,
    pub wallet_address: String,
    pub receiver: String,
    pub receive_amount: Amount,
    pub debit_amount: Amount,
    pub method: String,
    #[serde(default)]
    pub expires_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingPayment {
    pub id: String,
    pub wallet_address: String,
    #[serde(default)]
    pub quote_id: Option<String>,
    #[serde(default)]
    pub failed: bool,
    pub receiver: String,
    pub receive_amount: Amount,
    pub debit_amount: Amount,
    pub sent_amount: Amount,
    #[serde(default)]
    pub grant_spent_debit_amount: Option<Amount>,
    #[serde(default)]
    pub grant_spent_receive_amount: Option<Amount>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

// =====================================================
// Payment Request Types
// =====================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingPaymentRequest {
    pub wallet_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incoming_amount: Option<Amount>,
    /// RFC 3339 timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub wallet_address: String,
    pub receiver: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debit_amount: Option<Amount>,
}

impl QuoteRequest {
    pub fn ilp(wallet_address: impl Into<String>, receiver: impl Into<String>) -> Self {
        Self {
            wallet_address: wallet_address.into(),
            receiver: receiver.into(),
            method: "ilp".to_string(),
            receive_amount: None,
            debit_amount: None,
        }
    }
}

/// Outgoing payments are created either from a quote or directly against an
/// incoming payment with a fixed debit amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutgoingPaymentRequest {
    #[serde(rename_all = "camelCase")]
    FromQuote {
        wallet_address: String,
        quote_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
    },
    #[serde(rename_all = "camelCase")]
    FromIncomingPayment {
        wallet_address: String,
        incoming_payment: String,
        debit_amount: Amount,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_address_string_scale() {
        let json = r#"{
            "id": "https://ilp.example.dev/alice",
            "publicName": "Alice",
            "assetCode": "USD",
            "assetScale": "2",
            "authServer": "https://auth.example.dev",
            "resourceServer": "https://ilp.example.dev"
        }"#;
        let wallet: WalletAddress = serde_json::from_str(json).unwrap();
        assert_eq!(wallet.asset_scale.get(), 2);
        assert_eq!(wallet.amount(200).value, 200);
        assert_eq!(wallet.amount(200).asset_code, "USD");
    }

    #[test]
    fn test_grant_request_wire_shape() {
        let req = GrantRequest {
            access_token: AccessTokenRequest {
                access: vec![AccessDescriptor::quote([AccessAction::Create]).unwrap()],
            },
            client: "https://ilp.example.dev/alice".to_string(),
            interact: Some(InteractRequest::redirect(Some(InteractFinish::redirect(
                "http://localhost:5000",
                "n-1",
            )))),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["access_token"]["access"][0]["type"], "quote");
        assert_eq!(json["client"], "https://ilp.example.dev/alice");
        assert_eq!(json["interact"]["start"], serde_json::json!(["redirect"]));
        assert_eq!(json["interact"]["finish"]["method"], "redirect");
        assert_eq!(json["interact"]["finish"]["nonce"], "n-1");
    }

    #[test]
    fn test_non_interactive_request_omits_interact() {
        let req = GrantRequest {
            access_token: AccessTokenRequest { access: vec![] },
            client: "https://ilp.example.dev/alice".to_string(),
            interact: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("interact").is_none());
    }

    #[test]
    fn test_continue_field_rename_is_lossless() {
        // The URI legitimately contains "continue"; only the key is mapped.
        let json = r#"{
            "interact": {"redirect": "https://auth.example.dev/interact/abc", "finish": "f1"},
            "continue": {
                "access_token": {"value": "cont-token"},
                "uri": "https://auth.example.dev/continue/abc",
                "wait": 5
            }
        }"#;
        let resp: GrantResponse = serde_json::from_str(json).unwrap();
        let cont = resp.continuation.clone().unwrap();
        assert_eq!(cont.uri, "https://auth.example.dev/continue/abc");
        assert_eq!(cont.wait, 5);

        let back = serde_json::to_value(&resp).unwrap();
        assert_eq!(back["continue"]["uri"], "https://auth.example.dev/continue/abc");
        assert!(back.get("continuation").is_none());
    }

    #[test]
    fn test_outgoing_payment_request_shapes() {
        let from_quote = OutgoingPaymentRequest::FromQuote {
            wallet_address: "https://ilp.example.dev/alice".to_string(),
            quote_id: "https://ilp.example.dev/quotes/q1".to_string(),
            metadata: None,
        };
        let json = serde_json::to_value(&from_quote).unwrap();
        assert_eq!(json["quoteId"], "https://ilp.example.dev/quotes/q1");
        assert_eq!(json["walletAddress"], "https://ilp.example.dev/alice");
        assert!(json.get("metadata").is_none());
    }
}
