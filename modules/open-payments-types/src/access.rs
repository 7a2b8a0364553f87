//! Access descriptors: the unit of permission requested from, and granted
//! by, an authorization server.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{AccessError, Amount};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessType {
    IncomingPayment,
    Quote,
    OutgoingPayment,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::IncomingPayment => "incoming-payment",
            AccessType::Quote => "quote",
            AccessType::OutgoingPayment => "outgoing-payment",
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessAction {
    Create,
    Complete,
    Read,
    ReadAll,
    List,
    ListAll,
}

impl AccessAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessAction::Create => "create",
            AccessAction::Complete => "complete",
            AccessAction::Read => "read",
            AccessAction::ReadAll => "read-all",
            AccessAction::List => "list",
            AccessAction::ListAll => "list-all",
        }
    }
}

impl fmt::Display for AccessAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spend limits attached to an outgoing-payment grant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Limits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debit_amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_amount: Option<Amount>,
    /// ISO 8601 repeating interval, e.g. `R/2024-01-01T00:00:00Z/P1M`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
}

impl Limits {
    pub fn debit(amount: Amount) -> Self {
        Self {
            debit_amount: Some(amount),
            ..Default::default()
        }
    }

    /// True when every bound set in `outer` is also set here, and no wider.
    pub fn is_within(&self, outer: &Limits) -> bool {
        fn amount_within(inner: &Option<Amount>, outer: &Option<Amount>) -> bool {
            match (inner, outer) {
                (_, None) => true,
                (None, Some(_)) => false,
                (Some(i), Some(o)) => i.same_asset(o) && i.value <= o.value,
            }
        }
        fn pinned(inner: &Option<String>, outer: &Option<String>) -> bool {
            outer.is_none() || inner == outer
        }

        amount_within(&self.debit_amount, &outer.debit_amount)
            && amount_within(&self.receive_amount, &outer.receive_amount)
            && pinned(&self.receiver, &outer.receiver)
            && pinned(&self.interval, &outer.interval)
    }
}

/// One requested or granted permission.
///
/// Constructed through [`AccessDescriptor::new`] (or the per-type helpers),
/// which reject empty or duplicated action sets; deserialization goes
/// through the same checks. Fields are read-only after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAccessDescriptor", into = "RawAccessDescriptor")]
pub struct AccessDescriptor {
    access_type: AccessType,
    actions: Vec<AccessAction>,
    identifier: Option<String>,
    limits: Option<Limits>,
}

#[derive(Serialize, Deserialize)]
struct RawAccessDescriptor {
    #[serde(rename = "type")]
    access_type: AccessType,
    actions: Vec<AccessAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    limits: Option<Limits>,
}

impl TryFrom<RawAccessDescriptor> for AccessDescriptor {
    type Error = AccessError;

    fn try_from(raw: RawAccessDescriptor) -> Result<Self, Self::Error> {
        let mut access = AccessDescriptor::new(raw.access_type, raw.actions)?;
        access.identifier = raw.identifier;
        match raw.limits {
            Some(limits) => access.with_limits(limits),
            None => Ok(access),
        }
    }
}

impl From<AccessDescriptor> for RawAccessDescriptor {
    fn from(access: AccessDescriptor) -> Self {
        Self {
            access_type: access.access_type,
            actions: access.actions,
            identifier: access.identifier,
            limits: access.limits,
        }
    }
}

impl AccessDescriptor {
    pub fn new(
        access_type: AccessType,
        actions: impl IntoIterator<Item = AccessAction>,
    ) -> Result<Self, AccessError> {
        let mut unique: Vec<AccessAction> = Vec::new();
        for action in actions {
            if unique.contains(&action) {
                return Err(AccessError::DuplicateAction(action));
            }
            unique.push(action);
        }
        if unique.is_empty() {
            return Err(AccessError::EmptyActions(access_type));
        }
        Ok(Self {
            access_type,
            actions: unique,
            identifier: None,
            limits: None,
        })
    }

    pub fn incoming_payment(
        actions: impl IntoIterator<Item = AccessAction>,
    ) -> Result<Self, AccessError> {
        Self::new(AccessType::IncomingPayment, actions)
    }

    pub fn quote(actions: impl IntoIterator<Item = AccessAction>) -> Result<Self, AccessError> {
        Self::new(AccessType::Quote, actions)
    }

    /// Outgoing payments are always scoped to the paying wallet.
    pub fn outgoing_payment(
        actions: impl IntoIterator<Item = AccessAction>,
        wallet_address_id: impl Into<String>,
    ) -> Result<Self, AccessError> {
        Ok(Self::new(AccessType::OutgoingPayment, actions)?.with_identifier(wallet_address_id))
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Result<Self, AccessError> {
        if self.access_type != AccessType::OutgoingPayment {
            return Err(AccessError::LimitsNotAllowed(self.access_type));
        }
        self.limits = Some(limits);
        Ok(self)
    }

    pub fn access_type(&self) -> AccessType {
        self.access_type
    }

    pub fn actions(&self) -> &[AccessAction] {
        &self.actions
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn limits(&self) -> Option<&Limits> {
        self.limits.as_ref()
    }

    pub fn allows(&self, action: AccessAction) -> bool {
        self.actions.contains(&action)
    }

    /// Whether `granted` is no wider than this descriptor.
    ///
    /// The server may narrow a request (drop actions, pin an identifier,
    /// tighten limits) but never widen it.
    pub fn covers(&self, granted: &AccessDescriptor) -> bool {
        if self.access_type != granted.access_type {
            return false;
        }
        if !granted.actions.iter().all(|a| self.actions.contains(a)) {
            return false;
        }
        if let Some(id) = &self.identifier {
            if granted.identifier.as_ref() != Some(id) {
                return false;
            }
        }
        match (&self.limits, &granted.limits) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(requested), Some(limits)) => limits.is_within(requested),
        }
    }
}

impl fmt::Display for AccessDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actions = self
            .actions
            .iter()
            .map(|a| a.as_str())
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{}:{}", self.access_type, actions)?;
        if let Some(id) = &self.identifier {
            write!(f, "@{}", id)?;
        }
        Ok(())
    }
}
