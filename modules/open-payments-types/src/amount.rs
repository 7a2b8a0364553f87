//! Fixed-point monetary amounts.
//!
//! Open Payments encodes amount values as decimal strings so that no
//! consumer ever round-trips them through a float. Servers are not
//! consistent about `assetScale`, which shows up both as a number and as a
//! string, so both forms are accepted on input:
//! - Decimal strings: "200" -> 200
//! - Integers: 200 -> 200
//!
//! Values are always serialized as decimal strings and scales as numbers.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::AccessError;

/// Largest scale accepted. 255 is reserved.
pub const MAX_ASSET_SCALE: u8 = 254;

/// Precision exponent of an asset (`value * 10^-scale`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetScale(u8);

impl AssetScale {
    pub fn new(scale: u8) -> Result<Self, AccessError> {
        if scale > MAX_ASSET_SCALE {
            return Err(AccessError::InvalidAssetScale(scale as u64));
        }
        Ok(Self(scale))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for AssetScale {
    type Error = AccessError;

    fn try_from(scale: u8) -> Result<Self, Self::Error> {
        Self::new(scale)
    }
}

impl From<AssetScale> for u8 {
    fn from(scale: AssetScale) -> Self {
        scale.0
    }
}

impl fmt::Display for AssetScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for AssetScale {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> Deserialize<'de> for AssetScale {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw =
            deserializer.deserialize_any(DecimalU64Visitor("an asset scale between 0 and 254"))?;
        if raw > MAX_ASSET_SCALE as u64 {
            return Err(de::Error::custom(AccessError::InvalidAssetScale(raw)));
        }
        Ok(AssetScale(raw as u8))
    }
}

/// A monetary amount in the fixed-point domain of one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Amount {
    #[serde(with = "decimal_string")]
    pub value: u64,
    pub asset_code: String,
    pub asset_scale: AssetScale,
}

impl Amount {
    pub fn new(value: u64, asset_code: impl Into<String>, asset_scale: AssetScale) -> Self {
        Self {
            value,
            asset_code: asset_code.into(),
            asset_scale,
        }
    }

    /// True when both amounts live in the same numeric domain and can be
    /// compared by value.
    pub fn same_asset(&self, other: &Amount) -> bool {
        self.asset_code == other.asset_code && self.asset_scale == other.asset_scale
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (scale {})", self.value, self.asset_code, self.asset_scale)
    }
}

/// Accepts a non-negative integer given either as a JSON number or as a
/// decimal string.
struct DecimalU64Visitor(&'static str);

impl<'de> Visitor<'de> for DecimalU64Visitor {
    type Value = u64;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str(self.0)
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        let cleaned = value.trim();
        if cleaned.is_empty() || !cleaned.bytes().all(|b| b.is_ascii_digit()) {
            return Err(de::Error::custom(format!(
                "expected an unsigned decimal integer, got {:?}",
                value
            )));
        }
        cleaned
            .parse::<u64>()
            .map_err(|e| de::Error::custom(format!("{} for value {}", e, cleaned)))
    }

    fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        self.visit_str(&value)
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(value)
    }

    fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        u64::try_from(value).map_err(|_| de::Error::custom("negative value is not a valid amount"))
    }

    fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Err(de::Error::custom(format!(
            "floating point value {} is not a valid amount",
            value
        )))
    }
}

mod decimal_string {
    use super::DecimalU64Visitor;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(DecimalU64Visitor("an unsigned 64-bit amount"))
    }
}
