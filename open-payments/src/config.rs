use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

pub mod env_vars {
    /// Wallet address URL identifying this client to authorization servers.
    pub const WALLET_ADDRESS: &str = "OPEN_PAYMENTS_WALLET_ADDRESS";
    /// Key id registered for the client wallet's JWKS.
    pub const KEY_ID: &str = "OPEN_PAYMENTS_KEY_ID";
    /// Path to the PKCS#8 PEM Ed25519 private key.
    pub const PRIVATE_KEY_PATH: &str = "OPEN_PAYMENTS_PRIVATE_KEY_PATH";
    pub const HTTP_TIMEOUT_SECS: &str = "OPEN_PAYMENTS_HTTP_TIMEOUT_SECS";
}

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 120;

#[derive(Clone, Debug)]
pub struct Config {
    pub wallet_address: String,
    pub key_id: String,
    pub private_key_path: PathBuf,
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::Config(format!("{} must be set", name)))
        };

        let http_timeout_secs = match lookup(env_vars::HTTP_TIMEOUT_SECS) {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                Error::Config(format!(
                    "{} must be a valid number",
                    env_vars::HTTP_TIMEOUT_SECS
                ))
            })?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        Ok(Self {
            wallet_address: required(env_vars::WALLET_ADDRESS)?,
            key_id: required(env_vars::KEY_ID)?,
            private_key_path: PathBuf::from(required(env_vars::PRIVATE_KEY_PATH)?),
            http_timeout: Duration::from_secs(http_timeout_secs),
        })
    }
}
