//! Open Payments client: RFC 9421 request signing, GNAP grant negotiation
//! and payment resource orchestration.

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod grant;
pub mod http;
pub mod keys;
pub mod signature;

mod request;

pub use client::{OpenPaymentsClient, QuoteAmount};
pub use config::Config;
pub use error::{Error, Result};
pub use grant::{AccessToken, Continue, Grant, GrantNegotiator, Interaction};
pub use open_payments_types as types;
