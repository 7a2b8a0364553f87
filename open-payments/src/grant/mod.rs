//! GNAP grant negotiation
//!
//! A grant request resolves to one of three outcomes:
//! - **Issued**: the token is usable immediately
//! - **IssuedContinuable**: usable, and the grant can be continued later
//! - **Pending**: the resource owner must interact (redirect) or the client
//!   must wait `continue.wait` seconds and continue the grant
//!
//! Tokens are validated against the requested access on receipt; a server
//! that grants more than was asked for is treated as a protocol violation.

mod negotiator;
mod types;

pub use negotiator::GrantNegotiator;
pub use types::{AccessToken, Continue, Grant, Interaction};
