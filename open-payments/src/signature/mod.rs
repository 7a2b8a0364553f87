//! Request signing for Open Payments
//!
//! Every request to an authorization or resource server carries an
//! RFC 9421 signature:
//! 1. Digest the body (SHA-512) into `content-digest`
//! 2. Build the signature base over the covered components
//! 3. Sign the base with the client's Ed25519 key
//! 4. Emit `signature` and `signature-input` (same params as the base)

mod signer;
mod types;

pub use signer::{RequestSigner, verify_signature_base};
pub use types::*;
