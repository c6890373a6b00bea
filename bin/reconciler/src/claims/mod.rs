//! Claim issuance and tracking
//!
//! - Nonce registry with audit counters
//! - EIP-712 signature issuer/verifier
//! - Claim request status machine and expiry sweeper

mod nonce;
mod signer;
mod tracker;
mod types;

pub use nonce::{NonceRegistry, NonceStats};
pub use signer::{SignatureService, SignerConfig};
pub use tracker::{ClaimTracker, ExpirySweeper, TransitionOutcome};
pub use types::{
    ClaimContext, ClaimError, ClaimPayload, ClaimRequest, ClaimStatus, ClaimTicket,
};
