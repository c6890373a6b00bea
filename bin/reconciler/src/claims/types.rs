//! Claim request model and claim-path errors

use alloy_primitives::{Address, Signature, B256, U256};
use chrono::{DateTime, Utc};
use common::Amount;
use serde::{Deserialize, Serialize};

/// Claim request lifecycle. Executed and Expired are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimStatus {
    Pending,
    Executed,
    Expired,
    Failed,
}

impl std::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ClaimStatus::Pending => "pending",
            ClaimStatus::Executed => "executed",
            ClaimStatus::Expired => "expired",
            ClaimStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What the claim authorizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimContext {
    /// Reward accrued on one post, claimable by the post owner
    PostReward { post_id: U256 },
    /// Direct claim against the wallet's accumulated balance
    Direct,
}

/// The tuple of fields the signature binds. `amount` is in the token's
/// base units, exactly what the contract will see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimPayload {
    pub claimee: Address,
    pub amount: U256,
    /// Unix seconds
    pub deadline: i64,
    pub nonce: B256,
    pub context: ClaimContext,
}

/// What the caller hands to the client: the signed payload plus the
/// signature in both typed and wire form
#[derive(Debug, Clone)]
pub struct ClaimTicket {
    pub payload: ClaimPayload,
    pub signature: Signature,
    pub signature_hex: String,
}

/// Persisted claim request, unique on (wallet_address, nonce)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub wallet_address: Address,
    pub nonce: B256,
    /// Ledger-facing 18-decimal amount
    pub amount: Amount,
    pub deadline: i64,
    pub signature_hex: String,
    pub status: ClaimStatus,
    pub external_tx_hash: Option<B256>,
    pub reason: Option<String>,
    pub context: ClaimContext,
    pub created_at: DateTime<Utc>,
}

/// Claim-path errors, surfaced synchronously with a specific reason
#[derive(Debug)]
pub enum ClaimError {
    /// Signer key or domain configuration missing; the component disabled
    /// itself at startup
    NotConfigured,
    InvalidAmount,
    /// Requested deadline is already in the past at issuance time
    DeadlinePassed { deadline: i64 },
    UnknownWallet(Address),
    PostNotFound(U256),
    NotPostOwner { post_id: U256, claimee: Address },
    InsufficientTokens { requested: Amount, available: Amount },
    /// The randomly drawn nonce collided with an existing request
    NonceReuse,
    SigningFailed(String),
}

impl std::fmt::Display for ClaimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClaimError::NotConfigured => write!(f, "Claim signing is not configured"),
            ClaimError::InvalidAmount => write!(f, "Claim amount must be positive"),
            ClaimError::DeadlinePassed { deadline } => {
                write!(f, "Claim deadline {} is already in the past", deadline)
            }
            ClaimError::UnknownWallet(address) => {
                write!(f, "No wallet registered for address {}", address)
            }
            ClaimError::PostNotFound(post_id) => write!(f, "Post {} not found", post_id),
            ClaimError::NotPostOwner { post_id, claimee } => {
                write!(f, "Wallet {} does not own post {}", claimee, post_id)
            }
            ClaimError::InsufficientTokens {
                requested,
                available,
            } => write!(
                f,
                "Insufficient tokens: requested {}, available {}",
                requested, available
            ),
            ClaimError::NonceReuse => write!(f, "Nonce already in use for this wallet"),
            ClaimError::SigningFailed(msg) => write!(f, "Signing failed: {}", msg),
        }
    }
}

impl std::error::Error for ClaimError {}
