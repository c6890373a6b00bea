//! Ledger data model
//!
//! Entries are append-only and immutable once written; the only later
//! mutation is flipping a refunded entry's status to Reversed.

use alloy_primitives::B256;
use chrono::{DateTime, Utc};
use common::Amount;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a ledger entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Tokens spent on an on-chain action (e.g. liking a post)
    DeductOnAction,
    Refund,
    /// Credit from an executed claim ticket
    RewardClaim,
    TransferIn,
    TransferOut,
    SystemAdjustment,
    InitialSync,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::DeductOnAction => "deduct_on_action",
            TransactionKind::Refund => "refund",
            TransactionKind::RewardClaim => "reward_claim",
            TransactionKind::TransferIn => "transfer_in",
            TransactionKind::TransferOut => "transfer_out",
            TransactionKind::SystemAdjustment => "system_adjustment",
            TransactionKind::InitialSync => "initial_sync",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an entry's reference_id points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceType {
    Post,
    Claim,
    Transfer,
    Adjustment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    Completed,
    /// Set on the original entry when a refund references it
    Reversed,
}

/// One immutable ledger row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: Uuid,
    pub wallet_owner_id: String,
    pub kind: TransactionKind,
    /// Raw 18-decimal delta; negative for deductions
    pub signed_amount: i128,
    pub balance_before: Amount,
    pub balance_after: Amount,
    pub external_tx_hash: Option<B256>,
    pub reference_id: String,
    pub reference_type: ReferenceType,
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
}

/// The at-most-once key: one entry per (tx hash, reference type, kind)
pub type IdempotencyKey = (B256, ReferenceType, TransactionKind);
