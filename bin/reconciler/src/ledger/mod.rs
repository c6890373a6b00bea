//! Authoritative off-chain ledger
//!
//! - Append-only transaction model with per-wallet balance continuity
//! - Atomic store guarding the idempotency key and balance updates
//! - Reconciler routing decoded chain events into at-most-once writes

mod reconciler;
mod store;
mod types;

pub use reconciler::{ReconcileOutcome, ReconcileReport, Reconciler};
pub use store::{ApplyOutcome, EntrySpec, LedgerStore};
pub use types::{
    EntryStatus, IdempotencyKey, LedgerTransaction, ReferenceType, TransactionKind,
};
