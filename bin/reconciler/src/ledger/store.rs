//! Owned ledger state
//!
//! All balance mutations go through [`LedgerStore::apply`], which performs
//! the idempotency check, the domain-duplicate check, the balance
//! read-modify, and the entry insert under one lock. Concurrent writers
//! against the same wallet serialize here; no caller can observe a
//! half-applied update.

use super::types::{
    EntryStatus, IdempotencyKey, LedgerTransaction, ReferenceType, TransactionKind,
};
use alloy_primitives::B256;
use chrono::Utc;
use common::Amount;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Everything `apply` needs to write one entry
#[derive(Debug, Clone)]
pub struct EntrySpec {
    pub wallet_owner_id: String,
    pub kind: TransactionKind,
    pub signed_amount: i128,
    pub external_tx_hash: Option<B256>,
    pub reference_id: String,
    pub reference_type: ReferenceType,
    /// When set, a second entry for the same
    /// (wallet, reference type, reference id, kind) is a domain conflict
    /// even under a different transaction hash
    pub unique_per_reference: bool,
    /// Refund support: the original entry to mark Reversed
    pub reverses: Option<Uuid>,
}

/// Outcome of an atomic apply
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    Inserted(LedgerTransaction),
    /// Idempotency key already present: at-least-once delivery, no-op
    DuplicateDelivery,
    /// Same actor already performed this action on this entity
    DuplicateAction,
    InsufficientBalance { balance: Amount, delta: i128 },
    Overflow,
}

#[derive(Default)]
struct LedgerState {
    balances: HashMap<String, Amount>,
    entries: Vec<LedgerTransaction>,
    by_key: HashMap<IdempotencyKey, Uuid>,
    action_marks: HashSet<(String, ReferenceType, String, TransactionKind)>,
}

#[derive(Default)]
pub struct LedgerStore {
    state: Mutex<LedgerState>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one entry atomically. See module docs for the serialization
    /// guarantee.
    pub fn apply(&self, spec: EntrySpec) -> ApplyOutcome {
        let mut state = self.state.lock();

        if let Some(tx_hash) = spec.external_tx_hash {
            let key = (tx_hash, spec.reference_type, spec.kind);
            if state.by_key.contains_key(&key) {
                return ApplyOutcome::DuplicateDelivery;
            }
        }

        let mark = (
            spec.wallet_owner_id.clone(),
            spec.reference_type,
            spec.reference_id.clone(),
            spec.kind,
        );
        if spec.unique_per_reference && state.action_marks.contains(&mark) {
            return ApplyOutcome::DuplicateAction;
        }

        let balance_before = state
            .balances
            .get(&spec.wallet_owner_id)
            .copied()
            .unwrap_or(Amount::ZERO);

        let Some(balance_after) = balance_before.checked_add_signed(spec.signed_amount) else {
            if spec.signed_amount < 0 {
                return ApplyOutcome::InsufficientBalance {
                    balance: balance_before,
                    delta: spec.signed_amount,
                };
            }
            return ApplyOutcome::Overflow;
        };

        let entry = LedgerTransaction {
            id: Uuid::new_v4(),
            wallet_owner_id: spec.wallet_owner_id.clone(),
            kind: spec.kind,
            signed_amount: spec.signed_amount,
            balance_before,
            balance_after,
            external_tx_hash: spec.external_tx_hash,
            reference_id: spec.reference_id,
            reference_type: spec.reference_type,
            status: EntryStatus::Completed,
            created_at: Utc::now(),
        };

        if let Some(tx_hash) = spec.external_tx_hash {
            state
                .by_key
                .insert((tx_hash, spec.reference_type, spec.kind), entry.id);
        }
        if spec.unique_per_reference {
            state.action_marks.insert(mark);
        }
        if let Some(original_id) = spec.reverses {
            if let Some(original) = state.entries.iter_mut().find(|e| e.id == original_id) {
                original.status = EntryStatus::Reversed;
            }
        }

        state
            .balances
            .insert(spec.wallet_owner_id, balance_after);
        state.entries.push(entry.clone());

        ApplyOutcome::Inserted(entry)
    }

    pub fn balance_of(&self, owner_id: &str) -> Amount {
        self.state
            .lock()
            .balances
            .get(owner_id)
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    /// Entries for one wallet in insertion (creation) order
    pub fn entries_for(&self, owner_id: &str) -> Vec<LedgerTransaction> {
        self.state
            .lock()
            .entries
            .iter()
            .filter(|e| e.wallet_owner_id == owner_id)
            .cloned()
            .collect()
    }

    pub fn entry_count(&self) -> usize {
        self.state.lock().entries.len()
    }
}
