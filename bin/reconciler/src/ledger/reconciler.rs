//! Ledger reconciler
//!
//! Turns decoded chain events into at-most-once ledger writes. Delivery is
//! at-least-once: later polls may replay overlapping ranges, so every
//! handler funnels through the store's idempotency key. Per-event failures
//! never abort a batch.

use super::store::{ApplyOutcome, EntrySpec, LedgerStore};
use super::types::{LedgerTransaction, ReferenceType, TransactionKind};
use crate::chain::{
    parse_log, ChainError, ChainEvent, ChainReader, ClaimExecutedEvent, EventSignatures,
    LikedEvent, TokensClaimedEvent, TransferEvent,
};
use crate::claims::{ClaimTracker, NonceRegistry, TransitionOutcome};
use crate::directory::{PostCatalog, WalletDirectory};
use alloy_primitives::{Address, U256};
use chrono::Utc;
use common::Amount;
use serde::Serialize;
use std::sync::Arc;

/// Outcome of reconciling one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// New ledger entries were written
    Applied { entries: usize },
    /// Duplicate delivery, resolved as success
    AlreadyRecorded,
    /// Referenced wallet or entity unknown/deleted; expected under
    /// eventual consistency, resolved as success
    MissingEntity,
    /// Same actor repeated the same action on the same entity
    DomainConflict,
    /// Event failed validation (zero amount, would overdraw the balance)
    Rejected { reason: String },
}

/// Summary returned by `reconcile_range`
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub total_events: usize,
    pub processed_events: usize,
    pub new_entries: usize,
    pub errors: usize,
}

pub struct Reconciler {
    ledger: Arc<LedgerStore>,
    tracker: Arc<ClaimTracker>,
    nonces: Arc<NonceRegistry>,
    wallets: Arc<dyn WalletDirectory>,
    posts: Arc<dyn PostCatalog>,
    reader: Arc<dyn ChainReader>,
    contract_address: Address,
    token_decimals: u8,
}

impl Reconciler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<LedgerStore>,
        tracker: Arc<ClaimTracker>,
        nonces: Arc<NonceRegistry>,
        wallets: Arc<dyn WalletDirectory>,
        posts: Arc<dyn PostCatalog>,
        reader: Arc<dyn ChainReader>,
        contract_address: Address,
        token_decimals: u8,
    ) -> Self {
        Self {
            ledger,
            tracker,
            nonces,
            wallets,
            posts,
            reader,
            contract_address,
            token_decimals,
        }
    }

    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    /// Route one decoded event to its handler
    pub async fn handle_event(&self, event: &ChainEvent) -> ReconcileOutcome {
        let outcome = match event {
            ChainEvent::Liked(e) => self.handle_liked(e).await,
            ChainEvent::TokensClaimed(e) => self.handle_tokens_claimed(e).await,
            ChainEvent::ClaimExecuted(e) => self.handle_claim_executed(e).await,
            ChainEvent::Transfer(e) => self.handle_transfer(e).await,
        };

        match &outcome {
            ReconcileOutcome::Applied { entries } => {
                tracing::info!(
                    correlation_id = %event.correlation_id(),
                    entries,
                    "Event reconciled"
                );
            }
            ReconcileOutcome::AlreadyRecorded => {
                tracing::debug!(
                    correlation_id = %event.correlation_id(),
                    "Duplicate delivery, already recorded"
                );
            }
            ReconcileOutcome::MissingEntity => {
                tracing::debug!(
                    correlation_id = %event.correlation_id(),
                    "Referenced entity not found, skipping"
                );
            }
            ReconcileOutcome::DomainConflict => {
                tracing::warn!(
                    correlation_id = %event.correlation_id(),
                    "Domain conflict, event dropped"
                );
            }
            ReconcileOutcome::Rejected { reason } => {
                tracing::warn!(
                    correlation_id = %event.correlation_id(),
                    reason = %reason,
                    "Event rejected"
                );
            }
        }

        outcome
    }

    /// Convert a chain base-unit value; zero and over-wide values are
    /// rejected before they reach the store.
    fn ledger_amount(&self, value: U256) -> Result<Amount, String> {
        let amount = Amount::from_base_units(value, self.token_decimals)
            .ok_or_else(|| format!("amount {} out of range", value))?;
        if amount.is_zero() {
            return Err("zero amount".to_string());
        }
        Ok(amount)
    }

    async fn handle_liked(&self, event: &LikedEvent) -> ReconcileOutcome {
        let Some(account) = self.wallets.resolve(event.user).await else {
            return ReconcileOutcome::MissingEntity;
        };
        // The post may have been deleted after the event was emitted
        let post = self.posts.post(event.post_id).await.filter(|p| !p.deleted);
        if post.is_none() {
            return ReconcileOutcome::MissingEntity;
        }

        let amount = match self.ledger_amount(event.amount) {
            Ok(amount) => amount,
            Err(reason) => return ReconcileOutcome::Rejected { reason },
        };
        let Some(delta) = amount.to_i128_raw() else {
            return ReconcileOutcome::Rejected {
                reason: "amount exceeds ledger range".to_string(),
            };
        };

        let outcome = self.ledger.apply(EntrySpec {
            wallet_owner_id: account.owner_id,
            kind: TransactionKind::DeductOnAction,
            signed_amount: -delta,
            external_tx_hash: Some(event.tx_hash),
            reference_id: event.post_id.to_string(),
            reference_type: ReferenceType::Post,
            unique_per_reference: true,
            reverses: None,
        });

        match outcome {
            ApplyOutcome::Inserted(_) => ReconcileOutcome::Applied { entries: 1 },
            ApplyOutcome::DuplicateDelivery => ReconcileOutcome::AlreadyRecorded,
            ApplyOutcome::DuplicateAction => ReconcileOutcome::DomainConflict,
            ApplyOutcome::InsufficientBalance { balance, delta } => {
                ReconcileOutcome::Rejected {
                    reason: format!("insufficient balance {} for delta {}", balance, delta),
                }
            }
            ApplyOutcome::Overflow => ReconcileOutcome::Rejected {
                reason: "balance overflow".to_string(),
            },
        }
    }

    async fn handle_tokens_claimed(&self, event: &TokensClaimedEvent) -> ReconcileOutcome {
        let Some(account) = self.wallets.resolve(event.to).await else {
            return ReconcileOutcome::MissingEntity;
        };

        let amount = match self.ledger_amount(event.amount) {
            Ok(amount) => amount,
            Err(reason) => return ReconcileOutcome::Rejected { reason },
        };
        let Some(delta) = amount.to_i128_raw() else {
            return ReconcileOutcome::Rejected {
                reason: "amount exceeds ledger range".to_string(),
            };
        };

        let outcome = self.ledger.apply(EntrySpec {
            wallet_owner_id: account.owner_id,
            kind: TransactionKind::RewardClaim,
            signed_amount: delta,
            external_tx_hash: Some(event.tx_hash),
            reference_id: event.post_id.to_string(),
            reference_type: ReferenceType::Post,
            unique_per_reference: false,
            reverses: None,
        });

        match outcome {
            ApplyOutcome::Inserted(_) => {
                // Post-bound execution events carry no nonce; correlate
                // the pending request by ticket signature
                self.finalize_claim(self.tracker.mark_executed_by_signature(
                    event.to,
                    &event.signature,
                    event.tx_hash,
                    Utc::now().timestamp(),
                ), event.to);
                ReconcileOutcome::Applied { entries: 1 }
            }
            ApplyOutcome::DuplicateDelivery => ReconcileOutcome::AlreadyRecorded,
            ApplyOutcome::DuplicateAction => ReconcileOutcome::DomainConflict,
            ApplyOutcome::InsufficientBalance { .. } | ApplyOutcome::Overflow => {
                ReconcileOutcome::Rejected {
                    reason: "balance overflow".to_string(),
                }
            }
        }
    }

    async fn handle_claim_executed(&self, event: &ClaimExecutedEvent) -> ReconcileOutcome {
        let Some(account) = self.wallets.resolve(event.to).await else {
            return ReconcileOutcome::MissingEntity;
        };

        let amount = match self.ledger_amount(event.amount) {
            Ok(amount) => amount,
            Err(reason) => return ReconcileOutcome::Rejected { reason },
        };
        let Some(delta) = amount.to_i128_raw() else {
            return ReconcileOutcome::Rejected {
                reason: "amount exceeds ledger range".to_string(),
            };
        };

        let outcome = self.ledger.apply(EntrySpec {
            wallet_owner_id: account.owner_id,
            kind: TransactionKind::RewardClaim,
            signed_amount: delta,
            external_tx_hash: Some(event.tx_hash),
            reference_id: format!("{}", event.nonce),
            reference_type: ReferenceType::Claim,
            unique_per_reference: false,
            reverses: None,
        });

        match outcome {
            ApplyOutcome::Inserted(_) => {
                self.finalize_claim(
                    self.tracker.mark_executed(
                        event.to,
                        event.nonce,
                        event.tx_hash,
                        Utc::now().timestamp(),
                    ),
                    event.to,
                );
                ReconcileOutcome::Applied { entries: 1 }
            }
            ApplyOutcome::DuplicateDelivery => ReconcileOutcome::AlreadyRecorded,
            ApplyOutcome::DuplicateAction => ReconcileOutcome::DomainConflict,
            ApplyOutcome::InsufficientBalance { .. } | ApplyOutcome::Overflow => {
                ReconcileOutcome::Rejected {
                    reason: "balance overflow".to_string(),
                }
            }
        }
    }

    fn finalize_claim(&self, transition: TransitionOutcome, wallet: Address) {
        match transition {
            TransitionOutcome::Executed { nonce } => {
                self.nonces.mark_used(wallet, nonce);
            }
            TransitionOutcome::DeadlineExceeded => {
                // Credit stands (the chain is authoritative); the request
                // itself was moved to Expired by the tracker
            }
            TransitionOutcome::NotFound => {
                tracing::debug!(
                    wallet = %wallet,
                    "No tracked claim request for execution event"
                );
            }
            TransitionOutcome::AlreadyTerminal(status) => {
                tracing::debug!(wallet = %wallet, %status, "Claim request already terminal");
            }
            TransitionOutcome::Failed => {}
        }
    }

    async fn handle_transfer(&self, event: &TransferEvent) -> ReconcileOutcome {
        let amount = match self.ledger_amount(event.value) {
            Ok(amount) => amount,
            Err(reason) => return ReconcileOutcome::Rejected { reason },
        };
        let Some(delta) = amount.to_i128_raw() else {
            return ReconcileOutcome::Rejected {
                reason: "amount exceeds ledger range".to_string(),
            };
        };

        // Mint transfers have a zero sender; otherwise mirror whichever
        // sides belong to locally known wallets
        let sender = if event.from == Address::ZERO {
            None
        } else {
            self.wallets.resolve(event.from).await
        };
        let receiver = self.wallets.resolve(event.to).await;

        if sender.is_none() && receiver.is_none() {
            return ReconcileOutcome::MissingEntity;
        }

        let reference_id = format!("{}->{}", event.from, event.to);
        let mut entries = 0;
        let mut duplicates = 0;

        if let Some(account) = sender {
            let outcome = self.ledger.apply(EntrySpec {
                wallet_owner_id: account.owner_id,
                kind: TransactionKind::TransferOut,
                signed_amount: -delta,
                external_tx_hash: Some(event.tx_hash),
                reference_id: reference_id.clone(),
                reference_type: ReferenceType::Transfer,
                unique_per_reference: false,
                reverses: None,
            });
            match outcome {
                ApplyOutcome::Inserted(_) => entries += 1,
                ApplyOutcome::DuplicateDelivery => duplicates += 1,
                ApplyOutcome::InsufficientBalance { balance, delta } => {
                    tracing::warn!(
                        from = %event.from,
                        %balance,
                        delta,
                        "Transfer-out would overdraw mirrored balance, skipping debit"
                    );
                }
                _ => {}
            }
        }

        if let Some(account) = receiver {
            let outcome = self.ledger.apply(EntrySpec {
                wallet_owner_id: account.owner_id,
                kind: TransactionKind::TransferIn,
                signed_amount: delta,
                external_tx_hash: Some(event.tx_hash),
                reference_id,
                reference_type: ReferenceType::Transfer,
                unique_per_reference: false,
                reverses: None,
            });
            match outcome {
                ApplyOutcome::Inserted(_) => entries += 1,
                ApplyOutcome::DuplicateDelivery => duplicates += 1,
                _ => {}
            }
        }

        if entries > 0 {
            ReconcileOutcome::Applied { entries }
        } else if duplicates > 0 {
            ReconcileOutcome::AlreadyRecorded
        } else {
            ReconcileOutcome::Rejected {
                reason: "no transfer side applied".to_string(),
            }
        }
    }

    /// Manual/admin resync over an inclusive block range. Reuses the
    /// regular decode + reconcile path, so overlapping calls add nothing.
    pub async fn reconcile_range(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<ReconcileReport, ChainError> {
        tracing::info!(from_block, to_block, "Manual reconcile over block range");

        let logs = self
            .reader
            .logs(
                self.contract_address,
                &EventSignatures::all(),
                from_block,
                to_block,
            )
            .await?;

        let mut report = ReconcileReport {
            total_events: logs.len(),
            ..Default::default()
        };

        for record in logs {
            let event = match parse_log(&record.log, record.tx_hash, record.block_number) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(block_number = record.block_number, "Failed to parse log: {}", e);
                    report.errors += 1;
                    continue;
                }
            };

            report.processed_events += 1;
            match self.handle_event(&event).await {
                ReconcileOutcome::Applied { entries } => report.new_entries += entries,
                ReconcileOutcome::AlreadyRecorded | ReconcileOutcome::MissingEntity => {}
                ReconcileOutcome::DomainConflict | ReconcileOutcome::Rejected { .. } => {
                    report.errors += 1;
                }
            }
        }

        tracing::info!(
            total = report.total_events,
            processed = report.processed_events,
            new_entries = report.new_entries,
            errors = report.errors,
            "Reconcile range complete"
        );

        Ok(report)
    }

    /// Administrative ledger entry outside the event path: refunds,
    /// balance seeding, manual corrections.
    pub fn record_adjustment(
        &self,
        owner_id: &str,
        kind: TransactionKind,
        signed_amount: i128,
        reference_id: &str,
    ) -> eyre::Result<LedgerTransaction> {
        match kind {
            TransactionKind::Refund
            | TransactionKind::SystemAdjustment
            | TransactionKind::InitialSync => {}
            other => eyre::bail!("{} entries are event-driven, not administrative", other),
        }

        let outcome = self.ledger.apply(EntrySpec {
            wallet_owner_id: owner_id.to_string(),
            kind,
            signed_amount,
            external_tx_hash: None,
            reference_id: reference_id.to_string(),
            reference_type: ReferenceType::Adjustment,
            unique_per_reference: false,
            reverses: None,
        });

        match outcome {
            ApplyOutcome::Inserted(entry) => {
                tracing::info!(owner_id, %kind, signed_amount, "Adjustment recorded");
                Ok(entry)
            }
            ApplyOutcome::InsufficientBalance { balance, delta } => {
                eyre::bail!("insufficient balance {} for adjustment {}", balance, delta)
            }
            ApplyOutcome::Overflow => eyre::bail!("adjustment overflows balance"),
            ApplyOutcome::DuplicateDelivery | ApplyOutcome::DuplicateAction => {
                eyre::bail!("duplicate adjustment")
            }
        }
    }
}
