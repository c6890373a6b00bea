//! Claim request tracker
//!
//! Status machine: Pending -> Executed (correlated execution event),
//! Pending -> Expired (sweep), Pending -> Failed (explicit signal).
//! Every transition is check-and-set under one lock, so the expiry sweep
//! cannot race an in-flight execution-event reconciliation.

use super::types::{ClaimError, ClaimRequest, ClaimStatus};
use alloy_primitives::{Address, B256};
use common::Amount;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

/// Result of an execution-event correlation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Executed { nonce: B256 },
    Failed,
    /// Past deadline: the request was moved to Expired instead
    DeadlineExceeded,
    AlreadyTerminal(ClaimStatus),
    NotFound,
}

#[derive(Default)]
struct TrackerState {
    requests: HashMap<(Address, B256), ClaimRequest>,
    /// Post-bound execution events carry no nonce; they correlate by the
    /// ticket signature instead
    by_signature: HashMap<(Address, String), B256>,
}

#[derive(Default)]
pub struct ClaimTracker {
    state: Mutex<TrackerState>,
}

impl ClaimTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist a freshly issued Pending request. Enforces (wallet, nonce)
    /// uniqueness.
    pub fn insert_pending(&self, request: ClaimRequest) -> Result<(), ClaimError> {
        let mut state = self.state.lock();
        let key = (request.wallet_address, request.nonce);
        if state.requests.contains_key(&key) {
            return Err(ClaimError::NonceReuse);
        }
        state.by_signature.insert(
            (request.wallet_address, request.signature_hex.to_lowercase()),
            request.nonce,
        );
        state.requests.insert(key, request);
        Ok(())
    }

    /// Correlate an execution event by (wallet, nonce)
    pub fn mark_executed(
        &self,
        wallet: Address,
        nonce: B256,
        tx_hash: B256,
        now: i64,
    ) -> TransitionOutcome {
        let mut state = self.state.lock();
        Self::execute_locked(&mut state, wallet, nonce, tx_hash, now)
    }

    /// Correlate an execution event by the ticket signature bytes
    pub fn mark_executed_by_signature(
        &self,
        wallet: Address,
        signature: &[u8],
        tx_hash: B256,
        now: i64,
    ) -> TransitionOutcome {
        let mut state = self.state.lock();
        let sig_hex = format!("0x{}", hex::encode(signature)).to_lowercase();
        let Some(nonce) = state.by_signature.get(&(wallet, sig_hex)).copied() else {
            return TransitionOutcome::NotFound;
        };
        Self::execute_locked(&mut state, wallet, nonce, tx_hash, now)
    }

    fn execute_locked(
        state: &mut TrackerState,
        wallet: Address,
        nonce: B256,
        tx_hash: B256,
        now: i64,
    ) -> TransitionOutcome {
        let Some(request) = state.requests.get_mut(&(wallet, nonce)) else {
            return TransitionOutcome::NotFound;
        };

        match request.status {
            ClaimStatus::Pending => {
                if now > request.deadline {
                    // Never into Executed past the deadline
                    request.status = ClaimStatus::Expired;
                    request.reason = Some("execution observed after deadline".to_string());
                    tracing::warn!(
                        wallet = %wallet,
                        nonce = %nonce,
                        deadline = request.deadline,
                        "Execution event past deadline, expiring claim"
                    );
                    TransitionOutcome::DeadlineExceeded
                } else {
                    request.status = ClaimStatus::Executed;
                    request.external_tx_hash = Some(tx_hash);
                    tracing::info!(
                        wallet = %wallet,
                        nonce = %nonce,
                        tx_hash = %tx_hash,
                        "Claim executed"
                    );
                    TransitionOutcome::Executed { nonce }
                }
            }
            status => TransitionOutcome::AlreadyTerminal(status),
        }
    }

    /// Explicit failure signal, e.g. from a reverted execution attempt
    pub fn mark_failed(&self, wallet: Address, nonce: B256, reason: &str) -> TransitionOutcome {
        let mut state = self.state.lock();
        let Some(request) = state.requests.get_mut(&(wallet, nonce)) else {
            return TransitionOutcome::NotFound;
        };
        match request.status {
            ClaimStatus::Pending => {
                request.status = ClaimStatus::Failed;
                request.reason = Some(reason.to_string());
                tracing::warn!(wallet = %wallet, nonce = %nonce, reason, "Claim failed");
                TransitionOutcome::Failed
            }
            status => TransitionOutcome::AlreadyTerminal(status),
        }
    }

    /// Move every Pending request past its deadline to Expired. Returns
    /// the number swept.
    pub fn sweep_expired(&self, now: i64) -> usize {
        let mut state = self.state.lock();
        let mut swept = 0;
        for request in state.requests.values_mut() {
            if request.status == ClaimStatus::Pending && request.deadline < now {
                request.status = ClaimStatus::Expired;
                request.reason = Some("deadline passed".to_string());
                swept += 1;
            }
        }
        if swept > 0 {
            tracing::info!(swept, "Expired pending claim requests");
        }
        swept
    }

    pub fn request(&self, wallet: Address, nonce: B256) -> Option<ClaimRequest> {
        self.state.lock().requests.get(&(wallet, nonce)).cloned()
    }

    pub fn requests_for(&self, wallet: Address) -> Vec<ClaimRequest> {
        let mut requests: Vec<ClaimRequest> = self
            .state
            .lock()
            .requests
            .values()
            .filter(|r| r.wallet_address == wallet)
            .cloned()
            .collect();
        requests.sort_by_key(|r| r.created_at);
        requests
    }

    /// Sum of Pending claim amounts, used by the issuance overdraft guard
    pub fn pending_total(&self, wallet: Address) -> Amount {
        self.state
            .lock()
            .requests
            .values()
            .filter(|r| r.wallet_address == wallet && r.status == ClaimStatus::Pending)
            .fold(Amount::ZERO, |acc, r| {
                acc.checked_add(r.amount).unwrap_or(Amount::MAX)
            })
    }
}

/// Periodic expiry sweep, independent of the watcher
pub struct ExpirySweeper {
    tracker: Arc<ClaimTracker>,
    interval_secs: u64,
    cancel_token: CancellationToken,
}

impl ExpirySweeper {
    pub fn new(tracker: Arc<ClaimTracker>, interval_secs: u64) -> Arc<Self> {
        Arc::new(Self {
            tracker,
            interval_secs,
            cancel_token: CancellationToken::new(),
        })
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub async fn run(self: Arc<Self>) {
        tracing::info!(interval_secs = self.interval_secs, "Starting claim expiry sweeper");
        let mut sweep_interval = interval(Duration::from_secs(self.interval_secs));

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    tracing::info!("🛑 Shutdown signal received");
                    break;
                }
                _ = sweep_interval.tick() => {
                    self.tracker.sweep_expired(chrono::Utc::now().timestamp());
                }
            }
        }

        tracing::info!("Claim expiry sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::types::ClaimContext;
    use chrono::Utc;

    fn pending_request(wallet: Address, nonce: B256, deadline: i64) -> ClaimRequest {
        ClaimRequest {
            wallet_address: wallet,
            nonce,
            amount: Amount::ONE,
            deadline,
            signature_hex: format!("0x{}", hex::encode(nonce.as_slice())),
            status: ClaimStatus::Pending,
            external_tx_hash: None,
            reason: None,
            context: ClaimContext::Direct,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_nonce_uniqueness_enforced() {
        let tracker = ClaimTracker::new();
        let wallet = Address::repeat_byte(0x01);
        let nonce = B256::repeat_byte(0xAA);

        tracker
            .insert_pending(pending_request(wallet, nonce, 1000))
            .unwrap();
        assert!(matches!(
            tracker.insert_pending(pending_request(wallet, nonce, 2000)),
            Err(ClaimError::NonceReuse)
        ));
    }

    #[test]
    fn test_execute_before_deadline() {
        let tracker = ClaimTracker::new();
        let wallet = Address::repeat_byte(0x01);
        let nonce = B256::repeat_byte(0xAA);
        tracker
            .insert_pending(pending_request(wallet, nonce, 1000))
            .unwrap();

        let tx = B256::repeat_byte(0x05);
        assert_eq!(
            tracker.mark_executed(wallet, nonce, tx, 999),
            TransitionOutcome::Executed { nonce }
        );

        let request = tracker.request(wallet, nonce).unwrap();
        assert_eq!(request.status, ClaimStatus::Executed);
        assert_eq!(request.external_tx_hash, Some(tx));

        // terminal: a second execution event is a no-op
        assert_eq!(
            tracker.mark_executed(wallet, nonce, tx, 999),
            TransitionOutcome::AlreadyTerminal(ClaimStatus::Executed)
        );
    }

    #[test]
    fn test_no_execution_past_deadline() {
        let tracker = ClaimTracker::new();
        let wallet = Address::repeat_byte(0x01);
        let nonce = B256::repeat_byte(0xAA);
        tracker
            .insert_pending(pending_request(wallet, nonce, 1000))
            .unwrap();

        assert_eq!(
            tracker.mark_executed(wallet, nonce, B256::repeat_byte(0x05), 1001),
            TransitionOutcome::DeadlineExceeded
        );
        assert_eq!(
            tracker.request(wallet, nonce).unwrap().status,
            ClaimStatus::Expired
        );
    }

    #[test]
    fn test_sweep_expires_only_overdue_pending() {
        let tracker = ClaimTracker::new();
        let wallet = Address::repeat_byte(0x01);
        tracker
            .insert_pending(pending_request(wallet, B256::repeat_byte(0x01), 100))
            .unwrap();
        tracker
            .insert_pending(pending_request(wallet, B256::repeat_byte(0x02), 5000))
            .unwrap();

        assert_eq!(tracker.sweep_expired(1000), 1);
        assert_eq!(
            tracker.request(wallet, B256::repeat_byte(0x01)).unwrap().status,
            ClaimStatus::Expired
        );
        assert_eq!(
            tracker.request(wallet, B256::repeat_byte(0x02)).unwrap().status,
            ClaimStatus::Pending
        );

        // idempotent
        assert_eq!(tracker.sweep_expired(1000), 0);
    }

    #[test]
    fn test_correlation_by_signature() {
        let tracker = ClaimTracker::new();
        let wallet = Address::repeat_byte(0x01);
        let nonce = B256::repeat_byte(0xAA);
        let request = pending_request(wallet, nonce, 1000);
        let sig_bytes = hex::decode(request.signature_hex.trim_start_matches("0x")).unwrap();
        tracker.insert_pending(request).unwrap();

        assert_eq!(
            tracker.mark_executed_by_signature(wallet, &sig_bytes, B256::repeat_byte(0x05), 500),
            TransitionOutcome::Executed { nonce }
        );

        assert_eq!(
            tracker.mark_executed_by_signature(
                wallet,
                &[0xde, 0xad],
                B256::repeat_byte(0x05),
                500
            ),
            TransitionOutcome::NotFound
        );
    }

    #[test]
    fn test_pending_total_counts_only_pending() {
        let tracker = ClaimTracker::new();
        let wallet = Address::repeat_byte(0x01);
        tracker
            .insert_pending(pending_request(wallet, B256::repeat_byte(0x01), 1000))
            .unwrap();
        tracker
            .insert_pending(pending_request(wallet, B256::repeat_byte(0x02), 1000))
            .unwrap();
        tracker.mark_executed(wallet, B256::repeat_byte(0x01), B256::repeat_byte(0x05), 500);

        assert_eq!(tracker.pending_total(wallet), Amount::ONE);
    }

    #[test]
    fn test_mark_failed_records_reason() {
        let tracker = ClaimTracker::new();
        let wallet = Address::repeat_byte(0x01);
        let nonce = B256::repeat_byte(0xAA);
        tracker
            .insert_pending(pending_request(wallet, nonce, 1000))
            .unwrap();

        tracker.mark_failed(wallet, nonce, "execution reverted");
        let request = tracker.request(wallet, nonce).unwrap();
        assert_eq!(request.status, ClaimStatus::Failed);
        assert_eq!(request.reason.as_deref(), Some("execution reverted"));
    }
}
