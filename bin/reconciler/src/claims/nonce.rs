//! Per-wallet claim nonce registry
//!
//! Nonce values handed to callers are 32 random bytes, never a counter;
//! a predictable nonce would let an attacker pre-construct plausible claim
//! tickets. The generated/used counters exist for auditing only; replay
//! protection lives in the (wallet, nonce) uniqueness of claim requests
//! and the contract's own used-nonce set.

use alloy_primitives::{Address, B256};
use parking_lot::Mutex;
use rand::RngCore;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NonceStats {
    pub generated: u64,
    pub used: u64,
}

#[derive(Default)]
pub struct NonceRegistry {
    state: Mutex<HashMap<Address, NonceStats>>,
}

impl NonceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh unpredictable nonce for a wallet
    pub fn issue_nonce(&self, wallet: Address) -> B256 {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let nonce = B256::from(bytes);

        self.state.lock().entry(wallet).or_default().generated += 1;

        tracing::debug!(wallet = %wallet, nonce = %nonce, "Nonce issued");
        nonce
    }

    /// Bookkeeping after on-chain confirmation; not the authority for
    /// double-spend prevention
    pub fn mark_used(&self, wallet: Address, nonce: B256) {
        self.state.lock().entry(wallet).or_default().used += 1;
        tracing::debug!(wallet = %wallet, nonce = %nonce, "Nonce marked used");
    }

    pub fn stats(&self, wallet: Address) -> NonceStats {
        self.state
            .lock()
            .get(&wallet)
            .copied()
            .unwrap_or_default()
    }
}
