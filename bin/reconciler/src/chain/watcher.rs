//! Polling log watcher
//!
//! One watcher per tracked contract. Each poll pass covers
//! `[cursor+1, head]`; the cursor only advances after the pass completed
//! without an RPC failure, so a transient error is retried on the next tick
//! with the same range. A single-flight guard keeps overlapping passes out.

use crate::chain::{parse_log, ChainError, ChainEvent, ChainReader, EventSignatures};
use alloy_primitives::Address;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

/// Configuration for the log watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Contract whose logs are tracked
    pub contract_address: Address,
    /// Polling interval in seconds
    pub poll_interval_secs: u64,
    /// Window queried on cold start to cover events missed during downtime
    pub cold_start_window_blocks: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            contract_address: Address::ZERO,
            poll_interval_secs: 5,
            cold_start_window_blocks: 1000,
        }
    }
}

/// Health snapshot exposed to the rest of the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    pub is_listening: bool,
    pub is_connected: bool,
    pub contract_address: Address,
}

/// Polling watcher over one contract's event logs
pub struct LogWatcher {
    config: WatcherConfig,
    reader: Arc<dyn ChainReader>,
    event_tx: mpsc::UnboundedSender<ChainEvent>,
    /// Last fully processed block; owned exclusively by this watcher
    cursor: tokio::sync::RwLock<u64>,
    /// Single-flight guard: a second poll while one is in flight is skipped
    poll_guard: tokio::sync::Mutex<()>,
    listening: AtomicBool,
    connected: AtomicBool,
    cancel_token: CancellationToken,
}

impl LogWatcher {
    pub fn new(
        config: WatcherConfig,
        reader: Arc<dyn ChainReader>,
        event_tx: mpsc::UnboundedSender<ChainEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            reader,
            event_tx,
            cursor: tokio::sync::RwLock::new(0),
            poll_guard: tokio::sync::Mutex::new(()),
            listening: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            cancel_token: CancellationToken::new(),
        })
    }

    /// Get the cancellation token for graceful shutdown
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            is_listening: self.listening.load(Ordering::Relaxed),
            is_connected: self.connected.load(Ordering::Relaxed),
            contract_address: self.config.contract_address,
        }
    }

    pub async fn cursor(&self) -> u64 {
        *self.cursor.read().await
    }

    /// Run one poll pass. Returns the number of events emitted.
    ///
    /// Skipped (returning 0) when another pass is already in flight.
    pub async fn poll_once(&self) -> Result<usize, ChainError> {
        let Ok(_guard) = self.poll_guard.try_lock() else {
            tracing::debug!("Poll already in flight, skipping tick");
            return Ok(0);
        };

        let head = match self.reader.head_block().await {
            Ok(head) => {
                self.connected.store(true, Ordering::Relaxed);
                head
            }
            Err(e) => {
                self.connected.store(false, Ordering::Relaxed);
                return Err(e);
            }
        };

        let mut cursor = *self.cursor.read().await;
        if cursor == 0 && self.config.cold_start_window_blocks > 0 {
            // Cold start: look back over a fixed window instead of the
            // whole chain
            cursor = head.saturating_sub(self.config.cold_start_window_blocks);
            tracing::info!(
                from_block = cursor + 1,
                head,
                "⏪ Cold start, seeding cursor behind head"
            );
        }

        if head <= cursor {
            return Ok(0);
        }

        tracing::debug!(
            from_block = cursor + 1,
            to_block = head,
            contract = %self.config.contract_address,
            "📊 Polling log range"
        );

        let logs = match self
            .reader
            .logs(
                self.config.contract_address,
                &EventSignatures::all(),
                cursor + 1,
                head,
            )
            .await
        {
            Ok(logs) => logs,
            Err(e) => {
                self.connected.store(false, Ordering::Relaxed);
                return Err(e);
            }
        };

        let mut emitted = 0;
        for record in logs {
            match parse_log(&record.log, record.tx_hash, record.block_number) {
                Ok(event) => {
                    tracing::info!(
                        correlation_id = %event.correlation_id(),
                        block_number = event.block_number(),
                        "Event received"
                    );
                    if self.event_tx.send(event).is_err() {
                        tracing::error!("Failed to send event to channel (receiver dropped)");
                    } else {
                        emitted += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(block_number = record.block_number, "Failed to parse log: {}", e);
                }
            }
        }

        // "No events found" is still a successful pass
        *self.cursor.write().await = head;

        Ok(emitted)
    }

    /// Run the polling loop until cancelled
    pub async fn run(self: Arc<Self>) -> Result<(), ChainError> {
        tracing::info!(
            contract = %self.config.contract_address,
            interval_secs = self.config.poll_interval_secs,
            "Starting log watcher"
        );
        self.listening.store(true, Ordering::Relaxed);

        let mut poll_interval = interval(Duration::from_secs(self.config.poll_interval_secs));

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    tracing::info!("🛑 Shutdown signal received");
                    break;
                }
                _ = poll_interval.tick() => {
                    if let Err(e) = self.poll_once().await {
                        // Transient: cursor untouched, next tick retries
                        tracing::error!("Polling error: {}", e);
                    }
                }
            }
        }

        self.listening.store(false, Ordering::Relaxed);
        tracing::info!("Log watcher stopped");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::RawLogRecord;
    use crate::chain::event_types::Liked;
    use alloy_primitives::{B256, Log as PrimitiveLog, U256};
    use alloy_sol_types::SolEvent;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct ScriptedReader {
        head: Mutex<Result<u64, String>>,
        logs: Mutex<Vec<RawLogRecord>>,
        delay_ms: u64,
    }

    impl ScriptedReader {
        fn new(head: u64, logs: Vec<RawLogRecord>) -> Arc<Self> {
            Arc::new(Self {
                head: Mutex::new(Ok(head)),
                logs: Mutex::new(logs),
                delay_ms: 0,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                head: Mutex::new(Err("connection refused".to_string())),
                logs: Mutex::new(Vec::new()),
                delay_ms: 0,
            })
        }
    }

    #[async_trait]
    impl ChainReader for ScriptedReader {
        async fn head_block(&self) -> Result<u64, ChainError> {
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            self.head
                .lock()
                .clone()
                .map_err(ChainError::RpcError)
        }

        async fn logs(
            &self,
            _contract: Address,
            _topics: &[B256],
            _from_block: u64,
            _to_block: u64,
        ) -> Result<Vec<RawLogRecord>, ChainError> {
            Ok(self.logs.lock().clone())
        }
    }

    fn liked_record(block: u64) -> RawLogRecord {
        let data = Liked {
            postId: U256::from(7u64),
            user: Address::repeat_byte(0xAB),
            amount: U256::from(1u64),
            timestamp: U256::from(0u64),
        }
        .encode_log_data();
        RawLogRecord {
            log: PrimitiveLog {
                address: Address::repeat_byte(0xCC),
                data,
            },
            tx_hash: B256::repeat_byte(0x33),
            block_number: block,
        }
    }

    fn watcher_with(
        reader: Arc<dyn ChainReader>,
    ) -> (Arc<LogWatcher>, mpsc::UnboundedReceiver<ChainEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = WatcherConfig {
            contract_address: Address::repeat_byte(0xCC),
            poll_interval_secs: 1,
            cold_start_window_blocks: 100,
        };
        (LogWatcher::new(config, reader, tx), rx)
    }

    #[tokio::test]
    async fn test_poll_emits_events_and_advances_cursor() {
        let reader = ScriptedReader::new(500, vec![liked_record(450)]);
        let (watcher, mut rx) = watcher_with(reader);

        let emitted = watcher.poll_once().await.unwrap();
        assert_eq!(emitted, 1);
        assert_eq!(watcher.cursor().await, 500);
        assert!(matches!(rx.recv().await, Some(ChainEvent::Liked(_))));
    }

    #[tokio::test]
    async fn test_empty_range_still_advances_cursor() {
        let reader = ScriptedReader::new(500, Vec::new());
        let (watcher, _rx) = watcher_with(reader);

        let emitted = watcher.poll_once().await.unwrap();
        assert_eq!(emitted, 0);
        assert_eq!(watcher.cursor().await, 500);
    }

    #[tokio::test]
    async fn test_rpc_failure_leaves_cursor_unchanged() {
        let reader = ScriptedReader::failing();
        let (watcher, _rx) = watcher_with(reader);

        assert!(watcher.poll_once().await.is_err());
        assert_eq!(watcher.cursor().await, 0);
        assert!(!watcher.status().is_connected);
    }

    #[tokio::test]
    async fn test_cold_start_window_bounds_first_range() {
        // head 50 with window 100 must not underflow
        let reader = ScriptedReader::new(50, Vec::new());
        let (watcher, _rx) = watcher_with(reader);

        watcher.poll_once().await.unwrap();
        assert_eq!(watcher.cursor().await, 50);
    }

    #[tokio::test]
    async fn test_single_flight_skips_overlapping_poll() {
        let reader = Arc::new(ScriptedReader {
            head: Mutex::new(Ok(500)),
            logs: Mutex::new(vec![liked_record(450)]),
            delay_ms: 100,
        });
        let (watcher, _rx) = watcher_with(reader);

        let first = {
            let watcher = watcher.clone();
            tokio::spawn(async move { watcher.poll_once().await.unwrap() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = watcher.poll_once().await.unwrap();

        assert_eq!(second, 0, "overlapping poll must be skipped");
        assert_eq!(first.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_is_cancellable() {
        let reader = ScriptedReader::new(500, Vec::new());
        let (watcher, _rx) = watcher_with(reader);

        let cancel = watcher.cancel_token();
        let handle = {
            let watcher = watcher.clone();
            tokio::spawn(async move { watcher.run().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(watcher.status().is_listening);

        cancel.cancel();
        handle.await.unwrap().unwrap();
        assert!(!watcher.status().is_listening);
    }
}
