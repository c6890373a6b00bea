//! Chain RPC access behind a narrow trait
//!
//! The watcher and the admin resync path only need the current head block
//! and filtered logs; everything else the node offers stays out of scope.

use crate::chain::ChainError;
use alloy::providers::Provider;
use alloy::rpc::types::Filter;
use alloy_primitives::{Address, B256, Log as PrimitiveLog};
use async_trait::async_trait;

/// A raw log with the chain context the decoder needs
#[derive(Debug, Clone)]
pub struct RawLogRecord {
    pub log: PrimitiveLog,
    pub tx_hash: B256,
    pub block_number: u64,
}

/// Read access to the chain node
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Current head block number (`eth_blockNumber`)
    async fn head_block(&self) -> Result<u64, ChainError>;

    /// Logs for one contract over an inclusive block range, filtered by
    /// topic0 hashes
    async fn logs(
        &self,
        contract: Address,
        topics: &[B256],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLogRecord>, ChainError>;
}

/// Alloy-provider-backed reader used in production
pub struct HttpChainReader<P> {
    provider: P,
}

impl<P> HttpChainReader<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P> ChainReader for HttpChainReader<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    async fn head_block(&self) -> Result<u64, ChainError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))
    }

    async fn logs(
        &self,
        contract: Address,
        topics: &[B256],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLogRecord>, ChainError> {
        let filter = Filter::new()
            .address(contract)
            .event_signature(topics.to_vec())
            .from_block(from_block)
            .to_block(to_block);

        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))?;

        let mut records = Vec::with_capacity(logs.len());
        for log in logs {
            let tx_hash = log.transaction_hash.unwrap_or(B256::ZERO);
            let block_number = log.block_number.unwrap_or(0);

            // A malformed log must not poison the batch
            let Some(primitive_log) = PrimitiveLog::new(
                log.address(),
                log.topics().to_vec(),
                log.data().data.clone(),
            ) else {
                tracing::warn!(tx_hash = %tx_hash, "Dropping malformed log from RPC response");
                continue;
            };

            records.push(RawLogRecord {
                log: primitive_log,
                tx_hash,
                block_number,
            });
        }

        Ok(records)
    }
}
