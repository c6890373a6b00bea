use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub blockchain: BlockchainConfig,
    pub signing: SigningConfig,
    pub polling: PollingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockchainConfig {
    pub rpc_url: String,
    /// Reward contract address; empty disables the watcher
    pub contract_address: String,
    pub chain_id: u64,
    /// Decimal exponent of the reward token's base units
    pub token_decimals: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    pub domain_name: String,
    pub domain_version: String,
    /// EIP-712 verifying contract; empty disables claim issuance
    pub verifying_contract: String,
    pub claim_ttl_secs: i64,
    /// Optional override of the signer-derived trusted address
    pub trusted_signer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub cold_start_window_blocks: u64,
    pub sweep_interval_secs: u64,
}

impl PollingConfig {
    /// Environment overrides, applied after file load
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(interval) = env_u64("RECONCILER_POLL_INTERVAL_SECS") {
            self.interval_secs = interval;
        }
        if let Some(window) = env_u64("RECONCILER_COLD_START_WINDOW_BLOCKS") {
            self.cold_start_window_blocks = window;
        }
        if let Some(interval) = env_u64("RECONCILER_SWEEP_INTERVAL_SECS") {
            self.sweep_interval_secs = interval;
        }
        self
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl ServiceConfig {
    pub async fn load_from_file(path: &Path) -> eyre::Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            blockchain: BlockchainConfig {
                rpc_url: "http://localhost:8545".to_string(),
                contract_address: String::new(),
                chain_id: 31337,
                token_decimals: 18,
            },
            signing: SigningConfig {
                domain_name: "RewardClaims".to_string(),
                domain_version: "1".to_string(),
                verifying_contract: String::new(),
                claim_ttl_secs: 300,
                trusted_signer: None,
            },
            polling: PollingConfig {
                interval_secs: 5,
                cold_start_window_blocks: 1000,
                sweep_interval_secs: 60,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.polling.interval_secs, 5);
        assert_eq!(config.polling.cold_start_window_blocks, 1000);
        assert_eq!(config.signing.claim_ttl_secs, 300);
        assert_eq!(config.blockchain.token_decimals, 18);
        assert!(config.blockchain.contract_address.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let raw = r#"{
            "blockchain": {
                "rpc_url": "https://rpc.example.net",
                "contract_address": "0x4d856a5b7529edfd15ffaa7a36d2c7cfd52ac598",
                "chain_id": 8453,
                "token_decimals": 18
            },
            "signing": {
                "domain_name": "RewardClaims",
                "domain_version": "1",
                "verifying_contract": "0x4d856a5b7529edfd15ffaa7a36d2c7cfd52ac598",
                "claim_ttl_secs": 600,
                "trusted_signer": null
            },
            "polling": {
                "interval_secs": 10,
                "cold_start_window_blocks": 500,
                "sweep_interval_secs": 30
            }
        }"#;

        let config: ServiceConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.blockchain.chain_id, 8453);
        assert_eq!(config.polling.interval_secs, 10);
        assert_eq!(config.signing.claim_ttl_secs, 600);
    }
}
