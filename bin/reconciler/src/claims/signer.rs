//! EIP-712 claim signature issuer and verifier
//!
//! The backend never transfers funds: a ticket is a bearer authorization
//! the client submits to the chain itself. The signature binds exactly the
//! signed tuple; changing any field invalidates it. When the signer key
//! or domain configuration is missing the service constructs disabled,
//! warns once, and every call returns `ClaimError::NotConfigured`.

use super::nonce::NonceRegistry;
use super::tracker::ClaimTracker;
use super::types::{
    ClaimContext, ClaimError, ClaimPayload, ClaimRequest, ClaimStatus, ClaimTicket,
};
use crate::directory::{PostCatalog, TokenSource, WalletDirectory};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use alloy_primitives::{Address, Signature, B256, U256};
use alloy_sol_types::{eip712_domain, sol, Eip712Domain, SolStruct};
use chrono::Utc;
use common::Amount;
use std::sync::Arc;

sol! {
    /// Reward claim bound to one post
    struct PostClaim {
        uint256 postId;
        address to;
        uint256 amount;
        uint256 deadline;
        bytes32 nonce;
    }

    /// Claim against the wallet's accumulated balance
    struct DirectClaim {
        address to;
        uint256 amount;
        uint256 deadline;
        bytes32 nonce;
    }
}

/// Static signing configuration
#[derive(Debug, Clone)]
pub struct SignerConfig {
    pub domain_name: String,
    pub domain_version: String,
    pub chain_id: u64,
    pub verifying_contract: Option<Address>,
    pub claim_ttl_secs: i64,
    /// Overrides the signer-derived address for verify-only deployments
    pub trusted_signer: Option<Address>,
}

pub struct SignatureService {
    domain: Option<Eip712Domain>,
    signer: Option<PrivateKeySigner>,
    trusted_signer: Option<Address>,
    claim_ttl_secs: i64,
    token_decimals: u8,
    nonces: Arc<NonceRegistry>,
    tracker: Arc<ClaimTracker>,
    wallets: Arc<dyn WalletDirectory>,
    posts: Arc<dyn PostCatalog>,
    tokens: Arc<dyn TokenSource>,
}

impl SignatureService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: SignerConfig,
        signer: Option<PrivateKeySigner>,
        token_decimals: u8,
        nonces: Arc<NonceRegistry>,
        tracker: Arc<ClaimTracker>,
        wallets: Arc<dyn WalletDirectory>,
        posts: Arc<dyn PostCatalog>,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        let domain = match config.verifying_contract {
            Some(verifying_contract) => Some(eip712_domain! {
                name: config.domain_name.clone(),
                version: config.domain_version.clone(),
                chain_id: config.chain_id,
                verifying_contract: verifying_contract,
            }),
            None => None,
        };

        let trusted_signer = config
            .trusted_signer
            .or_else(|| signer.as_ref().map(|s| s.address()));

        if domain.is_none() || signer.is_none() {
            tracing::warn!(
                has_domain = domain.is_some(),
                has_signer = signer.is_some(),
                "Claim signing not configured, issuance disabled"
            );
        }

        Self {
            domain,
            signer,
            trusted_signer,
            claim_ttl_secs: config.claim_ttl_secs,
            token_decimals,
            nonces,
            tracker,
            wallets,
            posts,
            tokens,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.domain.is_some() && self.signer.is_some()
    }

    /// Typed-data digest for a payload. The struct schema depends on the
    /// claim context.
    fn digest(&self, payload: &ClaimPayload) -> Result<B256, ClaimError> {
        let domain = self.domain.as_ref().ok_or(ClaimError::NotConfigured)?;

        let digest = match payload.context {
            ClaimContext::PostReward { post_id } => PostClaim {
                postId: post_id,
                to: payload.claimee,
                amount: payload.amount,
                deadline: U256::from(payload.deadline as u64),
                nonce: payload.nonce,
            }
            .eip712_signing_hash(domain),
            ClaimContext::Direct => DirectClaim {
                to: payload.claimee,
                amount: payload.amount,
                deadline: U256::from(payload.deadline as u64),
                nonce: payload.nonce,
            }
            .eip712_signing_hash(domain),
        };

        Ok(digest)
    }

    /// Default deadline derived from the configured ticket lifetime
    pub fn default_deadline(&self) -> i64 {
        Utc::now().timestamp() + self.claim_ttl_secs
    }

    /// Issue a signed claim ticket and persist the Pending request before
    /// returning it.
    pub async fn issue_claim_signature(
        &self,
        claimee: Address,
        amount: Amount,
        deadline: i64,
        context: ClaimContext,
    ) -> Result<ClaimTicket, ClaimError> {
        let signer = self.signer.as_ref().ok_or(ClaimError::NotConfigured)?;

        if amount.is_zero() {
            return Err(ClaimError::InvalidAmount);
        }
        if deadline <= Utc::now().timestamp() {
            return Err(ClaimError::DeadlinePassed { deadline });
        }

        let account = self
            .wallets
            .resolve(claimee)
            .await
            .ok_or(ClaimError::UnknownWallet(claimee))?;

        if let ClaimContext::PostReward { post_id } = context {
            let post = self
                .posts
                .post(post_id)
                .await
                .filter(|p| !p.deleted)
                .ok_or(ClaimError::PostNotFound(post_id))?;
            if post.owner != claimee {
                return Err(ClaimError::NotPostOwner { post_id, claimee });
            }
        }

        // Outstanding pending claims count against the available balance
        let available = self.tokens.available_tokens(&account.owner_id).await;
        let pending = self.tracker.pending_total(claimee);
        let spendable = available.saturating_sub(pending);
        if spendable.is_less_than(&amount) {
            return Err(ClaimError::InsufficientTokens {
                requested: amount,
                available: spendable,
            });
        }

        let nonce = self.nonces.issue_nonce(claimee);

        let payload = ClaimPayload {
            claimee,
            amount: amount.to_base_units(self.token_decimals),
            deadline,
            nonce,
            context,
        };

        let digest = self.digest(&payload)?;
        let signature = signer
            .sign_hash_sync(&digest)
            .map_err(|e| ClaimError::SigningFailed(e.to_string()))?;
        let signature_hex = format!("0x{}", hex::encode(signature.as_bytes()));

        self.tracker.insert_pending(ClaimRequest {
            wallet_address: claimee,
            nonce,
            amount,
            deadline,
            signature_hex: signature_hex.clone(),
            status: ClaimStatus::Pending,
            external_tx_hash: None,
            reason: None,
            context,
            created_at: Utc::now(),
        })?;

        tracing::info!(
            claimee = %claimee,
            amount = %amount,
            deadline,
            nonce = %nonce,
            "Claim ticket issued"
        );

        Ok(ClaimTicket {
            payload,
            signature,
            signature_hex,
        })
    }

    /// Verify a claim ticket against the trusted signer and its deadline
    pub fn verify_claim_signature(
        &self,
        payload: &ClaimPayload,
        signature: &Signature,
    ) -> Result<bool, ClaimError> {
        self.verify_at(payload, signature, Utc::now().timestamp())
    }

    /// Deadline-parameterized verification, used directly by tests
    pub fn verify_at(
        &self,
        payload: &ClaimPayload,
        signature: &Signature,
        now: i64,
    ) -> Result<bool, ClaimError> {
        let trusted = self.trusted_signer.ok_or(ClaimError::NotConfigured)?;

        if payload.deadline <= now {
            tracing::debug!(deadline = payload.deadline, now, "Claim past deadline");
            return Ok(false);
        }

        let digest = self.digest(payload)?;
        let recovered = match signature.recover_address_from_prehash(&digest) {
            Ok(address) => address,
            Err(e) => {
                tracing::debug!("Signature recovery failed: {}", e);
                return Ok(false);
            }
        };

        // Address equality is checksum-insensitive by construction
        Ok(recovered == trusted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{InMemoryPosts, InMemoryTokens, InMemoryWallets};

    const TEST_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    struct Fixture {
        service: SignatureService,
        wallets: Arc<InMemoryWallets>,
        posts: Arc<InMemoryPosts>,
        tokens: Arc<InMemoryTokens>,
        tracker: Arc<ClaimTracker>,
    }

    fn fixture(signer: Option<PrivateKeySigner>) -> Fixture {
        let wallets = Arc::new(InMemoryWallets::new());
        let posts = Arc::new(InMemoryPosts::new());
        let tokens = Arc::new(InMemoryTokens::new());
        let tracker = Arc::new(ClaimTracker::new());
        let nonces = Arc::new(NonceRegistry::new());

        let config = SignerConfig {
            domain_name: "RewardClaims".to_string(),
            domain_version: "1".to_string(),
            chain_id: 31337,
            verifying_contract: Some(Address::repeat_byte(0xCC)),
            claim_ttl_secs: 300,
            trusted_signer: None,
        };

        let service = SignatureService::new(
            config,
            signer,
            18,
            nonces,
            tracker.clone(),
            wallets.clone(),
            posts.clone(),
            tokens.clone(),
        );

        Fixture {
            service,
            wallets,
            posts,
            tokens,
            tracker,
        }
    }

    fn funded_fixture() -> (Fixture, Address) {
        let signer: PrivateKeySigner = TEST_KEY.parse().unwrap();
        let fx = fixture(Some(signer));
        let claimee = Address::repeat_byte(0xDE);
        fx.wallets.register("user-1", claimee);
        fx.tokens
            .set_available("user-1", Amount::from_u128_with_scale(100, 0));
        (fx, claimee)
    }

    #[tokio::test]
    async fn test_issue_and_verify_round_trip() {
        let (fx, claimee) = funded_fixture();
        let deadline = fx.service.default_deadline();

        let ticket = fx
            .service
            .issue_claim_signature(
                claimee,
                Amount::from_u128_with_scale(5, 0),
                deadline,
                ClaimContext::Direct,
            )
            .await
            .unwrap();
        assert_eq!(ticket.payload.deadline, deadline);

        assert!(fx
            .service
            .verify_claim_signature(&ticket.payload, &ticket.signature)
            .unwrap());

        // the request was persisted before the ticket was returned
        let request = fx.tracker.request(claimee, ticket.payload.nonce).unwrap();
        assert_eq!(request.status, ClaimStatus::Pending);
        assert_eq!(request.signature_hex, ticket.signature_hex);
    }

    #[tokio::test]
    async fn test_signature_binds_every_field() {
        let (fx, claimee) = funded_fixture();
        fx.posts.register(U256::from(7u64), claimee);

        let ticket = fx
            .service
            .issue_claim_signature(
                claimee,
                Amount::from_u128_with_scale(5, 0),
                fx.service.default_deadline(),
                ClaimContext::PostReward {
                    post_id: U256::from(7u64),
                },
            )
            .await
            .unwrap();

        assert!(fx
            .service
            .verify_claim_signature(&ticket.payload, &ticket.signature)
            .unwrap());

        let mut tampered = ticket.payload;
        tampered.amount = ticket.payload.amount + U256::from(1u64);
        assert!(!fx
            .service
            .verify_claim_signature(&tampered, &ticket.signature)
            .unwrap());

        let mut tampered = ticket.payload;
        tampered.deadline += 1;
        assert!(!fx
            .service
            .verify_claim_signature(&tampered, &ticket.signature)
            .unwrap());

        let mut tampered = ticket.payload;
        tampered.nonce = B256::repeat_byte(0x99);
        assert!(!fx
            .service
            .verify_claim_signature(&tampered, &ticket.signature)
            .unwrap());

        let mut tampered = ticket.payload;
        tampered.claimee = Address::repeat_byte(0x11);
        assert!(!fx
            .service
            .verify_claim_signature(&tampered, &ticket.signature)
            .unwrap());

        let mut tampered = ticket.payload;
        tampered.context = ClaimContext::PostReward {
            post_id: U256::from(8u64),
        };
        assert!(!fx
            .service
            .verify_claim_signature(&tampered, &ticket.signature)
            .unwrap());
    }

    #[tokio::test]
    async fn test_verification_fails_past_deadline() {
        let (fx, claimee) = funded_fixture();

        let ticket = fx
            .service
            .issue_claim_signature(
                claimee,
                Amount::ONE,
                fx.service.default_deadline(),
                ClaimContext::Direct,
            )
            .await
            .unwrap();

        assert!(fx
            .service
            .verify_at(&ticket.payload, &ticket.signature, ticket.payload.deadline - 1)
            .unwrap());
        assert!(!fx
            .service
            .verify_at(&ticket.payload, &ticket.signature, ticket.payload.deadline)
            .unwrap());
        assert!(!fx
            .service
            .verify_at(&ticket.payload, &ticket.signature, ticket.payload.deadline + 60)
            .unwrap());
    }

    #[tokio::test]
    async fn test_validation_errors_are_specific() {
        let (fx, claimee) = funded_fixture();
        let deadline = fx.service.default_deadline();

        assert!(matches!(
            fx.service
                .issue_claim_signature(claimee, Amount::ZERO, deadline, ClaimContext::Direct)
                .await,
            Err(ClaimError::InvalidAmount)
        ));

        assert!(matches!(
            fx.service
                .issue_claim_signature(claimee, Amount::ONE, deadline - 600, ClaimContext::Direct)
                .await,
            Err(ClaimError::DeadlinePassed { .. })
        ));

        assert!(matches!(
            fx.service
                .issue_claim_signature(
                    Address::repeat_byte(0x77),
                    Amount::ONE,
                    deadline,
                    ClaimContext::Direct
                )
                .await,
            Err(ClaimError::UnknownWallet(_))
        ));

        assert!(matches!(
            fx.service
                .issue_claim_signature(
                    claimee,
                    Amount::ONE,
                    deadline,
                    ClaimContext::PostReward {
                        post_id: U256::from(404u64)
                    }
                )
                .await,
            Err(ClaimError::PostNotFound(_))
        ));

        fx.posts.register(U256::from(1u64), Address::repeat_byte(0x77));
        assert!(matches!(
            fx.service
                .issue_claim_signature(
                    claimee,
                    Amount::ONE,
                    deadline,
                    ClaimContext::PostReward {
                        post_id: U256::from(1u64)
                    }
                )
                .await,
            Err(ClaimError::NotPostOwner { .. })
        ));
    }

    #[tokio::test]
    async fn test_pending_claims_count_against_available() {
        let (fx, claimee) = funded_fixture();
        let deadline = fx.service.default_deadline();

        // 100 available; a 60-token pending claim leaves 40 spendable
        fx.service
            .issue_claim_signature(
                claimee,
                Amount::from_u128_with_scale(60, 0),
                deadline,
                ClaimContext::Direct,
            )
            .await
            .unwrap();

        assert!(matches!(
            fx.service
                .issue_claim_signature(
                    claimee,
                    Amount::from_u128_with_scale(50, 0),
                    deadline,
                    ClaimContext::Direct
                )
                .await,
            Err(ClaimError::InsufficientTokens { .. })
        ));

        fx.service
            .issue_claim_signature(
                claimee,
                Amount::from_u128_with_scale(40, 0),
                deadline,
                ClaimContext::Direct,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unconfigured_service_declines() {
        let fx = fixture(None);
        assert!(!fx.service.is_configured());

        let claimee = Address::repeat_byte(0xDE);
        fx.wallets.register("user-1", claimee);
        let deadline = fx.service.default_deadline();
        assert!(matches!(
            fx.service
                .issue_claim_signature(claimee, Amount::ONE, deadline, ClaimContext::Direct)
                .await,
            Err(ClaimError::NotConfigured)
        ));
    }
}
