//! Event types for the reward contract
//!
//! The reward contract emits:
//! - Liked: a wallet spent tokens to like a post
//! - TokensClaimed: a post-bound reward claim was executed
//! - ClaimExecuted: a direct claim ticket was redeemed
//! - Transfer: ERC-20 token movement involving tracked wallets

use alloy_primitives::{Address, Bytes, B256, Log as PrimitiveLog, U256};
use alloy_sol_types::{sol, SolEvent};
use chrono::{DateTime, Utc};

// Solidity event definitions. Transfer is the canonical ERC-20 event with
// indexed parties; the reward contract's own events are unindexed.
sol! {
    /// Liked event emitted when a user pays tokens to like a post
    #[derive(Debug)]
    event Liked(
        uint256 postId,
        address user,
        uint256 amount,
        uint256 timestamp
    );

    /// TokensClaimed event emitted when a post-bound claim ticket is redeemed
    #[derive(Debug)]
    event TokensClaimed(
        address to,
        uint256 postId,
        uint256 amount,
        bytes signature
    );

    /// ClaimExecuted event emitted when a direct claim ticket is redeemed
    #[derive(Debug)]
    event ClaimExecuted(
        address to,
        uint256 amount,
        bytes32 nonce,
        bytes signature
    );

    /// Canonical ERC-20 Transfer event
    #[derive(Debug)]
    event Transfer(
        address indexed from,
        address indexed to,
        uint256 value
    );
}

/// Parsed Liked event with chain context
#[derive(Debug, Clone)]
pub struct LikedEvent {
    pub post_id: U256,
    pub user: Address,
    /// Amount in the token's base units
    pub amount: U256,
    pub timestamp: U256,
    pub tx_hash: B256,
    pub block_number: u64,
    pub observed_at: DateTime<Utc>,
}

/// Parsed TokensClaimed event with chain context
#[derive(Debug, Clone)]
pub struct TokensClaimedEvent {
    pub to: Address,
    pub post_id: U256,
    pub amount: U256,
    /// Claim ticket signature the redeemer submitted on-chain
    pub signature: Bytes,
    pub tx_hash: B256,
    pub block_number: u64,
    pub observed_at: DateTime<Utc>,
}

/// Parsed ClaimExecuted event with chain context
#[derive(Debug, Clone)]
pub struct ClaimExecutedEvent {
    pub to: Address,
    pub amount: U256,
    pub nonce: B256,
    pub signature: Bytes,
    pub tx_hash: B256,
    pub block_number: u64,
    pub observed_at: DateTime<Utc>,
}

/// Parsed Transfer event with chain context
#[derive(Debug, Clone)]
pub struct TransferEvent {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub tx_hash: B256,
    pub block_number: u64,
    pub observed_at: DateTime<Utc>,
}

/// Wrapper enum for decoded contract events
#[derive(Debug, Clone)]
pub enum ChainEvent {
    Liked(LikedEvent),
    TokensClaimed(TokensClaimedEvent),
    ClaimExecuted(ClaimExecutedEvent),
    Transfer(TransferEvent),
}

impl ChainEvent {
    pub fn tx_hash(&self) -> B256 {
        match self {
            ChainEvent::Liked(e) => e.tx_hash,
            ChainEvent::TokensClaimed(e) => e.tx_hash,
            ChainEvent::ClaimExecuted(e) => e.tx_hash,
            ChainEvent::Transfer(e) => e.tx_hash,
        }
    }

    pub fn block_number(&self) -> u64 {
        match self {
            ChainEvent::Liked(e) => e.block_number,
            ChainEvent::TokensClaimed(e) => e.block_number,
            ChainEvent::ClaimExecuted(e) => e.block_number,
            ChainEvent::Transfer(e) => e.block_number,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChainEvent::Liked(_) => "liked",
            ChainEvent::TokensClaimed(_) => "tokens_claimed",
            ChainEvent::ClaimExecuted(_) => "claim_executed",
            ChainEvent::Transfer(_) => "transfer",
        }
    }

    /// Correlation id for log lines: truncated tx hash + event label.
    pub fn correlation_id(&self) -> String {
        let tx_hash = self.tx_hash();
        let hash_short = &format!("{:?}", tx_hash)[2..18];
        format!("{}:{}", hash_short, self.label())
    }
}

/// Event signature constants
pub struct EventSignatures;

impl EventSignatures {
    pub fn liked() -> B256 {
        Liked::SIGNATURE_HASH
    }

    pub fn tokens_claimed() -> B256 {
        TokensClaimed::SIGNATURE_HASH
    }

    pub fn claim_executed() -> B256 {
        ClaimExecuted::SIGNATURE_HASH
    }

    pub fn transfer() -> B256 {
        Transfer::SIGNATURE_HASH
    }

    /// All tracked topic hashes, for log query filters
    pub fn all() -> Vec<B256> {
        vec![
            Self::liked(),
            Self::tokens_claimed(),
            Self::claim_executed(),
            Self::transfer(),
        ]
    }
}

/// Parse a raw log into a ChainEvent by topic0 lookup
pub fn parse_log(
    log: &PrimitiveLog,
    tx_hash: B256,
    block_number: u64,
) -> Result<ChainEvent, EventParseError> {
    let topic0 = log.topics().first().ok_or(EventParseError::NoTopics)?;

    let observed_at = Utc::now();

    if *topic0 == EventSignatures::liked() {
        let decoded = Liked::decode_log(log)
            .map_err(|e| EventParseError::DecodeError(e.to_string()))?;

        Ok(ChainEvent::Liked(LikedEvent {
            post_id: decoded.postId,
            user: decoded.user,
            amount: decoded.amount,
            timestamp: decoded.timestamp,
            tx_hash,
            block_number,
            observed_at,
        }))
    } else if *topic0 == EventSignatures::tokens_claimed() {
        let decoded = TokensClaimed::decode_log(log)
            .map_err(|e| EventParseError::DecodeError(e.to_string()))?;

        Ok(ChainEvent::TokensClaimed(TokensClaimedEvent {
            to: decoded.to,
            post_id: decoded.postId,
            amount: decoded.amount,
            signature: decoded.signature.clone(),
            tx_hash,
            block_number,
            observed_at,
        }))
    } else if *topic0 == EventSignatures::claim_executed() {
        let decoded = ClaimExecuted::decode_log(log)
            .map_err(|e| EventParseError::DecodeError(e.to_string()))?;

        Ok(ChainEvent::ClaimExecuted(ClaimExecutedEvent {
            to: decoded.to,
            amount: decoded.amount,
            nonce: decoded.nonce,
            signature: decoded.signature.clone(),
            tx_hash,
            block_number,
            observed_at,
        }))
    } else if *topic0 == EventSignatures::transfer() {
        let decoded = Transfer::decode_log(log)
            .map_err(|e| EventParseError::DecodeError(e.to_string()))?;

        Ok(ChainEvent::Transfer(TransferEvent {
            from: decoded.from,
            to: decoded.to,
            value: decoded.value,
            tx_hash,
            block_number,
            observed_at,
        }))
    } else {
        Err(EventParseError::UnknownSignature(*topic0))
    }
}

/// Errors that can occur during event parsing
#[derive(Debug, Clone)]
pub enum EventParseError {
    /// Log has no topics
    NoTopics,
    /// Failed to decode event data
    DecodeError(String),
    /// Unknown event signature
    UnknownSignature(B256),
}

impl std::fmt::Display for EventParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventParseError::NoTopics => write!(f, "Log has no topics"),
            EventParseError::DecodeError(msg) => write!(f, "Failed to decode event: {}", msg),
            EventParseError::UnknownSignature(sig) => {
                write!(f, "Unknown event signature: {}", sig)
            }
        }
    }
}

impl std::error::Error for EventParseError {}
