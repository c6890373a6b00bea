//! Chain connectivity module
//!
//! Provides:
//! - Event types and topic-hash decoding for the reward contract
//! - A narrow reader trait over the node RPC
//! - The polling log watcher with cursor tracking

pub(crate) mod event_types;
mod errors;
mod reader;
mod watcher;

pub use errors::ChainError;
pub use event_types::{
    parse_log, ChainEvent, ClaimExecutedEvent, EventParseError, EventSignatures, LikedEvent,
    TokensClaimedEvent, TransferEvent,
    // Raw sol! events, exported so tests can encode log payloads
    ClaimExecuted, Liked, TokensClaimed, Transfer,
};
pub use reader::{ChainReader, HttpChainReader, RawLogRecord};
pub use watcher::{LogWatcher, ServiceStatus, WatcherConfig};
