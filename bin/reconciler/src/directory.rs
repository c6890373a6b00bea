//! Collaborator interfaces
//!
//! The reconciliation engine does not own users, posts, or reward
//! accounting; it consumes them through these traits. The in-memory
//! implementations back tests and standalone runs; the embedding
//! application provides its own.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use common::Amount;
use parking_lot::RwLock;
use std::collections::HashMap;

/// A wallet known to the application
#[derive(Debug, Clone)]
pub struct WalletAccount {
    pub owner_id: String,
    pub address: Address,
}

/// An application post, as far as reconciliation cares
#[derive(Debug, Clone)]
pub struct PostRecord {
    pub post_id: U256,
    pub owner: Address,
    pub deleted: bool,
}

/// Wallet/user lookup by address
#[async_trait]
pub trait WalletDirectory: Send + Sync {
    async fn resolve(&self, address: Address) -> Option<WalletAccount>;
}

/// Post existence and ownership lookup
#[async_trait]
pub trait PostCatalog: Send + Sync {
    async fn post(&self, post_id: U256) -> Option<PostRecord>;
}

/// Source of accumulated/available reward tokens per owner
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn available_tokens(&self, owner_id: &str) -> Amount;
}

/// In-memory wallet directory
#[derive(Default)]
pub struct InMemoryWallets {
    wallets: RwLock<HashMap<Address, WalletAccount>>,
}

impl InMemoryWallets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, owner_id: impl Into<String>, address: Address) {
        let account = WalletAccount {
            owner_id: owner_id.into(),
            address,
        };
        self.wallets.write().insert(address, account);
    }
}

#[async_trait]
impl WalletDirectory for InMemoryWallets {
    async fn resolve(&self, address: Address) -> Option<WalletAccount> {
        self.wallets.read().get(&address).cloned()
    }
}

/// In-memory post catalog
#[derive(Default)]
pub struct InMemoryPosts {
    posts: RwLock<HashMap<U256, PostRecord>>,
}

impl InMemoryPosts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, post_id: U256, owner: Address) {
        self.posts.write().insert(
            post_id,
            PostRecord {
                post_id,
                owner,
                deleted: false,
            },
        );
    }

    pub fn mark_deleted(&self, post_id: U256) {
        if let Some(post) = self.posts.write().get_mut(&post_id) {
            post.deleted = true;
        }
    }
}

#[async_trait]
impl PostCatalog for InMemoryPosts {
    async fn post(&self, post_id: U256) -> Option<PostRecord> {
        self.posts.read().get(&post_id).cloned()
    }
}

/// In-memory token source
#[derive(Default)]
pub struct InMemoryTokens {
    available: RwLock<HashMap<String, Amount>>,
}

impl InMemoryTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, owner_id: impl Into<String>, amount: Amount) {
        self.available.write().insert(owner_id.into(), amount);
    }
}

#[async_trait]
impl TokenSource for InMemoryTokens {
    async fn available_tokens(&self, owner_id: &str) -> Amount {
        self.available
            .read()
            .get(owner_id)
            .copied()
            .unwrap_or(Amount::ZERO)
    }
}
