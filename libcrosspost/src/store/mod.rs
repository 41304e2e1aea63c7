//! Credential and configuration store
//!
//! Accounts and global settings live in an external system of record. The
//! core only reads them (plus one token-update call), so the store is a trait
//! with a Notion implementation for production and an in-memory one for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::types::{Account, AccountId, PlatformKind};

pub mod cache;
pub mod memory;
pub mod notion;

pub use cache::{Clock, ManualClock, SystemClock, TtlCache};
pub use memory::MemoryStore;
pub use notion::NotionStore;

/// Global settings read from the store
///
/// Every value is optional; callers supply their own fallbacks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreConfig {
    pub draft_channel: Option<String>,
    pub publish_channel: Option<String>,
    pub default_destination: Option<String>,
    pub server_id: Option<String>,
}

/// A named channel a post can fan out to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub id: String,
    pub name: String,
}

/// A saved web page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspiration {
    pub url: String,
    pub title: String,
    pub description: Option<String>,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// All accounts registered for a platform, read fresh on every call
    async fn accounts(&self, platform: PlatformKind) -> Result<Vec<Account>, StoreError>;

    async fn config(&self) -> Result<StoreConfig, StoreError>;

    async fn update_account_tokens(
        &self,
        account_id: &AccountId,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Destinations the browser extension can pick from
    async fn publish_destinations(&self) -> Result<Vec<Destination>, StoreError>;

    async fn save_inspiration(&self, inspiration: &Inspiration) -> Result<(), StoreError>;

    /// Look up one account by id
    async fn account(
        &self,
        platform: PlatformKind,
        account_id: &AccountId,
    ) -> Result<Option<Account>, StoreError> {
        Ok(self
            .accounts(platform)
            .await?
            .into_iter()
            .find(|a| &a.id == account_id))
    }
}
