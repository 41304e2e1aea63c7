//! In-process credential store

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::SecretString;

use super::{CredentialStore, Destination, Inspiration, StoreConfig};
use crate::error::StoreError;
use crate::types::{Account, AccountId, PlatformKind};

#[derive(Default)]
struct State {
    accounts: Vec<Account>,
    config: StoreConfig,
    destinations: Vec<Destination>,
    inspirations: Vec<Inspiration>,
    fail_with: Option<StoreError>,
    account_reads: usize,
}

/// Store backed by plain vectors, used by tests and local runs
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, account: Account) -> Self {
        self.add_account(account);
        self
    }

    pub fn with_config(self, config: StoreConfig) -> Self {
        self.lock().config = config;
        self
    }

    pub fn with_destinations(self, destinations: Vec<Destination>) -> Self {
        self.lock().destinations = destinations;
        self
    }

    pub fn add_account(&self, account: Account) {
        self.lock().accounts.push(account);
    }

    /// Replace an account, e.g. to simulate rotated credentials
    pub fn replace_account(&self, account: Account) {
        let mut state = self.lock();
        state.accounts.retain(|a| a.id != account.id);
        state.accounts.push(account);
    }

    pub fn remove_account(&self, id: &AccountId) {
        self.lock().accounts.retain(|a| &a.id != id);
    }

    /// Make every following call fail with `error`
    pub fn fail_with(&self, error: StoreError) {
        self.lock().fail_with = Some(error);
    }

    pub fn inspirations(&self) -> Vec<Inspiration> {
        self.lock().inspirations.clone()
    }

    /// How many times account lists were read
    pub fn account_reads(&self) -> usize {
        self.lock().account_reads
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(&self) -> Result<(), StoreError> {
        match &self.lock().fail_with {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn accounts(&self, platform: PlatformKind) -> Result<Vec<Account>, StoreError> {
        self.check()?;
        let mut state = self.lock();
        state.account_reads += 1;
        Ok(state
            .accounts
            .iter()
            .filter(|a| a.platform == platform)
            .cloned()
            .collect())
    }

    async fn config(&self) -> Result<StoreConfig, StoreError> {
        self.check()?;
        Ok(self.lock().config.clone())
    }

    async fn update_account_tokens(
        &self,
        account_id: &AccountId,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), StoreError> {
        self.check()?;
        let mut state = self.lock();
        let account = state
            .accounts
            .iter_mut()
            .find(|a| &a.id == account_id)
            .ok_or_else(|| StoreError::Api {
                status: 404,
                message: format!("Account {} not found", account_id),
            })?;
        account.credentials.access_token = Some(SecretString::from(access_token.to_string()));
        if let Some(refresh) = refresh_token {
            account.credentials.refresh_token = Some(SecretString::from(refresh.to_string()));
        }
        Ok(())
    }

    async fn publish_destinations(&self) -> Result<Vec<Destination>, StoreError> {
        self.check()?;
        Ok(self.lock().destinations.clone())
    }

    async fn save_inspiration(&self, inspiration: &Inspiration) -> Result<(), StoreError> {
        self.check()?;
        self.lock().inspirations.push(inspiration.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CredentialField, Credentials};

    fn account(id: &str, platform: PlatformKind) -> Account {
        Account {
            id: id.into(),
            platform,
            display_name: id.to_uppercase(),
            username: None,
            credentials: Credentials::default(),
        }
    }

    #[tokio::test]
    async fn test_accounts_filtered_by_platform() {
        let store = MemoryStore::new()
            .with_account(account("a", PlatformKind::X))
            .with_account(account("b", PlatformKind::LinkedIn))
            .with_account(account("c", PlatformKind::X));

        let ids: Vec<String> = store
            .accounts(PlatformKind::X)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id.0)
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(store.account_reads(), 1);
    }

    #[tokio::test]
    async fn test_update_tokens() {
        let store = MemoryStore::new().with_account(account("a", PlatformKind::LinkedIn));
        store
            .update_account_tokens(&"a".into(), "new-token", None)
            .await
            .unwrap();

        let updated = store
            .account(PlatformKind::LinkedIn, &"a".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            updated.credentials.get(CredentialField::AccessToken),
            Some("new-token")
        );

        let err = store
            .update_account_tokens(&"missing".into(), "t", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MemoryStore::new();
        store.fail_with(StoreError::Http("down".into()));
        assert!(store.config().await.is_err());
        assert!(store.accounts(PlatformKind::X).await.is_err());
    }
}
