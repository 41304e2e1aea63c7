//! Platform publisher adapters
//!
//! Every platform implements [`Publisher`]: take an account and the content,
//! run whatever protocol the platform needs (OAuth 1.0a signing, two-phase
//! asset upload, container/publish) and return a normalised
//! [`PublishResult`]. Adapters never retry.
//!
//! # Examples
//!
//! ```no_run
//! use libcrosspost::platforms::PublisherRegistry;
//! use libcrosspost::types::{Account, PlatformKind, PostContent};
//!
//! # async fn example(account: Account) {
//! let registry = PublisherRegistry::with_defaults(reqwest::Client::new());
//! match registry.publish(PlatformKind::X, &account, &PostContent::text("Hello")).await {
//!     Ok(published) => println!("Posted: {}", published.url),
//!     Err(e) => eprintln!("Failed to publish: {}", e),
//! }
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::PlatformError;
use crate::types::{Account, PlatformKind, PostContent, PublishResult};

pub mod dribbble;
pub mod instagram;
pub mod linkedin;
pub mod oauth1;
pub mod x;

// Available outside tests so integration tests and the binaries' test suites can use it
pub mod mock;

pub use dribbble::DribbblePublisher;
pub use instagram::InstagramPublisher;
pub use linkedin::LinkedInPublisher;
pub use mock::MockPublisher;
pub use x::XPublisher;

/// Uniform publishing contract implemented once per platform
#[async_trait]
pub trait Publisher: Send + Sync {
    fn kind(&self) -> PlatformKind;

    /// Publish `content` as `account`
    ///
    /// Implementations check the account's required credential fields before
    /// any network call and return [`PlatformError::MissingCredentials`]
    /// naming every missing field.
    async fn publish(&self, account: &Account, content: &PostContent) -> PublishResult;
}

/// Publishers keyed by platform
#[derive(Clone, Default)]
pub struct PublisherRegistry {
    publishers: HashMap<PlatformKind, Arc<dyn Publisher>>,
}

impl PublisherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the real adapter for every platform, sharing one HTTP client
    pub fn with_defaults(client: reqwest::Client) -> Self {
        Self::new()
            .with(Arc::new(XPublisher::new(client.clone())))
            .with(Arc::new(LinkedInPublisher::new(client.clone())))
            .with(Arc::new(InstagramPublisher::new(client.clone())))
            .with(Arc::new(DribbblePublisher::new(client)))
    }

    pub fn with(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.register(publisher);
        self
    }

    /// Add or replace the publisher for its platform
    pub fn register(&mut self, publisher: Arc<dyn Publisher>) {
        self.publishers.insert(publisher.kind(), publisher);
    }

    pub fn get(&self, platform: PlatformKind) -> Option<Arc<dyn Publisher>> {
        self.publishers.get(&platform).cloned()
    }

    pub async fn publish(
        &self,
        platform: PlatformKind,
        account: &Account,
        content: &PostContent,
    ) -> PublishResult {
        let publisher = self
            .get(platform)
            .ok_or_else(|| PlatformError::Unsupported(platform.to_string()))?;

        tracing::info!(platform = %platform, account = %account.id, "Publishing");
        let result = publisher.publish(account, content).await;
        match &result {
            Ok(published) => {
                tracing::info!(platform = %platform, post_id = %published.post_id, "Published")
            }
            Err(e) => tracing::warn!(platform = %platform, error = %e, "Publish failed"),
        }
        result
    }

    /// Dispatch by platform name; unknown names yield `Unsupported platform`
    pub async fn publish_named(
        &self,
        platform: &str,
        account: &Account,
        content: &PostContent,
    ) -> PublishResult {
        let platform: PlatformKind = platform.parse()?;
        self.publish(platform, account, content).await
    }
}

pub(crate) fn network_error(error: reqwest::Error) -> PlatformError {
    PlatformError::Network(error.to_string())
}

/// Pull the provider's own error text out of a failure body
///
/// Known shapes are tried in order; anything else is passed through verbatim.
pub(crate) fn remote_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };

    let candidates = [
        value.get("message"),
        value.get("error").and_then(|e| e.get("message")),
        value.get("detail"),
        value
            .get("errors")
            .and_then(|e| e.get(0))
            .and_then(|e| e.get("message")),
        value.get("error_description"),
        value.get("title"),
    ];

    let message = candidates
        .into_iter()
        .flatten()
        .find_map(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string());
    message
}

/// Turn a response into `T`, or into `RemoteRejected` carrying the provider's message
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, PlatformError> {
    let status = response.status();
    let body = response.text().await.map_err(network_error)?;

    if !status.is_success() {
        return Err(PlatformError::RemoteRejected {
            status: status.as_u16(),
            message: remote_message(&body),
        });
    }

    serde_json::from_str(&body).map_err(|e| PlatformError::RemoteRejected {
        status: status.as_u16(),
        message: format!("Unexpected response: {}", e),
    })
}
