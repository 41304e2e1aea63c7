//! Service layer for Crosspost
//!
//! `CrosspostService` is the entry point both binaries use. It owns the
//! shared, long-lived pieces (credential store, publisher registry, settings,
//! the publish claim set) and hands out short-lived workers bound to a
//! transport:
//!
//! - [`workflow::PostingWorkflow`]: the interactive `/post` conversation
//! - [`confirm::ConfirmationHandler`]: Publish/Delete clicks on previews
//! - [`fanout::Fanout`]: the browser extension's save endpoints
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use libcrosspost::platforms::PublisherRegistry;
//! use libcrosspost::service::{CrosspostService, WorkflowSettings};
//! use libcrosspost::store::MemoryStore;
//! use libcrosspost::transport::memory::{MemoryTransport, RecordingResponder};
//! use libcrosspost::transport::InputScope;
//! use libcrosspost::PlatformKind;
//!
//! # async fn example() {
//! let service = CrosspostService::new(
//!     Arc::new(MemoryStore::new()),
//!     PublisherRegistry::with_defaults(reqwest::Client::new()),
//!     WorkflowSettings::default(),
//! );
//! let transport = MemoryTransport::new();
//! let responder = RecordingResponder::new();
//! let outcome = service
//!     .start_post(&transport, &responder, PlatformKind::X, InputScope::new("100", "42"))
//!     .await;
//! println!("{:?}", outcome);
//! # }
//! ```

pub mod collector;
pub mod confirm;
pub mod draft;
pub mod fanout;
pub mod render;
pub mod workflow;

pub use confirm::{ClaimSet, ConfirmOutcome, ConfirmationHandler};
pub use draft::DraftState;
pub use fanout::{Fanout, FanoutReport};
pub use workflow::{PostingWorkflow, WorkflowOutcome, WorkflowState};

use std::sync::Arc;

use crate::config::{Config, WorkflowTimeouts, DEFAULT_DRAFT_CHANNEL, DEFAULT_PUBLISH_CHANNEL};
use crate::platforms::PublisherRegistry;
use crate::store::{Clock, CredentialStore, SystemClock};
use crate::transport::{ArtifactHandle, InputScope, PreviewAction, Responder, Transport};
use crate::types::PlatformKind;
use crate::Result;

/// Settings the workflow workers read, resolved from [`Config`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSettings {
    pub timeouts: WorkflowTimeouts,
    /// Used when the store has no draft channel
    pub draft_fallback: String,
    /// Used when the store has no publish channel
    pub publish_fallback: String,
    pub inspiration_default: Option<String>,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            timeouts: WorkflowTimeouts::default(),
            draft_fallback: DEFAULT_DRAFT_CHANNEL.to_string(),
            publish_fallback: DEFAULT_PUBLISH_CHANNEL.to_string(),
            inspiration_default: None,
        }
    }
}

impl WorkflowSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            timeouts: config.timeouts()?,
            draft_fallback: config.channels.draft_fallback.clone(),
            publish_fallback: config.channels.publish_fallback.clone(),
            inspiration_default: config
                .channels
                .inspiration_default
                .clone()
                .filter(|c| !c.trim().is_empty()),
        })
    }
}

/// Shared entry point for the bot and the extension backend
#[derive(Clone)]
pub struct CrosspostService {
    store: Arc<dyn CredentialStore>,
    publishers: PublisherRegistry,
    settings: Arc<WorkflowSettings>,
    claims: Arc<ClaimSet>,
    clock: Arc<dyn Clock>,
}

impl CrosspostService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        publishers: PublisherRegistry,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            store,
            publishers,
            settings: Arc::new(settings),
            claims: Arc::new(ClaimSet::default()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    pub fn workflow<'a>(
        &'a self,
        transport: &'a dyn Transport,
        responder: &'a dyn Responder,
        platform: PlatformKind,
        scope: InputScope,
    ) -> PostingWorkflow<'a> {
        PostingWorkflow::new(
            self.store.as_ref(),
            transport,
            responder,
            &self.settings,
            Arc::clone(&self.clock),
            platform,
            scope,
        )
    }

    /// Run the `/post` conversation for one user in one channel
    pub async fn start_post(
        &self,
        transport: &dyn Transport,
        responder: &dyn Responder,
        platform: PlatformKind,
        scope: InputScope,
    ) -> WorkflowOutcome {
        self.workflow(transport, responder, platform, scope).run().await
    }

    pub fn confirmations<'a>(&'a self, transport: &'a dyn Transport) -> ConfirmationHandler<'a> {
        ConfirmationHandler::new(
            self.store.as_ref(),
            &self.publishers,
            transport,
            &self.settings,
            &self.claims,
            Arc::clone(&self.clock),
        )
    }

    /// Handle a Publish or Delete click on a preview
    pub async fn confirm(
        &self,
        transport: &dyn Transport,
        responder: &dyn Responder,
        action: PreviewAction,
        preview: &ArtifactHandle,
        posted_by: Option<&str>,
    ) -> ConfirmOutcome {
        self.confirmations(transport)
            .handle(action, preview, responder, posted_by)
            .await
    }

    pub fn fanout<'a>(&'a self, transport: &'a dyn Transport) -> Fanout<'a> {
        Fanout::new(
            self.store.as_ref(),
            transport,
            &self.settings,
            Arc::clone(&self.clock),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.workflow.text_timeout = "90s".into();
        config.channels.draft_fallback = "555".into();
        config.channels.inspiration_default = Some("  ".into());

        let settings = WorkflowSettings::from_config(&config).unwrap();
        assert_eq!(settings.timeouts.text, Duration::from_secs(90));
        assert_eq!(settings.timeouts.selection, Duration::from_secs(60));
        assert_eq!(settings.draft_fallback, "555");
        assert_eq!(settings.inspiration_default, None);
    }

    #[test]
    fn test_settings_reject_bad_duration() {
        let mut config = Config::default();
        config.workflow.image_timeout = "soon".into();
        assert!(WorkflowSettings::from_config(&config).is_err());
    }
}
