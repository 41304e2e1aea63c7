//! Publish and Delete actions on draft previews
//!
//! These run independently of the workflow that rendered the preview: all
//! they need is the preview artifact, whose fields hold the draft. The
//! account is re-read from the store on every publish since credentials may
//! have rotated since the draft was made.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{CrosspostError, TransportError};
use crate::platforms::PublisherRegistry;
use crate::service::collector::discard;
use crate::service::draft::DraftState;
use crate::service::render;
use crate::service::WorkflowSettings;
use crate::store::{Clock, CredentialStore};
use crate::transport::{
    ArtifactContent, ArtifactHandle, ArtifactId, DestinationId, PreviewAction, Responder, Transport,
};
use crate::types::{ImagePayload, PostContent};

pub const DEFAULT_CLAIM_CAPACITY: usize = 4096;

/// Preview ids that already had a Publish accepted
///
/// Check-and-insert is atomic, so of two concurrent clicks in this process
/// exactly one proceeds. The oldest ids are forgotten past `capacity`.
#[derive(Debug)]
pub struct ClaimSet {
    capacity: usize,
    inner: Mutex<Claims>,
}

#[derive(Debug, Default)]
struct Claims {
    ids: HashSet<ArtifactId>,
    order: VecDeque<ArtifactId>,
}

impl ClaimSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Claims::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Claims> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns false when the id was already claimed
    pub fn claim(&self, id: &ArtifactId) -> bool {
        let mut claims = self.lock();
        if !claims.ids.insert(id.clone()) {
            return false;
        }
        claims.order.push_back(id.clone());
        while claims.order.len() > self.capacity {
            if let Some(oldest) = claims.order.pop_front() {
                claims.ids.remove(&oldest);
            }
        }
        true
    }

    pub fn is_claimed(&self, id: &ArtifactId) -> bool {
        self.lock().ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.lock().ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ClaimSet {
    fn default() -> Self {
        Self::new(DEFAULT_CLAIM_CAPACITY)
    }
}

/// What a Publish or Delete action ended with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Published { url: String, warning: Option<String> },
    PublishFailed(String),
    /// A Publish for this preview was already accepted
    AlreadyClaimed,
    PreviewMissing,
    AccountMissing,
    DownloadFailed(String),
    Deleted,
    Error(String),
}

pub struct ConfirmationHandler<'a> {
    store: &'a dyn CredentialStore,
    publishers: &'a PublisherRegistry,
    transport: &'a dyn Transport,
    settings: &'a WorkflowSettings,
    claims: &'a ClaimSet,
    clock: Arc<dyn Clock>,
}

impl<'a> ConfirmationHandler<'a> {
    pub fn new(
        store: &'a dyn CredentialStore,
        publishers: &'a PublisherRegistry,
        transport: &'a dyn Transport,
        settings: &'a WorkflowSettings,
        claims: &'a ClaimSet,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            publishers,
            transport,
            settings,
            claims,
            clock,
        }
    }

    pub async fn handle(
        &self,
        action: PreviewAction,
        preview: &ArtifactHandle,
        responder: &dyn Responder,
        posted_by: Option<&str>,
    ) -> ConfirmOutcome {
        match action {
            PreviewAction::Publish => self.publish(preview, responder, posted_by).await,
            PreviewAction::Delete => self.delete(preview, responder).await,
        }
    }

    /// Best-effort delete that always reports success
    pub async fn delete(
        &self,
        preview: &ArtifactHandle,
        responder: &dyn Responder,
    ) -> ConfirmOutcome {
        discard(self.transport, preview, "preview").await;
        tracing::info!(preview = %preview.id, "Preview deleted");
        reply(responder, "✅ Preview deleted successfully.").await;
        ConfirmOutcome::Deleted
    }

    pub async fn publish(
        &self,
        preview: &ArtifactHandle,
        responder: &dyn Responder,
        posted_by: Option<&str>,
    ) -> ConfirmOutcome {
        if !self.claims.claim(&preview.id) {
            tracing::info!(preview = %preview.id, "Ignoring repeated publish");
            reply(responder, "⏳ This preview is already being published.").await;
            return ConfirmOutcome::AlreadyClaimed;
        }

        match self.try_publish(preview, responder, posted_by).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(preview = %preview.id, error = %e, "Publish failed unexpectedly");
                reply(responder, &format!("❌ An error occurred: {}", e)).await;
                ConfirmOutcome::Error(e.to_string())
            }
        }
    }

    async fn try_publish(
        &self,
        preview: &ArtifactHandle,
        responder: &dyn Responder,
        posted_by: Option<&str>,
    ) -> Result<ConfirmOutcome, CrosspostError> {
        if let Err(e) = self.transport.disable_actions(preview).await {
            if matches!(e, TransportError::NotFound(_)) {
                return Ok(self.preview_missing(responder).await);
            }
            tracing::warn!(preview = %preview.id, error = %e, "Failed to disable preview actions");
        }

        let fetched = match self.transport.fetch_artifact(preview).await {
            Ok(fetched) => fetched,
            Err(TransportError::NotFound(_)) => return Ok(self.preview_missing(responder).await),
            Err(e) => return Err(e.into()),
        };
        let draft = match DraftState::from_fields(&fetched.fields) {
            Ok(draft) => draft,
            Err(e) => {
                tracing::warn!(preview = %preview.id, error = %e, "Unreadable draft");
                return Ok(self.preview_missing(responder).await);
            }
        };

        let Some(account) = self.store.account(draft.platform, &draft.account_id).await? else {
            reply(responder, "❌ Account not found.").await;
            return Ok(ConfirmOutcome::AccountMissing);
        };

        let destination = self.publish_destination().await;
        let status = self
            .transport
            .send_artifact(&destination, &render::publishing(&draft, self.clock.now()), &[])
            .await?
            .handle;

        // Attachment URLs are signed and expire; the fetched preview carries a fresh one
        let image_url = fetched.image_url.clone().or_else(|| draft.image_ref.clone());
        let image = match image_url {
            None => None,
            Some(url) => match self.transport.download_attachment(&url).await {
                Ok(downloaded) => {
                    let mime = downloaded.mime_type.unwrap_or_else(|| "image/png".to_string());
                    Some(ImagePayload::new(downloaded.bytes, mime).with_source_url(url))
                }
                Err(e) => {
                    let message = match e {
                        TransportError::Download(message) => message,
                        other => other.to_string(),
                    };
                    self.update_status(&status, render::download_failed(&message, self.clock.now()))
                        .await;
                    reply(responder, &format!("❌ Failed to download image: {}", message)).await;
                    return Ok(ConfirmOutcome::DownloadFailed(message));
                }
            },
        };

        let content = PostContent::for_platform(draft.platform, &draft.text, image);
        match self.publishers.publish(draft.platform, &account, &content).await {
            Ok(published) => {
                let record = render::published(
                    &draft,
                    &published,
                    content.image.as_ref(),
                    posted_by,
                    self.clock.now(),
                );
                self.update_status(&status, record).await;
                discard(self.transport, preview, "published preview").await;

                let mut message = format!(
                    "✅ Successfully published to {}!\n🔗 {}",
                    draft.platform, published.url
                );
                if let Some(warning) = &published.warning {
                    message.push_str(&format!("\n⚠️ {}", warning));
                }
                reply(responder, &message).await;
                Ok(ConfirmOutcome::Published {
                    url: published.url,
                    warning: published.warning,
                })
            }
            Err(e) => {
                let error = e.to_string();
                let record = render::publish_failed(&draft, &error, self.clock.now());
                self.update_status(&status, record).await;
                reply(responder, &format!("❌ Failed to publish: {}", error)).await;
                Ok(ConfirmOutcome::PublishFailed(error))
            }
        }
    }

    async fn preview_missing(&self, responder: &dyn Responder) -> ConfirmOutcome {
        reply(responder, "❌ Preview data not found.").await;
        ConfirmOutcome::PreviewMissing
    }

    async fn publish_destination(&self) -> DestinationId {
        let configured = match self.store.config().await {
            Ok(config) => config.publish_channel,
            Err(e) => {
                tracing::warn!(error = %e, "Using fallback publish channel");
                None
            }
        };
        DestinationId(
            configured
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| self.settings.publish_fallback.clone()),
        )
    }

    async fn update_status(&self, status: &ArtifactHandle, content: ArtifactContent) {
        if let Err(e) = self.transport.edit_artifact(status, &content, &[]).await {
            tracing::warn!(status = %status.id, error = %e, "Failed to update publish status");
        }
    }
}

async fn reply(responder: &dyn Responder, text: &str) {
    if let Err(e) = responder.update(text).await {
        tracing::warn!(error = %e, "Failed to reply to interaction");
    }
}
