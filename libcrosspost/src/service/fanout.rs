//! Channel fan-out for the browser extension
//!
//! Saved pages and images go to every selected destination. Sends run
//! concurrently and each destination's result is reported on its own; one
//! failing channel does not fail the request.

use std::collections::HashSet;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::error::{FanoutError, StoreError};
use crate::service::render::truncate;
use crate::service::WorkflowSettings;
use crate::store::{Clock, CredentialStore, Destination, Inspiration};
use crate::transport::{ArtifactContent, ArtifactImage, DestinationId, Transport};

pub const FANOUT_COLOR: u32 = 0x5865F2;

/// A destination picked in the extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveInspiration {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub url: String,
    /// PNG data URL or bare base64
    #[serde(default)]
    pub screenshot: Option<String>,
    #[serde(default)]
    pub channels: Vec<ChannelRef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveImage {
    pub image_data_url: String,
    pub post_url: String,
    pub page_title: String,
    #[serde(default)]
    pub is_social_media: bool,
    #[serde(default)]
    pub channels: Vec<ChannelRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResult {
    pub channel_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FanoutReport {
    pub results: Vec<ChannelResult>,
}

impl FanoutReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn any_succeeded(&self) -> bool {
        self.succeeded() > 0
    }

    pub fn summary(&self) -> String {
        format!("Saved to {}/{} channel(s)", self.succeeded(), self.total())
    }
}

/// Explicit selection deduplicated in order, or the default when empty
pub fn resolve_targets(
    selection: &[ChannelRef],
    default: Option<&str>,
) -> Result<Vec<DestinationId>, FanoutError> {
    let mut seen = HashSet::new();
    let targets: Vec<DestinationId> = selection
        .iter()
        .map(|c| c.id.trim())
        .filter(|id| !id.is_empty() && seen.insert(id.to_string()))
        .map(DestinationId::from)
        .collect();
    if !targets.is_empty() {
        return Ok(targets);
    }

    default
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| vec![DestinationId::from(d)])
        .ok_or(FanoutError::NoChannelConfigured)
}

/// Bytes of a `data:image/...;base64,` URL or of bare base64
pub fn decode_data_url(data: &str) -> Result<Vec<u8>, FanoutError> {
    let payload = match data.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => data,
    };
    STANDARD
        .decode(payload.trim())
        .map_err(|e| FanoutError::InvalidImage(e.to_string()))
}

/// Whether `host` is `domain` or one of its subdomains
fn is_host(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|rest| rest.ends_with('.'))
}

fn source_footer(post_url: &str, is_social_media: bool) -> &'static str {
    if !is_social_media {
        return "📌 Saved Image";
    }
    let host = reqwest::Url::parse(post_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_default();
    if is_host(&host, "twitter.com") || is_host(&host, "x.com") {
        "📌 Saved from X/Twitter"
    } else if is_host(&host, "instagram.com") {
        "📌 Saved from Instagram"
    } else if is_host(&host, "pinterest.com") {
        "📌 Saved from Pinterest"
    } else {
        "📌 Saved Image"
    }
}

pub struct Fanout<'a> {
    store: &'a dyn CredentialStore,
    transport: &'a dyn Transport,
    settings: &'a WorkflowSettings,
    clock: Arc<dyn Clock>,
}

impl<'a> Fanout<'a> {
    pub fn new(
        store: &'a dyn CredentialStore,
        transport: &'a dyn Transport,
        settings: &'a WorkflowSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            transport,
            settings,
            clock,
        }
    }

    /// Configured default: the local setting, then the store's default
    /// destination, then its publish channel
    async fn default_destination(&self) -> Option<String> {
        if let Some(default) = self.settings.inspiration_default.clone() {
            return Some(default);
        }
        match self.store.config().await {
            Ok(config) => config.default_destination.or(config.publish_channel),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read default destination");
                None
            }
        }
    }

    async fn targets(&self, selection: &[ChannelRef]) -> Result<Vec<DestinationId>, FanoutError> {
        let default = if selection.iter().any(|c| !c.id.trim().is_empty()) {
            None
        } else {
            self.default_destination().await
        };
        resolve_targets(selection, default.as_deref())
    }

    async fn send_all(&self, targets: &[DestinationId], content: &ArtifactContent) -> FanoutReport {
        let sends = targets.iter().map(|target| async move {
            match self.transport.send_artifact(target, content, &[]).await {
                Ok(_) => {
                    tracing::info!(channel = %target, "Saved to channel");
                    ChannelResult {
                        channel_id: target.to_string(),
                        success: true,
                        error: None,
                    }
                }
                Err(e) => {
                    tracing::warn!(channel = %target, error = %e, "Failed to send to channel");
                    ChannelResult {
                        channel_id: target.to_string(),
                        success: false,
                        error: Some(e.to_string()),
                    }
                }
            }
        });
        let report = FanoutReport {
            results: join_all(sends).await,
        };
        tracing::info!("{}", report.summary());
        report
    }

    pub async fn destinations(&self) -> Result<Vec<Destination>, StoreError> {
        self.store.publish_destinations().await
    }

    pub async fn save_inspiration(
        &self,
        request: &SaveInspiration,
    ) -> Result<FanoutReport, FanoutError> {
        let targets = self.targets(&request.channels).await?;
        let screenshot = request
            .screenshot
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(decode_data_url)
            .transpose()?;

        let inspiration = Inspiration {
            url: request.url.clone(),
            title: request.title.clone(),
            description: request.description.clone().filter(|d| !d.trim().is_empty()),
        };
        if let Err(e) = self.store.save_inspiration(&inspiration).await {
            tracing::warn!(error = %e, "Saving inspiration to the store failed, continuing");
        }

        let description = inspiration
            .description
            .as_deref()
            .map(|d| truncate(d, 200))
            .unwrap_or_else(|| "No description available".to_string());
        let mut content = ArtifactContent::new()
            .title(&request.title)
            .url(&request.url)
            .description(description)
            .color(FANOUT_COLOR)
            .footer("Saved to Notion & Discord")
            .timestamp(self.clock.now());
        if let Some(bytes) = screenshot {
            content = content.image(ArtifactImage::Upload {
                filename: "screenshot.png".to_string(),
                bytes,
            });
        }

        Ok(self.send_all(&targets, &content).await)
    }

    pub async fn save_image(&self, request: &SaveImage) -> Result<FanoutReport, FanoutError> {
        let targets = self.targets(&request.channels).await?;
        let bytes = decode_data_url(&request.image_data_url)?;

        let content = ArtifactContent::new()
            .title(&request.page_title)
            .url(&request.post_url)
            .color(FANOUT_COLOR)
            .footer(source_footer(&request.post_url, request.is_social_media))
            .image(ArtifactImage::Upload {
                filename: "image.png".to_string(),
                bytes,
            })
            .timestamp(self.clock.now());

        Ok(self.send_all(&targets, &content).await)
    }
}
