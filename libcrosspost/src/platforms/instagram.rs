//! Instagram publisher (Graph API, business accounts)
//!
//! Instagram fetches the image itself, so the content must carry a publicly
//! reachable image URL. Publishing is a media container create followed by a
//! container publish; both must succeed.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::PlatformError;
use crate::platforms::{network_error, read_json, Publisher};
use crate::types::{Account, CredentialField, PlatformKind, PostContent, PublishResult, Published};

const GRAPH_BASE: &str = "https://graph.facebook.com/v18.0";
const POST_URL: &str = "https://www.instagram.com/p";

#[derive(Debug, Deserialize)]
struct GraphId {
    id: String,
}

pub struct InstagramPublisher {
    client: reqwest::Client,
    graph_base: String,
}

impl InstagramPublisher {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, GRAPH_BASE)
    }

    pub fn with_base_url(client: reqwest::Client, graph_base: impl Into<String>) -> Self {
        Self {
            client,
            graph_base: graph_base.into(),
        }
    }
}

/// Caption with the tags appended as hashtags
fn caption(content: &PostContent) -> String {
    let tags = content.tag_list();
    if tags.is_empty() {
        return content.text.clone();
    }
    let hashtags = tags
        .iter()
        .map(|t| format!("#{}", t.trim_start_matches('#')))
        .collect::<Vec<_>>()
        .join(" ");
    format!("{}\n\n{}", content.text, hashtags)
}

#[async_trait]
impl Publisher for InstagramPublisher {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Instagram
    }

    async fn publish(&self, account: &Account, content: &PostContent) -> PublishResult {
        let platform = PlatformKind::Instagram;
        let credentials = &account.credentials;
        credentials.require(platform, platform.required_credentials())?;

        let image = content
            .image
            .as_ref()
            .ok_or_else(|| {
                PlatformError::Validation("Instagram posts require an image".to_string())
            })?;
        let image_url = image.source_url.as_deref().ok_or_else(|| {
            PlatformError::Validation(
                "Instagram requires a publicly reachable image URL".to_string(),
            )
        })?;

        let token = credentials.field(platform, CredentialField::AccessToken)?;
        let user_id = credentials.field(platform, CredentialField::PlatformUserId)?;
        let caption = caption(content);

        let response = self
            .client
            .post(format!("{}/{}/media", self.graph_base, user_id))
            .form(&[
                ("image_url", image_url),
                ("caption", caption.as_str()),
                ("access_token", token),
            ])
            .send()
            .await
            .map_err(network_error)?;
        let container: GraphId = read_json(response).await?;
        tracing::debug!(container = %container.id, "Created Instagram media container");

        let response = self
            .client
            .post(format!("{}/{}/media_publish", self.graph_base, user_id))
            .form(&[("creation_id", container.id.as_str()), ("access_token", token)])
            .send()
            .await
            .map_err(network_error)?;
        let media: GraphId = read_json(response).await?;

        Ok(Published {
            url: format!("{}/{}", POST_URL, media.id),
            post_id: media.id,
            warning: None,
        })
    }
}
