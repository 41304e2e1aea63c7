//! Message/channel transport abstraction
//!
//! The workflow talks to users through *artifacts*: addressable messages that
//! carry embed-shaped content, an optional image and interactive actions. The
//! [`Transport`] trait is the Discord message API generalised to what the
//! workflow needs; [`Responder`] covers the private replies to whoever
//! triggered a command or button.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::TransportError;

#[cfg(feature = "discord")]
pub mod discord;
pub mod memory;

/// A channel or other place artifacts can be sent to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationId(pub String);

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DestinationId {
    fn from(s: &str) -> Self {
        DestinationId(s.to_string())
    }
}

/// Identifier of an artifact within its destination
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactId(pub String);

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArtifactId {
    fn from(s: &str) -> Self {
        ArtifactId(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactHandle {
    pub destination: DestinationId,
    pub id: ArtifactId,
}

impl ArtifactHandle {
    pub fn new(destination: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            destination: DestinationId(destination.into()),
            id: ArtifactId(id.into()),
        }
    }
}

/// Who may answer a collector, and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputScope {
    pub channel: DestinationId,
    pub user_id: String,
}

impl InputScope {
    pub fn new(channel: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            channel: DestinationId(channel.into()),
            user_id: user_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl EmbeddedField {
    pub fn new(name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactAuthor {
    pub name: String,
    pub url: Option<String>,
}

/// Image shown in an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactImage {
    /// Bytes uploaded together with the artifact
    Upload { filename: String, bytes: Vec<u8> },
    /// An image that already lives at a URL
    Url(String),
}

/// Most characters an embed may hold across its text parts
pub const EMBED_TOTAL_LIMIT: usize = 6000;
pub const EMBED_DESCRIPTION_LIMIT: usize = 4096;

/// Embed-shaped artifact content
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactContent {
    /// Plain message text outside the embed
    pub text: Option<String>,
    pub author: Option<ArtifactAuthor>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub color: Option<u32>,
    pub fields: Vec<EmbeddedField>,
    pub footer: Option<String>,
    pub image: Option<ArtifactImage>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl ArtifactContent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content with only plain text, used for prompts
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn author(mut self, name: impl Into<String>, url: Option<String>) -> Self {
        self.author = Some(ArtifactAuthor {
            name: name.into(),
            url,
        });
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn field(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        inline: bool,
    ) -> Self {
        self.fields.push(EmbeddedField::new(name, value, inline));
        self
    }

    pub fn fields(mut self, fields: Vec<EmbeddedField>) -> Self {
        self.fields = fields;
        self
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    pub fn image(mut self, image: ArtifactImage) -> Self {
        self.image = Some(image);
        self
    }

    pub fn timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at);
        self
    }

    /// Whether the content has anything beyond plain text
    pub fn has_embed(&self) -> bool {
        self.author.is_some()
            || self.title.is_some()
            || self.description.is_some()
            || !self.fields.is_empty()
            || self.footer.is_some()
            || self.image.is_some()
    }

    /// Characters counted against [`EMBED_TOTAL_LIMIT`]
    pub fn embed_len(&self) -> usize {
        let count = |s: &Option<String>| s.as_deref().map_or(0, |s| s.chars().count());
        self.author.as_ref().map_or(0, |a| a.name.chars().count())
            + count(&self.title)
            + count(&self.description)
            + count(&self.footer)
            + self
                .fields
                .iter()
                .map(|f| f.name.chars().count() + f.value.chars().count())
                .sum::<usize>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    Success,
    Danger,
}

/// An interactive action attached to an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionButton {
    pub custom_id: String,
    pub label: String,
    pub style: ButtonStyle,
    pub emoji: Option<char>,
    pub disabled: bool,
}

/// The two actions a draft preview carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewAction {
    Publish,
    Delete,
}

impl PreviewAction {
    fn prefix(&self) -> &'static str {
        match self {
            PreviewAction::Publish => "publish_preview_",
            PreviewAction::Delete => "delete_preview_",
        }
    }

    /// Action identifier bound to a preview artifact
    ///
    /// Only the artifact reference is encoded; the draft itself lives in the
    /// artifact's fields.
    pub fn custom_id(&self, artifact: &ArtifactId) -> String {
        format!("{}{}", self.prefix(), artifact)
    }

    /// Split an action identifier back into the action and artifact id
    pub fn parse(custom_id: &str) -> Option<(PreviewAction, ArtifactId)> {
        [PreviewAction::Publish, PreviewAction::Delete]
            .into_iter()
            .find_map(|action| {
                custom_id
                    .strip_prefix(action.prefix())
                    .filter(|id| !id.is_empty())
                    .map(|id| (action, ArtifactId(id.to_string())))
            })
    }

    pub fn button(&self, artifact: &ArtifactId, disabled: bool) -> ActionButton {
        let (label, style, emoji) = match self {
            PreviewAction::Publish => ("Publish", ButtonStyle::Success, '🚀'),
            PreviewAction::Delete => ("Delete", ButtonStyle::Danger, '🗑'),
        };
        ActionButton {
            custom_id: self.custom_id(artifact),
            label: label.to_string(),
            style,
            emoji: Some(emoji),
            disabled,
        }
    }

    /// Publish and Delete buttons for a preview artifact
    pub fn preview_buttons(artifact: &ArtifactId, disabled: bool) -> Vec<ActionButton> {
        vec![
            PreviewAction::Publish.button(artifact, disabled),
            PreviewAction::Delete.button(artifact, disabled),
        ]
    }
}

/// Result of sending an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentArtifact {
    pub handle: ArtifactHandle,
    /// Transport URL of an uploaded image, if one was attached
    pub image_url: Option<String>,
}

/// An artifact as read back from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArtifact {
    pub handle: ArtifactHandle,
    pub fields: Vec<EmbeddedField>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputAttachment {
    pub url: String,
    pub filename: String,
    pub content_type: Option<String>,
}

impl InputAttachment {
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|t| t.starts_with("image/"))
            .unwrap_or(false)
    }
}

/// One message a user sent while a collector was listening
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInput {
    pub handle: ArtifactHandle,
    pub author_id: String,
    pub content: String,
    pub attachments: Vec<InputAttachment>,
}

/// Outcome of waiting for input: either the input or an expired window
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collected<T> {
    Input(T),
    Timeout,
}

impl<T> Collected<T> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Collected::Timeout)
    }
}

/// Downloaded attachment bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedImage {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_artifact(
        &self,
        destination: &DestinationId,
        content: &ArtifactContent,
        actions: &[ActionButton],
    ) -> Result<SentArtifact, TransportError>;

    /// Replace an artifact's content and actions
    async fn edit_artifact(
        &self,
        handle: &ArtifactHandle,
        content: &ArtifactContent,
        actions: &[ActionButton],
    ) -> Result<(), TransportError>;

    /// Disable a preview artifact's actions without touching its content
    async fn disable_actions(&self, handle: &ArtifactHandle) -> Result<(), TransportError>;

    async fn delete_artifact(&self, handle: &ArtifactHandle) -> Result<(), TransportError>;

    async fn fetch_artifact(
        &self,
        handle: &ArtifactHandle,
    ) -> Result<FetchedArtifact, TransportError>;

    /// Wait for the next message from `scope.user_id` in `scope.channel`
    async fn await_user_input(
        &self,
        scope: &InputScope,
        timeout: Duration,
    ) -> Result<Collected<UserInput>, TransportError>;

    async fn download_attachment(&self, url: &str) -> Result<DownloadedImage, TransportError>;

    /// How to reference a destination inside message text
    fn mention(&self, destination: &DestinationId) -> String {
        format!("#{}", destination)
    }

    fn mention_user(&self, user_id: &str) -> String {
        format!("@{}", user_id)
    }
}

/// Private replies to the user who triggered an interaction
#[async_trait]
pub trait Responder: Send + Sync {
    /// Replace the initial reply
    async fn update(&self, text: &str) -> Result<(), TransportError>;

    /// Send an additional reply
    async fn follow_up(&self, text: &str) -> Result<(), TransportError>;
}

/// Fetch attachment bytes over HTTP
pub async fn download_over_http(
    client: &reqwest::Client,
    url: &str,
) -> Result<DownloadedImage, TransportError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| TransportError::Download(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Download(format!(
            "{}",
            status.canonical_reason().unwrap_or(status.as_str())
        )));
    }

    let mime_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response
        .bytes()
        .await
        .map_err(|e| TransportError::Download(e.to_string()))?;

    Ok(DownloadedImage {
        bytes: bytes.to_vec(),
        mime_type,
    })
}
