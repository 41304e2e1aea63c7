//! Discord transport built on serenity
//!
//! Artifacts are channel messages with one embed; uploads become message
//! attachments referenced from the embed as `attachment://<name>`. Waiting
//! for user input needs a gateway shard, so the bot builds a transport per
//! event with [`DiscordTransport::with_shard`]; the extension backend only
//! sends messages and uses the HTTP client alone.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serenity::all::{
    ButtonStyle as DiscordButtonStyle, ChannelId, CommandInteraction, ComponentInteraction,
    CreateActionRow, CreateAttachment, CreateButton, CreateEmbed, CreateEmbedAuthor,
    CreateEmbedFooter, CreateInteractionResponseFollowup, CreateMessage, EditInteractionResponse,
    EditMessage, Http, Message, MessageCollector, MessageId, ReactionType, ShardMessenger,
    Timestamp,
};
use serenity::http::HttpError;

use super::{
    download_over_http, ActionButton, ArtifactContent, ArtifactHandle, ArtifactImage, ButtonStyle,
    Collected, DestinationId, DownloadedImage, EmbeddedField, FetchedArtifact, InputAttachment,
    InputScope, PreviewAction, Responder, SentArtifact, Transport, UserInput,
};
use crate::error::TransportError;

fn map_err(error: serenity::Error) -> TransportError {
    if let serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) = &error {
        if response.status_code.as_u16() == 404 {
            return TransportError::NotFound(response.error.message.clone());
        }
    }
    TransportError::Request(error.to_string())
}

fn snowflake(value: &str, what: &str) -> Result<u64, TransportError> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| TransportError::Request(format!("Invalid {} id: {}", what, value)))
}

fn channel_id(destination: &DestinationId) -> Result<ChannelId, TransportError> {
    snowflake(&destination.0, "channel").map(ChannelId::new)
}

fn message_id(handle: &ArtifactHandle) -> Result<MessageId, TransportError> {
    snowflake(&handle.id.0, "message").map(MessageId::new)
}

fn build_embed(content: &ArtifactContent) -> CreateEmbed {
    let mut embed = CreateEmbed::new();
    if let Some(author) = &content.author {
        let mut built = CreateEmbedAuthor::new(&author.name);
        if let Some(url) = &author.url {
            built = built.url(url);
        }
        embed = embed.author(built);
    }
    if let Some(title) = &content.title {
        embed = embed.title(title);
    }
    if let Some(url) = &content.url {
        embed = embed.url(url);
    }
    if let Some(description) = &content.description {
        embed = embed.description(description);
    }
    if let Some(color) = content.color {
        embed = embed.color(color);
    }
    for field in &content.fields {
        embed = embed.field(&field.name, &field.value, field.inline);
    }
    if let Some(footer) = &content.footer {
        embed = embed.footer(CreateEmbedFooter::new(footer));
    }
    match &content.image {
        Some(ArtifactImage::Upload { filename, .. }) => {
            embed = embed.image(format!("attachment://{}", filename))
        }
        Some(ArtifactImage::Url(url)) => embed = embed.image(url),
        None => {}
    }
    if let Some(at) = content.timestamp {
        if let Ok(ts) = Timestamp::from_unix_timestamp(at.timestamp()) {
            embed = embed.timestamp(ts);
        }
    }
    embed
}

fn action_row(actions: &[ActionButton]) -> Vec<CreateActionRow> {
    if actions.is_empty() {
        return Vec::new();
    }
    let buttons = actions
        .iter()
        .map(|action| {
            let style = match action.style {
                ButtonStyle::Success => DiscordButtonStyle::Success,
                ButtonStyle::Danger => DiscordButtonStyle::Danger,
            };
            let mut button = CreateButton::new(&action.custom_id)
                .label(&action.label)
                .style(style)
                .disabled(action.disabled);
            if let Some(emoji) = action.emoji {
                button = button.emoji(ReactionType::Unicode(emoji.to_string()));
            }
            button
        })
        .collect();
    vec![CreateActionRow::Buttons(buttons)]
}

fn upload(content: &ArtifactContent) -> Option<CreateAttachment> {
    match &content.image {
        Some(ArtifactImage::Upload { filename, bytes }) => {
            Some(CreateAttachment::bytes(bytes.clone(), filename.clone()))
        }
        _ => None,
    }
}

fn image_url(message: &Message, content_image: Option<&ArtifactImage>) -> Option<String> {
    match content_image {
        Some(ArtifactImage::Url(url)) => Some(url.clone()),
        _ => message
            .attachments
            .first()
            .map(|a| a.url.clone())
            .or_else(|| {
                message
                    .embeds
                    .first()
                    .and_then(|e| e.image.as_ref())
                    .map(|i| i.url.clone())
            }),
    }
}

pub struct DiscordTransport {
    http: Arc<Http>,
    shard: Option<ShardMessenger>,
    client: reqwest::Client,
}

impl DiscordTransport {
    pub fn new(http: Arc<Http>, client: reqwest::Client) -> Self {
        Self {
            http,
            shard: None,
            client,
        }
    }

    /// Attach the gateway shard needed to collect user messages
    pub fn with_shard(mut self, shard: ShardMessenger) -> Self {
        self.shard = Some(shard);
        self
    }
}

#[async_trait]
impl Transport for DiscordTransport {
    async fn send_artifact(
        &self,
        destination: &DestinationId,
        content: &ArtifactContent,
        actions: &[ActionButton],
    ) -> Result<SentArtifact, TransportError> {
        let channel = channel_id(destination)?;

        let mut message = CreateMessage::new();
        if let Some(text) = &content.text {
            message = message.content(text);
        }
        if content.has_embed() {
            message = message.embed(build_embed(content));
        }
        if let Some(file) = upload(content) {
            message = message.add_file(file);
        }
        let rows = action_row(actions);
        if !rows.is_empty() {
            message = message.components(rows);
        }

        let sent = channel
            .send_message(&*self.http, message)
            .await
            .map_err(map_err)?;
        tracing::debug!(channel = %channel, message = %sent.id, "Sent artifact");

        Ok(SentArtifact {
            image_url: image_url(&sent, content.image.as_ref()),
            handle: ArtifactHandle::new(destination.0.clone(), sent.id.to_string()),
        })
    }

    async fn edit_artifact(
        &self,
        handle: &ArtifactHandle,
        content: &ArtifactContent,
        actions: &[ActionButton],
    ) -> Result<(), TransportError> {
        let channel = channel_id(&handle.destination)?;

        let mut edit = EditMessage::new().components(action_row(actions));
        if let Some(text) = &content.text {
            edit = edit.content(text);
        }
        if content.has_embed() {
            edit = edit.embed(build_embed(content));
        }
        if let Some(file) = upload(content) {
            edit = edit.new_attachment(file);
        }

        channel
            .edit_message(&*self.http, message_id(handle)?, edit)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn disable_actions(&self, handle: &ArtifactHandle) -> Result<(), TransportError> {
        let channel = channel_id(&handle.destination)?;
        let edit = EditMessage::new()
            .components(action_row(&PreviewAction::preview_buttons(&handle.id, true)));
        channel
            .edit_message(&*self.http, message_id(handle)?, edit)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn delete_artifact(&self, handle: &ArtifactHandle) -> Result<(), TransportError> {
        channel_id(&handle.destination)?
            .delete_message(&*self.http, message_id(handle)?)
            .await
            .map_err(map_err)
    }

    async fn fetch_artifact(
        &self,
        handle: &ArtifactHandle,
    ) -> Result<FetchedArtifact, TransportError> {
        let message = channel_id(&handle.destination)?
            .message(&*self.http, message_id(handle)?)
            .await
            .map_err(map_err)?;

        let fields = message
            .embeds
            .first()
            .map(|embed| {
                embed
                    .fields
                    .iter()
                    .map(|f| EmbeddedField::new(&f.name, &f.value, f.inline))
                    .collect()
            })
            .unwrap_or_default();

        Ok(FetchedArtifact {
            handle: handle.clone(),
            fields,
            image_url: image_url(&message, None),
        })
    }

    async fn await_user_input(
        &self,
        scope: &InputScope,
        timeout: Duration,
    ) -> Result<Collected<UserInput>, TransportError> {
        let shard = self.shard.as_ref().ok_or_else(|| {
            TransportError::Unsupported("collecting input needs a gateway connection".to_string())
        })?;
        let channel = channel_id(&scope.channel)?;
        let user = snowflake(&scope.user_id, "user")?;

        let message = MessageCollector::new(shard)
            .channel_id(channel)
            .author_id(user.into())
            .timeout(timeout)
            .next()
            .await;

        Ok(match message {
            Some(message) => Collected::Input(UserInput {
                handle: ArtifactHandle::new(scope.channel.0.clone(), message.id.to_string()),
                author_id: message.author.id.to_string(),
                content: message.content.clone(),
                attachments: message
                    .attachments
                    .iter()
                    .map(|a| InputAttachment {
                        url: a.url.clone(),
                        filename: a.filename.clone(),
                        content_type: a.content_type.clone(),
                    })
                    .collect(),
            }),
            None => Collected::Timeout,
        })
    }

    async fn download_attachment(&self, url: &str) -> Result<DownloadedImage, TransportError> {
        download_over_http(&self.client, url).await
    }

    fn mention(&self, destination: &DestinationId) -> String {
        format!("<#{}>", destination)
    }

    fn mention_user(&self, user_id: &str) -> String {
        format!("<@{}>", user_id)
    }
}

enum Source {
    Command(CommandInteraction),
    Component(ComponentInteraction),
}

/// Ephemeral replies to a slash command or button press
///
/// The interaction must already have been acknowledged (deferred or answered).
pub struct InteractionResponder {
    http: Arc<Http>,
    source: Source,
}

impl InteractionResponder {
    pub fn for_command(http: Arc<Http>, interaction: CommandInteraction) -> Self {
        Self {
            http,
            source: Source::Command(interaction),
        }
    }

    pub fn for_component(http: Arc<Http>, interaction: ComponentInteraction) -> Self {
        Self {
            http,
            source: Source::Component(interaction),
        }
    }
}

#[async_trait]
impl Responder for InteractionResponder {
    async fn update(&self, text: &str) -> Result<(), TransportError> {
        let edit = EditInteractionResponse::new().content(text);
        match &self.source {
            Source::Command(i) => i.edit_response(&*self.http, edit).await,
            Source::Component(i) => i.edit_response(&*self.http, edit).await,
        }
        .map(|_| ())
        .map_err(map_err)
    }

    async fn follow_up(&self, text: &str) -> Result<(), TransportError> {
        let followup = CreateInteractionResponseFollowup::new()
            .content(text)
            .ephemeral(true);
        match &self.source {
            Source::Command(i) => i.create_followup(&*self.http, followup).await,
            Source::Component(i) => i.create_followup(&*self.http, followup).await,
        }
        .map(|_| ())
        .map_err(map_err)
    }
}
