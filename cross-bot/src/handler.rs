//! Gateway event handling
//!
//! `/post` runs the posting workflow inside the event task; the workflow
//! waits on the gateway for the user's replies, so each transport is bound
//! to the shard the interaction arrived on. Preview buttons go to the
//! confirmation handler.

use libcrosspost::transport::discord::{DiscordTransport, InteractionResponder};
use libcrosspost::transport::{ArtifactHandle, InputScope, PreviewAction};
use libcrosspost::CrosspostService;
use serenity::all::{
    ActivityData, Command, CommandInteraction, ComponentInteraction, Context,
    CreateInteractionResponse, CreateInteractionResponseMessage, EventHandler, GuildId,
    Interaction, Ready,
};
use serenity::async_trait;

use crate::commands;

pub struct Handler {
    service: CrosspostService,
    client: reqwest::Client,
}

impl Handler {
    pub fn new(service: CrosspostService, client: reqwest::Client) -> Self {
        Self { service, client }
    }

    fn transport(&self, ctx: &Context) -> DiscordTransport {
        DiscordTransport::new(ctx.http.clone(), self.client.clone()).with_shard(ctx.shard.clone())
    }

    /// Register commands on the configured server, or globally without one
    async fn register_commands(&self, ctx: &Context) {
        let server = match self.service.store().config().await {
            Ok(config) => config.server_id,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read server id, registering globally");
                None
            }
        };
        let guild = server.and_then(|id| id.trim().parse::<u64>().ok()).filter(|id| *id != 0);

        let result = match guild {
            Some(id) => GuildId::new(id)
                .set_commands(&ctx.http, commands::all())
                .await
                .map(|c| c.len()),
            None => Command::set_global_commands(&ctx.http, commands::all())
                .await
                .map(|c| c.len()),
        };
        match result {
            Ok(count) => tracing::info!(count, guild = ?guild, "Registered slash commands"),
            Err(e) => tracing::error!(error = %e, "Failed to register slash commands"),
        }
    }

    async fn on_command(&self, ctx: Context, command: CommandInteraction) {
        if command.data.name != commands::POST {
            tracing::warn!(command = %command.data.name, "No handler for command");
            return;
        }

        let platform = match commands::platform_of(&command) {
            Ok(platform) => platform,
            Err(message) => {
                let reply = CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content(message)
                        .ephemeral(true),
                );
                if let Err(e) = command.create_response(&ctx.http, reply).await {
                    tracing::warn!(error = %e, "Failed to answer command");
                }
                return;
            }
        };

        if let Err(e) = defer_command(&ctx, &command).await {
            tracing::error!(error = %e, "Failed to defer /post, interaction likely expired");
            return;
        }

        let scope = InputScope::new(command.channel_id.to_string(), command.user.id.to_string());
        let transport = self.transport(&ctx);
        let responder = InteractionResponder::for_command(ctx.http.clone(), command);

        let outcome = self
            .service
            .start_post(&transport, &responder, platform, scope)
            .await;
        tracing::info!(%platform, awaiting = outcome.is_awaiting_confirmation(), "/post finished");
    }

    async fn on_component(&self, ctx: Context, component: ComponentInteraction) {
        let Some((action, artifact)) = PreviewAction::parse(&component.data.custom_id) else {
            tracing::debug!(custom_id = %component.data.custom_id, "Ignoring unknown component");
            return;
        };

        if let Err(e) = defer_component(&ctx, &component).await {
            tracing::error!(error = %e, "Failed to defer button press, interaction likely expired");
            return;
        }

        let preview = ArtifactHandle::new(component.channel_id.to_string(), artifact.0);
        let posted_by = component.user.name.clone();
        let transport = self.transport(&ctx);
        let responder = InteractionResponder::for_component(ctx.http.clone(), component);

        let outcome = self
            .service
            .confirm(&transport, &responder, action, &preview, Some(&posted_by))
            .await;
        tracing::info!(?action, ?outcome, "Preview action handled");
    }
}

fn ephemeral_defer() -> CreateInteractionResponse {
    CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new().ephemeral(true))
}

async fn defer_command(ctx: &Context, command: &CommandInteraction) -> serenity::Result<()> {
    command.create_response(&ctx.http, ephemeral_defer()).await
}

async fn defer_component(ctx: &Context, component: &ComponentInteraction) -> serenity::Result<()> {
    component.create_response(&ctx.http, ephemeral_defer()).await
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!(user = %ready.user.name, guilds = ready.guilds.len(), "Bot is ready");
        ctx.set_activity(Some(ActivityData::watching("drafts | /post")));
        self.register_commands(&ctx).await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => self.on_command(ctx, command).await,
            Interaction::Component(component) => self.on_component(ctx, component).await,
            _ => {}
        }
    }
}
