//! cross-bot - draft, preview and publish social posts from Discord

mod commands;
mod handler;

use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use libcrosspost::config::secret_from_env;
use libcrosspost::logging::{LogFormat, LoggingConfig};
use libcrosspost::platforms::PublisherRegistry;
use libcrosspost::store::NotionStore;
use libcrosspost::{Config, CrosspostError, CrosspostService, WorkflowSettings};
use secrecy::ExposeSecret;
use serenity::all::{Client, GatewayIntents};

use crate::handler::Handler;

#[derive(Parser, Debug)]
#[command(name = "cross-bot")]
#[command(version, about = "Draft, preview and publish social posts from Discord")]
#[command(long_about = r#"Run the Discord bot behind the /post command.

/post asks for an account, the post text and an optional image, then renders
a preview with Publish and Delete buttons in the drafts channel. Publishing
posts to X, LinkedIn, Instagram or Dribbble with the credentials stored in
Notion and records the result in the publish channel.

ENVIRONMENT:
    DISCORD_BOT_TOKEN        Bot token (required)
    NOTION_API_KEY           Notion integration secret (required)
    NOTION_MAIN_DATABASE_ID  Main configuration database
    CROSSPOST_CONFIG         Path to config.toml

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
"#)]
struct Cli {
    /// Log output format: text, json or pretty
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env();
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    logging.verbose = cli.verbose;
    logging.init();

    if let Err(e) = run().await {
        tracing::error!(error = %format!("{:#}", e), "cross-bot stopped");
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<CrosspostError>()
            .map(CrosspostError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    let settings = WorkflowSettings::from_config(&config)?;
    let store = NotionStore::from_config(&config, secret_from_env("NOTION_API_KEY")?)?;
    let token = secret_from_env("DISCORD_BOT_TOKEN")?;

    let client = reqwest::Client::new();
    let service = CrosspostService::new(
        Arc::new(store),
        PublisherRegistry::with_defaults(client.clone()),
        settings,
    );

    let intents =
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;
    let mut discord = Client::builder(token.expose_secret(), intents)
        .event_handler(Handler::new(service, client))
        .await
        .context("Failed to create Discord client")?;

    let shards = discord.shard_manager.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutting down");
                shards.shutdown_all().await;
            }
            Err(e) => tracing::warn!(error = %e, "Could not listen for shutdown signal"),
        }
    });

    tracing::info!("Starting bot");
    discord.start().await.context("Discord client error")?;
    Ok(())
}
