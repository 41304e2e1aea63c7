//! cross-ext - HTTP backend for the Crosspost browser extension

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cross_ext::{create_router, AppState};
use libcrosspost::config::secret_from_env;
use libcrosspost::logging::{LogFormat, LoggingConfig};
use libcrosspost::platforms::PublisherRegistry;
use libcrosspost::store::NotionStore;
use libcrosspost::transport::discord::DiscordTransport;
use libcrosspost::{Config, CrosspostError, CrosspostService, WorkflowSettings};
use secrecy::ExposeSecret;
use serenity::http::Http;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "cross-ext")]
#[command(version, about = "Backend for the Crosspost browser extension")]
#[command(long_about = r#"Serve the endpoints the browser extension calls to save pages and images
to Discord channels.

ENVIRONMENT:
    NOTION_API_KEY               Notion integration secret (required)
    NOTION_MAIN_DATABASE_ID      Main configuration database
    DISCORD_BOT_TOKEN            Bot token used to post messages (required)
    SITE_INSPIRATION_CHANNEL_ID  Default channel when none is selected

ENDPOINTS:
    POST /api/save-inspiration
    POST /api/save-image
    GET  /api/channels
    GET  /api/health
"#)]
struct Cli {
    /// Address to listen on (overrides [extension].bind)
    #[arg(short, long, env = "CROSSPOST_EXT_BIND")]
    bind: Option<String>,

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

    if let Err(e) = run(cli).await {
        tracing::error!(error = %format!("{:#}", e), "cross-ext stopped");
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<CrosspostError>()
            .map(CrosspostError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    let settings = WorkflowSettings::from_config(&config)?;
    let store = NotionStore::from_config(&config, secret_from_env("NOTION_API_KEY")?)?;

    let token = secret_from_env("DISCORD_BOT_TOKEN")?;
    let http = Arc::new(Http::new(token.expose_secret()));
    let transport = DiscordTransport::new(http, reqwest::Client::new());

    let service = CrosspostService::new(Arc::new(store), PublisherRegistry::new(), settings);
    let app = create_router(
        AppState::new(service, Arc::new(transport)),
        config.extension.body_limit_mb,
    );

    let bind = cli.bind.unwrap_or_else(|| config.extension.bind.clone());
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    tracing::info!(address = %bind, "Extension backend running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Extension backend stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
