//! Error types for Crosspost

use std::time::Duration;

use thiserror::Error;

use crate::service::render::wait_time;
use crate::types::{CredentialField, PlatformKind};

pub type Result<T> = std::result::Result<T, CrosspostError>;

#[derive(Error, Debug)]
pub enum CrosspostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Draft error: {0}")]
    Draft(#[from] DraftDecodeError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Fan-out error: {0}")]
    Fanout(#[from] FanoutError),
}

impl CrosspostError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CrosspostError::Config(_) => 2,
            CrosspostError::Store(StoreError::NotConfigured(_)) => 2,
            _ => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Failures talking to the credential/configuration store
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Request failed: {0}")]
    Http(String),

    #[error("Store rejected request ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed store response: {0}")]
    Malformed(String),

    #[error("Store not configured: {0}")]
    NotConfigured(String),
}

/// Failures of the message/channel transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport request failed: {0}")]
    Request(String),

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Operation not supported by this transport: {0}")]
    Unsupported(String),

    #[error("Failed to download attachment: {0}")]
    Download(String),
}

/// Errors produced by publisher adapters
///
/// None of these are retried by the adapter layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Missing {platform} credentials: {}", join_fields(.fields))]
    MissingCredentials {
        platform: PlatformKind,
        fields: Vec<CredentialField>,
    },

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("{message}")]
    RemoteRejected { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unsupported platform: {0}")]
    Unsupported(String),
}

fn join_fields(fields: &[CredentialField]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors decoding a draft token from a preview artifact
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DraftDecodeError {
    #[error("Preview data not found")]
    Missing,

    #[error("Preview data is not valid base64: {0}")]
    Encoding(String),

    #[error("Preview data is malformed: {0}")]
    Malformed(String),

    #[error("Preview data has unsupported version {0}")]
    UnsupportedVersion(u32),
}

/// Terminal failures of one posting workflow instance
#[derive(Error, Debug, Clone)]
pub enum WorkflowError {
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("No {0} accounts found")]
    NoAccountsFound(PlatformKind),

    #[error("Timed out waiting for {0}")]
    UserTimeout(&'static str),

    #[error("Timed out waiting for an image after {0:?}")]
    ImageTimeout(Duration),

    #[error("Invalid input: {0}")]
    InvalidUserInput(String),

    #[error("{0} requires an image")]
    ImageRequired(PlatformKind),

    #[error("Failed to download image: {0}")]
    ImageDownload(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl WorkflowError {
    /// Text shown to the user who started the workflow
    pub fn user_message(&self) -> String {
        match self {
            WorkflowError::ConfigurationMissing(what) => {
                format!("❌ {} is not configured. Please fix the setup and try again.", what)
            }
            WorkflowError::NoAccountsFound(platform) => format!(
                "❌ No {} accounts found.\n\nAdd an account in Notion first.",
                platform
            ),
            WorkflowError::ImageTimeout(window) => format!(
                "❌ Timeout. Please try again and upload an image within {}.",
                wait_time(*window)
            ),
            WorkflowError::UserTimeout(_) => "❌ Timeout. Please try again.".to_string(),
            WorkflowError::InvalidUserInput(message) => format!("❌ {}", message),
            WorkflowError::ImageRequired(platform) => {
                format!("❌ {} requires an image. Please try again.", platform)
            }
            WorkflowError::ImageDownload(message) => {
                format!("❌ Failed to download image: {}", message)
            }
            WorkflowError::Store(_) | WorkflowError::Transport(_) => {
                "❌ An error occurred. Please try again later.".to_string()
            }
        }
    }
}

/// Errors resolving fan-out destinations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FanoutError {
    #[error("No channel ID configured! Select a channel or add a default")]
    NoChannelConfigured,

    #[error("Invalid image data: {0}")]
    InvalidImage(String),
}
