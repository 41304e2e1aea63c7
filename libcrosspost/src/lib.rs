//! Crosspost - draft in Discord, preview, publish to social platforms
//!
//! This library holds everything the bot and the browser-extension backend
//! share: the credential store client, the platform publishers, the message
//! transport abstraction and the posting workflow built on top of them.

pub mod config;
pub mod error;
pub mod logging;
pub mod platforms;
pub mod service;
pub mod store;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{CrosspostError, Result};
pub use service::{CrosspostService, WorkflowSettings};
pub use types::{Account, AccountId, ImagePayload, PlatformKind, PostContent, Published};
