//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use libcrosspost::config::WorkflowTimeouts;
use libcrosspost::platforms::PublisherRegistry;
use libcrosspost::service::{CrosspostService, DraftState, WorkflowSettings};
use libcrosspost::store::{MemoryStore, StoreConfig};
use libcrosspost::transport::memory::MemoryTransport;
use libcrosspost::transport::{
    ArtifactContent, ArtifactHandle, DestinationId, InputScope, PreviewAction, Transport,
};
use libcrosspost::types::{Account, Credentials, PlatformKind};
use secrecy::SecretString;

pub const CONVERSATION: &str = "100";
pub const DRAFTS: &str = "200";
pub const PUBLISHED: &str = "300";
pub const USER: &str = "42";

pub fn scope() -> InputScope {
    InputScope::new(CONVERSATION, USER)
}

fn secret(value: &str) -> Option<SecretString> {
    Some(SecretString::from(value.to_string()))
}

pub fn x_account() -> Account {
    Account {
        id: "acc-x".into(),
        platform: PlatformKind::X,
        display_name: "Personal".into(),
        username: Some("me".into()),
        credentials: Credentials {
            api_key: secret("key"),
            api_secret: secret("secret"),
            access_token: secret("token"),
            access_token_secret: secret("token-secret"),
            ..Default::default()
        },
    }
}

pub fn instagram_account() -> Account {
    Account {
        id: "acc-ig".into(),
        platform: PlatformKind::Instagram,
        display_name: "Studio".into(),
        username: Some("studio".into()),
        credentials: Credentials {
            access_token: secret("ig-token"),
            platform_user_id: Some("1784".into()),
            ..Default::default()
        },
    }
}

pub fn dribbble_account() -> Account {
    Account {
        id: "acc-dr".into(),
        platform: PlatformKind::Dribbble,
        display_name: "Studio".into(),
        username: None,
        credentials: Credentials {
            access_token: secret("dr-token"),
            ..Default::default()
        },
    }
}

pub fn store() -> MemoryStore {
    MemoryStore::new()
        .with_account(x_account())
        .with_account(instagram_account())
        .with_account(dribbble_account())
        .with_config(StoreConfig {
            draft_channel: Some(DRAFTS.into()),
            publish_channel: Some(PUBLISHED.into()),
            ..Default::default()
        })
}

pub fn settings() -> WorkflowSettings {
    WorkflowSettings {
        timeouts: WorkflowTimeouts {
            selection: Duration::from_millis(300),
            text: Duration::from_millis(300),
            image: Duration::from_millis(150),
        },
        ..Default::default()
    }
}

pub fn service(store: &MemoryStore, publishers: PublisherRegistry) -> CrosspostService {
    CrosspostService::new(Arc::new(store.clone()), publishers, settings())
}

/// Render a preview the way the workflow does, without the conversation
pub async fn seed_preview(transport: &MemoryTransport, draft: &DraftState) -> ArtifactHandle {
    let destination = DestinationId::from(DRAFTS);
    let sent = transport
        .send_artifact(&destination, &ArtifactContent::new().description(&draft.text), &[])
        .await
        .unwrap();
    let content = ArtifactContent::new()
        .description(&draft.text)
        .fields(draft.to_fields());
    transport
        .edit_artifact(
            &sent.handle,
            &content,
            &PreviewAction::preview_buttons(&sent.handle.id, false),
        )
        .await
        .unwrap();
    sent.handle
}

pub fn x_draft(text: &str) -> DraftState {
    DraftState {
        platform: PlatformKind::X,
        account_id: "acc-x".into(),
        account_name: "Personal".into(),
        text: text.into(),
        image_ref: None,
    }
}
