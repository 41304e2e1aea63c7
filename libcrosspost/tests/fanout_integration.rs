//! Extension saves fanned out over the in-memory transport

mod common;

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::*;
use libcrosspost::error::{FanoutError, StoreError};
use libcrosspost::platforms::PublisherRegistry;
use libcrosspost::service::fanout::{ChannelRef, SaveImage, SaveInspiration};
use libcrosspost::service::{CrosspostService, WorkflowSettings};
use libcrosspost::store::{MemoryStore, StoreConfig};
use libcrosspost::transport::memory::{MemoryTransport, TransportOp};
use libcrosspost::transport::{ArtifactImage, DestinationId};

fn channels(ids: &[&str]) -> Vec<ChannelRef> {
    ids.iter()
        .map(|id| ChannelRef {
            id: id.to_string(),
            name: Some(format!("channel-{}", id)),
        })
        .collect()
}

fn inspiration(channels: Vec<ChannelRef>) -> SaveInspiration {
    SaveInspiration {
        title: "Linear".into(),
        description: Some("d".repeat(250)),
        url: "https://linear.app".into(),
        screenshot: Some(format!("data:image/png;base64,{}", STANDARD.encode(b"SHOT"))),
        channels,
    }
}

#[tokio::test]
async fn test_inspiration_to_each_selected_channel() {
    let store = store();
    let service = service(&store, PublisherRegistry::new());
    let transport = MemoryTransport::new();

    let report = service
        .fanout(&transport)
        .save_inspiration(&inspiration(channels(&["11", "12", "11"])))
        .await
        .unwrap();

    assert_eq!(report.summary(), "Saved to 2/2 channel(s)");
    for id in ["11", "12"] {
        let sent = transport.artifacts_in(&DestinationId::from(id));
        assert_eq!(sent.len(), 1);
        let content = &sent[0].1.content;
        assert_eq!(content.title.as_deref(), Some("Linear"));
        assert_eq!(content.footer.as_deref(), Some("Saved to Notion & Discord"));
        let expected = format!("{}...", "d".repeat(200));
        assert_eq!(content.description.as_deref(), Some(expected.as_str()));
        assert!(matches!(
            &content.image,
            Some(ArtifactImage::Upload { filename, bytes })
                if filename == "screenshot.png" && bytes == b"SHOT"
        ));
    }

    let saved = store.inspirations();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].url, "https://linear.app");
}

#[tokio::test]
async fn test_default_destination_when_nothing_selected() {
    let store = MemoryStore::new().with_config(StoreConfig {
        default_destination: Some("77".into()),
        publish_channel: Some(PUBLISHED.into()),
        ..Default::default()
    });
    let service = service(&store, PublisherRegistry::new());
    let transport = MemoryTransport::new();

    let report = service
        .fanout(&transport)
        .save_inspiration(&inspiration(Vec::new()))
        .await
        .unwrap();

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].channel_id, "77");
    assert!(transport.artifacts_in(&DestinationId::from(PUBLISHED)).is_empty());
}

#[tokio::test]
async fn test_local_default_wins_over_store() {
    let store = MemoryStore::new().with_config(StoreConfig {
        default_destination: Some("77".into()),
        ..Default::default()
    });
    let settings = WorkflowSettings {
        inspiration_default: Some("88".into()),
        ..settings()
    };
    let service = CrosspostService::new(Arc::new(store), PublisherRegistry::new(), settings);
    let transport = MemoryTransport::new();

    let report = service
        .fanout(&transport)
        .save_inspiration(&inspiration(Vec::new()))
        .await
        .unwrap();
    assert_eq!(report.results[0].channel_id, "88");
}

#[tokio::test]
async fn test_no_channel_configured_sends_nothing() {
    let store = MemoryStore::new();
    let service = service(&store, PublisherRegistry::new());
    let transport = MemoryTransport::new();

    let err = service
        .fanout(&transport)
        .save_inspiration(&inspiration(Vec::new()))
        .await
        .unwrap_err();

    assert_eq!(err, FanoutError::NoChannelConfigured);
    assert!(transport.events().is_empty());
    assert!(store.inspirations().is_empty());
}

#[tokio::test]
async fn test_store_failure_does_not_block_sends() {
    let store = MemoryStore::new();
    store.fail_with(StoreError::Http("connection reset".into()));
    let service = service(&store, PublisherRegistry::new());
    let transport = MemoryTransport::new();

    let report = service
        .fanout(&transport)
        .save_inspiration(&inspiration(channels(&["11"])))
        .await
        .unwrap();
    assert_eq!(report.succeeded(), 1);
}

#[tokio::test]
async fn test_image_save_reports_per_channel_failures() {
    let store = store();
    let service = service(&store, PublisherRegistry::new());
    let transport = MemoryTransport::new();
    transport.fail(TransportOp::Send);

    let request = SaveImage {
        image_data_url: format!("data:image/jpeg;base64,{}", STANDARD.encode(b"IMG")),
        post_url: "https://x.com/someone/status/1".into(),
        page_title: "A post".into(),
        is_social_media: true,
        channels: channels(&["11", "12"]),
    };
    let report = service.fanout(&transport).save_image(&request).await.unwrap();

    assert!(!report.any_succeeded());
    assert_eq!(report.summary(), "Saved to 0/2 channel(s)");
    assert!(report.results.iter().all(|r| r.error.is_some()));

    transport.recover(TransportOp::Send);
    let report = service.fanout(&transport).save_image(&request).await.unwrap();
    assert_eq!(report.succeeded(), 2);
    let sent = transport.artifacts_in(&DestinationId::from("11"));
    assert_eq!(sent[0].1.content.footer.as_deref(), Some("📌 Saved from X/Twitter"));
}

#[tokio::test]
async fn test_invalid_image_data_rejected() {
    let store = store();
    let service = service(&store, PublisherRegistry::new());
    let transport = MemoryTransport::new();

    let request = SaveImage {
        image_data_url: "data:image/png;base64,***".into(),
        post_url: "https://example.com".into(),
        page_title: "t".into(),
        is_social_media: false,
        channels: channels(&["11"]),
    };
    let err = service.fanout(&transport).save_image(&request).await.unwrap_err();
    assert!(matches!(err, FanoutError::InvalidImage(_)));
    assert!(transport.events().is_empty());
}
