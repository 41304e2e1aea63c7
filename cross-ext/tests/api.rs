//! Extension API exercised through the router with in-memory collaborators

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cross_ext::{create_router, AppState};
use libcrosspost::error::StoreError;
use libcrosspost::platforms::PublisherRegistry;
use libcrosspost::store::{Destination, MemoryStore, StoreConfig};
use libcrosspost::transport::memory::{MemoryTransport, TransportOp};
use libcrosspost::transport::DestinationId;
use libcrosspost::{CrosspostService, WorkflowSettings};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app(store: &MemoryStore, transport: &Arc<MemoryTransport>) -> Router {
    let service = CrosspostService::new(
        Arc::new(store.clone()),
        PublisherRegistry::new(),
        WorkflowSettings::default(),
    );
    create_router(AppState::new(service, transport.clone()), 1)
}

async fn call(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn png() -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(b"PNG"))
}

#[tokio::test]
async fn test_health() {
    let transport = Arc::new(MemoryTransport::new());
    let router = app(&MemoryStore::new(), &transport);
    let (status, body) = call(router, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok", "message": "Extension backend running" }));
}

#[tokio::test]
async fn test_save_inspiration_to_selected_channels() {
    let store = MemoryStore::new();
    let transport = Arc::new(MemoryTransport::new());
    let body = json!({
        "title": "Stripe",
        "description": "Payments",
        "url": "https://stripe.com",
        "screenshot": png(),
        "channels": [{ "id": "11", "name": "design" }, { "id": "12", "name": "web" }]
    });

    let router = app(&store, &transport);
    let (status, body) = call(router, "POST", "/api/save-inspiration", Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["message"], json!("Saved successfully!"));
    assert_eq!(transport.artifacts_in(&DestinationId::from("11")).len(), 1);
    assert_eq!(transport.artifacts_in(&DestinationId::from("12")).len(), 1);
    assert_eq!(store.inspirations()[0].title, "Stripe");
}

#[tokio::test]
async fn test_save_inspiration_without_any_channel_is_500() {
    let transport = Arc::new(MemoryTransport::new());
    let body = json!({ "title": "t", "url": "https://example.com", "screenshot": png() });

    let router = app(&MemoryStore::new(), &transport);
    let (status, body) = call(router, "POST", "/api/save-inspiration", Some(body)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].as_str().unwrap().starts_with("No channel ID configured"));
    assert!(transport.events().is_empty());
}

#[tokio::test]
async fn test_save_inspiration_falls_back_to_publish_channel() {
    let store = MemoryStore::new().with_config(StoreConfig {
        publish_channel: Some("300".into()),
        ..Default::default()
    });
    let transport = Arc::new(MemoryTransport::new());
    let body = json!({
        "title": "t",
        "url": "https://example.com",
        "screenshot": png(),
        "channels": []
    });

    let router = app(&store, &transport);
    let (status, _) = call(router, "POST", "/api/save-inspiration", Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(transport.artifacts_in(&DestinationId::from("300")).len(), 1);
}

#[tokio::test]
async fn test_save_image_reports_results() {
    let transport = Arc::new(MemoryTransport::new());
    let body = json!({
        "imageDataUrl": png(),
        "postUrl": "https://www.pinterest.com/pin/1",
        "pageTitle": "Pin",
        "isSocialMedia": true,
        "channels": [{ "id": "11" }, { "id": "12" }]
    });

    let router = app(&MemoryStore::new(), &transport);
    let (status, body) = call(router, "POST", "/api/save-image", Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["message"], json!("Saved to 2/2 channel(s)"));
    assert_eq!(body["results"][0], json!({ "channelId": "11", "success": true }));
    let sent = transport.artifacts_in(&DestinationId::from("12"));
    assert_eq!(sent[0].1.content.footer.as_deref(), Some("📌 Saved from Pinterest"));
}

#[tokio::test]
async fn test_save_image_all_channels_failing() {
    let transport = Arc::new(MemoryTransport::new());
    transport.fail(TransportOp::Send);
    let body = json!({
        "imageDataUrl": png(),
        "postUrl": "https://example.com",
        "pageTitle": "Image",
        "channels": [{ "id": "11" }]
    });

    let router = app(&MemoryStore::new(), &transport);
    let (status, body) = call(router, "POST", "/api/save-image", Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("Saved to 0/1 channel(s)"));
    assert_eq!(body["results"][0]["success"], json!(false));
    assert!(body["results"][0]["error"].is_string());
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let transport = Arc::new(MemoryTransport::new());
    let body = json!({ "title": "no url" });

    let router = app(&MemoryStore::new(), &transport);
    let (status, body) = call(router, "POST", "/api/save-inspiration", Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].as_str().unwrap().contains("url"));
}

#[tokio::test]
async fn test_channels_listed_from_store() {
    let store = MemoryStore::new().with_destinations(vec![
        Destination { id: "11".into(), name: "design".into() },
        Destination { id: "".into(), name: "broken".into() },
    ]);
    let transport = Arc::new(MemoryTransport::new());

    let router = app(&store, &transport);
    let (status, body) = call(router, "GET", "/api/channels", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "channels": [{ "id": "11", "name": "design" }] }));
}

#[tokio::test]
async fn test_channels_store_error_is_reported_not_raised() {
    let store = MemoryStore::new();
    store.fail_with(StoreError::NotConfigured("DB - Publish Channel IDs".into()));
    let transport = Arc::new(MemoryTransport::new());

    let router = app(&store, &transport);
    let (status, body) = call(router, "GET", "/api/channels", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["channels"], json!([]));
    assert!(body["error"].as_str().unwrap().contains("DB - Publish Channel IDs"));
}
