//! Handlers for the `/api` routes

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use libcrosspost::service::fanout::{ChannelResult, SaveImage, SaveInspiration};
use serde::Serialize;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<ChannelResult>,
}

#[derive(Debug, Serialize)]
pub struct ChannelEntry {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ChannelsResponse {
    pub channels: Vec<ChannelEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

/// `POST /api/save-inspiration`
///
/// Succeeds once the targets resolve, even when individual channels fail;
/// those failures are listed in `results`.
pub async fn save_inspiration(
    State(state): State<AppState>,
    payload: Result<Json<SaveInspiration>, JsonRejection>,
) -> Result<Json<SaveResponse>, ApiError> {
    let Json(request) = payload?;
    tracing::info!(
        title = %request.title,
        channels = request.channels.len(),
        "Save inspiration request"
    );

    let report = state
        .service
        .fanout(state.transport.as_ref())
        .save_inspiration(&request)
        .await?;

    Ok(Json(SaveResponse {
        success: true,
        message: "Saved successfully!".to_string(),
        results: report.results,
    }))
}

/// `POST /api/save-image`
pub async fn save_image(
    State(state): State<AppState>,
    payload: Result<Json<SaveImage>, JsonRejection>,
) -> Result<Json<SaveResponse>, ApiError> {
    let Json(request) = payload?;
    tracing::info!(
        title = %request.page_title,
        channels = request.channels.len().max(1),
        "Save image request"
    );

    let report = state
        .service
        .fanout(state.transport.as_ref())
        .save_image(&request)
        .await?;

    Ok(Json(SaveResponse {
        success: report.any_succeeded(),
        message: report.summary(),
        results: report.results,
    }))
}

/// `GET /api/channels`
///
/// A store failure still answers 200 with an empty list and the error text.
pub async fn channels(State(state): State<AppState>) -> Json<ChannelsResponse> {
    match state.service.fanout(state.transport.as_ref()).destinations().await {
        Ok(destinations) => {
            let channels: Vec<ChannelEntry> = destinations
                .into_iter()
                .filter(|d| !d.id.trim().is_empty())
                .map(|d| ChannelEntry { id: d.id, name: d.name })
                .collect();
            tracing::info!(count = channels.len(), "Listed publish channels");
            Json(ChannelsResponse {
                channels,
                error: None,
            })
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not list publish channels");
            Json(ChannelsResponse {
                channels: Vec::new(),
                error: Some(e.to_string()),
            })
        }
    }
}

/// `GET /api/health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "Extension backend running",
    })
}
