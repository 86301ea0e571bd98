use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use shared::telemetry;

use crate::error::ServiceError;
use crate::meetings::{ListMeetingsQuery, MeetingService, ScheduleMeetingRequest};
use crate::webhook::WebhookProcessor;

#[derive(Clone)]
pub struct ApiState {
    pub meetings: Arc<MeetingService>,
    pub webhooks: Arc<WebhookProcessor>,
}

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/meetings", post(schedule_meeting).get(list_meetings))
        .route("/meetings/:id", get(get_meeting).delete(delete_meeting))
        .route("/meetings/:id/transcript", get(get_transcript))
        .route("/meetings/:id/finalize", post(finalize_meeting))
        .route("/webhooks/recall", post(recall_webhook))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(telemetry::middleware::trace_layer))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "notetaker"
    }))
}

/// Auth lives upstream; the gateway injects the caller's identity.
fn require_owner(headers: &HeaderMap) -> Result<String, ServiceError> {
    headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(ServiceError::Unauthorized)
}

async fn schedule_meeting(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<ScheduleMeetingRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let owner = require_owner(&headers)?;
    let meeting = state.meetings.schedule(&owner, request).await?;
    Ok((StatusCode::CREATED, Json(meeting)))
}

async fn list_meetings(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<ListMeetingsQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let owner = require_owner(&headers)?;
    let page = state.meetings.list(&owner, query).await?;
    Ok(Json(page))
}

async fn get_meeting(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let owner = require_owner(&headers)?;
    let detail = state.meetings.get(&owner, &id).await?;
    Ok(Json(detail))
}

async fn delete_meeting(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let owner = require_owner(&headers)?;
    state.meetings.delete(&owner, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
struct TranscriptQuery {
    after_seq: Option<i64>,
}

async fn get_transcript(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<TranscriptQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let owner = require_owner(&headers)?;
    let chunks = state
        .meetings
        .transcript(&owner, &id, query.after_seq)
        .await?;
    Ok(Json(chunks))
}

async fn finalize_meeting(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let owner = require_owner(&headers)?;
    state.meetings.finalize(&owner, &id).await?;
    Ok(Json(json!({ "finalized": true })))
}

/// Provider callback. Always acknowledges success: the provider retries on
/// anything else, which would only multiply duplicate deliveries. The body
/// is read raw so that even unparseable payloads get their ack.
async fn recall_webhook(State(state): State<ApiState>, body: Bytes) -> impl IntoResponse {
    state.webhooks.process(&body).await;
    Json(json!({ "received": true }))
}
