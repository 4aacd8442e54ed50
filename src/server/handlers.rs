//! API handlers.
//!
//! Thin adapters: parse the body, call the registry or delivery engine,
//! shape the response. No business rules live here.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::ApiError;
use super::AppState;
use crate::delivery::DeliveryReport;
use crate::notifications::push::{NotificationPayload, SubscribeRequest, SubscriptionRecord};

/// Body of `DELETE /api/v1/subs`.
///
/// `endpoint` addresses exactly one subscriber and wins when both are given;
/// `name` removes the earliest subscriber with that name.
#[derive(Debug, Default, Deserialize)]
pub struct UnsubscribeRequest {
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Push endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Body of `POST /api/v1/notifyone`.
#[derive(Debug, Default, Deserialize)]
pub struct NotifyOneRequest {
    /// Target subscriber name.
    #[serde(default)]
    pub name: Option<String>,
    /// Notification title.
    #[serde(default)]
    pub title: Option<String>,
    /// Notification body.
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of a successful `POST /api/v1/notify`: a message plus the report counters.
#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    /// Acknowledgement text.
    pub message: &'static str,
    /// Broadcast counters.
    #[serde(flatten)]
    pub report: DeliveryReport,
}

/// `GET /api/v1/subs`
pub async fn list_subscriptions(State(state): State<AppState>) -> Json<Vec<SubscriptionRecord>> {
    Json(state.registry.list().await)
}

/// `POST /api/v1/subs`
pub async fn add_subscription(
    State(state): State<AppState>,
    body: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(request) = body?;
    let (name, subscription) = request
        .into_parts()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    state.registry.register(&name, subscription).await?;
    Ok((StatusCode::CREATED, Json(json!({}))))
}

/// `DELETE /api/v1/subs`
pub async fn remove_subscription(
    State(state): State<AppState>,
    body: Result<Json<UnsubscribeRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body?;

    match (request.endpoint, request.name) {
        (Some(endpoint), _) => state.registry.unregister_by_endpoint(&endpoint).await?,
        (None, Some(name)) => state.registry.unregister_by_name(&name).await?,
        (None, None) => {
            return Err(ApiError::BadRequest(
                "Either name or endpoint is required".to_string(),
            ))
        }
    };

    Ok(Json(json!({})))
}

/// `DELETE /api/v1/clear-subs`
pub async fn clear_subscriptions(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.registry.clear().await?;
    Ok(Json(json!({})))
}

/// `POST /api/v1/notify`
pub async fn notify_all(
    State(state): State<AppState>,
    body: Result<Json<NotificationPayload>, JsonRejection>,
) -> Result<Json<NotifyResponse>, ApiError> {
    let Json(payload) = body?;
    let report = state.delivery.broadcast(&payload).await?;

    Ok(Json(NotifyResponse {
        message: "Notifications sent",
        report,
    }))
}

/// `POST /api/v1/notifyone`
pub async fn notify_one(
    State(state): State<AppState>,
    body: Result<Json<NotifyOneRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body?;
    let name = request
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("name is required".to_string()))?;

    let payload = NotificationPayload {
        title: request.title,
        message: request.message,
    };
    state.delivery.send_to_one(&name, &payload).await?;

    Ok(Json(json!({ "message": "Test notification sent" })))
}

/// `GET /api/v1/vapid-public-key`
pub async fn vapid_public_key(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "publicKey": &*state.vapid_public_key }))
}

/// Fallback for unknown API paths.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Not Found".to_string())
}
