//! ==============================================================================
//! server.rs - http surface of the registry
//! ==============================================================================
//!
//! purpose:
//!     thin axum handlers that decode requests, ask the clock for "now" and
//!     delegate to the registry. no device state lives here.
//!
//! routes:
//!     GET|POST /update        device position report
//!     POST     /              same, for clients that post to the root
//!     GET      /get_devices   snapshot of every device (polled by the viewer)
//!     GET      /devices/:id   one device
//!     POST     /rename_device admin: {device_id, new_name}
//!     POST     /delete_device admin: {device_id}
//!     GET      /health        liveness probe
//!
//! admin routes require the shared passcode in the `x-admin-passcode` header.
//!
//! ==============================================================================

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::domain::DeviceView;
use crate::error::RegistryError;
use crate::ingest::UpdatePayload;
use crate::registry::Registry;

pub const ADMIN_PASSCODE_HEADER: &str = "x-admin-passcode";

// ==============================================================================
// shared state
// ==============================================================================
// cloned into every handler. the registry and clock are handles, so clones
// share one device map and one time source.

#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub clock: Arc<dyn Clock>,
    admin_passcode: Arc<str>,
    log_updates: bool,
}

impl AppState {
    pub fn new(
        registry: Registry,
        clock: Arc<dyn Clock>,
        admin_passcode: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            registry,
            clock,
            admin_passcode: admin_passcode.into(),
            log_updates: true,
        }
    }

    /// log accepted positions at info (true) or debug (false)
    pub fn with_update_logging(mut self, enabled: bool) -> Self {
        self.log_updates = enabled;
        self
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let supplied = headers
            .get(ADMIN_PASSCODE_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim);

        // an empty configured passcode never matches, which disables admin routes
        match supplied {
            Some(code) if !self.admin_passcode.is_empty() && code == &*self.admin_passcode => {
                Ok(())
            }
            _ => Err(ApiError::Unauthorized),
        }
    }
}

// ==============================================================================
// errors
// ==============================================================================
// device-facing and admin-facing endpoints answer in different json shapes:
//   device: {"status": "error", "message": ...}
//   admin:  {"success": false, "message": ...}

#[derive(Debug)]
pub enum ApiError {
    Device(RegistryError),
    Admin(RegistryError),
    Unauthorized,
}

fn status_of(err: &RegistryError) -> StatusCode {
    match err {
        RegistryError::Validation(_) => StatusCode::BAD_REQUEST,
        RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Device(err) => (
                status_of(&err),
                Json(json!({"status": "error", "message": err.to_string()})),
            )
                .into_response(),
            ApiError::Admin(err) => (
                status_of(&err),
                Json(json!({"success": false, "message": err.to_string()})),
            )
                .into_response(),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({"success": false, "message": "invalid or missing admin passcode"})),
            )
                .into_response(),
        }
    }
}

// ==============================================================================
// router
// ==============================================================================

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(update_handler))
        .route("/update", get(update_handler).post(update_handler))
        .route("/get_devices", get(devices_handler))
        .route("/devices/:id", get(device_handler))
        .route("/rename_device", post(rename_handler))
        .route("/delete_device", post(delete_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// serve until the listener fails
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ==============================================================================
// handlers
// ==============================================================================

async fn update_handler(
    State(state): State<AppState>,
    payload: UpdatePayload,
) -> Result<Json<Value>, ApiError> {
    let update = payload.into_update().map_err(|e| {
        warn!(error = %e, "rejected position report");
        ApiError::Device(e)
    })?;

    let (id, lat, lon) = (update.id.clone(), update.latitude, update.longitude);
    state
        .registry
        .upsert(update, state.clock.now())
        .await
        .map_err(ApiError::Device)?;

    if state.log_updates {
        info!(device = %id, lat, lon, "position updated");
    } else {
        debug!(device = %id, lat, lon, "position updated");
    }
    Ok(Json(json!({"status": "success"})))
}

/// snapshot as {id: view}, the shape the viewer polls
async fn devices_handler(State(state): State<AppState>) -> Json<BTreeMap<String, DeviceView>> {
    let snapshot = state.registry.snapshot(state.clock.now()).await;
    Json(snapshot.devices)
}

async fn device_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeviceView>, ApiError> {
    state
        .registry
        .get(&id, state.clock.now())
        .await
        .map(Json)
        .ok_or(ApiError::Device(RegistryError::NotFound(id)))
}

#[derive(Deserialize)]
struct RenameRequest {
    device_id: Option<String>,
    new_name: Option<String>,
}

async fn rename_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<RenameRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    state.authorize(&headers)?;

    let Json(request) = body.map_err(admin_body_error)?;
    let (Some(device_id), Some(new_name)) =
        (non_empty(request.device_id), non_empty(request.new_name))
    else {
        return Err(ApiError::Admin(RegistryError::Validation(
            "device_id and new_name are required".into(),
        )));
    };

    state.registry.rename(&device_id, &new_name).await.map_err(|e| {
        warn!(device = %device_id, error = %e, "rename failed");
        ApiError::Admin(e)
    })?;

    info!(device = %device_id, new_name = %new_name, "device renamed");
    Ok(Json(json!({"success": true})))
}

#[derive(Deserialize)]
struct DeleteRequest {
    device_id: Option<String>,
}

async fn delete_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    state.authorize(&headers)?;

    let Json(request) = body.map_err(admin_body_error)?;
    let Some(device_id) = non_empty(request.device_id) else {
        return Err(ApiError::Admin(RegistryError::Validation(
            "device_id is required".into(),
        )));
    };

    state.registry.delete(&device_id).await.map_err(|e| {
        warn!(device = %device_id, error = %e, "delete failed");
        ApiError::Admin(e)
    })?;

    info!(device = %device_id, "device deleted");
    Ok(Json(json!({"success": true})))
}

async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let (devices, active) = state.registry.counts(state.clock.now()).await;
    Json(json!({
        "status": "ok",
        "devices": devices,
        "active": active,
    }))
}

fn admin_body_error(rejection: JsonRejection) -> ApiError {
    ApiError::Admin(RegistryError::Validation(rejection.body_text()))
}

/// trimmed value, or None when absent or blank
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
