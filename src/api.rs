//! REST endpoints for the package tracker.
//!
//! Every failure path returns a structured `{"error": ...}` body; raw
//! internal errors never leak. Batch endpoints favor partial success —
//! a failing sibling write is logged, not propagated.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::carrier::CarrierClient;
use crate::error::{CarrierError, DatabaseError};
use crate::model::{Package, PackageStatus};
use crate::pipeline::Pipeline;
use crate::store::PackageStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PackageStore>,
    pub pipeline: Arc<Pipeline>,
    pub carrier: Arc<dyn CarrierClient>,
}

/// Build the Axum router with all package routes.
pub fn package_routes(
    store: Arc<dyn PackageStore>,
    pipeline: Arc<Pipeline>,
    carrier: Arc<dyn CarrierClient>,
) -> Router {
    let state = AppState {
        store,
        pipeline,
        carrier,
    };

    Router::new()
        .route("/health", get(health))
        .route("/api/new-package", post(new_package))
        .route("/api/get-packages", post(get_packages))
        .route("/api/send-messages", post(send_messages))
        .route("/api/archive-package", post(archive_package))
        .route("/api/package-status", get(package_status))
        .route("/api/count-msgs", post(count_msgs))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Errors ──────────────────────────────────────────────────────────────

/// Handler-facing error: a status code and a safe message.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({"error": self.message})),
        )
            .into_response()
    }
}

// Malformed bodies are a caller mistake, not a protocol violation:
// flatten axum's default 422/415 rejections into the 400 contract.
impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::bad_request(format!("Invalid request body: {}", e.body_text()))
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound { entity, id } => {
                Self::not_found(format!("{entity} {id} not found"))
            }
            other => {
                error!(error = %other, "Database failure");
                Self::internal("cannot fetch DB for packages")
            }
        }
    }
}

impl From<CarrierError> for ApiError {
    fn from(e: CarrierError) -> Self {
        match e {
            CarrierError::NotFound { .. } => Self::not_found("Package not found"),
            other => {
                error!(error = %other, "Carrier failure");
                Self::internal(format!("Failed to fetch package delivery status: {other}"))
            }
        }
    }
}

impl From<crate::error::Error> for ApiError {
    fn from(e: crate::error::Error) -> Self {
        match e {
            crate::error::Error::Database(db) => db.into(),
            crate::error::Error::Carrier(c) => c.into(),
            other => {
                error!(error = %other, "Request failed");
                Self::internal("Internal Server Error")
            }
        }
    }
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "parcel-track"
    }))
}

// ── Handlers ────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct NewPackageRequest {
    package_id: String,
    description: String,
    uid: String,
    address: String,
    post_office_code: String,
    pickup_point_name: String,
    status: Option<i64>,
    coordinates: Vec<f64>,
}

async fn new_package(
    State(state): State<AppState>,
    body: Result<Json<NewPackageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    if body.package_id.is_empty() {
        return Err(ApiError::bad_request("Missing or invalid required fields"));
    }
    if !body.coordinates.is_empty() && body.coordinates.len() != 2 {
        return Err(ApiError::bad_request(
            "coordinates must be empty or a [lat, lng] pair",
        ));
    }

    let mut package = Package::new(body.package_id, body.uid);
    package.description = body.description;
    package.address = body.address;
    package.post_office_code = body.post_office_code;
    package.pickup_point_name = body.pickup_point_name;
    package.coordinates = body.coordinates;
    if let Some(code) = body.status {
        package.status = PackageStatus::try_from(code)
            .map_err(|_| ApiError::bad_request("Missing or invalid required fields"))?;
    }

    state.store.insert(&package).await?;
    info!(package_id = %package.package_id, id = %package.id, "Package created");

    // First-pass enrichment: no messages yet, just a carrier refresh.
    // The record is already saved; a failing upstream must not fail intake.
    if let Err(e) = state.pipeline.run_first_pass(&package).await {
        error!(package_id = %package.package_id, error = %e, "First-pass processing failed");
    }

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Package added successfully!",
            "firebaseId": package.id,
        })),
    ))
}

async fn get_packages(
    State(state): State<AppState>,
    uid: Result<Json<String>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(uid) = uid?;
    let packages = state.store.list_by_uid(&uid).await?;

    Ok(Json(serde_json::json!({
        "message": "success",
        "data-size": packages.len(),
        "data": packages,
    })))
}

#[derive(Deserialize)]
struct SendMessagesRequest {
    uid: String,
    messages: Vec<String>,
}

async fn send_messages(
    State(state): State<AppState>,
    body: Result<Json<SendMessagesRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    if body.uid.is_empty() {
        return Err(ApiError::bad_request("Invalid input. Expected a user id."));
    }

    let outcome = state.pipeline.run_for_user(&body.uid, &body.messages).await?;

    Ok(Json(serde_json::json!({
        "res": format!(
            "packages updated successfully with {} packages",
            outcome.updated
        ),
        "trackingNumberChanges": outcome.changes,
    })))
}

#[derive(Deserialize)]
struct ArchivePackageRequest {
    id: String,
    /// When set, the record is removed instead of soft-archived.
    #[serde(default)]
    hard: bool,
}

async fn archive_package(
    State(state): State<AppState>,
    body: Result<Json<ArchivePackageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    if body.id.is_empty() {
        return Err(ApiError::bad_request("Invalid input."));
    }

    if body.hard {
        state.store.delete(&body.id).await?;
        info!(id = %body.id, "Package deleted");
        return Ok(Json(serde_json::json!({
            "message": format!("Document {} deleted successfully", body.id),
        })));
    }

    state
        .store
        .set_status(&body.id, PackageStatus::Archived)
        .await?;

    info!(id = %body.id, "Package archived");
    Ok(Json(serde_json::json!({
        "message": format!("Document {} status updated successfully", body.id),
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageStatusQuery {
    package_id: Option<String>,
}

async fn package_status(
    State(state): State<AppState>,
    Query(query): Query<PackageStatusQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(package_id) = query.package_id.filter(|id| !id.is_empty()) else {
        return Err(ApiError::bad_request("Package ID is required"));
    };

    let mut changes = Vec::new();
    let status = state
        .carrier
        .fetch_status(&package_id, 0, &mut changes)
        .await?;

    Ok(Json(status))
}

#[derive(Deserialize)]
struct CountMsgsRequest {
    messages: Vec<String>,
}

async fn count_msgs(
    body: Result<Json<CountMsgsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    Ok(Json(serde_json::json!({"count": body.messages.len()})))
}
