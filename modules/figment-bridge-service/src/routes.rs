//! Axum router and handlers for the figment bridge HTTP API.

use crate::error::ApiError;
use crate::health;
use crate::inspect;
use crate::resolver::{self, Resolution};
use crate::store::BridgeStore;
use crate::token;
use axum::Router;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use chrono::Utc;
use figment_bridge_types::*;
use serde_json::{Map, Value};
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

pub struct AppState {
    pub store: Arc<BridgeStore>,
    pub port: u16,
    pub start_time: Instant,
}

/// Routes and the methods each accepts, used for 404/405 bodies.
const ENDPOINTS: &[(&str, &[&str])] = &[
    ("/export", &["POST", "OPTIONS"]),
    ("/health", &["GET", "OPTIONS"]),
    ("/debug/{token}", &["GET", "OPTIONS"]),
];

pub fn router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    let routes = Router::new()
        .route(
            "/export",
            post(export).options(preflight).fallback(method_not_allowed),
        )
        .route(
            "/health",
            get(health_report).options(preflight).fallback(method_not_allowed),
        )
        .route(
            "/debug/:token",
            get(debug_token).options(preflight).fallback(method_not_allowed),
        )
        .fallback(not_found)
        .with_state(state);
    with_layers(routes, max_body_bytes)
}

/// Body limit, panic catcher and CORS, applied outermost in that order.
fn with_layers(routes: Router, max_body_bytes: usize) -> Router {
    routes
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive())
}

// =====================================================
// Export
// =====================================================

// POST /export
pub async fn export(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ExportResponse>, ApiError> {
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(format!("Export body too large: {}", rejection.body_text()))
        } else {
            ApiError::BadRequest(format!("Invalid export request: {}", rejection.body_text()))
        }
    })?;
    let request: ExportRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid export request: {}", e)))?;

    let response = match request {
        ExportRequest::Figment { figment } => export_figment(&state.store, figment).await?,
        ExportRequest::RealTime {
            figment,
            token,
            component_id,
        } => export_real_time(&state.store, figment, token.as_deref(), component_id).await?,
    };
    Ok(Json(response))
}

async fn export_figment(
    store: &BridgeStore,
    figment: Map<String, Value>,
) -> Result<ExportResponse, ApiError> {
    let path = store
        .latest
        .put(&LatestSnapshot {
            figment,
            exported_at: Utc::now(),
        })
        .await?;
    log::info!("[EXPORT] Latest snapshot written to {}", path.display());

    Ok(ExportResponse {
        success: true,
        token: None,
        message: "Figment exported".to_string(),
        file: path.display().to_string(),
    })
}

async fn export_real_time(
    store: &BridgeStore,
    figment: FigmentPayload,
    supplied_token: Option<&str>,
    component_id: Option<String>,
) -> Result<ExportResponse, ApiError> {
    let token = token::accept_or_issue(supplied_token).map_err(ApiError::BadRequest)?;
    let now = Utc::now();

    let (component, original_id) =
        inspect::stamp_component(inspect::primary_component(&figment), &token);
    let metadata = inspect::debug_metadata(&component, &figment, component_id.or(original_id));

    // Debug record goes first; it is the tier the resolver trusts most.
    let debug_path = store
        .debug
        .put(&DebugRecord {
            token: token.clone(),
            timestamp: now,
            component: component.clone(),
            figment: figment.clone(),
            metadata,
        })
        .await?;
    store
        .tokens
        .put(TokenRecord::new(token.clone(), component, now))
        .await?;
    store
        .real_time
        .put(&RealTimeSnapshot {
            figment,
            token: token.clone(),
            exported_at: now,
        })
        .await?;

    log::info!(
        "[EXPORT] Real-time export {} written to {}",
        token,
        debug_path.display()
    );

    Ok(ExportResponse {
        success: true,
        message: format!("Real-time export stored for token {}", token),
        token: Some(token),
        file: debug_path.display().to_string(),
    })
}

// =====================================================
// Lookup
// =====================================================

// GET /debug/:token
pub async fn debug_token(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Response {
    match resolver::resolve(&state.store, &token).await {
        Resolution::Hit(hit) => (StatusCode::OK, Json(hit)).into_response(),
        Resolution::Miss(miss) => (StatusCode::NOT_FOUND, Json(miss)).into_response(),
    }
}

// GET /health
pub async fn health_report(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(
        health::build_report(
            &state.store,
            state.port,
            state.start_time.elapsed().as_secs(),
        )
        .await,
    )
}

// =====================================================
// Preflight / fallbacks
// =====================================================

// OPTIONS *
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

pub async fn not_found(method: Method, uri: Uri) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    log::debug!("[HTTP] No route for {} {}", method, uri.path());
    (
        StatusCode::NOT_FOUND,
        Json(NotFoundResponse {
            success: false,
            error: format!("No endpoint at {}", uri.path()),
            path: uri.path().to_string(),
            available_endpoints: ENDPOINTS
                .iter()
                .map(|(path, methods)| format!("{} {}", methods[0], path))
                .collect(),
        }),
    )
        .into_response()
}

pub async fn method_not_allowed(method: Method, uri: Uri) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    let supported = supported_methods(uri.path());
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(MethodNotAllowedResponse {
            success: false,
            error: format!("Method {} not allowed on {}", method, uri.path()),
            method: method.to_string(),
            path: uri.path().to_string(),
            supported_methods: supported.iter().map(|m| m.to_string()).collect(),
        }),
    )
        .into_response()
}

fn supported_methods(path: &str) -> &'static [&'static str] {
    ENDPOINTS
        .iter()
        .find(|(pattern, _)| match pattern.strip_suffix("{token}") {
            Some(prefix) => path.starts_with(prefix),
            None => path == *pattern,
        })
        .map(|(_, methods)| *methods)
        .unwrap_or(&[])
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    log::error!("[HTTP] Handler panicked: {}", detail);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Internal server error")),
    )
        .into_response()
}
