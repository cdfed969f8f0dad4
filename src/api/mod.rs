// HTTP surface: session resolution layered in front of a minimal router

use axum::{
    Extension, Router,
    http::StatusCode,
    middleware,
    response::Json,
    routing::get,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{ResolvedIdentity, SessionResolver, access_log, session_middleware};

pub type AppState = Arc<SessionResolver>;

/// Build the router with session resolution and access logging applied.
///
/// Layers run top to bottom: tracing, CORS, session resolution, then the
/// access log, which can therefore see the resolved department.
pub fn create_router(resolver: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/whoami", get(whoami))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn_with_state(resolver, session_middleware))
                .layer(middleware::from_fn(access_log)),
        )
}

async fn health_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Echo the identity resolved for this request.
async fn whoami(Extension(identity): Extension<ResolvedIdentity>) -> Json<ResolvedIdentity> {
    Json(identity)
}
