use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, http::Method, routing::get, Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod agents;
pub mod auth;
pub mod error;
pub mod events;
pub mod mailer;
pub mod middleware;
pub mod payments;
pub mod properties;
pub mod reservations;
pub mod response;
pub mod state;
pub mod uploads;
pub mod users;
pub mod worker;

pub use state::AppState;

use crate::middleware::auth::{
    admin_auth_middleware, agent_auth_middleware, guest_auth_middleware,
};
use crate::middleware::rate_limit::{rate_limit, RateLimiter};
use crate::response::{success, ApiResponse};

pub fn app(state: AppState, limiter: Arc<RateLimiter>) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let public = Router::new()
        .route("/health", get(health))
        .merge(auth::routes())
        .merge(events::routes())
        // Mixed public/agent access: these guard their write handlers with
        // the AgentAuth extractor instead of a router-wide layer.
        .merge(properties::routes())
        .merge(uploads::routes());

    let guest = Router::new()
        .merge(users::routes())
        .merge(reservations::routes())
        .merge(payments::routes())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            guest_auth_middleware,
        ));

    let agent = agents::routes().route_layer(axum::middleware::from_fn_with_state(
        state.clone(),
        agent_auth_middleware,
    ));

    let admin = admin::routes().route_layer(axum::middleware::from_fn_with_state(
        state.clone(),
        admin_auth_middleware,
    ));

    let uploads_dir = state.uploads.dir.clone();
    let max_upload_bytes = state.uploads.max_bytes;

    Router::new()
        .nest(
            "/v1",
            Router::new().merge(public).merge(guest).merge(agent).merge(admin),
        )
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(limiter, rate_limit))
        .with_state(state)
}

/// GET /v1/health
async fn health() -> Json<ApiResponse<serde_json::Value>> {
    success(serde_json::json!({
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
