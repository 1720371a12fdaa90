//! API router — mounts all engine endpoints under /api/v1.

use axum::middleware;
use axum::routing::{get, patch, post};
use axum::Router;

use crate::auth;
use crate::handlers::{self, ApiState};

/// Build the router with all endpoints and the auth layer.
pub fn api_router(state: ApiState) -> Router {
    Router::new()
        // Campaigns
        .route(
            "/api/v1/campaigns",
            get(handlers::list_campaigns).post(handlers::create_campaign),
        )
        .route(
            "/api/v1/campaigns/:id",
            get(handlers::get_campaign).put(handlers::update_campaign),
        )
        .route(
            "/api/v1/campaigns/:id/toggle",
            patch(handlers::toggle_campaign),
        )
        .route("/api/v1/campaigns/:id/logs", get(handlers::campaign_logs))
        // Extension bridge
        .route(
            "/api/v1/campaigns/:id/pending-sends",
            get(handlers::pending_sends),
        )
        .route(
            "/api/v1/campaigns/:id/delivery-outcome",
            post(handlers::report_outcome),
        )
        .route(
            "/api/v1/extension/heartbeat",
            post(handlers::extension_heartbeat),
        )
        .route("/api/v1/extension/status", get(handlers::extension_status))
        // Operational
        .route("/health", get(handlers::health_check))
        .layer(middleware::from_fn(auth::auth_middleware))
        .with_state(state)
}
