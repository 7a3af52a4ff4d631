//! API Routes

use super::{
    auth::{auth_middleware, ApiAuth},
    handlers::*,
};
use crate::config::ApiConfig;
use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

/// HTTP API router
pub struct Api;

impl Api {
    /// Create the API router
    pub fn create_router(state: AppState, config: &ApiConfig, expose_metrics: bool) -> Router {
        let auth = Arc::new(ApiAuth::new(config.auth.clone()));

        // Public routes (no authentication required)
        let public_routes = Router::new().route("/health", get(health_check));

        let mut protected_routes = Router::new()
            // User directory
            .route("/users", get(list_users).post(create_user))
            .route(
                "/users/:id",
                get(get_user).put(update_user).delete(delete_user),
            )
            // Connection graph, caller from x-user-id
            .route("/connections/all", get(list_connections))
            .route("/connections/pending/received", get(list_pending_received))
            .route("/connections/pending/sent", get(list_pending_sent))
            .route("/connections/status/:other_id", get(pair_status))
            .route("/connections/request/:to_id", post(send_request))
            .route("/connections/accept/:from_id", post(accept_request))
            .route("/connections/reject/:from_id", post(reject_request))
            .route("/connections/remove/:target_id", post(remove_connection))
            .route("/connections/repair/:other_id", post(repair_pair));

        if expose_metrics {
            protected_routes = protected_routes.route("/metrics", get(export_metrics));
        }

        let protected_routes =
            protected_routes.layer(middleware::from_fn_with_state(auth, auth_middleware));

        Router::new()
            .nest("/api/v1", public_routes.merge(protected_routes))
            .layer(cors_layer(&config.cors_origins))
            .with_state(state)
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
