use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{auth_middleware, AuthService};
use crate::config::CorsConfig;
use crate::storage::Storage;

use super::analytics::{export_analytics, get_analytics, track_event};
use super::handlers::{
    create_hub, delete_hub, get_hub, health_check, list_hubs, login, move_link, register,
    update_hub, AppState,
};
use super::public::public_hub;

pub fn create_api_router(
    storage: Arc<dyn Storage>,
    auth_service: Arc<AuthService>,
    cors: &CorsConfig,
) -> Router {
    let state = Arc::new(AppState { storage });

    let protected_routes = Router::new()
        .route("/hubs", get(list_hubs).post(create_hub))
        .route(
            "/hubs/{id}",
            get(get_hub).put(update_hub).delete(delete_hub),
        )
        .route("/hubs/{id}/links/{link_id}/move", post(move_link))
        .route("/analytics/{hub_id}", get(get_analytics))
        .route("/analytics/{hub_id}/export", get(export_analytics))
        .route_layer(middleware::from_fn_with_state(auth_service, auth_middleware));

    let public_routes = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/public/{slug}", get(public_hub))
        .route("/analytics/track", post(track_event));

    let api = Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .with_state(state);

    let router = Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http());

    if cors.allow_any_origin {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
