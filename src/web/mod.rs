pub mod browse;
pub mod handlers;
pub mod media;
pub mod soap;
pub mod xml;

use axum::{
    routing::{any, get, post},
    Router,
};

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root_handler))
        .route("/description.xml", get(handlers::description_handler))
        .route("/cd_scpd.xml", get(handlers::content_directory_scpd))
        .route("/cm_scpd.xml", get(handlers::connection_manager_scpd))
        .route(
            "/control",
            post(soap::control).options(handlers::cors_preflight),
        )
        .route("/events", any(handlers::event_subscribe))
        .route(
            "/media/{*path}",
            get(media::serve_media)
                .head(media::serve_media)
                .options(handlers::cors_preflight),
        )
        .with_state(state)
}
