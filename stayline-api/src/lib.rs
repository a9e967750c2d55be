use axum::{http::Method, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod bookings;
pub mod error;
pub mod owner;
pub mod state;
pub mod workers;

pub use state::AppState;

fn base_layers(router: Router<AppState>, state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Router for the traveler-facing service.
pub fn traveler_app(state: AppState) -> Router {
    base_layers(bookings::routes(), state)
}

/// Router for the owner-facing service.
pub fn owner_app(state: AppState) -> Router {
    base_layers(owner::routes(), state)
}
