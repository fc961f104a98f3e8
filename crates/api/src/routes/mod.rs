//! HTTP route handlers.

pub mod contact;
pub mod csrf;
pub mod health;
pub mod helpers;
pub mod metrics;

use axum::Router;
use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::form::OriginPolicy;
use crate::state::AppState;

/// Build the application router with all routes and layers.
pub fn app(state: AppState) -> Router {
    let cors = build_cors_layer(state.origins());

    Router::new()
        .merge(csrf::router())
        .merge(contact::router())
        .merge(health::router())
        .merge(metrics::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the allow-listed origins.
///
/// Handlers still check the origin themselves; this only lets browser
/// preflights through.
fn build_cors_layer(origins: &OriginPolicy) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .origins()
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}
