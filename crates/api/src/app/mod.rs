//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: pipeline wiring (stores, queue, producer, worker pool)
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs and id parsing
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, post},
};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>) -> Router {
    // Protected routes: require the caller's identity.
    let protected =
        routes::router().layer(axum::middleware::from_fn(middleware::identity_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        // Called by the billing system, not by end users.
        .route("/billing/events", post(routes::billing::record_event))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
