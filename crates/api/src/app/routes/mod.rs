use axum::Router;

pub mod billing;
pub mod documents;
pub mod imports;
pub mod notifications;
pub mod system;

/// Router for all endpoints acting on behalf of an identified user.
pub fn router() -> Router {
    Router::new()
        .nest("/documents", documents::router())
        .nest("/imports", imports::router())
        .nest("/notifications", notifications::router())
}
