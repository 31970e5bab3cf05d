//! HTTP API handlers

pub mod auth;
pub mod entries;
pub mod health;
pub mod init;
pub mod rundown;
pub mod statuses;

pub use auth::auth_middleware;
pub use entries::{create_entry, delete_entry, get_entry, list_entries, update_entry};
pub use health::health_routes;
pub use init::init_schema;
pub use rundown::rundown;
pub use statuses::list_statuses;

use crate::ApiError;

/// Fallback for unmatched paths
pub async fn route_not_found(uri: axum::http::Uri) -> ApiError {
    ApiError::NotFound(format!("no route for {}", uri.path()))
}

/// Fallback for a known path reached with an unsupported method
pub async fn method_not_allowed(method: axum::http::Method, uri: axum::http::Uri) -> ApiError {
    ApiError::MethodNotAllowed(format!("method {} not allowed on {}", method, uri.path()))
}
