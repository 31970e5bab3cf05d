//! devlog-api library: REST surface over the entry store

use axum::Router;
use devlog_common::EntryStore;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod pagination;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Process-wide entry store
    pub store: Arc<dyn EntryStore>,
    /// Shared API token; `None` rejects every protected request
    pub api_token: Option<Arc<str>>,
    /// Projects accepted on write (empty: any)
    pub allowed_projects: Arc<[String]>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn EntryStore>,
        api_token: Option<String>,
        allowed_projects: Vec<String>,
    ) -> Self {
        Self {
            store,
            api_token: api_token.map(Arc::from),
            allowed_projects: allowed_projects.into(),
        }
    }

    /// Whether writes may target `project`
    pub fn project_allowed(&self, project: &str) -> bool {
        self.allowed_projects.is_empty() || self.allowed_projects.iter().any(|p| p == project)
    }
}

/// Build application router
///
/// `/rundown` and `/health` are public; everything else passes through
/// [`api::auth_middleware`]. Unknown paths and unsupported methods both
/// answer with the JSON error envelope.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let protected = Router::new()
        .route(
            "/entries",
            get(api::list_entries)
                .post(api::create_entry)
                .fallback(api::method_not_allowed),
        )
        .route(
            "/entries/:id",
            get(api::get_entry)
                .put(api::update_entry)
                .delete(api::delete_entry)
                .fallback(api::method_not_allowed),
        )
        .route("/init", post(api::init_schema).fallback(api::method_not_allowed))
        .route("/statuses", get(api::list_statuses).fallback(api::method_not_allowed))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    let public = Router::new()
        .route("/rundown", get(api::rundown).fallback(api::method_not_allowed))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .fallback(api::route_not_found)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
