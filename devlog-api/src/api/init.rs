//! Schema initialization endpoint

use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::info;

use crate::{ApiResult, AppState};

/// POST /init
///
/// Idempotent: creates the entries table and indexes when missing.
pub async fn init_schema(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.store.init_schema().await?;
    info!("Schema initialized on request ({})", state.store.backend());
    Ok(Json(json!({ "success": true })))
}
