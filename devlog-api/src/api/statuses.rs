//! Status catalogue endpoint

use axum::Json;
use devlog_common::status::{STATUS_ALIASES, STATUS_LABELS};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct StatusOption {
    pub key: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatusAlias {
    pub alias: &'static str,
    pub canonical: &'static str,
}

/// Response for GET /statuses
#[derive(Debug, Serialize)]
pub struct StatusCatalogue {
    pub statuses: Vec<StatusOption>,
    pub aliases: Vec<StatusAlias>,
}

/// GET /statuses
pub async fn list_statuses() -> Json<StatusCatalogue> {
    Json(StatusCatalogue {
        statuses: STATUS_LABELS
            .iter()
            .map(|&(key, label)| StatusOption { key, label })
            .collect(),
        aliases: STATUS_ALIASES
            .iter()
            .map(|&(alias, canonical)| StatusAlias { alias, canonical })
            .collect(),
    })
}
