//! Capability document for automated clients
//!
//! Served without authentication so an agent can learn the API before it
//! holds a token. Describes routes, auth, entry fields and the status
//! vocabulary; contains no data from the store.

use axum::Json;
use devlog_common::db::{DocumentType, DEFAULT_LIMIT, MAX_LIMIT};
use devlog_common::status::{STATUS_ALIASES, STATUS_LABELS};
use serde_json::{json, Value};

/// The rundown document
pub fn rundown_document() -> Value {
    let document_types: Vec<&str> = DocumentType::ALL.iter().map(|t| t.as_str()).collect();
    let statuses: Vec<&str> = STATUS_LABELS.iter().map(|&(key, _)| key).collect();
    let aliases: serde_json::Map<String, Value> = STATUS_ALIASES
        .iter()
        .map(|&(alias, canonical)| (alias.to_string(), Value::from(canonical)))
        .collect();

    json!({
        "service": "devlog",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Dated, project-scoped journal entries (addenda and dev logs) numbered per project, document type and day.",
        "auth": {
            "header": "Authorization: Bearer <token>",
            "query": "token=<token>",
            "precedence": "header",
            "public": ["GET /rundown", "GET /health"]
        },
        "endpoints": [
            {
                "method": "GET",
                "path": "/entries",
                "query": ["project", "document_type", "status", "after", "before", "q", "limit", "offset", "page", "include_deleted"],
                "returns": "{entries, total, page, totalPages, limit}"
            },
            { "method": "GET", "path": "/entries/{id}", "returns": "Entry or 404" },
            {
                "method": "POST",
                "path": "/entries",
                "required": ["project", "document_type", "date", "title"],
                "optional": ["entry_type", "status", "summary", "details", "narrative_signal", "next_steps"],
                "returns": "201 with the created Entry"
            },
            { "method": "PUT", "path": "/entries/{id}", "body": "any subset of the POST fields", "returns": "Entry or 404" },
            { "method": "DELETE", "path": "/entries/{id}", "returns": "{success: true} or 404 (soft delete)" },
            { "method": "POST", "path": "/init", "returns": "{success: true}" },
            { "method": "GET", "path": "/statuses", "returns": "{statuses, aliases}" },
            { "method": "GET", "path": "/health", "returns": "{status, module, version}" }
        ],
        "document_types": document_types,
        "date_format": "YYYY-MM-DD",
        "search": "q is split on whitespace; every term must appear (case-insensitive) in title, summary, details or next_steps",
        "ordering": "entry_date desc, entry_number desc",
        "limits": { "default": DEFAULT_LIMIT, "max": MAX_LIMIT },
        "statuses": statuses,
        "status_aliases": aliases,
        "errors": "{error: string} on every 4xx/5xx"
    })
}

/// GET /rundown
pub async fn rundown() -> Json<Value> {
    Json(rundown_document())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rundown_lists_every_document_type() {
        let doc = rundown_document();
        assert_eq!(doc["document_types"], json!(["addendum", "dev_log"]));
    }

    #[test]
    fn test_rundown_carries_vocabulary() {
        let doc = rundown_document();
        assert_eq!(doc["statuses"].as_array().map(Vec::len), Some(STATUS_LABELS.len()));
        assert_eq!(doc["status_aliases"]["urgent"], "blocked");
        assert_eq!(doc["limits"]["max"], MAX_LIMIT);
    }
}
