//! Entry CRUD endpoints
//!
//! Request shapes are validated here, field by field, before anything
//! reaches the store. The store applies its own normalization on top.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use devlog_common::db::{DocumentType, Entry, EntryFilter, EntryPatch, NewEntry};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::pagination::{calculate_pagination, resolve_window};
use crate::{ApiError, ApiResult, AppState};

static DATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern compiles"));

/// Query parameters for GET /entries
#[derive(Debug, Default, Deserialize)]
pub struct ListEntriesParams {
    pub project: Option<String>,
    pub document_type: Option<String>,
    pub status: Option<String>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub page: Option<i64>,
    #[serde(default)]
    pub include_deleted: bool,
}

/// Response for GET /entries
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryListResponse {
    pub entries: Vec<Entry>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
    pub limit: i64,
}

/// Body for POST /entries
#[derive(Debug, Default, Deserialize)]
pub struct CreateEntryRequest {
    pub project: Option<String>,
    pub document_type: Option<String>,
    pub date: Option<String>,
    pub title: Option<String>,
    pub entry_type: Option<String>,
    pub status: Option<String>,
    pub summary: Option<String>,
    pub details: Option<String>,
    pub narrative_signal: Option<String>,
    pub next_steps: Option<String>,
}

/// Body for PUT /entries/{id}; absent fields are left untouched
#[derive(Debug, Default, Deserialize)]
pub struct UpdateEntryRequest {
    pub project: Option<String>,
    pub document_type: Option<String>,
    pub date: Option<String>,
    pub title: Option<String>,
    pub entry_type: Option<String>,
    pub status: Option<String>,
    pub summary: Option<String>,
    pub details: Option<String>,
    pub narrative_signal: Option<String>,
    pub next_steps: Option<String>,
}

/// Parse a `YYYY-MM-DD` value named `field`
pub fn parse_date(field: &str, value: &str) -> ApiResult<NaiveDate> {
    if !DATE_PATTERN.is_match(value) {
        return Err(ApiError::BadRequest(format!(
            "{} must match YYYY-MM-DD (got '{}')",
            field, value
        )));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        ApiError::BadRequest(format!("{} is not a valid calendar date (got '{}')", field, value))
    })
}

fn parse_document_type(value: &str) -> ApiResult<DocumentType> {
    value.parse::<DocumentType>().map_err(ApiError::from)
}

fn required(field: &str, value: Option<String>) -> ApiResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{} is required", field)))
}

fn check_project(state: &AppState, project: &str) -> ApiResult<()> {
    if state.project_allowed(project) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("project '{}' is not allowed", project)))
    }
}

fn entry_not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("entry {} not found", id))
}

fn entry_id(path: Result<Path<i64>, PathRejection>) -> ApiResult<i64> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::BadRequest("id must be an integer".to_string()))
}

impl ListEntriesParams {
    /// Validate and convert into a store filter
    pub fn into_filter(self) -> ApiResult<EntryFilter> {
        let window = resolve_window(self.limit, self.offset, self.page);

        Ok(EntryFilter {
            project: self.project.filter(|p| !p.trim().is_empty()),
            document_type: self
                .document_type
                .filter(|t| !t.is_empty())
                .map(|t| parse_document_type(&t))
                .transpose()?,
            status: self.status,
            after: self
                .after
                .filter(|d| !d.is_empty())
                .map(|d| parse_date("after", &d))
                .transpose()?,
            before: self
                .before
                .filter(|d| !d.is_empty())
                .map(|d| parse_date("before", &d))
                .transpose()?,
            q: self.q,
            limit: Some(window.limit),
            offset: Some(window.offset),
            include_deleted: self.include_deleted,
        })
    }
}

impl CreateEntryRequest {
    pub fn into_new_entry(self) -> ApiResult<NewEntry> {
        let project = required("project", self.project)?.trim().to_string();
        let document_type = parse_document_type(&required("document_type", self.document_type)?)?;
        let entry_date = parse_date("date", &required("date", self.date)?)?;
        let title = required("title", self.title)?;

        Ok(NewEntry {
            project,
            document_type,
            entry_date,
            title,
            entry_type: self.entry_type,
            status: self.status,
            summary: self.summary,
            details: self.details,
            narrative_signal: self.narrative_signal,
            next_steps: self.next_steps,
        })
    }
}

impl UpdateEntryRequest {
    pub fn into_patch(self) -> ApiResult<EntryPatch> {
        let project = match self.project {
            Some(project) => Some(required("project", Some(project))?.trim().to_string()),
            None => None,
        };
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(ApiError::BadRequest("title must not be empty".to_string()));
            }
        }

        Ok(EntryPatch {
            project,
            document_type: self
                .document_type
                .map(|t| parse_document_type(&t))
                .transpose()?,
            entry_date: self.date.map(|d| parse_date("date", &d)).transpose()?,
            title: self.title,
            entry_type: self.entry_type,
            status: self.status,
            summary: self.summary,
            details: self.details,
            narrative_signal: self.narrative_signal,
            next_steps: self.next_steps,
        })
    }
}

/// GET /entries
pub async fn list_entries(
    State(state): State<AppState>,
    params: Result<Query<ListEntriesParams>, QueryRejection>,
) -> ApiResult<Json<EntryListResponse>> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let filter = params.into_filter()?;

    let page = state.store.list_entries(&filter).await?;
    let window = resolve_window(filter.limit, filter.offset, None);
    let pagination = calculate_pagination(page.total, window);

    debug!(
        "Listed {} of {} entries (page {}/{})",
        page.entries.len(),
        page.total,
        pagination.page,
        pagination.total_pages
    );

    Ok(Json(EntryListResponse {
        entries: page.entries,
        total: page.total,
        page: pagination.page,
        total_pages: pagination.total_pages,
        limit: pagination.limit,
    }))
}

/// GET /entries/{id}
pub async fn get_entry(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Entry>> {
    let id = entry_id(path)?;
    let entry = state.store.get_entry(id).await?.ok_or_else(|| entry_not_found(id))?;
    Ok(Json(entry))
}

/// POST /entries
pub async fn create_entry(
    State(state): State<AppState>,
    body: Result<Json<CreateEntryRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Entry>)> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let input = body.into_new_entry()?;
    check_project(&state, &input.project)?;

    let entry = state.store.create_entry(input).await?;
    info!(
        "Created entry {} ({}/{}/{} #{})",
        entry.id, entry.project, entry.document_type, entry.entry_date, entry.entry_number
    );

    Ok((StatusCode::CREATED, Json(entry)))
}

/// PUT /entries/{id}
pub async fn update_entry(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateEntryRequest>, JsonRejection>,
) -> ApiResult<Json<Entry>> {
    let id = entry_id(path)?;
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let patch = body.into_patch()?;
    if let Some(project) = &patch.project {
        check_project(&state, project)?;
    }

    let entry = state
        .store
        .update_entry(id, patch)
        .await?
        .ok_or_else(|| entry_not_found(id))?;
    info!("Updated entry {}", id);

    Ok(Json(entry))
}

/// DELETE /entries/{id} (soft delete)
pub async fn delete_entry(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let id = entry_id(path)?;
    if !state.store.delete_entry(id, false).await? {
        return Err(entry_not_found(id));
    }
    info!("Soft-deleted entry {}", id);

    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_accepts_calendar_dates() {
        assert_eq!(
            parse_date("date", "2024-02-29").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }

    #[test]
    fn test_parse_date_rejects_bad_shapes() {
        for value in ["2024-2-29", "24-02-29", "2024/02/29", "2024-02-29T00:00", ""] {
            let err = parse_date("date", value).unwrap_err();
            assert!(err.to_string().contains("YYYY-MM-DD"), "{value}: {err}");
        }
    }

    #[test]
    fn test_parse_date_rejects_impossible_dates() {
        let err = parse_date("after", "2023-02-29").unwrap_err();
        assert!(err.to_string().contains("not a valid calendar date"));
        assert!(err.to_string().starts_with("after"));
    }

    #[test]
    fn test_create_request_names_missing_field() {
        let request = CreateEntryRequest {
            project: Some("alpha".into()),
            document_type: Some("dev_log".into()),
            title: Some("t".into()),
            ..Default::default()
        };
        let err = request.into_new_entry().unwrap_err();
        assert_eq!(err.to_string(), "date is required");
    }

    #[test]
    fn test_create_request_rejects_unknown_type() {
        let request = CreateEntryRequest {
            project: Some("alpha".into()),
            document_type: Some("memo".into()),
            date: Some("2025-01-01".into()),
            title: Some("t".into()),
            ..Default::default()
        };
        let err = request.into_new_entry().unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert!(err.to_string().contains("document_type"));
    }

    #[test]
    fn test_update_request_rejects_blank_title() {
        let request = UpdateEntryRequest {
            title: Some("   ".into()),
            ..Default::default()
        };
        assert!(matches!(request.into_patch(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_update_request_maps_date() {
        let request = UpdateEntryRequest {
            date: Some("2025-03-04".into()),
            ..Default::default()
        };
        let patch = request.into_patch().unwrap();
        assert_eq!(patch.entry_date, NaiveDate::from_ymd_opt(2025, 3, 4));
        assert_eq!(patch.title, None);
    }

    #[test]
    fn test_list_params_use_page() {
        let params = ListEntriesParams {
            limit: Some(10),
            page: Some(3),
            ..Default::default()
        };
        let filter = params.into_filter().unwrap();
        assert_eq!(filter.limit, Some(10));
        assert_eq!(filter.offset, Some(20));
    }

    #[test]
    fn test_list_params_validate_dates() {
        let params = ListEntriesParams {
            before: Some("yesterday".into()),
            ..Default::default()
        };
        assert!(matches!(params.into_filter(), Err(ApiError::BadRequest(_))));
    }
}
