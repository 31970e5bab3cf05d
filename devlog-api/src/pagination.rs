//! Pagination for entry listings
//!
//! Requests carry `limit` plus either `offset` or a 1-indexed `page`; `page`
//! wins when both are given. Responses report `page` and `totalPages`
//! derived from the effective window.

use devlog_common::db::{DEFAULT_LIMIT, MAX_LIMIT};

/// Effective window for one listing request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: i64,
    pub offset: i64,
}

/// Pagination metadata returned alongside a page of entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Total number of pages (0 when nothing matched)
    pub total_pages: i64,
    pub limit: i64,
}

/// Resolve the requested window
///
/// `limit` below 1 falls back to the default and is capped at the maximum.
/// `page` below 1 is treated as the first page.
///
/// # Examples
/// ```
/// use devlog_api::pagination::resolve_window;
///
/// let w = resolve_window(Some(10), None, Some(3));
/// assert_eq!((w.limit, w.offset), (10, 20));
///
/// let w = resolve_window(Some(500), Some(40), None);
/// assert_eq!((w.limit, w.offset), (200, 40));
/// ```
pub fn resolve_window(limit: Option<i64>, offset: Option<i64>, page: Option<i64>) -> PageWindow {
    let limit = match limit {
        Some(limit) if limit >= 1 => limit.min(MAX_LIMIT),
        _ => DEFAULT_LIMIT,
    };

    let offset = match page {
        Some(page) => (page.max(1) - 1).saturating_mul(limit),
        None => offset.unwrap_or(0).max(0),
    };

    PageWindow { limit, offset }
}

/// Calculate pagination metadata for a window over `total` matches
pub fn calculate_pagination(total: i64, window: PageWindow) -> Pagination {
    let limit = window.limit.max(1);

    Pagination {
        page: window.offset / limit + 1,
        total_pages: (total + limit - 1) / limit,
        limit,
    }
}
