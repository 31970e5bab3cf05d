//! Entry filter → SQL predicate translation
//!
//! A filter is first lowered into a backend-neutral [`Predicate`] (a list of
//! typed clauses carrying their bound values). Only [`Predicate::render`]
//! knows about SQL spelling, and it delegates the two backend differences
//! (placeholder syntax, case-insensitive LIKE operator) to [`Dialect`].
//! Values are never spliced into SQL text.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::models::DocumentType;

/// Page size used when the caller does not ask for one
pub const DEFAULT_LIMIT: i64 = 20;

/// Hard cap on rows returned by a single listing
pub const MAX_LIMIT: i64 = 200;

/// Columns selected for every entry read, in `EntryRecord` order
pub const ENTRY_COLUMNS: &str = "id, project, document_type, entry_date, entry_number, title, \
     entry_type, status, summary, details, narrative_signal, next_steps, \
     is_deleted, created_at, updated_at";

/// Browse ordering; `id` breaks ties between groups sharing date and number
pub const ENTRY_ORDER: &str = "ORDER BY entry_date DESC, entry_number DESC, id DESC";

/// Listing filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryFilter {
    pub project: Option<String>,
    pub document_type: Option<DocumentType>,
    /// Matched against the normalized status
    pub status: Option<String>,
    /// Inclusive lower bound on entry_date
    pub after: Option<NaiveDate>,
    /// Inclusive upper bound on entry_date
    pub before: Option<NaiveDate>,
    /// Whitespace-separated search terms
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    #[serde(default)]
    pub include_deleted: bool,
}

impl EntryFilter {
    /// Limit after defaulting (non-positive → default) and capping
    pub fn effective_limit(&self) -> i64 {
        match self.limit {
            Some(limit) if limit >= 1 => limit.min(MAX_LIMIT),
            _ => DEFAULT_LIMIT,
        }
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    /// Search terms from `q`, empty when `q` is absent or blank
    pub fn search_terms(&self) -> Vec<&str> {
        self.q
            .as_deref()
            .map(|q| q.split_whitespace().collect())
            .unwrap_or_default()
    }
}

/// Filterable/searchable entry columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Project,
    DocumentType,
    Status,
    EntryDate,
    IsDeleted,
    Title,
    Summary,
    Details,
    NextSteps,
}

impl Column {
    pub fn as_str(self) -> &'static str {
        match self {
            Column::Project => "project",
            Column::DocumentType => "document_type",
            Column::Status => "status",
            Column::EntryDate => "entry_date",
            Column::IsDeleted => "is_deleted",
            Column::Title => "title",
            Column::Summary => "summary",
            Column::Details => "details",
            Column::NextSteps => "next_steps",
        }
    }
}

/// Columns a free-text term may match
pub const SEARCH_COLUMNS: &[Column] = &[
    Column::Title,
    Column::Summary,
    Column::Details,
    Column::NextSteps,
];

/// A bound value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Date(NaiveDate),
    Bool(bool),
    Int(i64),
}

/// One typed condition
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Eq(Column, SqlParam),
    AtLeast(Column, SqlParam),
    AtMost(Column, SqlParam),
    /// Case-insensitive substring match of one term against any of `columns`
    ContainsAny {
        columns: &'static [Column],
        term: String,
    },
}

/// SQL spelling differences between the two backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Placeholder for the 1-based parameter `index`
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => format!("${}", index),
        }
    }

    /// Case-insensitive LIKE operator
    pub fn like_operator(self) -> &'static str {
        match self {
            Dialect::Sqlite => "LIKE",
            Dialect::Postgres => "ILIKE",
        }
    }
}

/// Conjunction of clauses built from an [`EntryFilter`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    clauses: Vec<Clause>,
}

/// SQL fragment plus the values to bind, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPredicate {
    /// Empty, or ` WHERE ...` with a leading space
    pub where_clause: String,
    pub params: Vec<SqlParam>,
}

impl RenderedPredicate {
    /// 1-based index of the next placeholder after this predicate's params
    pub fn next_index(&self) -> usize {
        self.params.len() + 1
    }
}

impl Predicate {
    pub fn from_filter(filter: &EntryFilter) -> Self {
        let mut clauses = Vec::new();

        if !filter.include_deleted {
            clauses.push(Clause::Eq(Column::IsDeleted, SqlParam::Bool(false)));
        }
        if let Some(project) = &filter.project {
            clauses.push(Clause::Eq(Column::Project, SqlParam::Text(project.clone())));
        }
        if let Some(document_type) = filter.document_type {
            clauses.push(Clause::Eq(
                Column::DocumentType,
                SqlParam::Text(document_type.as_str().to_string()),
            ));
        }
        if let Some(status) = crate::status::normalize_optional_status(filter.status.as_deref()) {
            clauses.push(Clause::Eq(Column::Status, SqlParam::Text(status)));
        }
        if let Some(after) = filter.after {
            clauses.push(Clause::AtLeast(Column::EntryDate, SqlParam::Date(after)));
        }
        if let Some(before) = filter.before {
            clauses.push(Clause::AtMost(Column::EntryDate, SqlParam::Date(before)));
        }
        for term in filter.search_terms() {
            clauses.push(Clause::ContainsAny {
                columns: SEARCH_COLUMNS,
                term: term.to_string(),
            });
        }

        Self { clauses }
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn render(&self, dialect: Dialect) -> RenderedPredicate {
        let mut params = Vec::new();
        let mut parts = Vec::with_capacity(self.clauses.len());

        for clause in &self.clauses {
            let part = match clause {
                Clause::Eq(column, value) => {
                    params.push(value.clone());
                    format!("{} = {}", column.as_str(), dialect.placeholder(params.len()))
                }
                Clause::AtLeast(column, value) => {
                    params.push(value.clone());
                    format!("{} >= {}", column.as_str(), dialect.placeholder(params.len()))
                }
                Clause::AtMost(column, value) => {
                    params.push(value.clone());
                    format!("{} <= {}", column.as_str(), dialect.placeholder(params.len()))
                }
                Clause::ContainsAny { columns, term } => {
                    let pattern = format!("%{}%", escape_like(term));
                    let alternatives: Vec<String> = columns
                        .iter()
                        .map(|column| {
                            params.push(SqlParam::Text(pattern.clone()));
                            format!(
                                "{} {} {} ESCAPE '\\'",
                                column.as_str(),
                                dialect.like_operator(),
                                dialect.placeholder(params.len())
                            )
                        })
                        .collect();
                    format!("({})", alternatives.join(" OR "))
                }
            };
            parts.push(part);
        }

        let where_clause = if parts.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", parts.join(" AND "))
        };

        RenderedPredicate {
            where_clause,
            params,
        }
    }
}

/// Escape LIKE wildcards so a term matches literally
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Count and page queries for one listing
#[derive(Debug, Clone, PartialEq)]
pub struct ListQueries {
    pub count_sql: String,
    pub count_params: Vec<SqlParam>,
    pub select_sql: String,
    pub select_params: Vec<SqlParam>,
}

/// Build both listing statements for `filter` in `dialect`
pub fn build_list_queries(dialect: Dialect, filter: &EntryFilter) -> ListQueries {
    let rendered = Predicate::from_filter(filter).render(dialect);

    let count_sql = format!("SELECT COUNT(*) FROM entries{}", rendered.where_clause);

    let limit_index = rendered.next_index();
    let select_sql = format!(
        "SELECT {} FROM entries{} {} LIMIT {} OFFSET {}",
        ENTRY_COLUMNS,
        rendered.where_clause,
        ENTRY_ORDER,
        dialect.placeholder(limit_index),
        dialect.placeholder(limit_index + 1)
    );

    let mut select_params = rendered.params.clone();
    select_params.push(SqlParam::Int(filter.effective_limit()));
    select_params.push(SqlParam::Int(filter.effective_offset()));

    ListQueries {
        count_sql,
        count_params: rendered.params,
        select_sql,
        select_params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_default_filter_hides_deleted() {
        let rendered = Predicate::from_filter(&EntryFilter::default()).render(Dialect::Sqlite);
        assert_eq!(rendered.where_clause, " WHERE is_deleted = ?");
        assert_eq!(rendered.params, vec![SqlParam::Bool(false)]);
    }

    #[test]
    fn test_include_deleted_with_no_other_filters_is_empty() {
        let filter = EntryFilter {
            include_deleted: true,
            ..Default::default()
        };
        let predicate = Predicate::from_filter(&filter);
        assert!(predicate.is_empty());
        assert_eq!(predicate.render(Dialect::Postgres).where_clause, "");
    }

    #[test]
    fn test_postgres_numbers_placeholders_and_uses_ilike() {
        let filter = EntryFilter {
            project: Some("alpha".to_string()),
            document_type: Some(DocumentType::DevLog),
            after: Some(date(2025, 1, 1)),
            before: Some(date(2025, 1, 31)),
            q: Some("auth".to_string()),
            ..Default::default()
        };
        let rendered = Predicate::from_filter(&filter).render(Dialect::Postgres);

        assert_eq!(
            rendered.where_clause,
            " WHERE is_deleted = $1 AND project = $2 AND document_type = $3 \
             AND entry_date >= $4 AND entry_date <= $5 \
             AND (title ILIKE $6 ESCAPE '\\' OR summary ILIKE $7 ESCAPE '\\' \
             OR details ILIKE $8 ESCAPE '\\' OR next_steps ILIKE $9 ESCAPE '\\')"
        );
        assert_eq!(rendered.params.len(), 9);
        assert_eq!(rendered.params[2], SqlParam::Text("dev_log".to_string()));
        assert_eq!(rendered.params[3], SqlParam::Date(date(2025, 1, 1)));
        assert_eq!(rendered.params[8], SqlParam::Text("%auth%".to_string()));
    }

    #[test]
    fn test_dialects_share_the_same_logical_predicate() {
        let filter = EntryFilter {
            project: Some("alpha".to_string()),
            q: Some("auth fix".to_string()),
            ..Default::default()
        };
        let sqlite = Predicate::from_filter(&filter).render(Dialect::Sqlite);
        let postgres = Predicate::from_filter(&filter).render(Dialect::Postgres);

        assert_eq!(sqlite.params, postgres.params);

        let mut normalized = postgres.where_clause.replace("ILIKE", "LIKE");
        for index in (1..=postgres.params.len()).rev() {
            normalized = normalized.replace(&format!("${}", index), "?");
        }
        assert_eq!(normalized, sqlite.where_clause);
    }

    #[test]
    fn test_each_search_term_is_its_own_clause() {
        let filter = EntryFilter {
            q: Some("  auth   fix ".to_string()),
            include_deleted: true,
            ..Default::default()
        };
        let predicate = Predicate::from_filter(&filter);
        assert_eq!(predicate.clauses().len(), 2);

        let rendered = predicate.render(Dialect::Sqlite);
        assert_eq!(rendered.params.len(), 8);
        assert!(rendered.where_clause.contains(") AND ("));
        assert_eq!(rendered.params[0], SqlParam::Text("%auth%".to_string()));
        assert_eq!(rendered.params[4], SqlParam::Text("%fix%".to_string()));
    }

    #[test]
    fn test_status_filter_is_normalized() {
        let filter = EntryFilter {
            status: Some("✅ Done".to_string()),
            include_deleted: true,
            ..Default::default()
        };
        let predicate = Predicate::from_filter(&filter);
        assert_eq!(
            predicate.clauses(),
            &[Clause::Eq(Column::Status, SqlParam::Text("complete".to_string()))]
        );
    }

    #[test]
    fn test_escape_like_wildcards() {
        assert_eq!(escape_like("100%_done\\"), "100\\%\\_done\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_effective_limit_defaults_and_caps() {
        let mut filter = EntryFilter::default();
        assert_eq!(filter.effective_limit(), DEFAULT_LIMIT);

        filter.limit = Some(500);
        assert_eq!(filter.effective_limit(), MAX_LIMIT);

        filter.limit = Some(0);
        assert_eq!(filter.effective_limit(), DEFAULT_LIMIT);

        filter.limit = Some(35);
        assert_eq!(filter.effective_limit(), 35);
    }

    #[test]
    fn test_effective_offset_clamps_negative() {
        let filter = EntryFilter {
            offset: Some(-5),
            ..Default::default()
        };
        assert_eq!(filter.effective_offset(), 0);
    }

    #[test]
    fn test_list_queries_append_limit_and_offset() {
        let filter = EntryFilter {
            project: Some("alpha".to_string()),
            limit: Some(10),
            offset: Some(30),
            ..Default::default()
        };
        let queries = build_list_queries(Dialect::Postgres, &filter);

        assert_eq!(
            queries.count_sql,
            "SELECT COUNT(*) FROM entries WHERE is_deleted = $1 AND project = $2"
        );
        assert!(queries
            .select_sql
            .ends_with("ORDER BY entry_date DESC, entry_number DESC, id DESC LIMIT $3 OFFSET $4"));
        assert_eq!(queries.count_params.len(), 2);
        assert_eq!(
            &queries.select_params[2..],
            &[SqlParam::Int(10), SqlParam::Int(30)]
        );
    }
}
