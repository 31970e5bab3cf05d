//! Entry persistence
//!
//! One storage contract ([`EntryStore`]) with two interchangeable backends:
//! an embedded SQLite file ([`SqliteEntryStore`]) and a hosted PostgreSQL
//! server ([`PgEntryStore`]). The backend is chosen once at startup by
//! [`connect_from_config`]; call sites only ever see `Arc<dyn EntryStore>`.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::Result;

/// Bind a rendered parameter list onto any sqlx query builder
macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for param in $params {
            query = match param {
                $crate::db::query::SqlParam::Text(value) => query.bind(value.clone()),
                $crate::db::query::SqlParam::Date(value) => query.bind(*value),
                $crate::db::query::SqlParam::Bool(value) => query.bind(*value),
                $crate::db::query::SqlParam::Int(value) => query.bind(*value),
            };
        }
        query
    }};
}

pub mod models;
pub mod postgres;
pub mod query;
mod rows;
pub mod sequence;
pub mod sqlite;

pub use models::{DocumentType, Entry, EntryPatch, EntryRecord, NewEntry};
pub use postgres::PgEntryStore;
pub use query::{EntryFilter, DEFAULT_LIMIT, MAX_LIMIT};
pub use sequence::{next_entry_number, EntryGroup, MAX_ASSIGN_WAIT};
pub use sqlite::SqliteEntryStore;

/// Index DDL shared by both backends
pub(crate) const INDEX_STATEMENTS: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_entries_project ON entries (project)",
    "CREATE INDEX IF NOT EXISTS idx_entries_entry_date ON entries (entry_date)",
    "CREATE INDEX IF NOT EXISTS idx_entries_project_type ON entries (project, document_type)",
    "CREATE INDEX IF NOT EXISTS idx_entries_browse ON entries (project, document_type, entry_date DESC)",
];

/// Storage engine behind an [`EntryStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Sqlite,
    Postgres,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Sqlite => f.write_str("SQLite (embedded)"),
            Backend::Postgres => f.write_str("PostgreSQL (hosted)"),
        }
    }
}

/// One page of a listing plus the unpaginated match count
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryPage {
    pub entries: Vec<Entry>,
    pub total: i64,
}

/// Backend-agnostic entry storage contract
///
/// Both implementations must be observably identical for every operation,
/// including ordering and case-insensitive search.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Which engine serves this store (for logging)
    fn backend(&self) -> Backend;

    /// Ensure the entries table, its UNIQUE constraint and indexes exist
    async fn init_schema(&self) -> Result<()>;

    /// Entries matching `filter`, newest first, with the total match count
    async fn list_entries(&self, filter: &EntryFilter) -> Result<EntryPage>;

    /// Entry by id, soft-deleted or not
    async fn get_entry(&self, id: i64) -> Result<Option<Entry>>;

    /// Persist a new entry, assigning its entry_number
    async fn create_entry(&self, input: NewEntry) -> Result<Entry>;

    /// Apply the present fields of `patch`; `None` when `id` does not exist
    async fn update_entry(&self, id: i64, patch: EntryPatch) -> Result<Option<Entry>>;

    /// Soft delete (or remove when `hard`); false when no row was affected
    async fn delete_entry(&self, id: i64, hard: bool) -> Result<bool>;

    /// Release pooled connections
    async fn close(&self);
}

/// Which backend to open, decided once per process
#[derive(Clone, PartialEq, Eq)]
pub enum StoreSelection {
    Hosted { database_url: String },
    Embedded { db_path: PathBuf },
}

impl StoreSelection {
    /// A non-blank connection string selects the hosted backend
    pub fn resolve(database_url: Option<&str>, db_path: PathBuf) -> Self {
        match database_url.map(str::trim).filter(|url| !url.is_empty()) {
            Some(url) => StoreSelection::Hosted {
                database_url: url.to_string(),
            },
            None => StoreSelection::Embedded { db_path },
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            StoreSelection::Hosted { .. } => Backend::Postgres,
            StoreSelection::Embedded { .. } => Backend::Sqlite,
        }
    }
}

// Connection strings carry credentials; never print them
impl fmt::Debug for StoreSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreSelection::Hosted { .. } => f
                .debug_struct("Hosted")
                .field("database_url", &"<redacted>")
                .finish(),
            StoreSelection::Embedded { db_path } => f
                .debug_struct("Embedded")
                .field("db_path", db_path)
                .finish(),
        }
    }
}

/// Open the selected backend
///
/// The hosted backend connects and ensures its schema immediately. The
/// embedded backend defers opening the file until first access.
pub async fn connect_from_config(selection: &StoreSelection) -> Result<Arc<dyn EntryStore>> {
    match selection {
        StoreSelection::Hosted { database_url } => {
            let store = PgEntryStore::connect(database_url).await?;
            info!("Entry store: {}", store.backend());
            Ok(Arc::new(store))
        }
        StoreSelection::Embedded { db_path } => {
            let store = SqliteEntryStore::new(db_path.clone());
            info!("Entry store: {} at {}", store.backend(), db_path.display());
            Ok(Arc::new(store))
        }
    }
}
