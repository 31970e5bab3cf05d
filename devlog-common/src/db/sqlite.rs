//! Embedded SQLite backend
//!
//! The database file is opened on first access, not at construction: the
//! first operation creates the parent directory and file, applies connection
//! options and ensures the schema. The pool lives in a `OnceCell`, so this
//! happens at most once per store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::models::{Entry, EntryPatch, EntryRecord, NewEntry};
use super::query::{build_list_queries, Dialect, EntryFilter, ENTRY_COLUMNS};
use super::rows::{self, EntryRows};
use super::sequence::EntryGroup;
use super::{Backend, EntryPage, EntryStore, INDEX_STATEMENTS};
use crate::Result;

/// Milliseconds a writer waits on a locked database before failing
pub const BUSY_TIMEOUT_MS: u64 = 5000;

const MAX_CONNECTIONS: u32 = 8;

/// Entry store backed by a single SQLite file
pub struct SqliteEntryStore {
    db_path: PathBuf,
    pool: OnceCell<SqlitePool>,
}

impl SqliteEntryStore {
    /// Create a store for `db_path` without touching the filesystem
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            pool: OnceCell::new(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Connection pool, opening the database on first call
    pub async fn pool(&self) -> Result<&SqlitePool> {
        self.pool
            .get_or_try_init(|| open_database(&self.db_path))
            .await
    }
}

/// Open (creating if needed) the database file and ensure the schema
async fn open_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        // WAL lets readers proceed while one writer holds the lock
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create the entries table and indexes (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project TEXT NOT NULL,
            document_type TEXT NOT NULL CHECK (document_type IN ('addendum', 'dev_log')),
            entry_date TEXT NOT NULL,
            entry_number INTEGER NOT NULL CHECK (entry_number > 0),
            title TEXT NOT NULL,
            entry_type TEXT,
            status TEXT,
            summary TEXT,
            details TEXT,
            narrative_signal TEXT,
            next_steps TEXT,
            is_deleted BOOLEAN NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (project, document_type, entry_date, entry_number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    for statement in INDEX_STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }

    debug!("SQLite entries schema ensured");
    Ok(())
}

#[async_trait]
impl EntryRows for SqliteEntryStore {
    async fn fetch_entry(&self, id: i64) -> Result<Option<Entry>> {
        let pool = self.pool().await?;
        let sql = format!("SELECT {} FROM entries WHERE id = ?", ENTRY_COLUMNS);
        let record = sqlx::query_as::<_, EntryRecord>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        record.map(Entry::try_from).transpose()
    }

    async fn max_entry_number(
        &self,
        group: &EntryGroup,
        exclude_id: Option<i64>,
    ) -> Result<Option<i64>> {
        let pool = self.pool().await?;
        let base = "SELECT MAX(entry_number) FROM entries \
                    WHERE project = ? AND document_type = ? AND entry_date = ?";

        let current_max = match exclude_id {
            Some(id) => sqlx::query_scalar::<_, Option<i64>>(&format!("{} AND id <> ?", base))
                .bind(&group.project)
                .bind(group.document_type.as_str())
                .bind(group.entry_date)
                .bind(id)
                .fetch_one(pool)
                .await?,
            None => sqlx::query_scalar::<_, Option<i64>>(base)
                .bind(&group.project)
                .bind(group.document_type.as_str())
                .bind(group.entry_date)
                .fetch_one(pool)
                .await?,
        };

        Ok(current_max)
    }

    async fn insert_entry(
        &self,
        input: &NewEntry,
        entry_number: i64,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let pool = self.pool().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO entries (
                project, document_type, entry_date, entry_number, title,
                entry_type, status, summary, details, narrative_signal, next_steps,
                is_deleted, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&input.project)
        .bind(input.document_type.as_str())
        .bind(input.entry_date)
        .bind(entry_number)
        .bind(&input.title)
        .bind(&input.entry_type)
        .bind(&input.status)
        .bind(&input.summary)
        .bind(&input.details)
        .bind(&input.narrative_signal)
        .bind(&input.next_steps)
        .bind(false)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn write_entry(&self, entry: &Entry) -> Result<()> {
        let pool = self.pool().await?;
        sqlx::query(
            r#"
            UPDATE entries SET
                project = ?, document_type = ?, entry_date = ?, entry_number = ?,
                title = ?, entry_type = ?, status = ?, summary = ?, details = ?,
                narrative_signal = ?, next_steps = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&entry.project)
        .bind(entry.document_type.as_str())
        .bind(entry.entry_date)
        .bind(entry.entry_number)
        .bind(&entry.title)
        .bind(&entry.entry_type)
        .bind(&entry.status)
        .bind(&entry.summary)
        .bind(&entry.details)
        .bind(&entry.narrative_signal)
        .bind(&entry.next_steps)
        .bind(entry.updated_at)
        .bind(entry.id)
        .execute(pool)
        .await?;

        Ok(())
    }

    async fn mark_deleted(&self, id: i64, now: DateTime<Utc>) -> Result<bool> {
        let pool = self.pool().await?;
        let result = sqlx::query("UPDATE entries SET is_deleted = ?, updated_at = ? WHERE id = ?")
            .bind(true)
            .bind(now)
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_entry(&self, id: i64) -> Result<bool> {
        let pool = self.pool().await?;
        let result = sqlx::query("DELETE FROM entries WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn page_entries(&self, filter: &EntryFilter) -> Result<EntryPage> {
        let pool = self.pool().await?;
        let queries = build_list_queries(Dialect::Sqlite, filter);

        let total: i64 = bind_params!(
            sqlx::query_scalar::<_, i64>(&queries.count_sql),
            &queries.count_params
        )
        .fetch_one(pool)
        .await?;

        let records: Vec<EntryRecord> = bind_params!(
            sqlx::query_as::<_, EntryRecord>(&queries.select_sql),
            &queries.select_params
        )
        .fetch_all(pool)
        .await?;

        let entries = records
            .into_iter()
            .map(Entry::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(EntryPage { entries, total })
    }
}

#[async_trait]
impl EntryStore for SqliteEntryStore {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    async fn init_schema(&self) -> Result<()> {
        let pool = self.pool().await?;
        create_schema(pool).await?;
        info!("Entries schema ready ({})", self.db_path.display());
        Ok(())
    }

    async fn list_entries(&self, filter: &EntryFilter) -> Result<EntryPage> {
        self.page_entries(filter).await
    }

    async fn get_entry(&self, id: i64) -> Result<Option<Entry>> {
        self.fetch_entry(id).await
    }

    async fn create_entry(&self, input: NewEntry) -> Result<Entry> {
        rows::create(self, input).await
    }

    async fn update_entry(&self, id: i64, patch: EntryPatch) -> Result<Option<Entry>> {
        rows::update(self, id, patch).await
    }

    async fn delete_entry(&self, id: i64, hard: bool) -> Result<bool> {
        rows::delete(self, id, hard).await
    }

    async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
            info!("Closed database: {}", self.db_path.display());
        }
    }
}
