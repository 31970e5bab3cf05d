//! Hosted PostgreSQL backend
//!
//! Same statements as the SQLite backend, spelled with `$n` placeholders and
//! native `DATE`/`BOOLEAN`/`TIMESTAMPTZ` columns. The pool is connected and
//! the schema ensured when the store is constructed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, info};

use super::models::{Entry, EntryPatch, EntryRecord, NewEntry};
use super::query::{build_list_queries, Dialect, EntryFilter, ENTRY_COLUMNS};
use super::rows::{self, EntryRows};
use super::sequence::EntryGroup;
use super::{Backend, EntryPage, EntryStore, INDEX_STATEMENTS};
use crate::Result;

const MAX_CONNECTIONS: u32 = 10;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Entry store backed by a PostgreSQL server
pub struct PgEntryStore {
    pool: PgPool,
}

impl PgEntryStore {
    /// Connect with `database_url` and ensure the schema
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await?;
        info!("Connected to PostgreSQL");

        let store = Self { pool };
        create_schema(&store.pool).await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Create the entries table and indexes (idempotent)
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            id BIGSERIAL PRIMARY KEY,
            project TEXT NOT NULL,
            document_type TEXT NOT NULL CHECK (document_type IN ('addendum', 'dev_log')),
            entry_date DATE NOT NULL,
            entry_number BIGINT NOT NULL CHECK (entry_number > 0),
            title TEXT NOT NULL,
            entry_type TEXT,
            status TEXT,
            summary TEXT,
            details TEXT,
            narrative_signal TEXT,
            next_steps TEXT,
            is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT entries_group_number_key
                UNIQUE (project, document_type, entry_date, entry_number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    for statement in INDEX_STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }

    debug!("PostgreSQL entries schema ensured");
    Ok(())
}

#[async_trait]
impl EntryRows for PgEntryStore {
    async fn fetch_entry(&self, id: i64) -> Result<Option<Entry>> {
        let sql = format!("SELECT {} FROM entries WHERE id = $1", ENTRY_COLUMNS);
        let record = sqlx::query_as::<_, EntryRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        record.map(Entry::try_from).transpose()
    }

    async fn max_entry_number(
        &self,
        group: &EntryGroup,
        exclude_id: Option<i64>,
    ) -> Result<Option<i64>> {
        let base = "SELECT MAX(entry_number) FROM entries \
                    WHERE project = $1 AND document_type = $2 AND entry_date = $3";

        let current_max = match exclude_id {
            Some(id) => sqlx::query_scalar::<_, Option<i64>>(&format!("{} AND id <> $4", base))
                .bind(&group.project)
                .bind(group.document_type.as_str())
                .bind(group.entry_date)
                .bind(id)
                .fetch_one(&self.pool)
                .await?,
            None => sqlx::query_scalar::<_, Option<i64>>(base)
                .bind(&group.project)
                .bind(group.document_type.as_str())
                .bind(group.entry_date)
                .fetch_one(&self.pool)
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
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO entries (
                project, document_type, entry_date, entry_number, title,
                entry_type, status, summary, details, narrative_signal, next_steps,
                is_deleted, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id
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
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn write_entry(&self, entry: &Entry) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE entries SET
                project = $1, document_type = $2, entry_date = $3, entry_number = $4,
                title = $5, entry_type = $6, status = $7, summary = $8, details = $9,
                narrative_signal = $10, next_steps = $11, updated_at = $12
            WHERE id = $13
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
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_deleted(&self, id: i64, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE entries SET is_deleted = $1, updated_at = $2 WHERE id = $3")
            .bind(true)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_entry(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM entries WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn page_entries(&self, filter: &EntryFilter) -> Result<EntryPage> {
        let queries = build_list_queries(Dialect::Postgres, filter);

        let total: i64 = bind_params!(
            sqlx::query_scalar::<_, i64>(&queries.count_sql),
            &queries.count_params
        )
        .fetch_one(&self.pool)
        .await?;

        let records: Vec<EntryRecord> = bind_params!(
            sqlx::query_as::<_, EntryRecord>(&queries.select_sql),
            &queries.select_params
        )
        .fetch_all(&self.pool)
        .await?;

        let entries = records
            .into_iter()
            .map(Entry::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(EntryPage { entries, total })
    }
}

#[async_trait]
impl EntryStore for PgEntryStore {
    fn backend(&self) -> Backend {
        Backend::Postgres
    }

    async fn init_schema(&self) -> Result<()> {
        create_schema(&self.pool).await?;
        info!("Entries schema ready (PostgreSQL)");
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
        self.pool.close().await;
        info!("Closed PostgreSQL pool");
    }
}
