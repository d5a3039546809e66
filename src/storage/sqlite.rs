//! SQLite storage backend using sqlx.
//!
//! Each resource gets its own table holding the record as a JSON document
//! next to its integer primary key. The key column is authoritative: the
//! `id` inside a stored document is replaced on read.
//!
//! Filters and ordering run on decoded records through the same
//! [`CompiledQuery`] evaluation as the in-memory store. `search` reads the
//! table with a single statement, so `total_count` and `items` always come
//! from one snapshot.

use crate::core::query::{CompiledQuery, FilterResponse};
use crate::core::store::{Document, RecordStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::marker::PhantomData;
use std::path::Path;
use std::time::Duration;

/// Open (creating if needed) the database file at `path`
pub async fn open_database(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePool::connect_with(options)
        .await
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    tracing::info!(path = %path.display(), "opened database");
    Ok(pool)
}

/// Record store backed by one SQLite table per resource
#[derive(Clone, Debug)]
pub struct SqliteStore<T> {
    pool: SqlitePool,
    table: &'static str,
    _marker: PhantomData<T>,
}

impl<T: Document> SqliteStore<T> {
    /// Create the store, creating its table if it does not exist
    pub async fn open(pool: SqlitePool) -> Result<Self> {
        let store = Self {
            pool,
            table: T::resource_name(),
            _marker: PhantomData,
        };
        store.ensure_table().await?;
        Ok(store)
    }

    async fn ensure_table(&self) -> Result<()> {
        // AUTOINCREMENT keeps ids of deleted rows from being reused
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            self.table
        ))
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to create table {}", self.table))?;
        Ok(())
    }

    fn encode(record: &T) -> Result<String> {
        Ok(serde_json::to_string(&record.to_document()?)?)
    }

    fn decode(&self, row: &SqliteRow) -> Result<T> {
        let id: i64 = row.try_get("id")?;
        let document: String = row.try_get("document")?;
        let mut record: T = serde_json::from_str(&document)
            .with_context(|| format!("Corrupt document {} in {}", id, self.table))?;
        record.set_id(id);
        Ok(record)
    }

    async fn load_all(&self) -> Result<Vec<T>> {
        let rows = sqlx::query(&format!("SELECT id, document FROM {}", self.table))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|row| self.decode(row)).collect()
    }
}

#[async_trait]
impl<T: Document> RecordStore<T> for SqliteStore<T> {
    async fn get(&self, id: i64) -> Result<Option<T>> {
        let row = sqlx::query(&format!(
            "SELECT id, document FROM {} WHERE id = ?",
            self.table
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| self.decode(&r)).transpose()
    }

    async fn insert(&self, mut record: T) -> Result<T> {
        let result = sqlx::query(&format!(
            "INSERT INTO {} (document, updated_at) VALUES (?, ?)",
            self.table
        ))
        .bind(Self::encode(&record)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        record.set_id(id);
        tracing::debug!(resource = self.table, id, "inserted record");
        Ok(record)
    }

    async fn save(&self, record: T) -> Result<Option<T>> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET document = ?, updated_at = ? WHERE id = ?",
            self.table
        ))
        .bind(Self::encode(&record)?)
        .bind(Utc::now().to_rfc3339())
        .bind(record.id())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", self.table))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, query: &CompiledQuery) -> Result<u64> {
        let records = self.load_all().await?;
        Ok(records.iter().filter(|r| query.matches(*r)).count() as u64)
    }

    async fn fetch(&self, query: &CompiledQuery) -> Result<Vec<T>> {
        let records = self.load_all().await?;
        Ok(query.evaluate(records.iter()).1)
    }

    async fn search(&self, query: &CompiledQuery) -> Result<FilterResponse<T>> {
        let records = self.load_all().await?;
        let (total_count, items) = query.evaluate(records.iter());
        tracing::debug!(
            resource = self.table,
            total_count,
            returned = items.len(),
            "searched records"
        );
        Ok(FilterResponse::new(total_count, items))
    }
}
