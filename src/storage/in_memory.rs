//! In-memory implementation of RecordStore for development and tests

use crate::core::entity::Record;
use crate::core::query::{CompiledQuery, FilterResponse};
use crate::core::store::RecordStore;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

struct Table<T> {
    rows: BTreeMap<i64, T>,
    next_id: i64,
}

/// In-memory record store
///
/// Ids are assigned sequentially starting at 1 and never reused. Uses
/// RwLock for thread-safe access.
#[derive(Clone)]
pub struct InMemoryStore<T> {
    table: Arc<RwLock<Table<T>>>,
}

impl<T: Record> InMemoryStore<T> {
    /// Create a new, empty store
    pub fn new() -> Self {
        Self {
            table: Arc::new(RwLock::new(Table {
                rows: BTreeMap::new(),
                next_id: 1,
            })),
        }
    }
}

impl<T: Record> Default for InMemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Record> RecordStore<T> for InMemoryStore<T> {
    async fn get(&self, id: i64) -> Result<Option<T>> {
        let table = self
            .table
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(table.rows.get(&id).cloned())
    }

    async fn insert(&self, mut record: T) -> Result<T> {
        let mut table = self
            .table
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let id = table.next_id;
        table.next_id += 1;
        record.set_id(id);
        table.rows.insert(id, record.clone());

        tracing::debug!(resource = T::resource_name(), id, "inserted record");
        Ok(record)
    }

    async fn save(&self, record: T) -> Result<Option<T>> {
        let mut table = self
            .table
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        match table.rows.get_mut(&record.id()) {
            Some(slot) => {
                *slot = record.clone();
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut table = self
            .table
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        Ok(table.rows.remove(&id).is_some())
    }

    async fn count(&self, query: &CompiledQuery) -> Result<u64> {
        let table = self
            .table
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(table.rows.values().filter(|r| query.matches(*r)).count() as u64)
    }

    async fn fetch(&self, query: &CompiledQuery) -> Result<Vec<T>> {
        let table = self
            .table
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(query.evaluate(table.rows.values()).1)
    }

    async fn search(&self, query: &CompiledQuery) -> Result<FilterResponse<T>> {
        let table = self
            .table
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        let (total_count, items) = query.evaluate(table.rows.values());
        tracing::debug!(
            resource = T::resource_name(),
            total_count,
            returned = items.len(),
            "searched records"
        );
        Ok(FilterResponse::new(total_count, items))
    }
}
