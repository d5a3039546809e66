//! Record store trait

use crate::core::entity::Record;
use crate::core::query::{CompiledQuery, FilterResponse};
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// JSON encoding of a record for document stores
///
/// The default is the record's serde form. Records that hide attributes
/// from API responses override it so the stored document stays complete.
pub trait Document: Record + Serialize + DeserializeOwned {
    fn to_document(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Storage for one record type
///
/// Implementations evaluate [`CompiledQuery`] predicates and orderings;
/// they never see raw field names coming from a request.
#[async_trait]
pub trait RecordStore<T: Record>: Send + Sync {
    /// Get a record by id
    async fn get(&self, id: i64) -> Result<Option<T>>;

    /// Insert a record, assigning it a fresh id
    async fn insert(&self, record: T) -> Result<T>;

    /// Replace an existing record. Returns `None` if the id is unknown.
    async fn save(&self, record: T) -> Result<Option<T>>;

    /// Delete a record. Returns whether it existed.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Number of records matching the query predicates (window ignored)
    async fn count(&self, query: &CompiledQuery) -> Result<u64>;

    /// Matching records in query order, restricted to the page window
    async fn fetch(&self, query: &CompiledQuery) -> Result<Vec<T>>;

    /// Count and page in one call.
    ///
    /// The default issues `count` then `fetch` as two separate reads, so a
    /// concurrent write between them may make `total_count` and `items`
    /// disagree. Stores that can read both under one snapshot override it.
    async fn search(&self, query: &CompiledQuery) -> Result<FilterResponse<T>> {
        let total_count = self.count(query).await?;
        let items = self.fetch(query).await?;
        Ok(FilterResponse::new(total_count, items))
    }

    /// Whether a record with this id exists
    async fn exists(&self, id: i64) -> Result<bool> {
        Ok(self.get(id).await?.is_some())
    }
}
