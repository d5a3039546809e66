//! Generic CRUD and search service shared by every resource

use crate::core::error::{ManagerError, ManagerResult};
use crate::core::query::{FilterRequest, FilterResponse, QueryEngine};
use crate::core::store::{Document, RecordStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::OwnedRwLockWriteGuard;
use validator::Validate;

/// A record type exposed through the REST surface
///
/// Create and update payloads are distinct types: every field of `Update`
/// is optional and only provided fields change.
pub trait Resource: Document {
    /// Scope a caller needs for any operation on this resource
    const SCOPE: &'static str;

    type Create: DeserializeOwned + Validate + Send + 'static;
    type Update: DeserializeOwned + Validate + Send + 'static;

    /// Build a new record (id assigned later by the store)
    fn from_create(payload: Self::Create, now: DateTime<Utc>) -> ManagerResult<Self>;

    /// Apply a partial update in place
    fn apply_update(&mut self, payload: Self::Update) -> ManagerResult<()>;
}

/// Exclusive hold returned by a [`ReferenceGuard`]; the write it allowed must
/// finish before the guard is dropped
pub type GuardLock = OwnedRwLockWriteGuard<()>;

/// Veto over edits and deletes of records other records depend on
#[async_trait]
pub trait ReferenceGuard: Send + Sync {
    /// Allow an update of `resource` `id`, or fail
    async fn guard_update(&self, resource: &'static str, id: i64) -> ManagerResult<GuardLock>;

    /// Allow a delete of `resource` `id`, or fail
    async fn guard_delete(&self, resource: &'static str, id: i64) -> ManagerResult<GuardLock>;
}

/// CRUD and filter operations over one resource store
pub struct ResourceService<T: Resource> {
    store: Arc<dyn RecordStore<T>>,
    engine: QueryEngine,
    guard: Option<Arc<dyn ReferenceGuard>>,
}

impl<T: Resource> Clone for ResourceService<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            engine: self.engine,
            guard: self.guard.clone(),
        }
    }
}

impl<T: Resource> ResourceService<T> {
    pub fn new(store: Arc<dyn RecordStore<T>>, engine: QueryEngine) -> Self {
        Self {
            store,
            engine,
            guard: None,
        }
    }

    /// Route updates and deletes through `guard` first
    pub fn with_guard(mut self, guard: Arc<dyn ReferenceGuard>) -> Self {
        self.guard = Some(guard);
        self
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<dyn RecordStore<T>> {
        &self.store
    }

    pub async fn create(&self, payload: T::Create) -> ManagerResult<T> {
        let record = T::from_create(payload, Utc::now())?;
        let created = self.store.insert(record).await?;
        tracing::info!(resource = T::resource_name(), id = created.id(), "created record");
        Ok(created)
    }

    /// Get a record, failing with `NotFound` if absent
    pub async fn get(&self, id: i64) -> ManagerResult<T> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ManagerError::not_found(T::resource_name(), id))
    }

    pub async fn update(&self, id: i64, payload: T::Update) -> ManagerResult<T> {
        let _lock = match &self.guard {
            Some(guard) => Some(guard.guard_update(T::resource_name(), id).await?),
            None => None,
        };
        let mut record = self.get(id).await?;
        record.apply_update(payload)?;
        self.save(record).await
    }

    /// Persist a modified record
    pub async fn save(&self, record: T) -> ManagerResult<T> {
        let id = record.id();
        self.store
            .save(record)
            .await?
            .ok_or_else(|| ManagerError::not_found(T::resource_name(), id))
    }

    pub async fn delete(&self, id: i64) -> ManagerResult<()> {
        let _lock = match &self.guard {
            Some(guard) => Some(guard.guard_delete(T::resource_name(), id).await?),
            None => None,
        };
        if !self.store.delete(id).await? {
            return Err(ManagerError::not_found(T::resource_name(), id));
        }
        tracing::info!(resource = T::resource_name(), id, "deleted record");
        Ok(())
    }

    /// Compile and run a filter request.
    ///
    /// The request is fully validated before the store is touched.
    pub async fn filter(&self, request: &FilterRequest) -> ManagerResult<FilterResponse<T>> {
        let query = self.engine.build(T::fields(), request)?;
        Ok(self.store.search(&query).await?)
    }
}
