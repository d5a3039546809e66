//! Core module containing fundamental traits and types for the manager

pub mod auth;
pub mod entity;
pub mod error;
pub mod extractors;
pub mod field;
pub mod query;
pub mod service;
pub mod store;

pub use auth::{AuthContext, Claims, TokenService};
pub use entity::Record;
pub use error::{ManagerError, ManagerResult};
pub use extractors::Validated;
pub use field::{FieldDescriptor, FieldKind, FieldSet, FieldValue};
pub use query::{
    CompiledQuery, FilterOperator, FilterRequest, FilterResponse, QueryEngine, SortDirection,
};
pub use service::{Resource, ResourceService};
pub use store::RecordStore;
