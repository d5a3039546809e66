//! HTTP server: shared state, handlers and the route table
//!
//! `ServerBuilder` turns an [`AppConfig`](crate::config::AppConfig) into a
//! ready router with:
//! - CRUD and `_filter` routes for every resource
//! - Lifecycle routes for server configs (`_start`, `_stop`, `_refresh`)
//! - Token routes under `/auth`

pub mod builder;
pub mod handlers;
pub mod router;
pub mod state;

pub use builder::ServerBuilder;
pub use router::build_router;
pub use state::AppState;
