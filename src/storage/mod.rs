//! Storage implementations

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use sqlite::{SqliteStore, open_database};
