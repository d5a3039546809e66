//! Process lifecycle of dedicated server instances

pub mod controller;
pub mod host;
pub mod launch;
pub mod locks;
pub mod references;

pub use controller::LifecycleController;
pub use host::{LaunchSpec, OsProcessHost, ProcessHost};
pub use launch::LaunchFiles;
pub use locks::KeyedLocks;
pub use references::BlobReferences;
