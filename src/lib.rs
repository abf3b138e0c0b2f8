/// Fixture Sync
/// Keeps a document store in step with a public fixtures site over repeated runs.

pub mod config;
pub mod orchestrator;
pub mod report;
pub mod snapshot;
pub mod store;

pub use config::Config;
pub use orchestrator::{Clock, Orchestrator, RunMode, RunSummary, SyncError};
pub use store::{DocumentStore, SqliteStore};
