//! messlens: directory hygiene monitoring.
//!
//! Scans a directory tree into structural snapshots, scores them against
//! a standards policy, stores every observation in an append-only SQLite
//! log, and narrates the state via a local LLM grounded in similar past
//! snapshots.

pub mod analysis;
pub mod error;
pub mod models;
pub mod monitor;
pub mod rag;
pub mod schedule;
pub mod store;

pub use error::{MonitorError, Result};
pub use models::snapshot::DirectorySnapshot;
pub use models::standards::StandardsPolicy;
pub use monitor::Monitor;
pub use schedule::{ContinuousMonitor, MonitorStatus};
pub use store::ObservationStore;
