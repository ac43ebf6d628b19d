//! # Prism Common Library
//!
//! Shared code for the Prism metrics services including:
//! - Metric row model and identity key
//! - Observed period parsing
//! - Snapshot store collaborator (JSON file and in-memory backends)
//! - Bootstrap configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod models;
pub mod period;
pub mod store;

pub use error::{Error, Result};
pub use models::{MetricKey, MetricRow};
pub use store::{Snapshot, SnapshotStore, SnapshotVersion};
