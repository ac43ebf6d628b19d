//! HTTP API handlers for prism-mi

pub mod health;
pub mod import;
pub mod snapshot;

pub use health::health_routes;
pub use import::import_routes;
pub use snapshot::snapshot_routes;
