//! Application services.

mod version_history_service;

pub use version_history_service::{HistoryConfig, VersionHistoryService};
