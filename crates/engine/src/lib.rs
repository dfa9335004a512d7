//! SheetBinder Engine - the headless core of the character sheet editor.
//!
//! The editor shell (rendering, dialogs, i18n) lives elsewhere and consumes
//! this crate: it constructs a version store adapter, wires it into the
//! [`VersionHistoryService`], and reports every document mutation through
//! [`VersionHistoryService::track_change`]. Bursts of edits are collapsed
//! into single squashed history entries after a quiet period;
//! [`HistoryUseCases`] serves the history browser.

pub mod application;
pub mod infrastructure;
pub mod use_cases;

pub use application::services::{HistoryConfig, VersionHistoryService};
pub use infrastructure::clock::SystemClock;
pub use infrastructure::persistence::{InMemoryVersionRepo, SqliteVersionRepo};
pub use infrastructure::ports::{ClockPort, RepoError, VersionRepo};
pub use use_cases::history::{HistoryError, HistoryUseCases};
