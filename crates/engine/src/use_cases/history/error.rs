//! History browsing errors.

use sheetbinder_domain::VersionId;

use crate::infrastructure::ports::RepoError;

/// Errors that can occur while browsing version history.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("Version not found: {0}")]
    VersionNotFound(VersionId),

    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}
