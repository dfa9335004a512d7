//! Version history browsing use cases.
//!
//! The read side of history: listing a character's timeline, inspecting a
//! single version, and pulling a snapshot back out for restore. Writing
//! history belongs to
//! [`VersionHistoryService`](crate::application::services::VersionHistoryService).

mod error;

pub use error::HistoryError;

use std::sync::Arc;

use sheetbinder_domain::{CharacterId, CharacterSheet, Version, VersionId};

use crate::infrastructure::ports::VersionRepo;

/// Container for history browsing use cases.
pub struct HistoryUseCases {
    versions: Arc<dyn VersionRepo>,
}

impl HistoryUseCases {
    pub fn new(versions: Arc<dyn VersionRepo>) -> Self {
        Self { versions }
    }

    /// A character's version timeline, newest first.
    pub async fn list_history(
        &self,
        character_id: CharacterId,
    ) -> Result<Vec<Version>, HistoryError> {
        let history = self.versions.list_for_character(character_id).await?;

        tracing::debug!(
            character_id = %character_id,
            versions = history.len(),
            "Listed version history"
        );

        Ok(history)
    }

    /// Fetch one version.
    pub async fn get_version(&self, id: VersionId) -> Result<Version, HistoryError> {
        self.versions
            .get(id)
            .await?
            .ok_or(HistoryError::VersionNotFound(id))
    }

    /// The snapshot stored in a version, for the editor to apply as the
    /// live document.
    ///
    /// Restoring does not itself write history; the editor's next save will
    /// record a fresh version on top.
    pub async fn snapshot_to_restore(
        &self,
        id: VersionId,
    ) -> Result<CharacterSheet, HistoryError> {
        let version = self.get_version(id).await?;

        tracing::info!(
            version_id = %id,
            character_id = %version.character_id,
            "Restoring snapshot from history"
        );

        Ok(version.snapshot)
    }
}
