//! Repository port traits for version storage.

use async_trait::async_trait;

use sheetbinder_domain::{CharacterId, CharacterSheet, Version, VersionId};

use super::error::RepoError;

/// Append-only store for version records.
///
/// The store owns identity and time: it assigns each record's id and
/// creation timestamp. Records are immutable after the fact except for the
/// squash metadata patch.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VersionRepo: Send + Sync {
    /// Persist a new version of the given snapshot and return the saved
    /// record, id and timestamp assigned.
    async fn save(
        &self,
        snapshot: &CharacterSheet,
        description: &str,
    ) -> Result<Version, RepoError>;

    /// Fetch a single version, or `None` if it no longer exists.
    async fn get(&self, id: VersionId) -> Result<Option<Version>, RepoError>;

    /// All versions for one character, newest first.
    async fn list_for_character(
        &self,
        character_id: CharacterId,
    ) -> Result<Vec<Version>, RepoError>;

    /// Delete the listed versions in a single transaction. Ids that no
    /// longer exist are ignored.
    async fn delete_batch(&self, ids: &[VersionId]) -> Result<(), RepoError>;

    /// Patch an existing record with squash metadata (`is_squashed = true`
    /// and the merged-version count).
    async fn mark_squashed(&self, id: VersionId, merged_count: u32) -> Result<(), RepoError>;
}
