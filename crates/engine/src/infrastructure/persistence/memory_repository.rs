//! In-memory version storage.
//!
//! Backs tests and ephemeral (unsaved-collection) editor sessions. Ordering
//! falls back to an insertion sequence so that records written within the
//! same clock tick still list deterministically.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use sheetbinder_domain::{CharacterId, CharacterSheet, Version, VersionId};

use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::ports::{ClockPort, RepoError, VersionRepo};

#[derive(Default)]
struct MemoryState {
    versions: HashMap<VersionId, (Version, u64)>,
    next_seq: u64,
}

/// In-memory implementation of the version store.
pub struct InMemoryVersionRepo {
    clock: Arc<dyn ClockPort>,
    state: RwLock<MemoryState>,
}

impl InMemoryVersionRepo {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn ClockPort>) -> Self {
        Self {
            clock,
            state: RwLock::new(MemoryState::default()),
        }
    }

    /// Number of stored versions, across all characters.
    pub async fn len(&self) -> usize {
        self.state.read().await.versions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.versions.is_empty()
    }
}

impl Default for InMemoryVersionRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VersionRepo for InMemoryVersionRepo {
    async fn save(
        &self,
        snapshot: &CharacterSheet,
        description: &str,
    ) -> Result<Version, RepoError> {
        let version = Version::new(
            VersionId::new(),
            snapshot.clone(),
            description,
            self.clock.now(),
        );

        let mut state = self.state.write().await;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.versions.insert(version.id, (version.clone(), seq));

        Ok(version)
    }

    async fn get(&self, id: VersionId) -> Result<Option<Version>, RepoError> {
        let state = self.state.read().await;
        Ok(state.versions.get(&id).map(|(version, _)| version.clone()))
    }

    async fn list_for_character(
        &self,
        character_id: CharacterId,
    ) -> Result<Vec<Version>, RepoError> {
        let state = self.state.read().await;
        let mut entries: Vec<&(Version, u64)> = state
            .versions
            .values()
            .filter(|(version, _)| version.character_id == character_id)
            .collect();
        entries.sort_by(|(a, a_seq), (b, b_seq)| {
            (b.created_at, b_seq).cmp(&(a.created_at, a_seq))
        });
        Ok(entries.into_iter().map(|(version, _)| version.clone()).collect())
    }

    async fn delete_batch(&self, ids: &[VersionId]) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        for id in ids {
            state.versions.remove(id);
        }
        Ok(())
    }

    async fn mark_squashed(&self, id: VersionId, merged_count: u32) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        match state.versions.get_mut(&id) {
            Some((version, _)) => {
                version.mark_squashed(merged_count);
                Ok(())
            }
            None => Err(RepoError::not_found("Version", id)),
        }
    }
}
