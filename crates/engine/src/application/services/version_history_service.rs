//! Version history squashing service.
//!
//! Every edit writes a durable checkpoint immediately, so the latest state
//! never depends on a timer. What the timer controls is readability: once
//! the editor has been quiet for the configured delay, the burst of
//! checkpoints written since the last consolidation is collapsed into a
//! single squashed history entry, keeping the undo/history log scannable.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use sheetbinder_domain::{squash_descriptions, CharacterSheet, Version, VersionId};

use crate::infrastructure::ports::{RepoError, VersionRepo};

/// Configuration for the version history service.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Quiet period after the last edit before pending versions are squashed.
    pub squash_delay: Duration,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            squash_delay: Duration::from_millis(5000),
        }
    }
}

/// Where the service is in its squash cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No pending versions.
    Idle,
    /// Timer armed, at least one version awaiting consolidation.
    Pending,
    /// Timer disarmed by the editor (e.g. entering history view); pending
    /// versions wait for the next edit to re-arm.
    Cancelled,
    /// A squash is draining the pending list. Changes arriving now only
    /// re-arm the timer; no version is written for them.
    Squashing,
}

struct TimerState {
    phase: Phase,
    /// Versions written since the last completed squash, oldest first.
    /// Sole authority for what the next squash collapses.
    pending: Vec<VersionId>,
    /// Invalidates timer tasks from earlier arms.
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

struct ServiceInner {
    versions: Arc<dyn VersionRepo>,
    config: HistoryConfig,
    state: Mutex<TimerState>,
}

/// Records every document mutation as a durable version and collapses rapid
/// bursts into one consolidated history entry after a quiet period.
///
/// Clones share state; hand the editor shell a clone per component that
/// records changes instead of a global lookup.
#[derive(Clone)]
pub struct VersionHistoryService {
    inner: Arc<ServiceInner>,
}

impl VersionHistoryService {
    pub fn new(versions: Arc<dyn VersionRepo>) -> Self {
        Self::build(versions, HistoryConfig::default())
    }

    /// Replace the configuration. Call before the first tracked change;
    /// timers armed earlier keep the delay they were armed with.
    pub fn with_config(self, config: HistoryConfig) -> Self {
        Self::build(Arc::clone(&self.inner.versions), config)
    }

    fn build(versions: Arc<dyn VersionRepo>, config: HistoryConfig) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                versions,
                config,
                state: Mutex::new(TimerState {
                    phase: Phase::Idle,
                    pending: Vec::new(),
                    generation: 0,
                    timer: None,
                }),
            }),
        }
    }

    /// Record one document mutation as a version.
    ///
    /// The debounce timer is re-armed before anything else, so a slow store
    /// write cannot be overtaken by a timer firing for this same change. If
    /// a squash is currently draining, the call is a no-op beyond that timer
    /// reset: the squash output must never re-enter the pending list.
    ///
    /// A store failure propagates to the caller and leaves the pending list
    /// untouched.
    pub async fn track_change(
        &self,
        snapshot: CharacterSheet,
        description: &str,
    ) -> Result<(), RepoError> {
        {
            let mut state = self.inner.state.lock().await;
            ServiceInner::arm_timer(&self.inner, &mut state);
            if state.phase == Phase::Squashing {
                tracing::debug!(
                    description,
                    "change arrived mid-squash; timer re-armed, no version written"
                );
                return Ok(());
            }
        }

        let version = self.inner.versions.save(&snapshot, description).await?;

        let mut state = self.inner.state.lock().await;
        if state.phase == Phase::Squashing {
            // A squash started while the write was in flight. The list it is
            // draining must not grow under it; this record simply stays in
            // history as an individual entry.
            tracing::debug!(
                version_id = %version.id,
                "write landed mid-squash; keeping it as an individual entry"
            );
            return Ok(());
        }
        state.pending.push(version.id);
        state.phase = Phase::Pending;
        tracing::debug!(
            version_id = %version.id,
            pending = state.pending.len(),
            description,
            "tracked change"
        );
        Ok(())
    }

    /// Clear any armed timer and arm a fresh one for the configured delay.
    ///
    /// Called implicitly by every [`track_change`](Self::track_change); the
    /// editor also calls it directly for interactions that should postpone
    /// squashing without producing a version (e.g. opening an edit dialog).
    /// Repeated calls leave exactly one armed timer.
    pub async fn reset_timer(&self) {
        let mut state = self.inner.state.lock().await;
        ServiceInner::arm_timer(&self.inner, &mut state);
        if state.phase == Phase::Cancelled {
            state.phase = Phase::Pending;
        }
    }

    /// Clear the armed timer without re-arming.
    ///
    /// Used when the editor enters a mode where no squashing should happen
    /// (e.g. browsing history). Pending versions are retained and will be
    /// consolidated once a later edit re-arms the timer. A squash that has
    /// already started is not aborted.
    pub async fn cancel_timer(&self) {
        let mut state = self.inner.state.lock().await;
        ServiceInner::disarm_timer(&mut state);
        if state.phase == Phase::Pending {
            state.phase = Phase::Cancelled;
        }
        tracing::debug!(pending = state.pending.len(), "squash timer cancelled");
    }

    /// Number of versions written since the last completed squash.
    pub async fn unsquashed_count(&self) -> usize {
        self.inner.state.lock().await.pending.len()
    }

    /// Whether a debounce timer is currently armed.
    pub async fn is_timer_active(&self) -> bool {
        self.inner.state.lock().await.timer.is_some()
    }

    /// Whether a squash is currently executing.
    pub async fn is_squashing(&self) -> bool {
        self.inner.state.lock().await.phase == Phase::Squashing
    }
}

impl ServiceInner {
    /// Replace any armed timer with a fresh one for the configured delay.
    ///
    /// Each arm bumps the generation; a sleeping task from an earlier arm
    /// wakes, sees a newer generation, and returns without firing. The task
    /// holds only a weak reference, so dropping the service disarms
    /// everything outstanding.
    fn arm_timer(inner: &Arc<ServiceInner>, state: &mut TimerState) {
        Self::disarm_timer(state);
        let generation = state.generation;
        let delay = inner.config.squash_delay;
        let weak = Arc::downgrade(inner);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                Self::fire(inner, generation).await;
            }
        }));
    }

    fn disarm_timer(state: &mut TimerState) {
        if let Some(handle) = state.timer.take() {
            handle.abort();
        }
        state.generation = state.generation.wrapping_add(1);
    }

    /// Timer expiry: the only trigger for a squash.
    async fn fire(inner: Arc<ServiceInner>, generation: u64) {
        let drained = {
            let mut state = inner.state.lock().await;
            if state.generation != generation {
                return; // superseded by a later arm
            }
            // Detach ourselves from the state so cancel_timer cannot abort
            // a squash that has already begun.
            state.timer = None;
            // A timer re-armed mid-squash can expire while the squash is
            // still draining; never start a second one.
            if state.phase == Phase::Squashing {
                return;
            }
            if state.pending.is_empty() {
                state.phase = Phase::Idle;
                return;
            }
            state.phase = Phase::Squashing;
            std::mem::take(&mut state.pending)
        };

        let tracked = drained.len();
        tracing::debug!(tracked, "quiet period elapsed; squashing pending versions");

        match inner.squash(&drained).await {
            Ok(Some(version)) => tracing::info!(
                version_id = %version.id,
                merged = tracked,
                description = %version.description,
                "squashed pending versions into one history entry"
            ),
            Ok(None) => tracing::debug!("no tracked versions remained; nothing to squash"),
            // No retry: the next edit starts a fresh cycle. The cost is one
            // less-consolidated stretch of history, not lost data.
            Err(error) => tracing::warn!(%error, "squash failed; abandoning this cycle"),
        }

        let mut state = inner.state.lock().await;
        state.phase = Phase::Idle;
        state.pending.clear();
        Self::disarm_timer(&mut state);
    }

    /// One squash pass over the drained id list.
    ///
    /// Ids whose record was purged externally are dropped silently. The most
    /// recently created survivor contributes the snapshot; every survivor
    /// contributes its description, in chronological order. The originals
    /// are deleted in one batch, then the consolidated version is written
    /// and patched with squash metadata.
    async fn squash(&self, tracked: &[VersionId]) -> Result<Option<Version>, RepoError> {
        let mut valid: Vec<Version> = Vec::with_capacity(tracked.len());
        for &id in tracked {
            match self.versions.get(id).await? {
                Some(version) => valid.push(version),
                None => tracing::debug!(version_id = %id, "tracked version no longer exists; dropping"),
            }
        }

        // max_by_key keeps the last maximal element, so ties on timestamp
        // resolve to the latest-tracked record.
        let Some(representative) = valid.iter().max_by_key(|v| v.created_at) else {
            return Ok(None);
        };
        let representative = representative.snapshot.clone();

        let descriptions: Vec<&str> = valid.iter().map(|v| v.description.as_str()).collect();
        let combined = squash_descriptions(&descriptions);
        let merged_count = valid.len() as u32;

        self.versions.delete_batch(tracked).await?;

        let mut squashed = self.versions.save(&representative, &combined).await?;
        self.versions.mark_squashed(squashed.id, merged_count).await?;
        squashed.mark_squashed(merged_count);

        Ok(Some(squashed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    use sheetbinder_domain::{CharacterId, SheetValue};

    use crate::infrastructure::persistence::InMemoryVersionRepo;
    use crate::infrastructure::ports::MockVersionRepo;

    fn sheet(character_id: CharacterId, name: &str, might: i64) -> CharacterSheet {
        CharacterSheet::new(character_id, name)
            .with_value("MIGHT_POOL", SheetValue::Integer(might))
    }

    fn service_with_delay(
        repo: Arc<InMemoryVersionRepo>,
        delay_ms: u64,
    ) -> VersionHistoryService {
        // RUST_LOG=debug makes timing failures much easier to read
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
        VersionHistoryService::new(repo).with_config(HistoryConfig {
            squash_delay: Duration::from_millis(delay_ms),
        })
    }

    async fn settle(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test]
    async fn test_burst_collapses_to_single_squashed_version() {
        let repo = Arc::new(InMemoryVersionRepo::new());
        let service = service_with_delay(repo.clone(), 50);
        let character_id = CharacterId::new();

        let descriptions = [
            "Changed name",
            "Changed name",
            "Updated stats",
            "Added cypher",
            "Updated background",
        ];
        for (i, description) in descriptions.iter().enumerate() {
            service
                .track_change(sheet(character_id, "Arenth", i as i64), description)
                .await
                .unwrap();
        }
        assert_eq!(service.unsquashed_count().await, 5);
        assert!(service.is_timer_active().await);

        settle(200).await;

        let history = repo.list_for_character(character_id).await.unwrap();
        assert_eq!(history.len(), 1);
        let squashed = &history[0];
        assert!(squashed.is_squashed);
        assert_eq!(squashed.squashed_count, Some(5));
        assert_eq!(
            squashed.description,
            "Changed name, Updated stats, Added cypher"
        );
        // The newest snapshot is the consolidated state
        assert_eq!(
            squashed.snapshot.get("MIGHT_POOL"),
            Some(&SheetValue::Integer(4))
        );

        assert_eq!(service.unsquashed_count().await, 0);
        assert!(!service.is_timer_active().await);
        assert!(!service.is_squashing().await);
    }

    #[tokio::test]
    async fn test_single_change_still_squashes() {
        let repo = Arc::new(InMemoryVersionRepo::new());
        let service = service_with_delay(repo.clone(), 50);
        let character_id = CharacterId::new();

        service
            .track_change(sheet(character_id, "Arenth", 1), "Changed name")
            .await
            .unwrap();
        settle(200).await;

        let history = repo.list_for_character(character_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].is_squashed);
        assert_eq!(history[0].squashed_count, Some(1));
        assert_eq!(history[0].description, "Changed name");
    }

    #[tokio::test]
    async fn test_separate_quiet_periods_produce_separate_entries() {
        let repo = Arc::new(InMemoryVersionRepo::new());
        let service = service_with_delay(repo.clone(), 50);
        let character_id = CharacterId::new();

        service
            .track_change(sheet(character_id, "Arenth", 1), "Changed name")
            .await
            .unwrap();
        settle(200).await;
        service
            .track_change(sheet(character_id, "Arenth", 2), "Updated stats")
            .await
            .unwrap();
        settle(200).await;

        let history = repo.list_for_character(character_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|v| v.squashed_count == Some(1)));
    }

    #[tokio::test]
    async fn test_reset_timer_postpones_and_fires_once() {
        let repo = Arc::new(InMemoryVersionRepo::new());
        let service = service_with_delay(repo.clone(), 200);
        let character_id = CharacterId::new();

        service
            .track_change(sheet(character_id, "Arenth", 1), "Changed name")
            .await
            .unwrap();

        // Several resets without an intervening change: still one armed
        // timer, and the original deadline no longer applies.
        settle(100).await;
        service.reset_timer().await;
        service.reset_timer().await;
        service.reset_timer().await;

        settle(120).await; // past the original deadline, before the new one
        assert_eq!(service.unsquashed_count().await, 1);
        assert_eq!(repo.len().await, 1);
        let not_yet = repo.list_for_character(character_id).await.unwrap();
        assert!(!not_yet[0].is_squashed);

        settle(200).await;
        let history = repo.list_for_character(character_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].is_squashed);
        assert_eq!(history[0].squashed_count, Some(1));
    }

    #[tokio::test]
    async fn test_cancel_timer_leaves_history_unconsolidated() {
        let repo = Arc::new(InMemoryVersionRepo::new());
        let service = service_with_delay(repo.clone(), 50);
        let character_id = CharacterId::new();

        service
            .track_change(sheet(character_id, "Arenth", 1), "Changed name")
            .await
            .unwrap();
        service.cancel_timer().await;
        assert!(!service.is_timer_active().await);

        settle(200).await;

        // No squash ran; the individual record is still there and still
        // tracked for a future cycle.
        let history = repo.list_for_character(character_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(!history[0].is_squashed);
        assert_eq!(service.unsquashed_count().await, 1);

        // The next edit re-arms and consolidates both.
        service
            .track_change(sheet(character_id, "Arenth", 2), "Updated stats")
            .await
            .unwrap();
        settle(200).await;

        let history = repo.list_for_character(character_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].is_squashed);
        assert_eq!(history[0].squashed_count, Some(2));
        assert_eq!(history[0].description, "Changed name, Updated stats");
    }

    #[tokio::test]
    async fn test_failed_save_propagates_and_is_not_tracked() {
        let mut mock = MockVersionRepo::new();
        mock.expect_save()
            .returning(|_, _| Err(RepoError::database("save_version", "disk full")));
        let service = VersionHistoryService::new(Arc::new(mock)).with_config(HistoryConfig {
            squash_delay: Duration::from_millis(50),
        });

        let result = service
            .track_change(sheet(CharacterId::new(), "Arenth", 1), "Changed name")
            .await;
        assert!(result.is_err());
        assert_eq!(service.unsquashed_count().await, 0);
    }

    #[tokio::test]
    async fn test_externally_purged_ids_are_dropped_from_squash() {
        let repo = Arc::new(InMemoryVersionRepo::new());
        let service = service_with_delay(repo.clone(), 100);
        let character_id = CharacterId::new();

        service
            .track_change(sheet(character_id, "Arenth", 1), "Changed name")
            .await
            .unwrap();
        service
            .track_change(sheet(character_id, "Arenth", 2), "Updated stats")
            .await
            .unwrap();

        // Purge the older record behind the service's back
        let oldest = repo
            .list_for_character(character_id)
            .await
            .unwrap()
            .pop()
            .unwrap();
        repo.delete_batch(&[oldest.id]).await.unwrap();

        settle(300).await;

        let history = repo.list_for_character(character_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].is_squashed);
        assert_eq!(history[0].squashed_count, Some(1));
        assert_eq!(history[0].description, "Updated stats");
    }

    #[tokio::test]
    async fn test_all_ids_purged_squash_is_a_no_op() {
        let repo = Arc::new(InMemoryVersionRepo::new());
        let service = service_with_delay(repo.clone(), 50);
        let character_id = CharacterId::new();

        service
            .track_change(sheet(character_id, "Arenth", 1), "Changed name")
            .await
            .unwrap();
        let only = repo.list_for_character(character_id).await.unwrap();
        repo.delete_batch(&[only[0].id]).await.unwrap();

        settle(200).await;

        assert!(repo.is_empty().await);
        assert_eq!(service.unsquashed_count().await, 0);
        assert!(!service.is_timer_active().await);
    }

    /// Delegates to an in-memory repo but holds every batch delete open,
    /// widening the window in which a squash is observably in progress.
    struct SlowDeleteRepo {
        inner: InMemoryVersionRepo,
        delete_delay: Duration,
    }

    #[async_trait]
    impl VersionRepo for SlowDeleteRepo {
        async fn save(
            &self,
            snapshot: &CharacterSheet,
            description: &str,
        ) -> Result<Version, RepoError> {
            self.inner.save(snapshot, description).await
        }

        async fn get(&self, id: VersionId) -> Result<Option<Version>, RepoError> {
            self.inner.get(id).await
        }

        async fn list_for_character(
            &self,
            character_id: CharacterId,
        ) -> Result<Vec<Version>, RepoError> {
            self.inner.list_for_character(character_id).await
        }

        async fn delete_batch(&self, ids: &[VersionId]) -> Result<(), RepoError> {
            tokio::time::sleep(self.delete_delay).await;
            self.inner.delete_batch(ids).await
        }

        async fn mark_squashed(&self, id: VersionId, merged_count: u32) -> Result<(), RepoError> {
            self.inner.mark_squashed(id, merged_count).await
        }
    }

    #[tokio::test]
    async fn test_change_during_squash_is_not_written() {
        let repo = Arc::new(SlowDeleteRepo {
            inner: InMemoryVersionRepo::new(),
            delete_delay: Duration::from_millis(150),
        });
        let service = VersionHistoryService::new(repo.clone()).with_config(HistoryConfig {
            squash_delay: Duration::from_millis(50),
        });
        let character_id = CharacterId::new();

        service
            .track_change(sheet(character_id, "Arenth", 1), "Changed name")
            .await
            .unwrap();

        // Land inside the slow batch delete
        settle(100).await;
        assert!(service.is_squashing().await);
        service
            .track_change(sheet(character_id, "Arenth", 2), "Updated stats")
            .await
            .unwrap();

        settle(400).await;

        // Only the squash output exists; the mid-squash change was never
        // written and nothing re-entered the pending list.
        let history = repo.inner.list_for_character(character_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].is_squashed);
        assert_eq!(history[0].squashed_count, Some(1));
        assert_eq!(history[0].description, "Changed name");
        assert_eq!(service.unsquashed_count().await, 0);
        assert!(!service.is_squashing().await);
    }

    /// Fails the first batch delete, then recovers.
    struct FlakyDeleteRepo {
        inner: InMemoryVersionRepo,
        failed_once: AtomicBool,
    }

    #[async_trait]
    impl VersionRepo for FlakyDeleteRepo {
        async fn save(
            &self,
            snapshot: &CharacterSheet,
            description: &str,
        ) -> Result<Version, RepoError> {
            self.inner.save(snapshot, description).await
        }

        async fn get(&self, id: VersionId) -> Result<Option<Version>, RepoError> {
            self.inner.get(id).await
        }

        async fn list_for_character(
            &self,
            character_id: CharacterId,
        ) -> Result<Vec<Version>, RepoError> {
            self.inner.list_for_character(character_id).await
        }

        async fn delete_batch(&self, ids: &[VersionId]) -> Result<(), RepoError> {
            if !self.failed_once.swap(true, Ordering::SeqCst) {
                return Err(RepoError::database("delete_versions", "simulated failure"));
            }
            self.inner.delete_batch(ids).await
        }

        async fn mark_squashed(&self, id: VersionId, merged_count: u32) -> Result<(), RepoError> {
            self.inner.mark_squashed(id, merged_count).await
        }
    }

    #[tokio::test]
    async fn test_squash_failure_resets_state_and_next_cycle_succeeds() {
        let repo = Arc::new(FlakyDeleteRepo {
            inner: InMemoryVersionRepo::new(),
            failed_once: AtomicBool::new(false),
        });
        let service = VersionHistoryService::new(repo.clone()).with_config(HistoryConfig {
            squash_delay: Duration::from_millis(50),
        });
        let character_id = CharacterId::new();

        service
            .track_change(sheet(character_id, "Arenth", 1), "Changed name")
            .await
            .unwrap();
        settle(200).await;

        // The squash failed: state fully reset, the individual record kept.
        assert_eq!(service.unsquashed_count().await, 0);
        assert!(!service.is_squashing().await);
        assert!(!service.is_timer_active().await);
        let history = repo.inner.list_for_character(character_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(!history[0].is_squashed);

        // The next edit starts a fresh cycle, which succeeds. The abandoned
        // record was dropped from tracking, so it survives as-is.
        service
            .track_change(sheet(character_id, "Arenth", 2), "Updated stats")
            .await
            .unwrap();
        settle(200).await;

        let history = repo.inner.list_for_character(character_id).await.unwrap();
        assert_eq!(history.len(), 2);
        let newest = &history[0];
        assert!(newest.is_squashed);
        assert_eq!(newest.squashed_count, Some(1));
        assert_eq!(newest.description, "Updated stats");
    }

    #[tokio::test]
    async fn test_reset_timer_alone_never_squashes_anything() {
        let repo = Arc::new(InMemoryVersionRepo::new());
        let service = service_with_delay(repo.clone(), 50);

        service.reset_timer().await;
        assert!(service.is_timer_active().await);
        settle(200).await;

        assert!(repo.is_empty().await);
        assert!(!service.is_timer_active().await);
        assert_eq!(service.unsquashed_count().await, 0);
    }
}
