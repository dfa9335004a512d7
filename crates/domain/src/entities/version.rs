//! Version entity - Immutable checkpoints of a character document
//!
//! A version is written every time the editor reports a change, forming the
//! character's history timeline. Versions are immutable once written, with
//! one exception: a squash pass may patch the squash metadata on the record
//! it produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sheetbinder_domain::{CharacterId, CharacterSheet, VersionId};

/// A version - one durable checkpoint of the edited document plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub id: VersionId,
    pub character_id: CharacterId,
    /// Full copy of the document at the time of the change. Value semantics:
    /// later edits to the live document never alter this snapshot.
    pub snapshot: CharacterSheet,
    /// Human-readable summary of the change that produced this version
    /// (e.g. "Changed name", "Updated stats").
    pub description: String,
    /// When this version was written (assigned by the store).
    pub created_at: DateTime<Utc>,
    /// True only for records produced by a squash pass.
    pub is_squashed: bool,
    /// How many original versions were merged; present only on squashed
    /// records.
    pub squashed_count: Option<u32>,
}

impl Version {
    /// Create a fresh, un-squashed version record.
    ///
    /// The store assigns `id` and `created_at`; the character scope comes
    /// from the snapshot itself.
    pub fn new(
        id: VersionId,
        snapshot: CharacterSheet,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            character_id: snapshot.character_id(),
            snapshot,
            description: description.into(),
            created_at,
            is_squashed: false,
            squashed_count: None,
        }
    }

    /// Apply the squash metadata patch.
    pub fn mark_squashed(&mut self, merged_count: u32) {
        self.is_squashed = true;
        self.squashed_count = Some(merged_count);
    }
}
