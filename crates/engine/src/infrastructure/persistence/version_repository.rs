//! SQLite-backed version storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

use sheetbinder_domain::{CharacterId, CharacterSheet, Version, VersionId};

use crate::infrastructure::ports::{ClockPort, RepoError, VersionRepo};

/// SQLite implementation of the version store.
///
/// Snapshots are stored as JSON text; timestamps come from the injected
/// clock so tests can pin them.
pub struct SqliteVersionRepo {
    pool: SqlitePool,
    clock: Arc<dyn ClockPort>,
}

impl SqliteVersionRepo {
    pub async fn new(db_path: &str, clock: Arc<dyn ClockPort>) -> Result<Self, RepoError> {
        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", db_path))
            .await
            .map_err(|e| RepoError::database("versions", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS versions (
                id TEXT PRIMARY KEY,
                character_id TEXT NOT NULL,
                snapshot_json TEXT NOT NULL,
                description TEXT NOT NULL,
                created_at TEXT NOT NULL,
                is_squashed INTEGER NOT NULL DEFAULT 0,
                squashed_count INTEGER
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| RepoError::database("versions", e))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_versions_character
             ON versions (character_id, created_at)",
        )
        .execute(&pool)
        .await
        .map_err(|e| RepoError::database("versions", e))?;

        Ok(Self { pool, clock })
    }

    fn row_to_version(row: &sqlx::sqlite::SqliteRow) -> Result<Version, RepoError> {
        let id: String = row.get("id");
        let id = Uuid::parse_str(&id)
            .map(VersionId::from_uuid)
            .map_err(|e| RepoError::serialization(format!("bad version id {id}: {e}")))?;

        let snapshot_json: String = row.get("snapshot_json");
        let snapshot: CharacterSheet = serde_json::from_str(&snapshot_json)
            .map_err(|e| RepoError::Serialization(e.to_string()))?;

        let created_at: String = row.get("created_at");
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RepoError::serialization(format!("bad timestamp {created_at}: {e}")))?;

        let squashed_count: Option<i64> = row.get("squashed_count");

        Ok(Version {
            id,
            character_id: snapshot.character_id(),
            snapshot,
            description: row.get("description"),
            created_at,
            is_squashed: row.get("is_squashed"),
            squashed_count: squashed_count.and_then(|c| u32::try_from(c).ok()),
        })
    }
}

#[async_trait]
impl VersionRepo for SqliteVersionRepo {
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
        let snapshot_json = serde_json::to_string(&version.snapshot)
            .map_err(|e| RepoError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO versions (id, character_id, snapshot_json, description, created_at, is_squashed, squashed_count)
            VALUES (?, ?, ?, ?, ?, 0, NULL)
            "#,
        )
        .bind(version.id.to_string())
        .bind(version.character_id.to_string())
        .bind(snapshot_json)
        .bind(description)
        .bind(version.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("save_version", e))?;

        Ok(version)
    }

    async fn get(&self, id: VersionId) -> Result<Option<Version>, RepoError> {
        let row = sqlx::query("SELECT * FROM versions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("get_version", e))?;

        match row {
            Some(row) => Ok(Some(Self::row_to_version(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_for_character(
        &self,
        character_id: CharacterId,
    ) -> Result<Vec<Version>, RepoError> {
        let rows = sqlx::query(
            "SELECT * FROM versions WHERE character_id = ?
             ORDER BY created_at DESC, rowid DESC",
        )
        .bind(character_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("list_versions", e))?;

        rows.iter().map(Self::row_to_version).collect()
    }

    async fn delete_batch(&self, ids: &[VersionId]) -> Result<(), RepoError> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("delete_versions", e))?;

        for id in ids {
            sqlx::query("DELETE FROM versions WHERE id = ?")
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| RepoError::database("delete_versions", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| RepoError::database("delete_versions", e))?;

        Ok(())
    }

    async fn mark_squashed(&self, id: VersionId, merged_count: u32) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE versions SET is_squashed = 1, squashed_count = ? WHERE id = ?",
        )
        .bind(i64::from(merged_count))
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("mark_squashed", e))?;

        if result.rows_affected() == 0 {
            return Err(RepoError::not_found("Version", id));
        }

        Ok(())
    }
}
