//! Append-only rating change log.

use crate::domain::{Actor, AuditEntry, ChangeKind, EntityImage, EntityKind, TimeMs};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::Repository;

fn image(row: &SqliteRow, suffix: &str) -> EntityImage {
    EntityImage {
        mu: row.get::<f64, _>(format!("mu_{}", suffix).as_str()),
        sigma: row.get::<f64, _>(format!("sigma_{}", suffix).as_str()),
        elo: row.get::<i64, _>(format!("elo_{}", suffix).as_str()),
        wins: row.get::<i64, _>(format!("wins_{}", suffix).as_str()),
        losses: row.get::<i64, _>(format!("losses_{}", suffix).as_str()),
        draws: row.get::<i64, _>(format!("draws_{}", suffix).as_str()),
    }
}

fn row_to_entry(row: &SqliteRow) -> AuditEntry {
    let params = serde_json::from_str(&row.get::<String, _>("params"))
        .unwrap_or(serde_json::Value::Null);
    AuditEntry {
        target_kind: EntityKind::parse(&row.get::<String, _>("target_kind"))
            .unwrap_or(EntityKind::Player),
        target_id: row.get::<String, _>("target_id"),
        change_kind: ChangeKind::parse(&row.get::<String, _>("change_kind"))
            .unwrap_or(ChangeKind::Game),
        before: image(row, "before"),
        after: image(row, "after"),
        actor: Actor::new(row.get::<String, _>("actor")),
        params,
        created_at: TimeMs::new(row.get::<i64, _>("created_at")),
    }
}

impl Repository {
    /// Append one entry to the rating change log. The core treats this as
    /// diagnostic: callers log a failed append and move on, they never roll
    /// back the mutation it describes.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn append_audit(&self, entry: &AuditEntry) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO rating_changes (
                target_kind, target_id, change_kind,
                mu_before, sigma_before, elo_before, wins_before, losses_before, draws_before,
                mu_after, sigma_after, elo_after, wins_after, losses_after, draws_after,
                actor, params, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.target_kind.as_str())
        .bind(entry.target_id.as_str())
        .bind(entry.change_kind.as_str())
        .bind(entry.before.mu)
        .bind(entry.before.sigma)
        .bind(entry.before.elo)
        .bind(entry.before.wins)
        .bind(entry.before.losses)
        .bind(entry.before.draws)
        .bind(entry.after.mu)
        .bind(entry.after.sigma)
        .bind(entry.after.elo)
        .bind(entry.after.wins)
        .bind(entry.after.losses)
        .bind(entry.after.draws)
        .bind(entry.actor.as_str())
        .bind(entry.params.to_string())
        .bind(entry.created_at.as_ms())
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Newest-first audit entries for one target.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn audit_history(
        &self,
        target_kind: EntityKind,
        target_id: &str,
        limit: i64,
    ) -> Result<Vec<AuditEntry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT target_kind, target_id, change_kind,
                   mu_before, sigma_before, elo_before, wins_before, losses_before, draws_before,
                   mu_after, sigma_after, elo_after, wins_after, losses_after, draws_after,
                   actor, params, created_at
            FROM rating_changes
            WHERE target_kind = ? AND target_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(target_kind.as_str())
        .bind(target_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(row_to_entry).collect())
    }
}
