//! Player table operations for the repository.

use crate::domain::{DeckName, PlayerId, PlayerRecord, Rating, TimeMs};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::Repository;

fn row_to_player(row: &SqliteRow) -> PlayerRecord {
    PlayerRecord {
        id: PlayerId::new(row.get::<String, _>("id")),
        rating: Rating::new(row.get::<f64, _>("mu"), row.get::<f64, _>("sigma")),
        wins: row.get::<i64, _>("wins"),
        losses: row.get::<i64, _>("losses"),
        draws: row.get::<i64, _>("draws"),
        last_active: row.get::<Option<i64>, _>("last_active").map(TimeMs::new),
        decay_steps: row.get::<i64, _>("decay_steps"),
        default_deck: row.get::<Option<String>, _>("default_deck").map(DeckName::new),
        created_at: TimeMs::new(row.get::<i64, _>("created_at")),
    }
}

impl Repository {
    /// Fetch one player, if present.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_player(&self, id: &PlayerId) -> Result<Option<PlayerRecord>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, mu, sigma, wins, losses, draws, last_active, decay_steps,
                   default_deck, created_at
            FROM players
            WHERE id = ?
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.as_ref().map(row_to_player))
    }

    /// Insert or fully replace one player row.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub async fn upsert_player(&self, player: &PlayerRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO players (
                id, mu, sigma, wins, losses, draws, last_active, decay_steps,
                default_deck, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                mu = excluded.mu,
                sigma = excluded.sigma,
                wins = excluded.wins,
                losses = excluded.losses,
                draws = excluded.draws,
                last_active = excluded.last_active,
                decay_steps = excluded.decay_steps,
                default_deck = excluded.default_deck
            "#,
        )
        .bind(player.id.as_str())
        .bind(player.rating.mu)
        .bind(player.rating.sigma)
        .bind(player.wins)
        .bind(player.losses)
        .bind(player.draws)
        .bind(player.last_active.map(|t| t.as_ms()))
        .bind(player.decay_steps)
        .bind(player.default_deck.as_ref().map(|d| d.as_str().to_string()))
        .bind(player.created_at.as_ms())
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// All player rows, in id order for determinism.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn all_players(&self) -> Result<Vec<PlayerRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, mu, sigma, wins, losses, draws, last_active, decay_steps,
                   default_deck, created_at
            FROM players
            ORDER BY id ASC
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(row_to_player).collect())
    }

    /// Delete one player row (zero-record garbage collection).
    ///
    /// # Errors
    /// Returns an error if the delete fails.
    pub async fn delete_player(&self, id: &PlayerId) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM players WHERE id = ?")
            .bind(id.as_str())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Count a player's participation rows in confirmed, active games.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn active_match_count(&self, id: &PlayerId) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n
            FROM matches m
            JOIN games_master g ON g.id = m.game_id
            WHERE m.player_id = ? AND g.status = 'confirmed' AND g.active = 1
            "#,
        )
        .bind(id.as_str())
        .fetch_one(self.pool())
        .await?;

        Ok(row.get::<i64, _>("n"))
    }

    /// Set one player's default deck.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn set_default_deck(
        &self,
        id: &PlayerId,
        deck: Option<&DeckName>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE players SET default_deck = ? WHERE id = ?")
            .bind(deck.map(|d| d.as_str().to_string()))
            .bind(id.as_str())
            .execute(self.pool())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use tempfile::TempDir;

    async fn setup() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    #[tokio::test]
    async fn test_upsert_and_get_player() {
        let (repo, _temp) = setup().await;
        let mut player = PlayerRecord::new(PlayerId::new("u1".into()), TimeMs::new(5));
        repo.upsert_player(&player).await.unwrap();

        let loaded = repo.get_player(&player.id).await.unwrap().unwrap();
        assert_eq!(loaded, player);

        player.rating = Rating::new(27.0, 7.0);
        player.wins = 2;
        player.last_active = Some(TimeMs::new(99));
        player.default_deck = Some(DeckName::new("burn".into()));
        repo.upsert_player(&player).await.unwrap();

        let loaded = repo.get_player(&player.id).await.unwrap().unwrap();
        assert_eq!(loaded, player);
    }

    #[tokio::test]
    async fn test_get_missing_player() {
        let (repo, _temp) = setup().await;
        let missing = repo.get_player(&PlayerId::new("ghost".into())).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_delete_player() {
        let (repo, _temp) = setup().await;
        let player = PlayerRecord::new(PlayerId::new("u1".into()), TimeMs::new(0));
        repo.upsert_player(&player).await.unwrap();
        repo.delete_player(&player.id).await.unwrap();
        assert!(repo.get_player(&player.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_all_players_ordered() {
        let (repo, _temp) = setup().await;
        for id in ["b", "a", "c"] {
            repo.upsert_player(&PlayerRecord::new(PlayerId::new(id.into()), TimeMs::new(0)))
                .await
                .unwrap();
        }
        let all = repo.all_players().await.unwrap();
        let ids: Vec<&str> = all.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
