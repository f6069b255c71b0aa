//! Deck table operations for the repository.

use crate::domain::{DeckName, DeckRecord, Rating, TimeMs};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::Repository;

fn row_to_deck(row: &SqliteRow) -> DeckRecord {
    DeckRecord {
        name: DeckName::new(row.get::<String, _>("name")),
        rating: Rating::new(row.get::<f64, _>("mu"), row.get::<f64, _>("sigma")),
        wins: row.get::<i64, _>("wins"),
        losses: row.get::<i64, _>("losses"),
        draws: row.get::<i64, _>("draws"),
        created_at: TimeMs::new(row.get::<i64, _>("created_at")),
    }
}

impl Repository {
    /// Fetch one deck archetype, if present.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_deck(&self, name: &DeckName) -> Result<Option<DeckRecord>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT name, mu, sigma, wins, losses, draws, created_at FROM decks WHERE name = ?",
        )
        .bind(name.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.as_ref().map(row_to_deck))
    }

    /// Insert or fully replace one deck row.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub async fn upsert_deck(&self, deck: &DeckRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO decks (name, mu, sigma, wins, losses, draws, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                mu = excluded.mu,
                sigma = excluded.sigma,
                wins = excluded.wins,
                losses = excluded.losses,
                draws = excluded.draws
            "#,
        )
        .bind(deck.name.as_str())
        .bind(deck.rating.mu)
        .bind(deck.rating.sigma)
        .bind(deck.wins)
        .bind(deck.losses)
        .bind(deck.draws)
        .bind(deck.created_at.as_ms())
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// All deck rows, in name order for determinism.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn all_decks(&self) -> Result<Vec<DeckRecord>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT name, mu, sigma, wins, losses, draws, created_at FROM decks ORDER BY name ASC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(row_to_deck).collect())
    }

    /// Delete one deck row (zero-record garbage collection).
    ///
    /// # Errors
    /// Returns an error if the delete fails.
    pub async fn delete_deck(&self, name: &DeckName) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM decks WHERE name = ?")
            .bind(name.as_str())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Count a deck's participation rows in confirmed, active games.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn active_deck_row_count(&self, name: &DeckName) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n
            FROM deck_matches dm
            JOIN games_master g ON g.id = dm.game_id
            WHERE dm.deck_name = ? AND g.status = 'confirmed' AND g.active = 1
            "#,
        )
        .bind(name.as_str())
        .fetch_one(self.pool())
        .await?;

        Ok(row.get::<i64, _>("n"))
    }
}
