//! Participation row operations for both entity kinds.

use crate::domain::{DeckMatchRow, DeckName, MatchRow, Outcome, PlayerId, Rating};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::Repository;

fn row_to_match(row: &SqliteRow) -> MatchRow {
    MatchRow {
        id: row.get::<i64, _>("id"),
        game_id: row.get::<i64, _>("game_id"),
        player_id: PlayerId::new(row.get::<String, _>("player_id")),
        outcome: Outcome::parse(&row.get::<String, _>("outcome")).unwrap_or(Outcome::Loss),
        turn_order: row.get::<Option<i64>, _>("turn_order"),
        rating_after: Rating::new(row.get::<f64, _>("mu_after"), row.get::<f64, _>("sigma_after")),
        deck: row.get::<Option<String>, _>("deck").map(DeckName::new),
    }
}

fn row_to_deck_match(row: &SqliteRow) -> DeckMatchRow {
    DeckMatchRow {
        id: row.get::<i64, _>("id"),
        game_id: row.get::<i64, _>("game_id"),
        deck_name: DeckName::new(row.get::<String, _>("deck_name")),
        outcome: Outcome::parse(&row.get::<String, _>("outcome")).unwrap_or(Outcome::Loss),
        turn_order: row.get::<Option<i64>, _>("turn_order"),
        rating_after: Rating::new(row.get::<f64, _>("mu_after"), row.get::<f64, _>("sigma_after")),
    }
}

impl Repository {
    /// Player participation rows of one game, in row order.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn match_rows_for_game(&self, game_id: i64) -> Result<Vec<MatchRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, game_id, player_id, outcome, turn_order, mu_after, sigma_after, deck
            FROM matches WHERE game_id = ? ORDER BY id ASC
            "#,
        )
        .bind(game_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(row_to_match).collect())
    }

    /// Deck participation rows of one game, in row order.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn deck_rows_for_game(&self, game_id: i64) -> Result<Vec<DeckMatchRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, game_id, deck_name, outcome, turn_order, mu_after, sigma_after
            FROM deck_matches WHERE game_id = ? ORDER BY id ASC
            "#,
        )
        .bind(game_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(row_to_deck_match).collect())
    }

    /// Rewrite the stored post-game rating of one player row (replay).
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn update_match_rating(
        &self,
        row_id: i64,
        rating: Rating,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE matches SET mu_after = ?, sigma_after = ? WHERE id = ?")
            .bind(rating.mu)
            .bind(rating.sigma)
            .bind(row_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Rewrite the stored post-game rating of one deck row (replay).
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn update_deck_match_rating(
        &self,
        row_id: i64,
        rating: Rating,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE deck_matches SET mu_after = ?, sigma_after = ? WHERE id = ?")
            .bind(rating.mu)
            .bind(rating.sigma)
            .bind(row_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Reassign the deck of one player's seat in one game. Returns how many
    /// rows changed (0 when the player has no seat in the game).
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn update_match_deck(
        &self,
        game_id: i64,
        player_id: &PlayerId,
        deck: Option<&DeckName>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE matches SET deck = ? WHERE game_id = ? AND player_id = ?")
            .bind(deck.map(|d| d.as_str().to_string()))
            .bind(game_id)
            .bind(player_id.as_str())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    /// Set the deck of one player row by row id (snapshot restore path).
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn set_match_deck_by_id(
        &self,
        row_id: i64,
        deck: Option<&DeckName>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE matches SET deck = ? WHERE id = ?")
            .bind(deck.map(|d| d.as_str().to_string()))
            .bind(row_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Update the turn order of one player row.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn update_match_turn_order(
        &self,
        row_id: i64,
        turn_order: Option<i64>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE matches SET turn_order = ? WHERE id = ?")
            .bind(turn_order)
            .bind(row_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Update the turn order of one deck row.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn update_deck_turn_order(
        &self,
        row_id: i64,
        turn_order: Option<i64>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE deck_matches SET turn_order = ? WHERE id = ?")
            .bind(turn_order)
            .bind(row_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// A player's rows with no deck assigned, for retroactive default-deck
    /// rewrites. Returns `(row id, game id)` pairs.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn unassigned_match_rows(
        &self,
        player_id: &PlayerId,
    ) -> Result<Vec<(i64, i64)>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, game_id FROM matches WHERE player_id = ? AND deck IS NULL ORDER BY id ASC",
        )
        .bind(player_id.as_str())
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get::<i64, _>("id"), row.get::<i64, _>("game_id")))
            .collect())
    }

    /// Rebuild one game's deck rows from its player rows' deck assignments.
    /// Rating columns are placeholders until the next deck replay rewrites
    /// them.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn regenerate_deck_rows(&self, game_id: i64) -> Result<usize, sqlx::Error> {
        let match_rows = self.match_rows_for_game(game_id).await?;

        let mut tx = self.pool().begin().await?;
        sqlx::query("DELETE FROM deck_matches WHERE game_id = ?")
            .bind(game_id)
            .execute(&mut *tx)
            .await?;

        let mut inserted = 0usize;
        for row in &match_rows {
            let Some(deck) = &row.deck else { continue };
            sqlx::query(
                r#"
                INSERT INTO deck_matches (game_id, deck_name, outcome, turn_order, mu_after, sigma_after)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(game_id)
            .bind(deck.as_str())
            .bind(row.outcome.as_str())
            .bind(row.turn_order)
            .bind(row.rating_after.mu)
            .bind(row.rating_after.sigma)
            .execute(&mut *tx)
            .await?;
            inserted += 1;
        }

        tx.commit().await?;
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::db::repo::{NewGame, NewSeat};
    use crate::domain::{Actor, EntityKind, TimeMs};
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

    fn seat(id: &str, outcome: Outcome, deck: Option<&str>) -> NewSeat {
        NewSeat {
            entity_id: id.to_string(),
            outcome,
            turn_order: None,
            rating_after: Rating::default(),
            deck: deck.map(|d| DeckName::new(d.to_string())),
        }
    }

    async fn insert_hybrid(repo: &Repository) -> i64 {
        let (game, _, _) = repo
            .insert_game_with_rows(
                NewGame {
                    kind: EntityKind::Player,
                    sequence: 1.0,
                    submitted_by: Actor::new("u1".into()),
                    admin_submitted: false,
                    created_at: TimeMs::new(0),
                },
                &[
                    seat("u1", Outcome::Win, Some("burn")),
                    seat("u2", Outcome::Loss, None),
                ],
                &[seat("burn", Outcome::Win, None)],
            )
            .await
            .unwrap();
        game.id
    }

    #[tokio::test]
    async fn test_update_match_rating() {
        let (repo, _temp) = setup().await;
        let game_id = insert_hybrid(&repo).await;
        let rows = repo.match_rows_for_game(game_id).await.unwrap();

        let new_rating = Rating::new(28.5, 6.2);
        repo.update_match_rating(rows[0].id, new_rating)
            .await
            .unwrap();

        let rows = repo.match_rows_for_game(game_id).await.unwrap();
        assert_eq!(rows[0].rating_after, new_rating);
    }

    #[tokio::test]
    async fn test_update_match_deck_and_regenerate() {
        let (repo, _temp) = setup().await;
        let game_id = insert_hybrid(&repo).await;

        let changed = repo
            .update_match_deck(
                game_id,
                &PlayerId::new("u2".into()),
                Some(&DeckName::new("stax".into())),
            )
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let inserted = repo.regenerate_deck_rows(game_id).await.unwrap();
        assert_eq!(inserted, 2);
        let deck_rows = repo.deck_rows_for_game(game_id).await.unwrap();
        let names: Vec<&str> = deck_rows.iter().map(|r| r.deck_name.as_str()).collect();
        assert_eq!(names, vec!["burn", "stax"]);
    }

    #[tokio::test]
    async fn test_update_match_deck_missing_seat() {
        let (repo, _temp) = setup().await;
        let game_id = insert_hybrid(&repo).await;
        let changed = repo
            .update_match_deck(game_id, &PlayerId::new("ghost".into()), None)
            .await
            .unwrap();
        assert_eq!(changed, 0);
    }

    #[tokio::test]
    async fn test_unassigned_match_rows() {
        let (repo, _temp) = setup().await;
        let game_id = insert_hybrid(&repo).await;

        let unassigned = repo
            .unassigned_match_rows(&PlayerId::new("u2".into()))
            .await
            .unwrap();
        assert_eq!(unassigned.len(), 1);
        assert_eq!(unassigned[0].1, game_id);
        assert!(repo
            .unassigned_match_rows(&PlayerId::new("u1".into()))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_turn_order_updates() {
        let (repo, _temp) = setup().await;
        let game_id = insert_hybrid(&repo).await;
        let rows = repo.match_rows_for_game(game_id).await.unwrap();

        repo.update_match_turn_order(rows[0].id, Some(2))
            .await
            .unwrap();
        let rows = repo.match_rows_for_game(game_id).await.unwrap();
        assert_eq!(rows[0].turn_order, Some(2));

        let deck_rows = repo.deck_rows_for_game(game_id).await.unwrap();
        repo.update_deck_turn_order(deck_rows[0].id, Some(1))
            .await
            .unwrap();
        let deck_rows = repo.deck_rows_for_game(game_id).await.unwrap();
        assert_eq!(deck_rows[0].turn_order, Some(1));
    }
}
