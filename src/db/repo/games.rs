//! Game master records, sequence queries, and transactional game writes.

use crate::domain::sequence::renormalized_key;
use crate::domain::{
    Actor, DeckMatchRow, DeckName, EntityKind, GameRecord, GameStatus, MatchRow, Outcome, PlayerId,
    Rating, TimeMs,
};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::Repository;

/// Fields of a game master row before it has an id.
#[derive(Debug, Clone)]
pub struct NewGame {
    pub kind: EntityKind,
    pub sequence: f64,
    pub submitted_by: Actor,
    pub admin_submitted: bool,
    pub created_at: TimeMs,
}

/// One participation row before it has a row id. `entity_id` is a player id
/// for match rows and a deck name for deck rows; `deck` is carried only by
/// player seats in hybrid games.
#[derive(Debug, Clone)]
pub struct NewSeat {
    pub entity_id: String,
    pub outcome: Outcome,
    pub turn_order: Option<i64>,
    pub rating_after: Rating,
    pub deck: Option<DeckName>,
}

pub(super) fn row_to_game(row: &SqliteRow) -> GameRecord {
    let status = GameStatus::parse(&row.get::<String, _>("status")).unwrap_or(GameStatus::Confirmed);
    let kind = EntityKind::parse(&row.get::<String, _>("kind")).unwrap_or(EntityKind::Player);
    GameRecord {
        id: row.get::<i64, _>("id"),
        kind,
        sequence: row.get::<f64, _>("sequence"),
        status,
        active: row.get::<i64, _>("active") != 0,
        submitted_by: Actor::new(row.get::<String, _>("submitted_by")),
        admin_submitted: row.get::<i64, _>("admin_submitted") != 0,
        created_at: TimeMs::new(row.get::<i64, _>("created_at")),
    }
}

const GAME_COLUMNS: &str =
    "id, kind, sequence, status, active, submitted_by, admin_submitted, created_at";

impl Repository {
    /// Fetch one game master record.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_game(&self, id: i64) -> Result<Option<GameRecord>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM games_master WHERE id = ?",
            GAME_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.as_ref().map(row_to_game))
    }

    /// Insert a confirmed, active game with all of its participation rows in
    /// one transaction. Returns the stored records with their assigned ids.
    ///
    /// # Errors
    /// Returns an error if the transaction fails; no partial rows survive.
    pub async fn insert_game_with_rows(
        &self,
        game: NewGame,
        player_seats: &[NewSeat],
        deck_seats: &[NewSeat],
    ) -> Result<(GameRecord, Vec<MatchRow>, Vec<DeckMatchRow>), sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO games_master (
                kind, sequence, status, active, submitted_by, admin_submitted, created_at
            ) VALUES (?, ?, 'confirmed', 1, ?, ?, ?)
            "#,
        )
        .bind(game.kind.as_str())
        .bind(game.sequence)
        .bind(game.submitted_by.as_str())
        .bind(game.admin_submitted as i64)
        .bind(game.created_at.as_ms())
        .execute(&mut *tx)
        .await?;
        let game_id = result.last_insert_rowid();

        let mut player_rows = Vec::with_capacity(player_seats.len());
        for seat in player_seats {
            let result = sqlx::query(
                r#"
                INSERT INTO matches (game_id, player_id, outcome, turn_order, mu_after, sigma_after, deck)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(game_id)
            .bind(seat.entity_id.as_str())
            .bind(seat.outcome.as_str())
            .bind(seat.turn_order)
            .bind(seat.rating_after.mu)
            .bind(seat.rating_after.sigma)
            .bind(seat.deck.as_ref().map(|d| d.as_str().to_string()))
            .execute(&mut *tx)
            .await?;

            player_rows.push(MatchRow {
                id: result.last_insert_rowid(),
                game_id,
                player_id: PlayerId::new(seat.entity_id.clone()),
                outcome: seat.outcome,
                turn_order: seat.turn_order,
                rating_after: seat.rating_after,
                deck: seat.deck.clone(),
            });
        }

        let mut deck_rows = Vec::with_capacity(deck_seats.len());
        for seat in deck_seats {
            let result = sqlx::query(
                r#"
                INSERT INTO deck_matches (game_id, deck_name, outcome, turn_order, mu_after, sigma_after)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(game_id)
            .bind(seat.entity_id.as_str())
            .bind(seat.outcome.as_str())
            .bind(seat.turn_order)
            .bind(seat.rating_after.mu)
            .bind(seat.rating_after.sigma)
            .execute(&mut *tx)
            .await?;

            deck_rows.push(DeckMatchRow {
                id: result.last_insert_rowid(),
                game_id,
                deck_name: DeckName::new(seat.entity_id.clone()),
                outcome: seat.outcome,
                turn_order: seat.turn_order,
                rating_after: seat.rating_after,
            });
        }

        tx.commit().await?;

        let stored = GameRecord {
            id: game_id,
            kind: game.kind,
            sequence: game.sequence,
            status: GameStatus::Confirmed,
            active: true,
            submitted_by: game.submitted_by,
            admin_submitted: game.admin_submitted,
            created_at: game.created_at,
        };
        Ok((stored, player_rows, deck_rows))
    }

    /// Undo half of a game: mark the master row undone and delete its
    /// participation rows, atomically. The master row stays as a tombstone so
    /// redo can restore the game under its original id.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn remove_game_rows(&self, game_id: i64) -> Result<(), sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("UPDATE games_master SET status = 'undone' WHERE id = ?")
            .bind(game_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM matches WHERE game_id = ?")
            .bind(game_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM deck_matches WHERE game_id = ?")
            .bind(game_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await
    }

    /// Redo half of a game: restore the master row to confirmed and re-insert
    /// its participation rows under their original ids, atomically.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn restore_game(
        &self,
        game_id: i64,
        player_rows: &[MatchRow],
        deck_rows: &[DeckMatchRow],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("UPDATE games_master SET status = 'confirmed' WHERE id = ?")
            .bind(game_id)
            .execute(&mut *tx)
            .await?;

        for row in player_rows {
            sqlx::query(
                r#"
                INSERT INTO matches (id, game_id, player_id, outcome, turn_order, mu_after, sigma_after, deck)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(row.id)
            .bind(row.game_id)
            .bind(row.player_id.as_str())
            .bind(row.outcome.as_str())
            .bind(row.turn_order)
            .bind(row.rating_after.mu)
            .bind(row.rating_after.sigma)
            .bind(row.deck.as_ref().map(|d| d.as_str().to_string()))
            .execute(&mut *tx)
            .await?;
        }

        for row in deck_rows {
            sqlx::query(
                r#"
                INSERT INTO deck_matches (id, game_id, deck_name, outcome, turn_order, mu_after, sigma_after)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(row.id)
            .bind(row.game_id)
            .bind(row.deck_name.as_str())
            .bind(row.outcome.as_str())
            .bind(row.turn_order)
            .bind(row.rating_after.mu)
            .bind(row.rating_after.sigma)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    /// Flip a game's active flag.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn set_game_active(&self, game_id: i64, active: bool) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE games_master SET active = ? WHERE id = ?")
            .bind(active as i64)
            .bind(game_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Highest sequence key among confirmed, active games.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn max_active_sequence(&self) -> Result<Option<f64>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT MAX(sequence) AS s FROM games_master WHERE status = 'confirmed' AND active = 1",
        )
        .fetch_one(self.pool())
        .await?;
        Ok(row.get::<Option<f64>, _>("s"))
    }

    /// Lowest sequence key among confirmed, active games.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn min_active_sequence(&self) -> Result<Option<f64>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT MIN(sequence) AS s FROM games_master WHERE status = 'confirmed' AND active = 1",
        )
        .fetch_one(self.pool())
        .await?;
        Ok(row.get::<Option<f64>, _>("s"))
    }

    /// Next-higher sequence key after `sequence` among confirmed, active games.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn next_active_sequence_after(
        &self,
        sequence: f64,
    ) -> Result<Option<f64>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT MIN(sequence) AS s FROM games_master
            WHERE status = 'confirmed' AND active = 1 AND sequence > ?
            "#,
        )
        .bind(sequence)
        .fetch_one(self.pool())
        .await?;
        Ok(row.get::<Option<f64>, _>("s"))
    }

    /// Confirmed, active player games in sequence order.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn replayable_player_games(&self) -> Result<Vec<GameRecord>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM games_master
            WHERE kind = 'player' AND status = 'confirmed' AND active = 1
            ORDER BY sequence ASC
            "#,
            GAME_COLUMNS
        ))
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(row_to_game).collect())
    }

    /// Confirmed, active games carrying deck participation, in sequence order.
    /// Includes hybrid player games alongside pure deck games.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn replayable_deck_games(&self) -> Result<Vec<GameRecord>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT DISTINCT g.{} FROM games_master g
            JOIN deck_matches dm ON dm.game_id = g.id
            WHERE g.status = 'confirmed' AND g.active = 1
            ORDER BY g.sequence ASC
            "#,
            GAME_COLUMNS_QUALIFIED
        ))
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(row_to_game).collect())
    }

    /// Respace every game's sequence key to evenly spaced integers, keeping
    /// the existing order. Runs in one transaction; no replay is needed
    /// afterwards because relative order is unchanged.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn renormalize_sequences(&self) -> Result<usize, sqlx::Error> {
        let rows = sqlx::query("SELECT id FROM games_master ORDER BY sequence ASC, id ASC")
            .fetch_all(self.pool())
            .await?;

        let mut tx = self.pool().begin().await?;
        for (index, row) in rows.iter().enumerate() {
            let id: i64 = row.get("id");
            sqlx::query("UPDATE games_master SET sequence = ? WHERE id = ?")
                .bind(renormalized_key(index))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(rows.len())
    }
}

const GAME_COLUMNS_QUALIFIED: &str =
    "id, g.kind, g.sequence, g.status, g.active, g.submitted_by, g.admin_submitted, g.created_at";

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

    fn new_game(kind: EntityKind, sequence: f64) -> NewGame {
        NewGame {
            kind,
            sequence,
            submitted_by: Actor::new("u1".into()),
            admin_submitted: false,
            created_at: TimeMs::new(1_000),
        }
    }

    fn seat(id: &str, outcome: Outcome) -> NewSeat {
        NewSeat {
            entity_id: id.to_string(),
            outcome,
            turn_order: None,
            rating_after: Rating::default(),
            deck: None,
        }
    }

    #[tokio::test]
    async fn test_insert_game_with_rows() {
        let (repo, _temp) = setup().await;
        let seats = vec![seat("u1", Outcome::Win), seat("u2", Outcome::Loss)];
        let (game, player_rows, deck_rows) = repo
            .insert_game_with_rows(new_game(EntityKind::Player, 1.0), &seats, &[])
            .await
            .unwrap();

        assert!(game.counts_for_replay());
        assert_eq!(player_rows.len(), 2);
        assert!(deck_rows.is_empty());
        assert_eq!(player_rows[0].game_id, game.id);

        let loaded = repo.get_game(game.id).await.unwrap().unwrap();
        assert_eq!(loaded, game);
    }

    #[tokio::test]
    async fn test_remove_and_restore_game() {
        let (repo, _temp) = setup().await;
        let seats = vec![seat("u1", Outcome::Win), seat("u2", Outcome::Loss)];
        let (game, player_rows, _) = repo
            .insert_game_with_rows(new_game(EntityKind::Player, 1.0), &seats, &[])
            .await
            .unwrap();

        repo.remove_game_rows(game.id).await.unwrap();
        let undone = repo.get_game(game.id).await.unwrap().unwrap();
        assert_eq!(undone.status, GameStatus::Undone);
        assert!(repo.match_rows_for_game(game.id).await.unwrap().is_empty());

        repo.restore_game(game.id, &player_rows, &[]).await.unwrap();
        let restored = repo.get_game(game.id).await.unwrap().unwrap();
        assert_eq!(restored.status, GameStatus::Confirmed);
        assert_eq!(
            repo.match_rows_for_game(game.id).await.unwrap(),
            player_rows
        );
    }

    #[tokio::test]
    async fn test_sequence_queries_ignore_inactive() {
        let (repo, _temp) = setup().await;
        for sequence in [1.0, 2.0, 3.0] {
            repo.insert_game_with_rows(
                new_game(EntityKind::Player, sequence),
                &[seat("u1", Outcome::Win), seat("u2", Outcome::Loss)],
                &[],
            )
            .await
            .unwrap();
        }

        assert_eq!(repo.max_active_sequence().await.unwrap(), Some(3.0));
        assert_eq!(repo.min_active_sequence().await.unwrap(), Some(1.0));
        assert_eq!(
            repo.next_active_sequence_after(1.0).await.unwrap(),
            Some(2.0)
        );

        // Deactivating the last game pulls the max down.
        let games = repo.replayable_player_games().await.unwrap();
        repo.set_game_active(games[2].id, false).await.unwrap();
        assert_eq!(repo.max_active_sequence().await.unwrap(), Some(2.0));
        assert_eq!(repo.replayable_player_games().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_renormalize_preserves_order() {
        let (repo, _temp) = setup().await;
        for sequence in [0.125, 0.5, 7.25] {
            repo.insert_game_with_rows(
                new_game(EntityKind::Player, sequence),
                &[seat("u1", Outcome::Win), seat("u2", Outcome::Loss)],
                &[],
            )
            .await
            .unwrap();
        }

        let before: Vec<i64> = repo
            .replayable_player_games()
            .await
            .unwrap()
            .iter()
            .map(|g| g.id)
            .collect();
        let count = repo.renormalize_sequences().await.unwrap();
        assert_eq!(count, 3);

        let after = repo.replayable_player_games().await.unwrap();
        let ids: Vec<i64> = after.iter().map(|g| g.id).collect();
        assert_eq!(ids, before);
        let keys: Vec<f64> = after.iter().map(|g| g.sequence).collect();
        assert_eq!(keys, vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_replayable_deck_games_spans_hybrids() {
        let (repo, _temp) = setup().await;
        // A pure deck game and a hybrid player game both carry deck rows.
        repo.insert_game_with_rows(
            new_game(EntityKind::Deck, 1.0),
            &[],
            &[seat("burn", Outcome::Win), seat("stax", Outcome::Loss)],
        )
        .await
        .unwrap();
        repo.insert_game_with_rows(
            new_game(EntityKind::Player, 2.0),
            &[seat("u1", Outcome::Win), seat("u2", Outcome::Loss)],
            &[seat("elves", Outcome::Win), seat("burn", Outcome::Loss)],
        )
        .await
        .unwrap();
        repo.insert_game_with_rows(
            new_game(EntityKind::Player, 3.0),
            &[seat("u1", Outcome::Win), seat("u2", Outcome::Loss)],
            &[],
        )
        .await
        .unwrap();

        let deck_games = repo.replayable_deck_games().await.unwrap();
        assert_eq!(deck_games.len(), 2);
        assert_eq!(deck_games[0].kind, EntityKind::Deck);
        assert_eq!(deck_games[1].kind, EntityKind::Player);
    }
}
