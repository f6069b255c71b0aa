//! Deterministic full-history replay.
//!
//! The rating update is not commutative, so a historical edit anywhere in the
//! sequence invalidates everything rated after it. Replay therefore never
//! patches: it resets every entity of a kind to the prior and re-runs every
//! confirmed, active game in sequence order through the same pipeline the
//! submission path uses, rewriting stored post-game ratings as it goes.
//!
//! Per-row persistence failures are logged and counted rather than aborting
//! the sweep; the triggering operation surfaces the count as a warning.

use crate::db::Repository;
use crate::domain::{
    Actor, AuditEntry, ChangeKind, DeckName, DeckRecord, EntityImage, EntityKind, Outcome,
    PlayerId, PlayerRecord, Rating, TimeMs,
};
use crate::engine::{apply_steps, owed_steps, DecayParams, PodSeat, RatingPipeline};
use serde_json::json;
use std::collections::HashMap;
use tracing::warn;

/// What one replay sweep did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplaySummary {
    pub games: usize,
    pub participations: usize,
    /// Entities garbage-collected at the zero-game default.
    pub removed: usize,
    /// Per-row persistence failures; the sweep continued past each.
    pub failures: usize,
}

impl ReplaySummary {
    pub fn absorb(&mut self, other: ReplaySummary) {
        self.games += other.games;
        self.participations += other.participations;
        self.removed += other.removed;
        self.failures += other.failures;
    }
}

/// Replays one entity kind's full game history from scratch.
pub struct Replayer<'a> {
    repo: &'a Repository,
    pipeline: RatingPipeline,
    decay: Option<DecayParams>,
}

impl<'a> Replayer<'a> {
    pub fn new(repo: &'a Repository, pipeline: RatingPipeline, decay: Option<DecayParams>) -> Self {
        Replayer {
            repo,
            pipeline,
            decay,
        }
    }

    /// Rebuild all entity state of `kind` from its confirmed, active games.
    pub async fn replay(
        &self,
        kind: EntityKind,
        actor: &Actor,
    ) -> Result<ReplaySummary, sqlx::Error> {
        match kind {
            EntityKind::Player => self.replay_players(actor).await,
            EntityKind::Deck => self.replay_decks(actor).await,
        }
    }

    async fn replay_players(&self, actor: &Actor) -> Result<ReplaySummary, sqlx::Error> {
        let mut players: HashMap<PlayerId, PlayerRecord> = HashMap::new();
        for mut player in self.repo.all_players().await? {
            player.rating = Rating::default();
            player.wins = 0;
            player.losses = 0;
            player.draws = 0;
            player.last_active = None;
            player.decay_steps = 0;
            players.insert(player.id.clone(), player);
        }

        let games = self.repo.replayable_player_games().await?;
        let mut summary = ReplaySummary::default();
        let mut latest: Option<TimeMs> = None;

        for game in &games {
            let rows = self.repo.match_rows_for_game(game.id).await?;
            if rows.is_empty() {
                continue;
            }

            // Owed decay is interleaved from the game's original timestamp,
            // never the recalculation's own wall clock.
            if let Some(params) = &self.decay {
                for row in &rows {
                    let player = players.entry(row.player_id.clone()).or_insert_with(|| {
                        PlayerRecord::new(row.player_id.clone(), game.created_at)
                    });
                    if let Some(last) = player.last_active {
                        let steps = owed_steps(params, last, game.created_at);
                        if steps > 0 {
                            player.rating = apply_steps(params, player.rating, steps);
                        }
                    }
                }
            }

            let mut seats = Vec::with_capacity(rows.len());
            let mut befores = Vec::with_capacity(rows.len());
            for row in &rows {
                let player = players
                    .entry(row.player_id.clone())
                    .or_insert_with(|| PlayerRecord::new(row.player_id.clone(), game.created_at));
                befores.push(player.image());
                seats.push(PodSeat::new(player.rating, row.outcome));
            }
            let rated = self.pipeline.rate_pod(&seats);

            for ((row, rating), before) in rows.iter().zip(rated).zip(befores) {
                let Some(player) = players.get_mut(&row.player_id) else {
                    continue;
                };
                player.rating = rating;
                bump_counters(&mut player.wins, &mut player.losses, &mut player.draws, row.outcome);
                player.last_active = Some(game.created_at);
                player.decay_steps = 0;

                if let Err(e) = self.repo.update_match_rating(row.id, rating).await {
                    warn!(game_id = game.id, row_id = row.id, error = %e,
                        "replay failed to rewrite match row rating");
                    summary.failures += 1;
                }
                self.record_audit(
                    EntityKind::Player,
                    row.player_id.as_str(),
                    before,
                    player.image(),
                    actor,
                    game.id,
                )
                .await;
                summary.participations += 1;
            }

            latest = Some(game.created_at);
            summary.games += 1;
        }

        // Trailing decay up to the newest replayed timestamp. The applied
        // step counter keeps the next scheduled sweep from double-charging.
        if let (Some(params), Some(latest)) = (&self.decay, latest) {
            for player in players.values_mut() {
                if let Some(last) = player.last_active {
                    let steps = owed_steps(params, last, latest);
                    if steps > 0 {
                        player.rating = apply_steps(params, player.rating, steps);
                        player.decay_steps = steps;
                    }
                }
            }
        }

        for player in players.values() {
            if let Err(e) = self.repo.upsert_player(player).await {
                warn!(player = player.id.as_str(), error = %e,
                    "replay failed to persist player state");
                summary.failures += 1;
            }
        }

        for player in players.values() {
            if !at_zero_game_default(player.rating, player.wins, player.losses, player.draws) {
                continue;
            }
            match self.repo.active_match_count(&player.id).await {
                Ok(0) => {
                    if let Err(e) = self.repo.delete_player(&player.id).await {
                        warn!(player = player.id.as_str(), error = %e,
                            "replay failed to garbage-collect player");
                        summary.failures += 1;
                    } else {
                        summary.removed += 1;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(player = player.id.as_str(), error = %e,
                        "replay failed to count player participation");
                    summary.failures += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn replay_decks(&self, actor: &Actor) -> Result<ReplaySummary, sqlx::Error> {
        let mut decks: HashMap<DeckName, DeckRecord> = HashMap::new();
        for mut deck in self.repo.all_decks().await? {
            deck.rating = Rating::default();
            deck.wins = 0;
            deck.losses = 0;
            deck.draws = 0;
            decks.insert(deck.name.clone(), deck);
        }

        let games = self.repo.replayable_deck_games().await?;
        let mut summary = ReplaySummary::default();

        for game in &games {
            let rows = self.repo.deck_rows_for_game(game.id).await?;
            if rows.is_empty() {
                continue;
            }

            let mut seats = Vec::with_capacity(rows.len());
            let mut befores = Vec::with_capacity(rows.len());
            for row in &rows {
                let deck = decks
                    .entry(row.deck_name.clone())
                    .or_insert_with(|| DeckRecord::new(row.deck_name.clone(), game.created_at));
                befores.push(deck.image());
                seats.push(PodSeat::new(deck.rating, row.outcome));
            }

            // Hybrid player games pad short deck groups with phantoms; pure
            // deck games rate as submitted.
            let rated = match game.kind {
                EntityKind::Player => self.pipeline.rate_hybrid_decks(&seats),
                EntityKind::Deck => self.pipeline.rate_pod(&seats),
            };

            // A deck fielded twice in one game folds in row order: its state
            // after the game is the last row's post-rating, every row counts.
            for ((row, rating), before) in rows.iter().zip(rated).zip(befores) {
                let Some(deck) = decks.get_mut(&row.deck_name) else {
                    continue;
                };
                deck.rating = rating;
                bump_counters(&mut deck.wins, &mut deck.losses, &mut deck.draws, row.outcome);

                if let Err(e) = self.repo.update_deck_match_rating(row.id, rating).await {
                    warn!(game_id = game.id, row_id = row.id, error = %e,
                        "replay failed to rewrite deck row rating");
                    summary.failures += 1;
                }
                self.record_audit(
                    EntityKind::Deck,
                    row.deck_name.as_str(),
                    before,
                    deck.image(),
                    actor,
                    game.id,
                )
                .await;
                summary.participations += 1;
            }

            summary.games += 1;
        }

        for deck in decks.values() {
            if let Err(e) = self.repo.upsert_deck(deck).await {
                warn!(deck = deck.name.as_str(), error = %e,
                    "replay failed to persist deck state");
                summary.failures += 1;
            }
        }

        for deck in decks.values() {
            if !at_zero_game_default(deck.rating, deck.wins, deck.losses, deck.draws) {
                continue;
            }
            match self.repo.active_deck_row_count(&deck.name).await {
                Ok(0) => {
                    if let Err(e) = self.repo.delete_deck(&deck.name).await {
                        warn!(deck = deck.name.as_str(), error = %e,
                            "replay failed to garbage-collect deck");
                        summary.failures += 1;
                    } else {
                        summary.removed += 1;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(deck = deck.name.as_str(), error = %e,
                        "replay failed to count deck participation");
                    summary.failures += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn record_audit(
        &self,
        kind: EntityKind,
        id: &str,
        before: EntityImage,
        after: EntityImage,
        actor: &Actor,
        game_id: i64,
    ) {
        let entry = AuditEntry::new(
            kind,
            id.to_string(),
            ChangeKind::Game,
            before,
            after,
            actor.clone(),
            json!({ "game_id": game_id, "recalculation": true }),
        );
        if let Err(e) = self.repo.append_audit(&entry).await {
            warn!(target = id, error = %e, "failed to append replay audit entry");
        }
    }
}

fn bump_counters(wins: &mut i64, losses: &mut i64, draws: &mut i64, outcome: Outcome) {
    match outcome {
        Outcome::Win => *wins += 1,
        Outcome::Loss => *losses += 1,
        Outcome::Draw => *draws += 1,
    }
}

fn at_zero_game_default(rating: Rating, wins: i64, losses: i64, draws: i64) -> bool {
    rating.is_prior() && wins == 0 && losses == 0 && draws == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::db::repo::{NewGame, NewSeat};
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

    fn seat(id: &str, outcome: Outcome) -> NewSeat {
        NewSeat {
            entity_id: id.to_string(),
            outcome,
            turn_order: None,
            rating_after: Rating::default(),
            deck: None,
        }
    }

    async fn insert_player_game(
        repo: &Repository,
        sequence: f64,
        created_at: i64,
        seats: &[NewSeat],
    ) -> i64 {
        let (game, _, _) = repo
            .insert_game_with_rows(
                NewGame {
                    kind: EntityKind::Player,
                    sequence,
                    submitted_by: Actor::new("u1".into()),
                    admin_submitted: false,
                    created_at: TimeMs::new(created_at),
                },
                seats,
                &[],
            )
            .await
            .unwrap();
        game.id
    }

    fn pod(winner: &str, losers: [&str; 3]) -> Vec<NewSeat> {
        let mut seats = vec![seat(winner, Outcome::Win)];
        seats.extend(losers.iter().map(|l| seat(l, Outcome::Loss)));
        seats
    }

    async fn player_state(repo: &Repository, id: &str) -> PlayerRecord {
        repo.get_player(&PlayerId::new(id.into()))
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_replay_builds_state_from_rows_alone() {
        let (repo, _temp) = setup().await;
        insert_player_game(&repo, 1.0, 100, &pod("a", ["b", "c", "d"])).await;
        insert_player_game(&repo, 2.0, 200, &pod("b", ["a", "c", "d"])).await;

        // No player rows exist yet; replay creates them from participation.
        let replayer = Replayer::new(&repo, RatingPipeline::default(), None);
        let summary = replayer
            .replay(EntityKind::Player, &Actor::new("system".into()))
            .await
            .unwrap();

        assert_eq!(summary.games, 2);
        assert_eq!(summary.participations, 8);
        assert_eq!(summary.failures, 0);

        let a = player_state(&repo, "a").await;
        assert_eq!((a.wins, a.losses, a.draws), (1, 1, 0));
        assert_eq!(a.last_active, Some(TimeMs::new(200)));

        let c = player_state(&repo, "c").await;
        assert_eq!((c.wins, c.losses), (0, 2));
        assert!(c.rating.elo() < 1000);
    }

    #[tokio::test]
    async fn test_replay_is_idempotent() {
        let (repo, _temp) = setup().await;
        insert_player_game(&repo, 1.0, 100, &pod("a", ["b", "c", "d"])).await;
        insert_player_game(&repo, 2.0, 200, &pod("c", ["a", "b", "d"])).await;
        insert_player_game(&repo, 3.0, 300, &pod("a", ["b", "c", "d"])).await;

        let replayer = Replayer::new(&repo, RatingPipeline::default(), None);
        let actor = Actor::new("system".into());
        replayer.replay(EntityKind::Player, &actor).await.unwrap();
        let first: Vec<PlayerRecord> = repo.all_players().await.unwrap();

        replayer.replay(EntityKind::Player, &actor).await.unwrap();
        let second: Vec<PlayerRecord> = repo.all_players().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_replay_skips_inactive_games() {
        let (repo, _temp) = setup().await;
        let g1 = insert_player_game(&repo, 1.0, 100, &pod("a", ["b", "c", "d"])).await;
        insert_player_game(&repo, 2.0, 200, &pod("b", ["a", "c", "d"])).await;

        let replayer = Replayer::new(&repo, RatingPipeline::default(), None);
        let actor = Actor::new("system".into());
        replayer.replay(EntityKind::Player, &actor).await.unwrap();
        let a_with_win = player_state(&repo, "a").await;

        repo.set_game_active(g1, false).await.unwrap();
        replayer.replay(EntityKind::Player, &actor).await.unwrap();
        let a_without = player_state(&repo, "a").await;

        assert_eq!(a_with_win.wins, 1);
        assert_eq!(a_without.wins, 0);
        assert_ne!(a_with_win.rating, a_without.rating);
    }

    #[tokio::test]
    async fn test_replay_garbage_collects_orphans() {
        let (repo, _temp) = setup().await;
        let game = insert_player_game(&repo, 1.0, 100, &pod("a", ["b", "c", "d"])).await;
        let replayer = Replayer::new(&repo, RatingPipeline::default(), None);
        let actor = Actor::new("system".into());
        replayer.replay(EntityKind::Player, &actor).await.unwrap();
        assert_eq!(repo.all_players().await.unwrap().len(), 4);

        repo.remove_game_rows(game).await.unwrap();
        let summary = replayer.replay(EntityKind::Player, &actor).await.unwrap();
        assert_eq!(summary.removed, 4);
        assert!(repo.all_players().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replay_rewrites_stored_post_ratings() {
        let (repo, _temp) = setup().await;
        // Rows are inserted with prior placeholders; replay must overwrite.
        let game = insert_player_game(&repo, 1.0, 100, &pod("a", ["b", "c", "d"])).await;
        let replayer = Replayer::new(&repo, RatingPipeline::default(), None);
        replayer
            .replay(EntityKind::Player, &Actor::new("system".into()))
            .await
            .unwrap();

        let rows = repo.match_rows_for_game(game).await.unwrap();
        assert!(rows[0].rating_after.elo() >= 1003);
        for loser in &rows[1..] {
            assert!(loser.rating_after.elo() <= 999);
        }
    }

    #[tokio::test]
    async fn test_order_sensitivity() {
        let (repo, _temp) = setup().await;
        // Same two results, opposite order, in two separate databases.
        let (repo2, _temp2) = setup().await;

        insert_player_game(&repo, 1.0, 100, &pod("a", ["b", "c", "d"])).await;
        insert_player_game(&repo, 2.0, 200, &pod("b", ["a", "c", "d"])).await;

        insert_player_game(&repo2, 1.0, 100, &pod("b", ["a", "c", "d"])).await;
        insert_player_game(&repo2, 2.0, 200, &pod("a", ["b", "c", "d"])).await;

        let actor = Actor::new("system".into());
        Replayer::new(&repo, RatingPipeline::default(), None)
            .replay(EntityKind::Player, &actor)
            .await
            .unwrap();
        Replayer::new(&repo2, RatingPipeline::default(), None)
            .replay(EntityKind::Player, &actor)
            .await
            .unwrap();

        let a_forward = player_state(&repo, "a").await;
        let a_reversed = player_state(&repo2, "a").await;
        assert_ne!(a_forward.rating, a_reversed.rating);
    }

    #[tokio::test]
    async fn test_replay_interleaves_decay_from_game_timestamps() {
        let (repo, _temp) = setup().await;
        let params = DecayParams {
            grace_ms: 1_000,
            interval_ms: 1_000,
            elo_per_step: 5.0,
            elo_floor: 900.0,
            sigma_growth: 0.0,
        };
        insert_player_game(&repo, 1.0, 0, &pod("a", ["b", "c", "d"])).await;
        // 5s gap: 5 owed steps for every participant before the second game.
        insert_player_game(&repo, 2.0, 5_000, &pod("a", ["b", "c", "d"])).await;

        let actor = Actor::new("system".into());
        let with_decay = Replayer::new(&repo, RatingPipeline::default(), Some(params));
        with_decay.replay(EntityKind::Player, &actor).await.unwrap();
        let decayed = player_state(&repo, "a").await;

        let without = Replayer::new(&repo, RatingPipeline::default(), None);
        without.replay(EntityKind::Player, &actor).await.unwrap();
        let undecayed = player_state(&repo, "a").await;

        assert!(decayed.rating.elo_f() < undecayed.rating.elo_f());
        // No trailing decay past the newest game: both end active at 5000.
        assert_eq!(decayed.last_active, Some(TimeMs::new(5_000)));
        assert_eq!(decayed.decay_steps, 0);
    }

    #[tokio::test]
    async fn test_hybrid_deck_replay_pads_and_folds_duplicates() {
        let (repo, _temp) = setup().await;
        let (game, _, _) = repo
            .insert_game_with_rows(
                NewGame {
                    kind: EntityKind::Player,
                    sequence: 1.0,
                    submitted_by: Actor::new("u1".into()),
                    admin_submitted: false,
                    created_at: TimeMs::new(100),
                },
                &[seat("u1", Outcome::Win), seat("u2", Outcome::Loss)],
                &[seat("burn", Outcome::Win), seat("burn", Outcome::Loss)],
            )
            .await
            .unwrap();

        let replayer = Replayer::new(&repo, RatingPipeline::default(), None);
        replayer
            .replay(EntityKind::Deck, &Actor::new("system".into()))
            .await
            .unwrap();

        let burn = repo
            .get_deck(&DeckName::new("burn".into()))
            .await
            .unwrap()
            .unwrap();
        // Both rows count; final state is the last row's post-rating.
        assert_eq!((burn.wins, burn.losses), (1, 1));
        let rows = repo.deck_rows_for_game(game.id).await.unwrap();
        assert_eq!(burn.rating, rows[1].rating_after);
        assert_ne!(rows[0].rating_after, rows[1].rating_after);
    }
}
