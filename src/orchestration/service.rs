//! The league service: every core operation behind one write lock.
//!
//! All mutating paths (submission, override, toggle, undo/redo, decay sweep)
//! serialize on a single mutex so a replay can never interleave with another
//! write. Read queries go straight to the repository. The undo ledger and the
//! staged-submission registry live inside the locked state and are lost on
//! restart by design.

use crate::config::Config;
use crate::db::repo::{NewGame, NewSeat};
use crate::db::Repository;
use crate::domain::sequence::{append_key, midpoint_key, needs_renormalization, prepend_key};
use crate::domain::{
    Actor, AuditEntry, ChangeKind, DeckName, DeckRecord, DecaySnapshot, DecayedPlayer,
    EntityImage, EntityKind, GameRecord, GameStatus, MatchSnapshot, Outcome, OverrideSnapshot,
    ParticipantChange, ParticipantInput, PlayerId, PlayerRecord, Rating, RewrittenDeckRow,
    SeatTurnOrder, Snapshot, SnapshotKind, SubmissionReport, TimeMs,
};
use crate::engine::{apply_steps, owed_steps, DecayParams, PodSeat, RatingPipeline};
use crate::ledger::SnapshotLedger;
use crate::orchestration::pending::PendingRegistry;
use crate::replay::Replayer;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("participant {0} already has a pending submission")]
    AlreadyPending(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Manual override request; unset fields are left alone. `elo` solves mu at
/// the (possibly updated) sigma and wins over a simultaneous `mu`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatingOverride {
    pub mu: Option<f64>,
    pub sigma: Option<f64>,
    pub elo: Option<f64>,
    pub wins: Option<i64>,
    pub losses: Option<i64>,
    pub draws: Option<i64>,
}

impl RatingOverride {
    fn is_empty(&self) -> bool {
        self == &RatingOverride::default()
    }

    fn touches_rating(&self) -> bool {
        self.mu.is_some() || self.sigma.is_some() || self.elo.is_some()
    }

    fn touches_counters(&self) -> bool {
        self.wins.is_some() || self.losses.is_some() || self.draws.is_some()
    }
}

/// What a manual override changed, for display.
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideReport {
    pub before: EntityImage,
    pub after: EntityImage,
}

/// One seat's requested turn order, keyed by participant id.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOrderInput {
    pub id: String,
    pub turn_order: Option<i64>,
}

/// What a decay sweep did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecaySweepReport {
    pub players: usize,
    pub steps: i64,
}

/// Where a new game lands in the sequence.
enum Placement {
    /// After all existing history; no replay needed.
    Append(f64),
    /// Between existing games; the whole history must be re-derived.
    Inject(f64),
}

struct CoreState {
    ledger: SnapshotLedger,
    pending: PendingRegistry,
}

pub struct LeagueService {
    repo: Arc<Repository>,
    config: Config,
    state: Mutex<CoreState>,
}

impl LeagueService {
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        let state = CoreState {
            ledger: SnapshotLedger::new(config.ledger_capacity),
            pending: PendingRegistry::new(config.pending_ttl_ms),
        };
        LeagueService {
            repo,
            config,
            state: Mutex::new(state),
        }
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    fn decay_params(&self) -> Option<DecayParams> {
        self.config.decay_enabled.then_some(self.config.decay)
    }

    fn pipeline(&self) -> RatingPipeline {
        self.config.pipeline
    }

    fn replayer(&self) -> Replayer<'_> {
        Replayer::new(&self.repo, self.pipeline(), self.decay_params())
    }

    async fn replay_kinds(
        &self,
        kinds: &[EntityKind],
        actor: &Actor,
    ) -> Result<usize, ServiceError> {
        let replayer = self.replayer();
        let mut failures = 0;
        for kind in kinds {
            let summary = replayer.replay(*kind, actor).await?;
            info!(
                kind = kind.as_str(),
                games = summary.games,
                participations = summary.participations,
                removed = summary.removed,
                failures = summary.failures,
                "replay finished"
            );
            failures += summary.failures;
        }
        Ok(failures)
    }

    // =========================================================================
    // Game submission
    // =========================================================================

    /// Validate and apply a completed game in one step.
    pub async fn submit_game(
        &self,
        kind: EntityKind,
        participants: Vec<ParticipantInput>,
        anchor: Option<String>,
        submitted_by: Actor,
        admin_submitted: bool,
    ) -> Result<SubmissionReport, ServiceError> {
        let mut state = self.state.lock().await;
        state.pending.expire(TimeMs::now());
        for p in &participants {
            if state.pending.is_locked(kind, &p.id) {
                return Err(ServiceError::AlreadyPending(p.id.clone()));
            }
        }
        self.apply_submission(
            &mut state,
            kind,
            participants,
            anchor,
            submitted_by,
            admin_submitted,
        )
        .await
    }

    /// Park a validated submission for later confirmation, locking its
    /// participants against overlapping submissions.
    pub async fn stage_game(
        &self,
        kind: EntityKind,
        participants: Vec<ParticipantInput>,
        anchor: Option<String>,
        submitted_by: Actor,
        admin_submitted: bool,
    ) -> Result<Uuid, ServiceError> {
        validate_submission(kind, &participants)?;
        // A bad anchor must fail at staging time, before anyone confirms.
        self.resolve_sequence(anchor.as_deref()).await?;

        let mut state = self.state.lock().await;
        let now = TimeMs::now();
        state.pending.expire(now);
        state
            .pending
            .stage(kind, participants, anchor, submitted_by, admin_submitted, now)
            .map_err(ServiceError::AlreadyPending)
    }

    /// Apply a staged submission and release its locks.
    pub async fn confirm_game(&self, token: Uuid) -> Result<SubmissionReport, ServiceError> {
        let mut state = self.state.lock().await;
        state.pending.expire(TimeMs::now());
        let staged = state
            .pending
            .take(token)
            .ok_or_else(|| ServiceError::NotFound(format!("staged game {}", token)))?;
        self.apply_submission(
            &mut state,
            staged.kind,
            staged.participants,
            staged.anchor,
            staged.submitted_by,
            staged.admin_submitted,
        )
        .await
    }

    /// Discard a staged submission without touching ratings.
    pub async fn cancel_game(&self, token: Uuid) -> Result<(), ServiceError> {
        let mut state = self.state.lock().await;
        state
            .pending
            .take(token)
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound(format!("staged game {}", token)))
    }

    /// Drop staged submissions past their TTL. Returns how many expired.
    pub async fn expire_pending(&self) -> usize {
        let mut state = self.state.lock().await;
        state.pending.expire(TimeMs::now())
    }

    async fn apply_submission(
        &self,
        state: &mut CoreState,
        kind: EntityKind,
        participants: Vec<ParticipantInput>,
        anchor: Option<String>,
        submitted_by: Actor,
        admin_submitted: bool,
    ) -> Result<SubmissionReport, ServiceError> {
        validate_submission(kind, &participants)?;
        let placement = self.resolve_sequence(anchor.as_deref()).await?;
        let now = TimeMs::now();

        let report = match kind {
            EntityKind::Player => {
                self.apply_player_submission(
                    state,
                    participants,
                    placement,
                    submitted_by,
                    admin_submitted,
                    now,
                )
                .await?
            }
            EntityKind::Deck => {
                self.apply_deck_submission(
                    state,
                    participants,
                    placement,
                    submitted_by,
                    admin_submitted,
                    now,
                )
                .await?
            }
        };
        Ok(report)
    }

    async fn apply_player_submission(
        &self,
        state: &mut CoreState,
        participants: Vec<ParticipantInput>,
        placement: Placement,
        submitted_by: Actor,
        admin_submitted: bool,
        now: TimeMs,
    ) -> Result<SubmissionReport, ServiceError> {
        // Load or create every participant, then top up owed decay so the
        // live path matches what a later replay would derive.
        let mut records: Vec<PlayerRecord> = Vec::with_capacity(participants.len());
        for p in &participants {
            let id = PlayerId::new(p.id.clone());
            let record = self
                .repo
                .get_player(&id)
                .await?
                .unwrap_or_else(|| PlayerRecord::new(id, now));
            records.push(record);
        }
        if let Some(params) = self.decay_params() {
            for record in &mut records {
                if let Some(last) = record.last_active {
                    let fresh = owed_steps(&params, last, now) - record.decay_steps;
                    if fresh > 0 {
                        record.rating = apply_steps(&params, record.rating, fresh);
                        record.decay_steps += fresh;
                    }
                }
            }
        }
        let befores: Vec<EntityImage> = records.iter().map(|r| r.image()).collect();

        // Seats a deck was declared for (directly or via the player's
        // default) feed the deck rating history too.
        let effective_decks: Vec<Option<DeckName>> = participants
            .iter()
            .zip(&records)
            .map(|(p, r)| {
                p.deck
                    .as_ref()
                    .map(|d| DeckName::new(d.clone()))
                    .or_else(|| r.default_deck.clone())
            })
            .collect();

        match placement {
            Placement::Append(sequence) => {
                let seats: Vec<PodSeat> = records
                    .iter()
                    .zip(&participants)
                    .map(|(r, p)| PodSeat::new(r.rating, p.outcome))
                    .collect();
                let rated = self.pipeline().rate_pod(&seats);

                for ((record, rating), p) in records.iter_mut().zip(&rated).zip(&participants) {
                    record.rating = *rating;
                    bump(record, p.outcome);
                    record.last_active = Some(now);
                    record.decay_steps = 0;
                }

                // Deck side: duplicates share the pre-game rating and fold in
                // row order, exactly as replay does.
                let deck_rows_in: Vec<(usize, DeckName)> = effective_decks
                    .iter()
                    .enumerate()
                    .filter_map(|(i, d)| d.clone().map(|d| (i, d)))
                    .collect();
                let mut decks: HashMap<DeckName, DeckRecord> = HashMap::new();
                for (_, name) in &deck_rows_in {
                    if !decks.contains_key(name) {
                        let record = self
                            .repo
                            .get_deck(name)
                            .await?
                            .unwrap_or_else(|| DeckRecord::new(name.clone(), now));
                        decks.insert(name.clone(), record);
                    }
                }
                let deck_befores: HashMap<DeckName, EntityImage> =
                    decks.iter().map(|(n, d)| (n.clone(), d.image())).collect();

                let deck_seats: Vec<PodSeat> = deck_rows_in
                    .iter()
                    .map(|(i, name)| {
                        let rating = decks.get(name).map(|d| d.rating).unwrap_or_default();
                        PodSeat::new(rating, participants[*i].outcome)
                    })
                    .collect();
                let deck_rated = if deck_seats.is_empty() {
                    Vec::new()
                } else {
                    self.pipeline().rate_hybrid_decks(&deck_seats)
                };
                let mut deck_row_ratings = Vec::with_capacity(deck_rows_in.len());
                for ((i, name), rating) in deck_rows_in.iter().zip(&deck_rated) {
                    if let Some(deck) = decks.get_mut(name) {
                        deck.rating = *rating;
                        bump_deck(deck, participants[*i].outcome);
                    }
                    deck_row_ratings.push(*rating);
                }

                let player_seats: Vec<NewSeat> = participants
                    .iter()
                    .zip(&records)
                    .zip(&effective_decks)
                    .map(|((p, r), deck)| NewSeat {
                        entity_id: p.id.clone(),
                        outcome: p.outcome,
                        turn_order: p.turn_order,
                        rating_after: r.rating,
                        deck: deck.clone(),
                    })
                    .collect();
                let deck_seats_new: Vec<NewSeat> = deck_rows_in
                    .iter()
                    .zip(&deck_row_ratings)
                    .map(|((i, name), rating)| NewSeat {
                        entity_id: name.as_str().to_string(),
                        outcome: participants[*i].outcome,
                        turn_order: participants[*i].turn_order,
                        rating_after: *rating,
                        deck: None,
                    })
                    .collect();

                let (game, player_rows, deck_rows) = self
                    .repo
                    .insert_game_with_rows(
                        NewGame {
                            kind: EntityKind::Player,
                            sequence,
                            submitted_by: submitted_by.clone(),
                            admin_submitted,
                            created_at: now,
                        },
                        &player_seats,
                        &deck_seats_new,
                    )
                    .await?;

                for record in &records {
                    self.repo.upsert_player(record).await?;
                }
                for deck in decks.values() {
                    self.repo.upsert_deck(deck).await?;
                }

                let participant_changes: Vec<ParticipantChange> = participants
                    .iter()
                    .zip(&befores)
                    .zip(&records)
                    .map(|((p, before), record)| ParticipantChange {
                        id: p.id.clone(),
                        outcome: p.outcome,
                        before: *before,
                        after: record.image(),
                    })
                    .collect();
                let deck_changes: Vec<ParticipantChange> = deck_change_list(&decks, &deck_befores);

                self.audit_submission(&game, &participant_changes, &deck_changes, &submitted_by)
                    .await;
                state.ledger.push(Snapshot::new(
                    submitted_by,
                    None,
                    SnapshotKind::Match(MatchSnapshot {
                        game: game.clone(),
                        player_rows,
                        deck_rows,
                        participants: participant_changes.clone(),
                        decks: deck_changes.clone(),
                    }),
                ));

                Ok(SubmissionReport {
                    game_id: game.id,
                    sequence,
                    participants: participant_changes,
                    decks: deck_changes,
                    warning: None,
                })
            }
            Placement::Inject(sequence) => {
                self.apply_injected_submission(
                    state,
                    EntityKind::Player,
                    participants,
                    effective_decks,
                    befores,
                    sequence,
                    submitted_by,
                    admin_submitted,
                    now,
                )
                .await
            }
        }
    }

    async fn apply_deck_submission(
        &self,
        state: &mut CoreState,
        participants: Vec<ParticipantInput>,
        placement: Placement,
        submitted_by: Actor,
        admin_submitted: bool,
        now: TimeMs,
    ) -> Result<SubmissionReport, ServiceError> {
        let mut decks: HashMap<DeckName, DeckRecord> = HashMap::new();
        for p in &participants {
            let name = DeckName::new(p.id.clone());
            if !decks.contains_key(&name) {
                let record = self
                    .repo
                    .get_deck(&name)
                    .await?
                    .unwrap_or_else(|| DeckRecord::new(name.clone(), now));
                decks.insert(name, record);
            }
        }
        let deck_befores: HashMap<DeckName, EntityImage> =
            decks.iter().map(|(n, d)| (n.clone(), d.image())).collect();

        match placement {
            Placement::Append(sequence) => {
                let seats: Vec<PodSeat> = participants
                    .iter()
                    .map(|p| {
                        let rating = decks
                            .get(&DeckName::new(p.id.clone()))
                            .map(|d| d.rating)
                            .unwrap_or_default();
                        PodSeat::new(rating, p.outcome)
                    })
                    .collect();
                let rated = self.pipeline().rate_pod(&seats);

                let mut row_ratings = Vec::with_capacity(participants.len());
                for (p, rating) in participants.iter().zip(&rated) {
                    if let Some(deck) = decks.get_mut(&DeckName::new(p.id.clone())) {
                        deck.rating = *rating;
                        bump_deck(deck, p.outcome);
                    }
                    row_ratings.push(*rating);
                }

                let deck_seats: Vec<NewSeat> = participants
                    .iter()
                    .zip(&row_ratings)
                    .map(|(p, rating)| NewSeat {
                        entity_id: p.id.clone(),
                        outcome: p.outcome,
                        turn_order: p.turn_order,
                        rating_after: *rating,
                        deck: None,
                    })
                    .collect();

                let (game, player_rows, deck_rows) = self
                    .repo
                    .insert_game_with_rows(
                        NewGame {
                            kind: EntityKind::Deck,
                            sequence,
                            submitted_by: submitted_by.clone(),
                            admin_submitted,
                            created_at: now,
                        },
                        &[],
                        &deck_seats,
                    )
                    .await?;

                for deck in decks.values() {
                    self.repo.upsert_deck(deck).await?;
                }

                let deck_changes = deck_change_list(&decks, &deck_befores);
                self.audit_submission(&game, &[], &deck_changes, &submitted_by)
                    .await;
                state.ledger.push(Snapshot::new(
                    submitted_by,
                    None,
                    SnapshotKind::Match(MatchSnapshot {
                        game: game.clone(),
                        player_rows,
                        deck_rows,
                        participants: Vec::new(),
                        decks: deck_changes.clone(),
                    }),
                ));

                Ok(SubmissionReport {
                    game_id: game.id,
                    sequence,
                    participants: Vec::new(),
                    decks: deck_changes,
                    warning: None,
                })
            }
            Placement::Inject(sequence) => {
                let befores: Vec<EntityImage> = participants
                    .iter()
                    .map(|p| {
                        deck_befores
                            .get(&DeckName::new(p.id.clone()))
                            .copied()
                            .unwrap_or_else(|| EntityImage::new(Rating::default(), 0, 0, 0))
                    })
                    .collect();
                self.apply_injected_submission(
                    state,
                    EntityKind::Deck,
                    participants,
                    Vec::new(),
                    befores,
                    sequence,
                    submitted_by,
                    admin_submitted,
                    now,
                )
                .await
            }
        }
    }

    /// Insert an injected game with placeholder post-ratings, then re-derive
    /// the whole history; the replay rewrites the placeholders.
    #[allow(clippy::too_many_arguments)]
    async fn apply_injected_submission(
        &self,
        state: &mut CoreState,
        kind: EntityKind,
        participants: Vec<ParticipantInput>,
        effective_decks: Vec<Option<DeckName>>,
        befores: Vec<EntityImage>,
        sequence: f64,
        submitted_by: Actor,
        admin_submitted: bool,
        now: TimeMs,
    ) -> Result<SubmissionReport, ServiceError> {
        let (player_seats, deck_seats): (Vec<NewSeat>, Vec<NewSeat>) = match kind {
            EntityKind::Player => {
                let players = participants
                    .iter()
                    .zip(&befores)
                    .zip(&effective_decks)
                    .map(|((p, before), deck)| NewSeat {
                        entity_id: p.id.clone(),
                        outcome: p.outcome,
                        turn_order: p.turn_order,
                        rating_after: before.rating(),
                        deck: deck.clone(),
                    })
                    .collect();
                let decks = participants
                    .iter()
                    .zip(&effective_decks)
                    .filter_map(|(p, deck)| {
                        deck.as_ref().map(|d| NewSeat {
                            entity_id: d.as_str().to_string(),
                            outcome: p.outcome,
                            turn_order: p.turn_order,
                            rating_after: Rating::default(),
                            deck: None,
                        })
                    })
                    .collect();
                (players, decks)
            }
            EntityKind::Deck => {
                let decks = participants
                    .iter()
                    .zip(&befores)
                    .map(|(p, before)| NewSeat {
                        entity_id: p.id.clone(),
                        outcome: p.outcome,
                        turn_order: p.turn_order,
                        rating_after: before.rating(),
                        deck: None,
                    })
                    .collect();
                (Vec::new(), decks)
            }
        };

        let (game, _, _) = self
            .repo
            .insert_game_with_rows(
                NewGame {
                    kind,
                    sequence,
                    submitted_by: submitted_by.clone(),
                    admin_submitted,
                    created_at: now,
                },
                &player_seats,
                &deck_seats,
            )
            .await?;

        let mut kinds = vec![kind];
        if kind == EntityKind::Player && !deck_seats.is_empty() {
            kinds.push(EntityKind::Deck);
        }
        let failures = self.replay_kinds(&kinds, &submitted_by).await?;

        // Reload everything the replay rewrote for the report and snapshot.
        let player_rows = self.repo.match_rows_for_game(game.id).await?;
        let deck_rows = self.repo.deck_rows_for_game(game.id).await?;

        let mut participant_changes = Vec::with_capacity(participants.len());
        if kind == EntityKind::Player {
            for (p, before) in participants.iter().zip(&befores) {
                let after = match self.repo.get_player(&PlayerId::new(p.id.clone())).await? {
                    Some(record) => record.image(),
                    None => *before,
                };
                participant_changes.push(ParticipantChange {
                    id: p.id.clone(),
                    outcome: p.outcome,
                    before: *before,
                    after,
                });
            }
        }

        let mut deck_changes = Vec::new();
        let mut seen = BTreeSet::new();
        for row in &deck_rows {
            if !seen.insert(row.deck_name.clone()) {
                continue;
            }
            let after = match self.repo.get_deck(&row.deck_name).await? {
                Some(record) => record.image(),
                None => EntityImage::new(Rating::default(), 0, 0, 0),
            };
            let before = if kind == EntityKind::Deck {
                participants
                    .iter()
                    .position(|p| p.id == row.deck_name.as_str())
                    .map(|i| befores[i])
                    .unwrap_or(after)
            } else {
                // Hybrid injection: the pre-state was not captured per deck;
                // report the prior for decks created by this game.
                EntityImage::new(Rating::default(), 0, 0, 0)
            };
            deck_changes.push(ParticipantChange {
                id: row.deck_name.as_str().to_string(),
                outcome: row.outcome,
                before,
                after,
            });
        }
        if kind == EntityKind::Deck {
            participant_changes = Vec::new();
        }

        state.ledger.push(Snapshot::new(
            submitted_by,
            None,
            SnapshotKind::Match(MatchSnapshot {
                game: game.clone(),
                player_rows,
                deck_rows,
                participants: participant_changes.clone(),
                decks: deck_changes.clone(),
            }),
        ));

        Ok(SubmissionReport {
            game_id: game.id,
            sequence,
            participants: participant_changes,
            decks: deck_changes,
            warning: replay_warning(failures),
        })
    }

    async fn resolve_sequence(&self, anchor: Option<&str>) -> Result<Placement, ServiceError> {
        match anchor {
            None => Ok(Placement::Append(append_key(
                self.repo.max_active_sequence().await?,
            ))),
            Some("0") => match self.repo.min_active_sequence().await? {
                // An empty league has nothing to come before.
                None => Ok(Placement::Append(prepend_key(None))),
                Some(min) => Ok(Placement::Inject(prepend_key(Some(min)))),
            },
            Some(raw) => {
                let id: i64 = raw
                    .parse()
                    .map_err(|_| ServiceError::NotFound(format!("anchor game {}", raw)))?;
                let game = self
                    .repo
                    .get_game(id)
                    .await?
                    .filter(|g| g.counts_for_replay())
                    .ok_or_else(|| ServiceError::NotFound(format!("anchor game {}", id)))?;

                let successor = self.repo.next_active_sequence_after(game.sequence).await?;
                let mut anchor_seq = game.sequence;
                let mut successor = successor;
                let mut candidate = midpoint_key(anchor_seq, successor);
                if needs_renormalization(anchor_seq, candidate, successor) {
                    let respaced = self.repo.renormalize_sequences().await?;
                    info!(games = respaced, "sequence keys renormalized");
                    let game = self
                        .repo
                        .get_game(id)
                        .await?
                        .ok_or_else(|| ServiceError::NotFound(format!("anchor game {}", id)))?;
                    anchor_seq = game.sequence;
                    successor = self.repo.next_active_sequence_after(anchor_seq).await?;
                    candidate = midpoint_key(anchor_seq, successor);
                }

                match successor {
                    // Anchored at the newest game: ordering is unchanged.
                    None => Ok(Placement::Append(candidate)),
                    Some(_) => Ok(Placement::Inject(candidate)),
                }
            }
        }
    }

    async fn audit_submission(
        &self,
        game: &GameRecord,
        participants: &[ParticipantChange],
        decks: &[ParticipantChange],
        actor: &Actor,
    ) {
        let params = json!({ "game_id": game.id, "sequence": game.sequence });
        for change in participants {
            self.record_audit(AuditEntry::new(
                EntityKind::Player,
                change.id.clone(),
                ChangeKind::Game,
                change.before,
                change.after,
                actor.clone(),
                params.clone(),
            ))
            .await;
        }
        for change in decks {
            self.record_audit(AuditEntry::new(
                EntityKind::Deck,
                change.id.clone(),
                ChangeKind::Game,
                change.before,
                change.after,
                actor.clone(),
                params.clone(),
            ))
            .await;
        }
    }

    /// Fire-and-forget audit append: a failed write is logged and never
    /// blocks or rolls back the mutation it describes.
    async fn record_audit(&self, entry: AuditEntry) {
        if let Err(e) = self.repo.append_audit(&entry).await {
            warn!(entity = entry.target_id.as_str(), error = %e,
                "failed to append audit entry");
        }
    }

    // =========================================================================
    // Manual overrides
    // =========================================================================

    /// Directly set a player's or deck's rating and/or counters.
    pub async fn override_rating(
        &self,
        kind: EntityKind,
        id: &str,
        changes: RatingOverride,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<OverrideReport, ServiceError> {
        if changes.is_empty() {
            return Err(ServiceError::Validation(
                "override must set at least one field".to_string(),
            ));
        }

        let mut state = self.state.lock().await;
        let (before, after) = match kind {
            EntityKind::Player => {
                let player_id = PlayerId::new(id.to_string());
                let mut record = self
                    .repo
                    .get_player(&player_id)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("player {}", id)))?;
                let before = record.image();
                let after = apply_override(&changes, before);
                record.rating = after.rating();
                record.wins = after.wins;
                record.losses = after.losses;
                record.draws = after.draws;
                self.repo.upsert_player(&record).await?;
                (before, after)
            }
            EntityKind::Deck => {
                let name = DeckName::new(id.to_string());
                let mut record = self
                    .repo
                    .get_deck(&name)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("deck {}", id)))?;
                let before = record.image();
                let after = apply_override(&changes, before);
                record.rating = after.rating();
                record.wins = after.wins;
                record.losses = after.losses;
                record.draws = after.draws;
                self.repo.upsert_deck(&record).await?;
                (before, after)
            }
        };

        let change_kind = if changes.touches_rating() {
            ChangeKind::Manual
        } else {
            ChangeKind::WldAdjustment
        };
        let params = json!({
            "reason": reason,
            "counters_changed": changes.touches_counters(),
        });
        self.record_audit(AuditEntry::new(
            kind,
            id.to_string(),
            change_kind,
            before,
            after,
            actor.clone(),
            params,
        ))
        .await;

        state.ledger.push(Snapshot::new(
            actor,
            reason,
            SnapshotKind::Override(OverrideSnapshot::Rating {
                kind,
                id: id.to_string(),
                before,
                after,
            }),
        ));

        Ok(OverrideReport { before, after })
    }

    /// Reassign the deck one player piloted in one game, then re-derive the
    /// deck history.
    pub async fn set_match_deck(
        &self,
        game_id: i64,
        player_id: &PlayerId,
        deck: Option<DeckName>,
        actor: Actor,
    ) -> Result<Option<String>, ServiceError> {
        let mut state = self.state.lock().await;
        let game = self.require_confirmed_game(game_id).await?;
        let rows = self.repo.match_rows_for_game(game.id).await?;
        let row = rows
            .iter()
            .find(|r| &r.player_id == player_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("player {} in game {}", player_id, game_id))
            })?;
        let before = row.deck.clone();
        if before == deck {
            return Err(ServiceError::Validation(
                "deck assignment is unchanged".to_string(),
            ));
        }

        self.repo
            .update_match_deck(game_id, player_id, deck.as_ref())
            .await?;
        self.repo.regenerate_deck_rows(game_id).await?;
        let failures = self.replay_kinds(&[EntityKind::Deck], &actor).await?;

        state.ledger.push(Snapshot::new(
            actor,
            None,
            SnapshotKind::Override(OverrideSnapshot::MatchDeck {
                game_id,
                player_id: player_id.clone(),
                before,
                after: deck,
            }),
        ));
        Ok(replay_warning(failures))
    }

    /// Set a player's default deck; optionally rewrite their unassigned
    /// historical seats to it and re-derive the deck history.
    pub async fn set_default_deck(
        &self,
        player_id: &PlayerId,
        deck: Option<DeckName>,
        retroactive: bool,
        actor: Actor,
    ) -> Result<Option<String>, ServiceError> {
        let mut state = self.state.lock().await;
        let player = self
            .repo
            .get_player(player_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("player {}", player_id)))?;
        let before = player.default_deck.clone();

        self.repo.set_default_deck(player_id, deck.as_ref()).await?;

        let mut rewritten_rows = Vec::new();
        let mut failures = 0;
        if retroactive {
            if let Some(new_deck) = &deck {
                let unassigned = self.repo.unassigned_match_rows(player_id).await?;
                let mut games = BTreeSet::new();
                for (row_id, game_id) in &unassigned {
                    self.repo
                        .set_match_deck_by_id(*row_id, Some(new_deck))
                        .await?;
                    rewritten_rows.push(RewrittenDeckRow {
                        match_id: *row_id,
                        game_id: *game_id,
                        deck_before: None,
                    });
                    games.insert(*game_id);
                }
                for game_id in games {
                    self.repo.regenerate_deck_rows(game_id).await?;
                }
                if !rewritten_rows.is_empty() {
                    failures = self.replay_kinds(&[EntityKind::Deck], &actor).await?;
                }
            }
        }

        state.ledger.push(Snapshot::new(
            actor,
            None,
            SnapshotKind::Override(OverrideSnapshot::DefaultDeck {
                player_id: player_id.clone(),
                before,
                after: deck,
                retroactive: !rewritten_rows.is_empty(),
                rewritten_rows,
            }),
        ));
        Ok(replay_warning(failures))
    }

    /// Set the turn order of a game's seats. Metadata only, never a replay.
    pub async fn set_turn_order(
        &self,
        game_id: i64,
        seats: Vec<TurnOrderInput>,
        actor: Actor,
    ) -> Result<(), ServiceError> {
        validate_turn_orders(seats.iter().map(|s| s.turn_order))?;

        let mut state = self.state.lock().await;
        let game = self.require_confirmed_game(game_id).await?;

        // (row id, participant id, current order) for the game's primary rows.
        let current: Vec<(i64, String, Option<i64>)> = match game.kind {
            EntityKind::Player => self
                .repo
                .match_rows_for_game(game_id)
                .await?
                .into_iter()
                .map(|r| (r.id, r.player_id.as_str().to_string(), r.turn_order))
                .collect(),
            EntityKind::Deck => self
                .repo
                .deck_rows_for_game(game_id)
                .await?
                .into_iter()
                .map(|r| (r.id, r.deck_name.as_str().to_string(), r.turn_order))
                .collect(),
        };

        // Duplicate decks in one game consume rows first-come-first-served.
        let mut consumed = vec![false; current.len()];
        let mut merged: Vec<Option<i64>> = current.iter().map(|(_, _, order)| *order).collect();
        let mut before = Vec::with_capacity(seats.len());
        let mut after = Vec::with_capacity(seats.len());
        for seat in &seats {
            let slot = current
                .iter()
                .enumerate()
                .find(|(i, (_, id, _))| !consumed[*i] && id == &seat.id)
                .map(|(i, row)| (i, row.0, row.2));
            let Some((index, row_id, old)) = slot else {
                return Err(ServiceError::NotFound(format!(
                    "participant {} in game {}",
                    seat.id, game_id
                )));
            };
            consumed[index] = true;
            merged[index] = seat.turn_order;
            before.push(SeatTurnOrder {
                row_id,
                turn_order: old,
            });
            after.push(SeatTurnOrder {
                row_id,
                turn_order: seat.turn_order,
            });
        }

        // Uniqueness must hold across every seat of the game, including rows
        // this request leaves untouched.
        validate_turn_orders(merged.into_iter())?;

        for seat in &after {
            match game.kind {
                EntityKind::Player => {
                    self.repo
                        .update_match_turn_order(seat.row_id, seat.turn_order)
                        .await?
                }
                EntityKind::Deck => {
                    self.repo
                        .update_deck_turn_order(seat.row_id, seat.turn_order)
                        .await?
                }
            }
        }

        state.ledger.push(Snapshot::new(
            actor,
            None,
            SnapshotKind::Override(OverrideSnapshot::TurnOrder {
                game_id,
                kind: game.kind,
                before,
                after,
            }),
        ));
        Ok(())
    }

    /// Deactivate or reactivate a game, then re-derive every history it
    /// touches.
    pub async fn toggle_game_active(
        &self,
        game_id: i64,
        active: bool,
        actor: Actor,
    ) -> Result<Option<String>, ServiceError> {
        let mut state = self.state.lock().await;
        let game = self.require_confirmed_game(game_id).await?;
        if game.active == active {
            return Err(ServiceError::Validation(format!(
                "game {} is already {}",
                game_id,
                if active { "active" } else { "inactive" }
            )));
        }

        self.repo.set_game_active(game_id, active).await?;
        let kinds = self.kinds_for_game(&game).await?;
        let failures = self.replay_kinds(&kinds, &actor).await?;

        state.ledger.push(Snapshot::new(
            actor,
            None,
            SnapshotKind::Override(OverrideSnapshot::ActiveFlag {
                game_id,
                before: game.active,
                after: active,
            }),
        ));
        Ok(replay_warning(failures))
    }

    async fn require_confirmed_game(&self, game_id: i64) -> Result<GameRecord, ServiceError> {
        let game = self
            .repo
            .get_game(game_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("game {}", game_id)))?;
        if game.status != GameStatus::Confirmed {
            return Err(ServiceError::NotFound(format!("game {}", game_id)));
        }
        Ok(game)
    }

    async fn kinds_for_game(&self, game: &GameRecord) -> Result<Vec<EntityKind>, sqlx::Error> {
        match game.kind {
            EntityKind::Deck => Ok(vec![EntityKind::Deck]),
            EntityKind::Player => {
                let mut kinds = vec![EntityKind::Player];
                if !self.repo.deck_rows_for_game(game.id).await?.is_empty() {
                    kinds.push(EntityKind::Deck);
                }
                Ok(kinds)
            }
        }
    }

    // =========================================================================
    // Undo / redo
    // =========================================================================

    /// Invert the most recent mutation. `Ok(None)` means nothing to undo.
    pub async fn undo(&self, actor: Actor) -> Result<Option<String>, ServiceError> {
        let mut state = self.state.lock().await;
        let Some(snapshot) = state.ledger.pop_active() else {
            return Ok(None);
        };
        match self.apply_inverse(&snapshot, &actor).await {
            Ok(()) => {
                let description = snapshot.describe();
                state.ledger.push_redo(snapshot);
                Ok(Some(description))
            }
            Err(e) => {
                // The ledger must not lose an entry to a failed inverse.
                state.ledger.reinstate(snapshot);
                Err(e)
            }
        }
    }

    /// Reapply the most recently undone mutation. `Ok(None)` means nothing
    /// to redo.
    pub async fn redo(&self, actor: Actor) -> Result<Option<String>, ServiceError> {
        let mut state = self.state.lock().await;
        let Some(snapshot) = state.ledger.pop_redo() else {
            return Ok(None);
        };
        match self.apply_forward(&snapshot, &actor).await {
            Ok(()) => {
                let description = snapshot.describe();
                state.ledger.reinstate(snapshot);
                Ok(Some(description))
            }
            Err(e) => {
                state.ledger.push_redo(snapshot);
                Err(e)
            }
        }
    }

    async fn apply_inverse(&self, snapshot: &Snapshot, actor: &Actor) -> Result<(), ServiceError> {
        match &snapshot.kind {
            SnapshotKind::Match(m) => {
                self.repo.remove_game_rows(m.game.id).await?;
                self.replay_kinds(&m.kinds_touched(), actor).await?;
                let params = json!({ "game_id": m.game.id, "action": "undo" });
                for change in m.participants.iter() {
                    self.record_audit(AuditEntry::new(
                        EntityKind::Player,
                        change.id.clone(),
                        ChangeKind::Undo,
                        change.after,
                        change.before,
                        actor.clone(),
                        params.clone(),
                    ))
                    .await;
                }
                for change in m.decks.iter() {
                    self.record_audit(AuditEntry::new(
                        EntityKind::Deck,
                        change.id.clone(),
                        ChangeKind::Undo,
                        change.after,
                        change.before,
                        actor.clone(),
                        params.clone(),
                    ))
                    .await;
                }
                Ok(())
            }
            SnapshotKind::Override(o) => self.apply_override_image(o, actor, true).await,
            SnapshotKind::Decay(d) => self.apply_decay_image(d, actor, true).await,
        }
    }

    async fn apply_forward(&self, snapshot: &Snapshot, actor: &Actor) -> Result<(), ServiceError> {
        match &snapshot.kind {
            SnapshotKind::Match(m) => {
                self.repo
                    .restore_game(m.game.id, &m.player_rows, &m.deck_rows)
                    .await?;
                self.replay_kinds(&m.kinds_touched(), actor).await?;
                let params = json!({ "game_id": m.game.id, "action": "redo" });
                for change in m.participants.iter() {
                    self.record_audit(AuditEntry::new(
                        EntityKind::Player,
                        change.id.clone(),
                        ChangeKind::Undo,
                        change.before,
                        change.after,
                        actor.clone(),
                        params.clone(),
                    ))
                    .await;
                }
                for change in m.decks.iter() {
                    self.record_audit(AuditEntry::new(
                        EntityKind::Deck,
                        change.id.clone(),
                        ChangeKind::Undo,
                        change.before,
                        change.after,
                        actor.clone(),
                        params.clone(),
                    ))
                    .await;
                }
                Ok(())
            }
            SnapshotKind::Override(o) => self.apply_override_image(o, actor, false).await,
            SnapshotKind::Decay(d) => self.apply_decay_image(d, actor, false).await,
        }
    }

    /// Restore one side of an override snapshot. `invert` picks the before
    /// image (undo) over the after image (redo).
    async fn apply_override_image(
        &self,
        snapshot: &OverrideSnapshot,
        actor: &Actor,
        invert: bool,
    ) -> Result<(), ServiceError> {
        match snapshot {
            OverrideSnapshot::Rating {
                kind,
                id,
                before,
                after,
            } => {
                let (from, to) = if invert {
                    (after, before)
                } else {
                    (before, after)
                };
                self.restore_entity_image(*kind, id, *to).await?;
                self.record_audit(AuditEntry::new(
                    *kind,
                    id.clone(),
                    ChangeKind::Undo,
                    *from,
                    *to,
                    actor.clone(),
                    json!({ "action": if invert { "undo" } else { "redo" } }),
                ))
                .await;
                Ok(())
            }
            OverrideSnapshot::MatchDeck {
                game_id,
                player_id,
                before,
                after,
            } => {
                let target = if invert { before } else { after };
                self.repo
                    .update_match_deck(*game_id, player_id, target.as_ref())
                    .await?;
                self.repo.regenerate_deck_rows(*game_id).await?;
                self.replay_kinds(&[EntityKind::Deck], actor).await?;
                Ok(())
            }
            OverrideSnapshot::DefaultDeck {
                player_id,
                before,
                after,
                retroactive,
                rewritten_rows,
            } => {
                let target = if invert { before } else { after };
                self.repo.set_default_deck(player_id, target.as_ref()).await?;
                if *retroactive {
                    let mut games = BTreeSet::new();
                    for row in rewritten_rows {
                        let deck = if invert {
                            row.deck_before.as_ref()
                        } else {
                            after.as_ref()
                        };
                        self.repo.set_match_deck_by_id(row.match_id, deck).await?;
                        games.insert(row.game_id);
                    }
                    for game_id in games {
                        self.repo.regenerate_deck_rows(game_id).await?;
                    }
                    self.replay_kinds(&[EntityKind::Deck], actor).await?;
                }
                Ok(())
            }
            OverrideSnapshot::TurnOrder {
                game_id: _,
                kind,
                before,
                after,
            } => {
                let target = if invert { before } else { after };
                for seat in target {
                    match kind {
                        EntityKind::Player => {
                            self.repo
                                .update_match_turn_order(seat.row_id, seat.turn_order)
                                .await?
                        }
                        EntityKind::Deck => {
                            self.repo
                                .update_deck_turn_order(seat.row_id, seat.turn_order)
                                .await?
                        }
                    }
                }
                Ok(())
            }
            OverrideSnapshot::ActiveFlag {
                game_id,
                before,
                after,
            } => {
                let target = if invert { *before } else { *after };
                self.repo.set_game_active(*game_id, target).await?;
                let game = self
                    .repo
                    .get_game(*game_id)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("game {}", game_id)))?;
                let kinds = self.kinds_for_game(&game).await?;
                self.replay_kinds(&kinds, actor).await?;
                Ok(())
            }
        }
    }

    async fn apply_decay_image(
        &self,
        snapshot: &DecaySnapshot,
        actor: &Actor,
        invert: bool,
    ) -> Result<(), ServiceError> {
        for decayed in &snapshot.players {
            let Some(mut player) = self.repo.get_player(&decayed.id).await? else {
                continue;
            };
            let before = player.image();
            if invert {
                player.rating = decayed.before;
                player.decay_steps = decayed.steps_before;
            } else {
                player.rating = decayed.after;
                player.decay_steps = decayed.steps_after;
            }
            self.repo.upsert_player(&player).await?;
            self.record_audit(AuditEntry::new(
                EntityKind::Player,
                decayed.id.as_str().to_string(),
                ChangeKind::Undo,
                before,
                player.image(),
                actor.clone(),
                json!({ "action": if invert { "undo" } else { "redo" }, "decay": true }),
            ))
            .await;
        }
        Ok(())
    }

    async fn restore_entity_image(
        &self,
        kind: EntityKind,
        id: &str,
        image: EntityImage,
    ) -> Result<(), ServiceError> {
        match kind {
            EntityKind::Player => {
                let player_id = PlayerId::new(id.to_string());
                let mut record = self
                    .repo
                    .get_player(&player_id)
                    .await?
                    .unwrap_or_else(|| PlayerRecord::new(player_id, TimeMs::now()));
                record.rating = image.rating();
                record.wins = image.wins;
                record.losses = image.losses;
                record.draws = image.draws;
                self.repo.upsert_player(&record).await?;
            }
            EntityKind::Deck => {
                let name = DeckName::new(id.to_string());
                let mut record = self
                    .repo
                    .get_deck(&name)
                    .await?
                    .unwrap_or_else(|| DeckRecord::new(name, TimeMs::now()));
                record.rating = image.rating();
                record.wins = image.wins;
                record.losses = image.losses;
                record.draws = image.draws;
                self.repo.upsert_deck(&record).await?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Decay sweep
    // =========================================================================

    /// Apply owed decay steps to every idle player. Returns `None` when decay
    /// is disabled or nobody owed a step.
    pub async fn run_decay_sweep(
        &self,
        actor: Actor,
    ) -> Result<Option<DecaySweepReport>, ServiceError> {
        let Some(params) = self.decay_params() else {
            return Ok(None);
        };

        let mut state = self.state.lock().await;
        let now = TimeMs::now();
        let mut decayed = Vec::new();
        let mut total_steps = 0i64;

        for mut player in self.repo.all_players().await? {
            let Some(last) = player.last_active else {
                continue;
            };
            let owed = owed_steps(&params, last, now);
            let fresh = owed - player.decay_steps;
            if fresh <= 0 {
                continue;
            }

            let before_rating = player.rating;
            let steps_before = player.decay_steps;
            let before = player.image();

            player.rating = apply_steps(&params, player.rating, fresh);
            player.decay_steps = owed;
            self.repo.upsert_player(&player).await?;

            self.record_audit(AuditEntry::new(
                EntityKind::Player,
                player.id.as_str().to_string(),
                ChangeKind::Decay,
                before,
                player.image(),
                actor.clone(),
                json!({ "steps": fresh }),
            ))
            .await;

            total_steps += fresh;
            decayed.push(DecayedPlayer {
                id: player.id.clone(),
                before: before_rating,
                steps_before,
                after: player.rating,
                steps_after: player.decay_steps,
            });
        }

        if decayed.is_empty() {
            return Ok(None);
        }

        let players = decayed.len();
        state.ledger.push(Snapshot::new(
            actor,
            None,
            SnapshotKind::Decay(DecaySnapshot { players: decayed }),
        ));
        Ok(Some(DecaySweepReport {
            players,
            steps: total_steps,
        }))
    }

    // =========================================================================
    // Read queries (bypass the write lock)
    // =========================================================================

    pub async fn get_player(&self, id: &PlayerId) -> Result<Option<PlayerRecord>, ServiceError> {
        Ok(self.repo.get_player(id).await?)
    }

    pub async fn get_deck(&self, name: &DeckName) -> Result<Option<DeckRecord>, ServiceError> {
        Ok(self.repo.get_deck(name).await?)
    }

    /// Players ordered by display rating, best first.
    pub async fn player_standings(&self) -> Result<Vec<PlayerRecord>, ServiceError> {
        let mut players = self.repo.all_players().await?;
        players.sort_by(|a, b| {
            b.rating
                .elo()
                .cmp(&a.rating.elo())
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(players)
    }

    /// Decks ordered by display rating, best first.
    pub async fn deck_standings(&self) -> Result<Vec<DeckRecord>, ServiceError> {
        let mut decks = self.repo.all_decks().await?;
        decks.sort_by(|a, b| {
            b.rating
                .elo()
                .cmp(&a.rating.elo())
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(decks)
    }

    pub async fn audit_history(
        &self,
        kind: EntityKind,
        target_id: &str,
        limit: i64,
    ) -> Result<Vec<AuditEntry>, ServiceError> {
        Ok(self.repo.audit_history(kind, target_id, limit).await?)
    }
}

fn bump(record: &mut PlayerRecord, outcome: Outcome) {
    match outcome {
        Outcome::Win => record.wins += 1,
        Outcome::Loss => record.losses += 1,
        Outcome::Draw => record.draws += 1,
    }
}

fn bump_deck(record: &mut DeckRecord, outcome: Outcome) {
    match outcome {
        Outcome::Win => record.wins += 1,
        Outcome::Loss => record.losses += 1,
        Outcome::Draw => record.draws += 1,
    }
}

fn deck_change_list(
    decks: &HashMap<DeckName, DeckRecord>,
    befores: &HashMap<DeckName, EntityImage>,
) -> Vec<ParticipantChange> {
    let mut changes: Vec<ParticipantChange> = decks
        .iter()
        .map(|(name, deck)| {
            let before = befores
                .get(name)
                .copied()
                .unwrap_or_else(|| deck.image());
            let outcome = if deck.wins > before.wins {
                Outcome::Win
            } else if deck.draws > before.draws {
                Outcome::Draw
            } else {
                Outcome::Loss
            };
            ParticipantChange {
                id: name.as_str().to_string(),
                outcome,
                before,
                after: deck.image(),
            }
        })
        .collect();
    changes.sort_by(|a, b| a.id.cmp(&b.id));
    changes
}

fn replay_warning(failures: usize) -> Option<String> {
    (failures > 0).then(|| format!("replay finished with {} persistence failure(s)", failures))
}

fn validate_submission(
    kind: EntityKind,
    participants: &[ParticipantInput],
) -> Result<(), ServiceError> {
    let n = participants.len();
    if !(3..=4).contains(&n) {
        return Err(ServiceError::Validation(
            "a pod seats 3 or 4 participants".to_string(),
        ));
    }
    if participants.iter().any(|p| p.id.trim().is_empty()) {
        return Err(ServiceError::Validation(
            "participant ids must not be empty".to_string(),
        ));
    }

    let wins = participants
        .iter()
        .filter(|p| p.outcome == Outcome::Win)
        .count();
    let draws = participants
        .iter()
        .filter(|p| p.outcome == Outcome::Draw)
        .count();
    let decisive = wins == 1 && draws == 0;
    let all_draw = draws == n;
    if !decisive && !all_draw {
        return Err(ServiceError::Validation(
            "outcomes must be exactly one winner with the rest losing, or an all-draw".to_string(),
        ));
    }

    validate_turn_orders(participants.iter().map(|p| p.turn_order))?;

    match kind {
        EntityKind::Player => {
            let mut seen = BTreeSet::new();
            for p in participants {
                if !seen.insert(p.id.as_str()) {
                    return Err(ServiceError::Validation(format!(
                        "player {} appears more than once",
                        p.id
                    )));
                }
            }
        }
        EntityKind::Deck => {
            // The same archetype may repeat, but deck games have no seat decks.
            if participants.iter().any(|p| p.deck.is_some()) {
                return Err(ServiceError::Validation(
                    "deck games cannot declare per-seat decks".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_turn_orders(
    orders: impl Iterator<Item = Option<i64>>,
) -> Result<(), ServiceError> {
    let mut seen = BTreeSet::new();
    for order in orders.flatten() {
        if !(1..=4).contains(&order) {
            return Err(ServiceError::Validation(
                "turn order must be between 1 and 4".to_string(),
            ));
        }
        if !seen.insert(order) {
            return Err(ServiceError::Validation(format!(
                "turn order {} assigned twice",
                order
            )));
        }
    }
    Ok(())
}

fn apply_override(changes: &RatingOverride, before: EntityImage) -> EntityImage {
    let mut rating = before.rating();
    if let Some(sigma) = changes.sigma {
        rating.sigma = sigma;
    }
    if let Some(mu) = changes.mu {
        rating.mu = mu;
    }
    if let Some(elo) = changes.elo {
        rating = Rating::for_elo(elo, rating.sigma);
    }
    EntityImage::new(
        rating,
        changes.wins.unwrap_or(before.wins),
        changes.losses.unwrap_or(before.losses),
        changes.draws.unwrap_or(before.draws),
    )
}
