//! Before/after snapshots for the undo/redo ledger.
//!
//! Every mutating operation pushes exactly one snapshot carrying what is
//! needed to invert it byte-for-byte. The three kinds form a closed sum type;
//! undo and redo match exhaustively on it.

use crate::domain::{
    Actor, DeckMatchRow, DeckName, EntityImage, EntityKind, GameRecord, MatchRow,
    ParticipantChange, PlayerId, Rating, TimeMs,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One reversible mutation, as pushed onto the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub actor: Actor,
    pub reason: Option<String>,
    pub created_at: TimeMs,
    pub kind: SnapshotKind,
}

impl Snapshot {
    pub fn new(actor: Actor, reason: Option<String>, kind: SnapshotKind) -> Self {
        Snapshot {
            id: Uuid::new_v4(),
            actor,
            reason,
            created_at: TimeMs::now(),
            kind,
        }
    }

    /// Human-readable summary for undo/redo responses.
    pub fn describe(&self) -> String {
        match &self.kind {
            SnapshotKind::Match(m) => format!(
                "game #{} ({}, {} seats)",
                m.game.id,
                m.game.kind,
                m.seat_count()
            ),
            SnapshotKind::Override(o) => o.describe(),
            SnapshotKind::Decay(d) => format!("decay sweep over {} players", d.players.len()),
        }
    }
}

/// What kind of mutation the snapshot captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SnapshotKind {
    /// A confirmed game submission: the full game row plus every
    /// participation row, so undo can delete them and redo can re-insert.
    Match(MatchSnapshot),
    /// A manual edit: field deltas plus enough context to restore rows.
    Override(OverrideSnapshot),
    /// A scheduled decay sweep: per-player before/after rating pairs.
    Decay(DecaySnapshot),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub game: GameRecord,
    pub player_rows: Vec<MatchRow>,
    pub deck_rows: Vec<DeckMatchRow>,
    /// Rating movement per participant at submission time, for audit on undo.
    pub participants: Vec<ParticipantChange>,
    pub decks: Vec<ParticipantChange>,
}

impl MatchSnapshot {
    pub fn seat_count(&self) -> usize {
        if self.player_rows.is_empty() {
            self.deck_rows.len()
        } else {
            self.player_rows.len()
        }
    }

    /// Entity kinds whose history this game touches.
    pub fn kinds_touched(&self) -> Vec<EntityKind> {
        let mut kinds = Vec::new();
        if !self.player_rows.is_empty() {
            kinds.push(EntityKind::Player);
        }
        if !self.deck_rows.is_empty() {
            kinds.push(EntityKind::Deck);
        }
        kinds
    }
}

/// Field-level deltas of a manual edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OverrideSnapshot {
    /// Direct rating and/or W-L-D override on one entity.
    Rating {
        kind: EntityKind,
        id: String,
        before: EntityImage,
        after: EntityImage,
    },
    /// Deck assignment of one seat in a player game.
    MatchDeck {
        game_id: i64,
        player_id: PlayerId,
        before: Option<DeckName>,
        after: Option<DeckName>,
    },
    /// A player's default deck, optionally rewritten into past unassigned rows.
    DefaultDeck {
        player_id: PlayerId,
        before: Option<DeckName>,
        after: Option<DeckName>,
        retroactive: bool,
        /// Match rows that were unassigned before the retroactive rewrite.
        rewritten_rows: Vec<RewrittenDeckRow>,
    },
    /// Turn-order metadata of one game; never triggers a replay.
    TurnOrder {
        game_id: i64,
        kind: EntityKind,
        before: Vec<SeatTurnOrder>,
        after: Vec<SeatTurnOrder>,
    },
    /// Activation flag of one game.
    ActiveFlag {
        game_id: i64,
        before: bool,
        after: bool,
    },
}

impl OverrideSnapshot {
    pub fn describe(&self) -> String {
        match self {
            OverrideSnapshot::Rating { kind, id, .. } => {
                format!("rating override on {} {}", kind, id)
            }
            OverrideSnapshot::MatchDeck {
                game_id, player_id, ..
            } => format!("deck assignment in game #{} for {}", game_id, player_id),
            OverrideSnapshot::DefaultDeck { player_id, .. } => {
                format!("default deck for {}", player_id)
            }
            OverrideSnapshot::TurnOrder { game_id, .. } => {
                format!("turn order in game #{}", game_id)
            }
            OverrideSnapshot::ActiveFlag { game_id, after, .. } => {
                if *after {
                    format!("game #{} reactivated", game_id)
                } else {
                    format!("game #{} deactivated", game_id)
                }
            }
        }
    }
}

/// One match row's prior deck value, captured before a retroactive rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewrittenDeckRow {
    pub match_id: i64,
    pub game_id: i64,
    pub deck_before: Option<DeckName>,
}

/// One seat's turn order, keyed by participation row id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatTurnOrder {
    pub row_id: i64,
    pub turn_order: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecaySnapshot {
    pub players: Vec<DecayedPlayer>,
}

/// One player's rating movement in a decay sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayedPlayer {
    pub id: PlayerId,
    pub before: Rating,
    pub steps_before: i64,
    pub after: Rating,
    pub steps_after: i64,
}
