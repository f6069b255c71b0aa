//! Game master records, participation rows, and submission inputs/reports.

use crate::domain::{
    Actor, DeckName, EntityImage, EntityKind, GameStatus, Outcome, PlayerId, Rating, TimeMs,
};
use serde::{Deserialize, Serialize};

/// A rated player row from the `players` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub rating: Rating,
    pub wins: i64,
    pub losses: i64,
    pub draws: i64,
    /// Timestamp of the newest confirmed+active game this player appeared in.
    pub last_active: Option<TimeMs>,
    /// Decay steps already applied since `last_active`; keeps sweeps idempotent.
    pub decay_steps: i64,
    /// Deck assumed for future submissions when a seat declares none.
    pub default_deck: Option<DeckName>,
    pub created_at: TimeMs,
}

impl PlayerRecord {
    /// Fresh player at the zero-game prior.
    pub fn new(id: PlayerId, created_at: TimeMs) -> Self {
        PlayerRecord {
            id,
            rating: Rating::default(),
            wins: 0,
            losses: 0,
            draws: 0,
            last_active: None,
            decay_steps: 0,
            default_deck: None,
            created_at,
        }
    }

    pub fn image(&self) -> EntityImage {
        EntityImage::new(self.rating, self.wins, self.losses, self.draws)
    }
}

/// A rated deck archetype row from the `decks` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckRecord {
    pub name: DeckName,
    pub rating: Rating,
    pub wins: i64,
    pub losses: i64,
    pub draws: i64,
    pub created_at: TimeMs,
}

impl DeckRecord {
    /// Fresh deck at the zero-game prior.
    pub fn new(name: DeckName, created_at: TimeMs) -> Self {
        DeckRecord {
            name,
            rating: Rating::default(),
            wins: 0,
            losses: 0,
            draws: 0,
            created_at,
        }
    }

    pub fn image(&self) -> EntityImage {
        EntityImage::new(self.rating, self.wins, self.losses, self.draws)
    }
}

/// One game in the master ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: i64,
    pub kind: EntityKind,
    /// Fractional total-order key; only confirmed+active games replay.
    pub sequence: f64,
    pub status: GameStatus,
    pub active: bool,
    pub submitted_by: Actor,
    pub admin_submitted: bool,
    pub created_at: TimeMs,
}

impl GameRecord {
    pub fn counts_for_replay(&self) -> bool {
        self.status == GameStatus::Confirmed && self.active
    }
}

/// One player's seat in a player game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRow {
    pub id: i64,
    pub game_id: i64,
    pub player_id: PlayerId,
    pub outcome: Outcome,
    pub turn_order: Option<i64>,
    /// Rating as computed at this game's point in history.
    pub rating_after: Rating,
    /// Deck the player piloted, when declared (makes the game hybrid).
    pub deck: Option<DeckName>,
}

/// One deck's seat in a deck game or a hybrid player game. The same archetype
/// may appear in several rows of one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckMatchRow {
    pub id: i64,
    pub game_id: i64,
    pub deck_name: DeckName,
    pub outcome: Outcome,
    pub turn_order: Option<i64>,
    pub rating_after: Rating,
}

/// One seat of a submission, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantInput {
    /// Player id for player games, deck name for deck games.
    pub id: String,
    pub outcome: Outcome,
    pub turn_order: Option<i64>,
    /// Declared deck; player games only.
    pub deck: Option<String>,
}

/// Per-participant rating movement returned to the caller for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantChange {
    pub id: String,
    pub outcome: Outcome,
    pub before: EntityImage,
    pub after: EntityImage,
}

/// Result of a confirmed game submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReport {
    pub game_id: i64,
    pub sequence: f64,
    pub participants: Vec<ParticipantChange>,
    /// Deck movements for hybrid games (empty for pure player games).
    pub decks: Vec<ParticipantChange>,
    /// Set when a triggered replay finished with per-entity persistence failures.
    pub warning: Option<String>,
}
