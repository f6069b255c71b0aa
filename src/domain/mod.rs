//! Domain types for the pod rating ledger.
//!
//! This module provides:
//! - Domain primitives: TimeMs, PlayerId, DeckName, Actor, Outcome
//! - Gaussian rating with the Elo-equivalent display transform
//! - Game master, match, and deck-match participation records
//! - Fractional sequence-key helpers for chronological ordering
//! - Snapshot sum type for the undo/redo ledger and audit entries

pub mod audit;
pub mod game;
pub mod primitives;
pub mod rating;
pub mod sequence;
pub mod snapshot;

pub use audit::{AuditEntry, ChangeKind};
pub use game::{
    DeckMatchRow, DeckRecord, GameRecord, MatchRow, ParticipantChange, ParticipantInput,
    PlayerRecord, SubmissionReport,
};
pub use primitives::{Actor, DeckName, EntityKind, GameStatus, Outcome, PlayerId, TimeMs};
pub use rating::{EntityImage, Rating, BETA, KAPPA, PRIOR_MU, PRIOR_SIGMA};
pub use snapshot::{
    DecaySnapshot, DecayedPlayer, MatchSnapshot, OverrideSnapshot, RewrittenDeckRow, SeatTurnOrder,
    Snapshot, SnapshotKind,
};
