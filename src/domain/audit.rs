//! Append-only audit trail of rating changes.

use crate::domain::{Actor, EntityImage, EntityKind, TimeMs};
use serde::{Deserialize, Serialize};

/// What caused a rating change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A game result, original or replayed.
    Game,
    /// A manual rating override.
    Manual,
    /// An undo or redo of a prior operation.
    Undo,
    /// A scheduled decay step.
    Decay,
    /// A manual win/loss/draw counter adjustment.
    WldAdjustment,
}

impl ChangeKind {
    pub fn as_str(&self) -> &str {
        match self {
            ChangeKind::Game => "game",
            ChangeKind::Manual => "manual",
            ChangeKind::Undo => "undo",
            ChangeKind::Decay => "decay",
            ChangeKind::WldAdjustment => "wld_adjustment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "game" => Some(ChangeKind::Game),
            "manual" => Some(ChangeKind::Manual),
            "undo" => Some(ChangeKind::Undo),
            "decay" => Some(ChangeKind::Decay),
            "wld_adjustment" => Some(ChangeKind::WldAdjustment),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One rating change, as appended to `rating_changes`. The core never mutates
/// or deletes these rows; writes are fire-and-forget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub target_kind: EntityKind,
    pub target_id: String,
    pub change_kind: ChangeKind,
    pub before: EntityImage,
    pub after: EntityImage,
    pub actor: Actor,
    /// Free-form context: game id, recalculation marker, override fields.
    pub params: serde_json::Value,
    pub created_at: TimeMs,
}

impl AuditEntry {
    pub fn new(
        target_kind: EntityKind,
        target_id: String,
        change_kind: ChangeKind,
        before: EntityImage,
        after: EntityImage,
        actor: Actor,
        params: serde_json::Value,
    ) -> Self {
        AuditEntry {
            target_kind,
            target_id,
            change_kind,
            before,
            after,
            actor,
            params,
            created_at: TimeMs::now(),
        }
    }
}
