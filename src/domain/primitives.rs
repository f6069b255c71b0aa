//! Domain primitives: TimeMs, PlayerId, DeckName, Actor, EntityKind, Outcome, GameStatus.

use serde::{Deserialize, Serialize};

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        TimeMs(chrono::Utc::now().timestamp_millis())
    }

    /// Get the underlying milliseconds value.
    pub fn as_ms(&self) -> i64 {
        self.0
    }

    /// Milliseconds elapsed from `earlier` to `self`, clamped at zero.
    pub fn since(&self, earlier: TimeMs) -> i64 {
        self.0.saturating_sub(earlier.0).max(0)
    }
}

/// Player identifier (external chat-layer id).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: String) -> Self {
        PlayerId(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deck archetype name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeckName(pub String);

impl DeckName {
    pub fn new(name: String) -> Self {
        DeckName(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeckName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who performed a mutating operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor(pub String);

impl Actor {
    pub fn new(actor: String) -> Self {
        Actor(actor)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which rating table an entity or game belongs to. Mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Player,
    Deck,
}

impl EntityKind {
    pub fn as_str(&self) -> &str {
        match self {
            EntityKind::Player => "player",
            EntityKind::Deck => "deck",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "player" => Some(EntityKind::Player),
            "deck" => Some(EntityKind::Deck),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-seat game result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "w")]
    Win,
    #[serde(rename = "l")]
    Loss,
    #[serde(rename = "d")]
    Draw,
}

impl Outcome {
    pub fn as_str(&self) -> &str {
        match self {
            Outcome::Win => "w",
            Outcome::Loss => "l",
            Outcome::Draw => "d",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "w" => Some(Outcome::Win),
            "l" => Some(Outcome::Loss),
            "d" => Some(Outcome::Draw),
            _ => None,
        }
    }

    /// Finishing rank for the rating engine. Lower is better; draws share first.
    pub fn rank(&self) -> usize {
        match self {
            Outcome::Win | Outcome::Draw => 1,
            Outcome::Loss => 2,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of a game master record. Undone games keep their row as a
/// tombstone so redo can restore them under the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Confirmed,
    Undone,
}

impl GameStatus {
    pub fn as_str(&self) -> &str {
        match self {
            GameStatus::Confirmed => "confirmed",
            GameStatus::Undone => "undone",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "confirmed" => Some(GameStatus::Confirmed),
            "undone" => Some(GameStatus::Undone),
            _ => None,
        }
    }
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
