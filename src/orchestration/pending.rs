//! Staged submissions awaiting confirmation.
//!
//! A staged game holds an in-memory lock per participant; a second staged
//! submission naming a locked participant is rejected rather than queued.
//! Staged entries expire after a TTL and are discarded without touching
//! ratings. Process-local: a restart drops all staged games and locks.

use crate::domain::{Actor, EntityKind, ParticipantInput, TimeMs};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// One validated submission parked until the confirmation step.
#[derive(Debug, Clone)]
pub struct StagedGame {
    pub token: Uuid,
    pub kind: EntityKind,
    pub participants: Vec<ParticipantInput>,
    pub anchor: Option<String>,
    pub submitted_by: Actor,
    pub admin_submitted: bool,
    pub staged_at: TimeMs,
}

/// In-memory registry of staged games and their participant locks.
#[derive(Debug)]
pub struct PendingRegistry {
    staged: HashMap<Uuid, StagedGame>,
    locked: HashSet<(EntityKind, String)>,
    ttl_ms: i64,
}

impl PendingRegistry {
    pub fn new(ttl_ms: i64) -> Self {
        PendingRegistry {
            staged: HashMap::new(),
            locked: HashSet::new(),
            ttl_ms,
        }
    }

    /// Stage a submission, locking every participant. Returns the id of the
    /// first already-locked participant on conflict, with nothing staged.
    #[allow(clippy::too_many_arguments)]
    pub fn stage(
        &mut self,
        kind: EntityKind,
        participants: Vec<ParticipantInput>,
        anchor: Option<String>,
        submitted_by: Actor,
        admin_submitted: bool,
        now: TimeMs,
    ) -> Result<Uuid, String> {
        for p in &participants {
            if self.locked.contains(&(kind, p.id.clone())) {
                return Err(p.id.clone());
            }
        }
        for p in &participants {
            self.locked.insert((kind, p.id.clone()));
        }

        let token = Uuid::new_v4();
        self.staged.insert(
            token,
            StagedGame {
                token,
                kind,
                participants,
                anchor,
                submitted_by,
                admin_submitted,
                staged_at: now,
            },
        );
        Ok(token)
    }

    /// Remove a staged game and release its locks (confirm or cancel path).
    pub fn take(&mut self, token: Uuid) -> Option<StagedGame> {
        let staged = self.staged.remove(&token)?;
        for p in &staged.participants {
            self.locked.remove(&(staged.kind, p.id.clone()));
        }
        Some(staged)
    }

    /// Drop every staged game older than the TTL, releasing its locks.
    /// Returns how many expired.
    pub fn expire(&mut self, now: TimeMs) -> usize {
        let ttl = self.ttl_ms;
        let expired: Vec<Uuid> = self
            .staged
            .values()
            .filter(|s| now.since(s.staged_at) >= ttl)
            .map(|s| s.token)
            .collect();
        for token in &expired {
            self.take(*token);
        }
        expired.len()
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_locked(&self, kind: EntityKind, id: &str) -> bool {
        self.locked.contains(&(kind, id.to_string()))
    }
}
