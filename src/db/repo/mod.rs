//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `players.rs` - Player table operations
//! - `decks.rs` - Deck table operations
//! - `games.rs` - Game master records, sequence queries, transactional inserts
//! - `matches.rs` - Participation rows for both entity kinds
//! - `audit.rs` - Append-only rating change log

mod audit;
mod decks;
mod games;
mod matches;
mod players;

pub use games::{NewGame, NewSeat};

use sqlx::sqlite::SqlitePool;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
