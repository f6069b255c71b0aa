pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod orchestration;
pub mod replay;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    Actor, DeckName, EntityKind, GameStatus, Outcome, PlayerId, Rating, TimeMs,
};
pub use error::AppError;
pub use orchestration::{LeagueService, ServiceError};
