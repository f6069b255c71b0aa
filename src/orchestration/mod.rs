//! Orchestration layer: the league service and its staged-submission state.

pub mod pending;
pub mod service;

pub use pending::{PendingRegistry, StagedGame};
pub use service::{
    DecaySweepReport, LeagueService, OverrideReport, RatingOverride, ServiceError, TurnOrderInput,
};
