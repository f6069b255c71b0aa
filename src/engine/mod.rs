//! Pure computation engines for deterministic rating logic.
//!
//! Nothing in this module touches the database or the clock: the openskill
//! update, the post-processing pipeline, and the decay step are all plain
//! functions over domain values, shared verbatim by the submission path and
//! the replay engine so both derive identical histories.

pub mod decay;
pub mod openskill;
pub mod pipeline;

pub use decay::{apply_steps, owed_steps, DecayParams};
pub use openskill::{rate, RankedSeat};
pub use pipeline::{PodSeat, RatingPipeline};
