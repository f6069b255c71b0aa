//! Post-processing pipeline applied after every openskill update.
//!
//! The raw Plackett-Luce output is adjusted in a fixed order: short-pod
//! dampening, then the minimum-change guarantee, then the participation
//! bonus. The bonus runs last so it is never itself clamped by the
//! minimum-change rule. Each step can be toggled off independently.

use crate::domain::{Outcome, Rating};
use crate::engine::openskill::{rate, RankedSeat};

/// Mu-delta scale applied when a pod ran one seat short of the nominal four.
const SHORT_POD_FACTOR: f64 = 0.9;

/// Smallest Elo movement a decisive result may produce.
const MIN_DECISIVE_DELTA: f64 = 2.0;

/// Flat Elo credit for showing up.
const PARTICIPATION_BONUS: f64 = 1.0;

/// Nominal pod size; hybrid deck groups are padded up to this with phantoms.
const NOMINAL_POD_SIZE: usize = 4;

/// One real competitor entering the pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PodSeat {
    pub rating: Rating,
    pub outcome: Outcome,
}

impl PodSeat {
    pub fn new(rating: Rating, outcome: Outcome) -> Self {
        PodSeat { rating, outcome }
    }
}

/// The shared rating pipeline: openskill plus post-processing toggles.
///
/// The submission path and the replay engine must both rate games through
/// the same pipeline instance configuration, otherwise a replay would not
/// reproduce the history it is rebuilding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingPipeline {
    pub dampen_short_pods: bool,
    pub minimum_change: bool,
    pub participation_bonus: bool,
    pub phantom_padding: bool,
}

impl Default for RatingPipeline {
    fn default() -> Self {
        RatingPipeline {
            dampen_short_pods: true,
            minimum_change: true,
            participation_bonus: true,
            phantom_padding: true,
        }
    }
}

impl RatingPipeline {
    /// Rate a pod of real competitors (player games, pure deck games).
    pub fn rate_pod(&self, seats: &[PodSeat]) -> Vec<Rating> {
        self.run(seats, false)
    }

    /// Rate the deck side of a hybrid player+deck game.
    ///
    /// Groups short of the nominal four are padded with phantom opponents at
    /// the prior, ranked strictly last. Phantom results are discarded before
    /// post-processing; they are never persisted, logged, or counted. A group
    /// padded to four is not a short pod, so dampening does not apply to it.
    pub fn rate_hybrid_decks(&self, seats: &[PodSeat]) -> Vec<Rating> {
        self.run(seats, self.phantom_padding)
    }

    fn run(&self, seats: &[PodSeat], pad: bool) -> Vec<Rating> {
        let mut ranked: Vec<RankedSeat> = seats
            .iter()
            .map(|s| RankedSeat::new(s.rating, s.outcome.rank()))
            .collect();

        if pad {
            let phantom_rank = seats.iter().map(|s| s.outcome.rank()).max().unwrap_or(1) + 1;
            while ranked.len() < NOMINAL_POD_SIZE {
                ranked.push(RankedSeat::new(Rating::default(), phantom_rank));
            }
        }

        let group_size = ranked.len();
        let mut out = rate(&ranked);
        out.truncate(seats.len());

        if self.dampen_short_pods && group_size == NOMINAL_POD_SIZE - 1 {
            for (after, seat) in out.iter_mut().zip(seats) {
                after.mu = seat.rating.mu + (after.mu - seat.rating.mu) * SHORT_POD_FACTOR;
            }
        }

        if self.minimum_change {
            for (after, seat) in out.iter_mut().zip(seats) {
                let old_elo = seat.rating.elo_f();
                match seat.outcome {
                    Outcome::Win => {
                        if after.elo_f() - old_elo < MIN_DECISIVE_DELTA {
                            *after = Rating::for_elo(old_elo + MIN_DECISIVE_DELTA, after.sigma);
                        }
                    }
                    Outcome::Loss => {
                        if after.elo_f() - old_elo > -MIN_DECISIVE_DELTA {
                            *after = Rating::for_elo(old_elo - MIN_DECISIVE_DELTA, after.sigma);
                        }
                    }
                    Outcome::Draw => {}
                }
            }
        }

        if self.participation_bonus {
            for after in out.iter_mut() {
                *after = Rating::for_elo(after.elo_f() + PARTICIPATION_BONUS, after.sigma);
            }
        }

        out
    }
}
