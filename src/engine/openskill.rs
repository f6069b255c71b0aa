//! Weng-Lin Plackett-Luce skill update.
//!
//! Mean/variance message passing over a ranking likelihood, per Weng & Lin's
//! Bayesian approximation method for online ranking. Pure and deterministic:
//! identical seats and ranks always produce identical outputs. The engine has
//! no validation responsibility; callers reject malformed rank assignments
//! before invoking it.

use crate::domain::{Rating, BETA, KAPPA};

/// One competitor as seen by the update: current belief plus finishing rank.
/// Lower rank is better; tied seats share a rank.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedSeat {
    pub rating: Rating,
    pub rank: usize,
}

impl RankedSeat {
    pub fn new(rating: Rating, rank: usize) -> Self {
        RankedSeat { rating, rank }
    }
}

/// Update every seat's rating from one game's finishing order.
///
/// Output order matches input order. Seats are independent free-for-all
/// competitors (a pod has no teams).
pub fn rate(seats: &[RankedSeat]) -> Vec<Rating> {
    debug_assert!(!seats.is_empty(), "caller must reject empty pods");

    let beta_sq = BETA * BETA;
    let c = seats
        .iter()
        .map(|s| s.rating.sigma * s.rating.sigma + beta_sq)
        .sum::<f64>()
        .sqrt();

    let exp_mu: Vec<f64> = seats.iter().map(|s| (s.rating.mu / c).exp()).collect();

    // sum_q[q] = Σ exp(μ_s / c) over seats s that placed the same or worse
    // than q — the candidates still in the running when q was picked in the
    // sequential-choice model.
    let sum_q: Vec<f64> = seats
        .iter()
        .map(|q| {
            seats
                .iter()
                .zip(exp_mu.iter())
                .filter(|(s, _)| s.rank >= q.rank)
                .map(|(_, e)| e)
                .sum()
        })
        .collect();

    // a[q] = number of seats tied with q, q included.
    let ties: Vec<f64> = seats
        .iter()
        .map(|q| seats.iter().filter(|s| s.rank == q.rank).count() as f64)
        .collect();

    seats
        .iter()
        .enumerate()
        .map(|(i, seat)| {
            let sigma_sq = seat.rating.sigma * seat.rating.sigma;
            let mut omega = 0.0;
            let mut delta = 0.0;

            for (q, other) in seats.iter().enumerate() {
                if other.rank > seat.rank {
                    continue;
                }
                let p = exp_mu[i] / sum_q[q];
                if q == i {
                    omega += (1.0 - p) / ties[q];
                } else {
                    omega -= p / ties[q];
                }
                delta += p * (1.0 - p) / ties[q];
            }

            let mu = seat.rating.mu + omega * (sigma_sq / c);
            let gamma = seat.rating.sigma / c;
            let shrink = 1.0 - delta * (sigma_sq / (c * c)) * gamma;
            let sigma = seat.rating.sigma * shrink.max(KAPPA).sqrt();

            Rating::new(mu, sigma)
        })
        .collect()
}
