//! Inactivity decay steps for player ratings.
//!
//! A decay step inflates sigma toward the prior and pulls the continuous
//! Elo-equivalent down by a fixed amount, floor-clamped, by solving mu at
//! the new sigma. Owed steps are a pure function of a player's last activity
//! and the configured grace/interval, so the scheduled sweep and the replay
//! engine derive identical step counts from timestamps alone.

use crate::domain::{Rating, TimeMs, PRIOR_SIGMA};

/// Tunables for the decay model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayParams {
    /// Idle time before the first step is owed.
    pub grace_ms: i64,
    /// Idle time per additional step after the grace period.
    pub interval_ms: i64,
    /// Continuous Elo lost per step.
    pub elo_per_step: f64,
    /// Continuous Elo a rating never decays below.
    pub elo_floor: f64,
    /// Per-step sigma inflation, added in quadrature and capped at the prior.
    pub sigma_growth: f64,
}

/// Total decay steps owed as of `now` for a player last active at `last_active`.
pub fn owed_steps(params: &DecayParams, last_active: TimeMs, now: TimeMs) -> i64 {
    if params.interval_ms <= 0 {
        return 0;
    }
    let idle = now.since(last_active);
    if idle < params.grace_ms {
        0
    } else {
        (idle - params.grace_ms) / params.interval_ms + 1
    }
}

/// Apply `steps` decay steps to a rating.
pub fn apply_steps(params: &DecayParams, rating: Rating, steps: i64) -> Rating {
    let mut r = rating;
    for _ in 0..steps.max(0) {
        let sigma = (r.sigma * r.sigma + params.sigma_growth * params.sigma_growth)
            .sqrt()
            .min(PRIOR_SIGMA);
        let current = r.elo_f();
        let elo = if current <= params.elo_floor {
            // Already at or below the floor: sigma still inflates, Elo holds.
            current
        } else {
            (current - params.elo_per_step).max(params.elo_floor)
        };
        r = Rating::for_elo(elo, sigma);
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PRIOR_MU;

    fn params() -> DecayParams {
        DecayParams {
            grace_ms: 1_000,
            interval_ms: 100,
            elo_per_step: 5.0,
            elo_floor: 900.0,
            sigma_growth: 0.5,
        }
    }

    #[test]
    fn test_no_steps_inside_grace() {
        let p = params();
        assert_eq!(owed_steps(&p, TimeMs::new(0), TimeMs::new(999)), 0);
    }

    #[test]
    fn test_first_step_at_grace_boundary() {
        let p = params();
        assert_eq!(owed_steps(&p, TimeMs::new(0), TimeMs::new(1_000)), 1);
        assert_eq!(owed_steps(&p, TimeMs::new(0), TimeMs::new(1_099)), 1);
        assert_eq!(owed_steps(&p, TimeMs::new(0), TimeMs::new(1_100)), 2);
    }

    #[test]
    fn test_steps_scale_with_idle_time() {
        let p = params();
        assert_eq!(owed_steps(&p, TimeMs::new(0), TimeMs::new(1_950)), 10);
    }

    #[test]
    fn test_zero_interval_owes_nothing() {
        let p = DecayParams {
            interval_ms: 0,
            ..params()
        };
        assert_eq!(owed_steps(&p, TimeMs::new(0), TimeMs::new(1_000_000)), 0);
    }

    #[test]
    fn test_step_lowers_elo_and_inflates_sigma() {
        let p = params();
        let before = Rating::new(30.0, 5.0);
        let after = apply_steps(&p, before, 1);
        assert!((before.elo_f() - after.elo_f() - 5.0).abs() < 1e-9);
        assert!(after.sigma > before.sigma);
    }

    #[test]
    fn test_sigma_caps_at_prior() {
        let p = params();
        let mut r = Rating::new(30.0, 8.3);
        r = apply_steps(&p, r, 50);
        assert!(r.sigma <= PRIOR_SIGMA + 1e-12);
    }

    #[test]
    fn test_elo_clamps_at_floor() {
        let p = params();
        let r = apply_steps(&p, Rating::new(PRIOR_MU, 5.0), 1_000);
        assert!((r.elo_f() - p.elo_floor).abs() < 1e-9);
    }

    #[test]
    fn test_rating_below_floor_holds() {
        let p = params();
        let sunk = Rating::for_elo(850.0, 6.0);
        let after = apply_steps(&p, sunk, 3);
        assert!((after.elo_f() - 850.0).abs() < 1e-9);
    }

    #[test]
    fn test_applying_in_pieces_matches_one_pass() {
        let p = params();
        let start = Rating::new(28.0, 4.0);
        let whole = apply_steps(&p, start, 7);
        let pieces = apply_steps(&p, apply_steps(&p, start, 3), 4);
        assert!((whole.mu - pieces.mu).abs() < 1e-9);
        assert!((whole.sigma - pieces.sigma).abs() < 1e-9);
    }
}
