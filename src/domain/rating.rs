//! Gaussian skill rating and its display ("Elo-equivalent") transform.
//!
//! Every entity starts at the prior `(25, 25/3)`. The display rating is a
//! linear transform of mu and sigma; the inverse solve (`for_elo`) is what the
//! minimum-change rule, the participation bonus, and decay all use to pin a
//! rating to an exact Elo value at a given sigma.

use serde::{Deserialize, Serialize};

/// Prior mean skill for a new entity.
pub const PRIOR_MU: f64 = 25.0;

/// Prior uncertainty for a new entity.
pub const PRIOR_SIGMA: f64 = 25.0 / 3.0;

/// Skill-distance scale for the Plackett-Luce update.
pub const BETA: f64 = 25.0 / 6.0;

/// Regularization floor for sigma shrinkage.
pub const KAPPA: f64 = 0.0001;

const ELO_BASE: f64 = 1000.0;
const ELO_MU_SCALE: f64 = 12.0;
const ELO_SIGMA_SCALE: f64 = 4.0;

/// Mean and uncertainty of a Bayesian skill rating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub mu: f64,
    pub sigma: f64,
}

impl Default for Rating {
    fn default() -> Self {
        Rating {
            mu: PRIOR_MU,
            sigma: PRIOR_SIGMA,
        }
    }
}

impl Rating {
    pub fn new(mu: f64, sigma: f64) -> Self {
        Rating { mu, sigma }
    }

    /// Continuous Elo-equivalent: `1000 + (mu-25)*12 - (sigma-25/3)*4`.
    pub fn elo_f(&self) -> f64 {
        ELO_BASE + (self.mu - PRIOR_MU) * ELO_MU_SCALE - (self.sigma - PRIOR_SIGMA) * ELO_SIGMA_SCALE
    }

    /// Rounded Elo-equivalent for display.
    pub fn elo(&self) -> i64 {
        self.elo_f().round() as i64
    }

    /// Solve for the mu that yields exactly `elo` at uncertainty `sigma`.
    pub fn for_elo(elo: f64, sigma: f64) -> Self {
        let mu = PRIOR_MU + (elo - ELO_BASE + (sigma - PRIOR_SIGMA) * ELO_SIGMA_SCALE) / ELO_MU_SCALE;
        Rating { mu, sigma }
    }

    /// True when this rating is bitwise at the zero-game prior.
    pub fn is_prior(&self) -> bool {
        self.mu == PRIOR_MU && self.sigma == PRIOR_SIGMA
    }
}

/// Full before/after image of an entity for snapshots and audit rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntityImage {
    pub mu: f64,
    pub sigma: f64,
    pub elo: i64,
    pub wins: i64,
    pub losses: i64,
    pub draws: i64,
}

impl EntityImage {
    pub fn new(rating: Rating, wins: i64, losses: i64, draws: i64) -> Self {
        EntityImage {
            mu: rating.mu,
            sigma: rating.sigma,
            elo: rating.elo(),
            wins,
            losses,
            draws,
        }
    }

    pub fn rating(&self) -> Rating {
        Rating::new(self.mu, self.sigma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prior_maps_to_base_elo() {
        let r = Rating::default();
        assert_eq!(r.elo(), 1000);
        assert!(r.is_prior());
    }

    #[test]
    fn test_elo_rises_with_mu_falls_with_sigma() {
        let base = Rating::default().elo_f();
        assert!(Rating::new(26.0, PRIOR_SIGMA).elo_f() > base);
        assert!(Rating::new(PRIOR_MU, 9.0).elo_f() < base);
    }

    #[test]
    fn test_for_elo_inverts_transform() {
        for (mu, sigma) in [(25.0, 25.0 / 3.0), (31.2, 5.7), (18.9, 8.0), (25.0, 2.5)] {
            let r = Rating::new(mu, sigma);
            let solved = Rating::for_elo(r.elo_f(), sigma);
            assert!((solved.mu - mu).abs() < 1e-9);
            assert_eq!(solved.sigma, sigma);
        }
    }

    #[test]
    fn test_for_elo_exact_target() {
        let solved = Rating::for_elo(1002.0, 7.9);
        assert!((solved.elo_f() - 1002.0).abs() < 1e-9);
    }

    #[test]
    fn test_entity_image_round_trip() {
        let r = Rating::new(27.5, 7.1);
        let image = EntityImage::new(r, 3, 1, 0);
        assert_eq!(image.rating(), r);
        assert_eq!(image.elo, r.elo());
        assert_eq!(image.wins, 3);
    }
}
