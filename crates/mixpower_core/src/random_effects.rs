//! Correlated per-subject random effects.

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::error::SimulationError;
use crate::model::{RandomEffect, SubjectRandomEffects, covariance_is_psd};

/// Draw `n_subjects` independent `(t0, t1)` pairs from a zero-mean bivariate
/// normal with SDs `tau_intercept`, `tau_slope` and correlation `rho`.
///
/// Uses the Cholesky factor of the 2x2 covariance:
/// `t0 = tau0 * z0`, `t1 = tau1 * (rho * z0 + sqrt(1 - rho^2) * z1)`.
pub fn sample_random_effects<R: Rng + ?Sized>(
    rng: &mut R,
    n_subjects: usize,
    tau_intercept: f64,
    tau_slope: f64,
    rho: f64,
) -> Result<SubjectRandomEffects, SimulationError> {
    let invalid = || SimulationError::InvalidCovariance {
        tau_intercept,
        tau_slope,
        rho,
    };
    if !(rho.is_finite() && (-1.0..=1.0).contains(&rho)) {
        return Err(invalid());
    }
    let c = rho * tau_intercept * tau_slope;
    let covariance = [
        [tau_intercept * tau_intercept, c],
        [c, tau_slope * tau_slope],
    ];
    if tau_intercept < 0.0 || tau_slope < 0.0 || !covariance_is_psd(covariance) {
        return Err(invalid());
    }

    // max(0) guards the rounding of 1 - rho^2 at |rho| = 1
    let residual = (1.0 - rho * rho).max(0.0).sqrt();
    let effects = (0..n_subjects)
        .map(|_| {
            let z0: f64 = StandardNormal.sample(rng);
            let z1: f64 = StandardNormal.sample(rng);
            RandomEffect {
                t0: tau_intercept * z0,
                t1: tau_slope * (rho * z0 + residual * z1),
            }
        })
        .collect();

    Ok(SubjectRandomEffects::new(effects))
}
