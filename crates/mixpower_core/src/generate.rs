//! Trial-level data generation.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::SimulationError;
use crate::model::{
    Condition, DesignField, DesignParameters, SubjectRandomEffects, TrialRecord,
};

/// Build the full dataset of one replication.
///
/// Rows are ordered by subject, then trial, then condition (baseline first):
///
/// `response = intercept + t0[s] + [effect + t1[s] if treatment] + noise`
///
/// with `noise ~ Normal(0, sigma)` drawn independently per row. Subjects
/// missing from `effects` get zero deviations.
pub fn generate_trials<R: Rng + ?Sized>(
    rng: &mut R,
    params: &DesignParameters,
    effects: &SubjectRandomEffects,
) -> Result<Vec<TrialRecord>, SimulationError> {
    let noise =
        Normal::new(0.0, params.sigma).map_err(|_| SimulationError::InvalidParameters {
            field: DesignField::Sigma,
            value: params.sigma,
            reason: "must be non-negative and finite",
        })?;

    let mut trials = Vec::with_capacity(params.n_observations());
    for subject_id in 1..=params.n_subjects {
        let re = effects.get(subject_id).unwrap_or_default();
        let baseline_mean = params.intercept + re.t0;
        let treatment_mean = baseline_mean + params.effect + re.t1;
        for _trial in 0..params.n_trials {
            for condition in Condition::LEVELS {
                let mean = if condition.is_treatment() {
                    treatment_mean
                } else {
                    baseline_mean
                };
                trials.push(TrialRecord {
                    subject_id,
                    condition,
                    response: mean + noise.sample(rng),
                });
            }
        }
    }
    Ok(trials)
}
