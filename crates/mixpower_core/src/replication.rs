//! A single simulate-then-fit replication.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::SimulationError;
use crate::fit::{Fitter, MODEL_FORMULA};
use crate::generate::generate_trials;
use crate::model::{DesignParameters, ReplicationResult};
use crate::random_effects::sample_random_effects;

/// How several warnings from one fit are folded into the recorded string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningPolicy {
    /// Keep only the last warning
    #[default]
    Last,
    First,
    /// Join all warnings with `"; "`
    Concatenate,
}

impl WarningPolicy {
    #[must_use]
    pub fn collapse(self, warnings: &[String]) -> String {
        match self {
            WarningPolicy::Last => warnings.last().cloned().unwrap_or_default(),
            WarningPolicy::First => warnings.first().cloned().unwrap_or_default(),
            WarningPolicy::Concatenate => warnings.join("; "),
        }
    }
}

/// Run one replication: sample random effects, generate trials, fit.
///
/// A fit failure is not an error here: it is recorded on the returned result
/// with `failed = true` and no terms. Only configuration problems (invalid
/// parameters or covariance) are returned as `Err`, before anything is drawn.
pub fn run_replication<R: Rng + ?Sized, F: Fitter + ?Sized>(
    rng: &mut R,
    replication: usize,
    params: &DesignParameters,
    fitter: &F,
    policy: WarningPolicy,
) -> Result<ReplicationResult, SimulationError> {
    params.validate()?;
    let effects = sample_random_effects(
        rng,
        params.n_subjects,
        params.tau_intercept,
        params.tau_slope,
        params.rho,
    )?;
    let trials = generate_trials(rng, params, &effects)?;

    let result = match fitter.fit(&trials, MODEL_FORMULA) {
        Ok(fit) => {
            let warnings = policy.collapse(&fit.warnings);
            if !warnings.is_empty() {
                tracing::debug!(replication, warning = %warnings, "fit converged with warnings");
            }
            ReplicationResult {
                replication,
                params: *params,
                terms: fit.terms,
                warnings,
                failed: false,
            }
        }
        Err(e) => {
            tracing::warn!(replication, error = %e, "fit failed");
            ReplicationResult {
                replication,
                params: *params,
                terms: Vec::new(),
                warnings: e.to_string(),
                failed: true,
            }
        }
    };

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_policies() {
        let warnings = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(WarningPolicy::Last.collapse(&warnings), "c");
        assert_eq!(WarningPolicy::First.collapse(&warnings), "a");
        assert_eq!(WarningPolicy::Concatenate.collapse(&warnings), "a; b; c");
        for policy in [
            WarningPolicy::Last,
            WarningPolicy::First,
            WarningPolicy::Concatenate,
        ] {
            assert_eq!(policy.collapse(&[]), "");
        }
    }
}
