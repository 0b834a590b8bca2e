//! Design parameters of a simulated two-condition, multi-subject experiment.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::trials::TrialRecord;
use crate::error::SimulationError;

/// One configuration of the generative model.
///
/// Every recognized field is listed here; configuration files carrying any
/// other key are rejected. Missing keys take their default values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DesignParameters {
    pub n_subjects: usize,
    /// Trials per subject per condition
    pub n_trials: usize,
    pub intercept: f64,
    /// Fixed treatment effect
    pub effect: f64,
    /// SD of the per-subject random intercepts
    pub tau_intercept: f64,
    /// SD of the per-subject random slopes
    pub tau_slope: f64,
    /// Correlation between random intercepts and slopes
    pub rho: f64,
    /// Residual noise SD
    pub sigma: f64,
}

impl Default for DesignParameters {
    fn default() -> Self {
        Self {
            n_subjects: 20,
            n_trials: 100,
            intercept: 1000.0,
            effect: 50.0,
            tau_intercept: 80.0,
            tau_slope: 30.0,
            rho: 0.2,
            sigma: 200.0,
        }
    }
}

impl DesignParameters {
    /// Number of rows a generated dataset has (`n_subjects * n_trials * 2`).
    #[must_use]
    pub fn n_observations(&self) -> usize {
        self.n_subjects * self.n_trials * 2
    }

    /// The implied random-effect covariance `[[v0, c], [c, v1]]`.
    #[must_use]
    pub fn covariance(&self) -> [[f64; 2]; 2] {
        let c = self.rho * self.tau_intercept * self.tau_slope;
        [
            [self.tau_intercept * self.tau_intercept, c],
            [c, self.tau_slope * self.tau_slope],
        ]
    }

    /// Check every field, returning the first violation.
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.n_subjects == 0 {
            return Err(invalid(DesignField::NSubjects, 0.0, "must be positive"));
        }
        if self.n_trials == 0 {
            return Err(invalid(DesignField::NTrials, 0.0, "must be positive"));
        }
        let too_large = self
            .n_subjects
            .checked_mul(self.n_trials)
            .and_then(|n| n.checked_mul(2))
            .and_then(|n| n.checked_mul(std::mem::size_of::<TrialRecord>()))
            .is_none_or(|bytes| bytes > isize::MAX as usize);
        if too_large {
            return Err(invalid(
                DesignField::NSubjects,
                self.n_subjects as f64,
                "n_subjects * n_trials * 2 observations do not fit in memory",
            ));
        }
        for field in DesignField::ALL {
            let value = field.value(self);
            if !value.is_finite() {
                return Err(invalid(field, value, "must be finite"));
            }
        }
        for field in [
            DesignField::TauIntercept,
            DesignField::TauSlope,
            DesignField::Sigma,
        ] {
            let value = field.value(self);
            if value < 0.0 {
                return Err(invalid(field, value, "must be non-negative"));
            }
        }
        if !(-1.0..=1.0).contains(&self.rho) || !covariance_is_psd(self.covariance()) {
            return Err(SimulationError::InvalidCovariance {
                tau_intercept: self.tau_intercept,
                tau_slope: self.tau_slope,
                rho: self.rho,
            });
        }
        Ok(())
    }
}

fn invalid(field: DesignField, value: f64, reason: &'static str) -> SimulationError {
    SimulationError::InvalidParameters {
        field,
        value,
        reason,
    }
}

/// Positive semi-definiteness of a symmetric 2x2 matrix, with a relative
/// tolerance for the rounding in `rho = ±1`.
pub(crate) fn covariance_is_psd(m: [[f64; 2]; 2]) -> bool {
    let [[a, b], [_, d]] = m;
    if !(a.is_finite() && b.is_finite() && d.is_finite()) {
        return false;
    }
    let det = a * d - b * b;
    a >= 0.0 && d >= 0.0 && det >= -1e-12 * (a * d).max(1.0)
}

/// Names a single `DesignParameters` field, for sweep axes and grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignField {
    NSubjects,
    NTrials,
    Intercept,
    Effect,
    TauIntercept,
    TauSlope,
    Rho,
    Sigma,
}

impl DesignField {
    pub const ALL: [DesignField; 8] = [
        DesignField::NSubjects,
        DesignField::NTrials,
        DesignField::Intercept,
        DesignField::Effect,
        DesignField::TauIntercept,
        DesignField::TauSlope,
        DesignField::Rho,
        DesignField::Sigma,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            DesignField::NSubjects => "n_subjects",
            DesignField::NTrials => "n_trials",
            DesignField::Intercept => "intercept",
            DesignField::Effect => "effect",
            DesignField::TauIntercept => "tau_intercept",
            DesignField::TauSlope => "tau_slope",
            DesignField::Rho => "rho",
            DesignField::Sigma => "sigma",
        }
    }

    /// Whether the field holds a count rather than a real value
    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(self, DesignField::NSubjects | DesignField::NTrials)
    }

    /// Read this field from a parameter set
    #[must_use]
    pub fn value(self, params: &DesignParameters) -> f64 {
        match self {
            DesignField::NSubjects => params.n_subjects as f64,
            DesignField::NTrials => params.n_trials as f64,
            DesignField::Intercept => params.intercept,
            DesignField::Effect => params.effect,
            DesignField::TauIntercept => params.tau_intercept,
            DesignField::TauSlope => params.tau_slope,
            DesignField::Rho => params.rho,
            DesignField::Sigma => params.sigma,
        }
    }

    /// Write this field. Count fields accept only positive whole numbers.
    pub fn apply(self, params: &mut DesignParameters, value: f64) -> Result<(), SimulationError> {
        if self.is_integer() && !(value.is_finite() && value >= 1.0 && value.fract() == 0.0) {
            return Err(invalid(self, value, "must be a positive whole number"));
        }
        match self {
            DesignField::NSubjects => params.n_subjects = value as usize,
            DesignField::NTrials => params.n_trials = value as usize,
            DesignField::Intercept => params.intercept = value,
            DesignField::Effect => params.effect = value,
            DesignField::TauIntercept => params.tau_intercept = value,
            DesignField::TauSlope => params.tau_slope = value,
            DesignField::Rho => params.rho = value,
            DesignField::Sigma => params.sigma = value,
        }
        Ok(())
    }
}

impl fmt::Display for DesignField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when parsing a field name that is not part of `DesignParameters`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFieldError(pub String);

impl fmt::Display for UnknownFieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let known: Vec<&str> = DesignField::ALL.iter().map(|d| d.name()).collect();
        write!(
            f,
            "unknown design field '{}' (expected one of: {})",
            self.0,
            known.join(", ")
        )
    }
}

impl std::error::Error for UnknownFieldError {}

impl FromStr for DesignField {
    type Err = UnknownFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DesignField::ALL
            .into_iter()
            .find(|f| f.name() == s.trim())
            .ok_or_else(|| UnknownFieldError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(DesignParameters::default().validate().is_ok());
        assert_eq!(DesignParameters::default().n_observations(), 4000);
    }

    #[test]
    fn test_rho_out_of_range_is_invalid_covariance() {
        let params = DesignParameters {
            rho: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(SimulationError::InvalidCovariance { .. })
        ));
    }

    #[test]
    fn test_perfect_correlation_is_psd() {
        let params = DesignParameters {
            rho: -1.0,
            ..Default::default()
        };
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_negative_sigma_rejected() {
        let params = DesignParameters {
            sigma: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(SimulationError::InvalidParameters {
                field: DesignField::Sigma,
                ..
            })
        ));
    }

    #[test]
    fn test_field_roundtrip_through_name() {
        for field in DesignField::ALL {
            assert_eq!(field.name().parse::<DesignField>(), Ok(field));
        }
        assert!("n_subject".parse::<DesignField>().is_err());
    }

    #[test]
    fn test_apply_integer_field() {
        let mut params = DesignParameters::default();
        DesignField::NSubjects.apply(&mut params, 8.0).unwrap();
        assert_eq!(params.n_subjects, 8);
        assert!(DesignField::NSubjects.apply(&mut params, 2.5).is_err());
        assert!(DesignField::NTrials.apply(&mut params, 0.0).is_err());
        DesignField::Rho.apply(&mut params, -0.3).unwrap();
        assert_eq!(params.rho, -0.3);
    }

    #[test]
    fn test_unknown_fields_rejected_on_deserialize() {
        let json = r#"{"n_subjects":2,"n_trials":3,"intercept":0,"effect":0,
            "tau_intercept":0,"tau_slope":0,"rho":0,"sigma":1,"bogus":4}"#;
        assert!(serde_json::from_str::<DesignParameters>(json).is_err());
    }

    #[test]
    fn test_oversized_design_is_rejected() {
        let params = DesignParameters {
            n_subjects: usize::MAX / 4,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(SimulationError::InvalidParameters {
                field: DesignField::NSubjects,
                ..
            })
        ));
        let wide = DesignParameters {
            n_subjects: 1,
            n_trials: usize::MAX / 2,
            ..Default::default()
        };
        assert!(wide.validate().is_err());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let params: DesignParameters = serde_json::from_str(r#"{"n_subjects":8}"#).unwrap();
        assert_eq!(params.n_subjects, 8);
        assert_eq!(params.sigma, DesignParameters::default().sigma);
    }
}
