//! Closed-form mixed-model fit for balanced two-condition designs.
//!
//! With every subject observed `n` times in each condition, the REML fit of
//! `response ~ condition + (1+condition | subject)` reduces to subject-level
//! summaries:
//!
//! - the fixed intercept is the mean of the subjects' baseline means, tested
//!   with a one-sample t-test on S-1 degrees of freedom;
//! - the fixed effect is the mean of the subjects' treatment-minus-baseline
//!   differences, tested the same way;
//! - variance components follow from the method of moments, using the pooled
//!   within-cell variance as the residual.

use rustc_hash::FxHashMap;
use statrs::distribution::{ContinuousCDF, StudentsT};

use super::{EFFECT_TERM, Fitter, INTERCEPT_TERM, MODEL_FORMULA};
use crate::error::FitError;
use crate::model::{Condition, FitResult, TermEstimate, TrialRecord};

/// Emitted when a variance component lands on the boundary of its space.
pub const SINGULAR_FIT_WARNING: &str = "boundary (singular) fit: see help('isSingular')";

/// Fitter for balanced designs with correlated random intercepts and slopes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalancedFitter;

/// Running mean and sum of squared deviations (Welford)
#[derive(Debug, Clone, Copy, Default)]
struct CellStats {
    n: usize,
    mean: f64,
    m2: f64,
}

impl CellStats {
    fn push(&mut self, x: f64) {
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (x - self.mean);
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SubjectCells {
    baseline: CellStats,
    treatment: CellStats,
}

impl Fitter for BalancedFitter {
    fn fit(&self, data: &[TrialRecord], formula: &str) -> Result<FitResult, FitError> {
        if !same_formula(formula, MODEL_FORMULA) {
            return Err(FitError::UnsupportedFormula(formula.to_string()));
        }

        let mut cells: FxHashMap<usize, SubjectCells> = FxHashMap::default();
        for trial in data {
            let entry = cells.entry(trial.subject_id).or_default();
            match trial.condition {
                Condition::Baseline => entry.baseline.push(trial.response),
                Condition::Treatment => entry.treatment.push(trial.response),
            }
        }

        let mut subject_ids: Vec<usize> = cells.keys().copied().collect();
        subject_ids.sort_unstable();
        let subjects: Vec<SubjectCells> = subject_ids.iter().map(|id| cells[id]).collect();

        let n_subjects = subjects.len();
        if n_subjects < 2 {
            return Err(FitError::InsufficientData(format!(
                "need at least 2 subjects, got {n_subjects}"
            )));
        }
        let n_trials = subjects[0].baseline.n;
        if subjects
            .iter()
            .any(|s| s.baseline.n != n_trials || s.treatment.n != n_trials)
        {
            return Err(FitError::InsufficientData(
                "design is unbalanced across subjects or conditions".to_string(),
            ));
        }
        if n_trials < 2 {
            return Err(FitError::InsufficientData(
                "need at least 2 trials per subject and condition to separate residual variance"
                    .to_string(),
            ));
        }

        let baseline_means: Vec<f64> = subjects.iter().map(|s| s.baseline.mean).collect();
        let differences: Vec<f64> = subjects
            .iter()
            .map(|s| s.treatment.mean - s.baseline.mean)
            .collect();

        let s = n_subjects as f64;
        let n = n_trials as f64;
        let df = s - 1.0;

        let intercept = one_sample_t(&baseline_means, df, INTERCEPT_TERM)?;
        let effect = one_sample_t(&differences, df, EFFECT_TERM)?;

        let residual_ss: f64 = subjects.iter().map(|c| c.baseline.m2 + c.treatment.m2).sum();
        let residual_var = residual_ss / (2.0 * s * (n - 1.0));

        let mut warnings = Vec::new();
        let mut singular = false;

        let mut var_t0 = variance(&baseline_means) - residual_var / n;
        let mut var_t1 = variance(&differences) - 2.0 * residual_var / n;
        let cov_t01 = covariance(&baseline_means, &differences) + residual_var / n;
        if var_t0 < 0.0 {
            var_t0 = 0.0;
            singular = true;
        }
        if var_t1 < 0.0 {
            var_t1 = 0.0;
            singular = true;
        }
        let sd_t0 = var_t0.sqrt();
        let sd_t1 = var_t1.sqrt();
        let correlation = if sd_t0 > 0.0 && sd_t1 > 0.0 {
            let raw = cov_t01 / (sd_t0 * sd_t1);
            if raw.abs() > 1.0 {
                singular = true;
            }
            raw.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        if singular {
            warnings.push(SINGULAR_FIT_WARNING.to_string());
        }

        Ok(FitResult {
            terms: vec![
                intercept,
                effect,
                TermEstimate::random("sd__(Intercept)", sd_t0),
                TermEstimate::random("sd__conditiontreatment", sd_t1),
                TermEstimate::random("cor__(Intercept).conditiontreatment", correlation),
                TermEstimate::random("sd__Observation", residual_var.sqrt()),
            ],
            warnings,
        })
    }
}

fn same_formula(a: &str, b: &str) -> bool {
    a.chars()
        .filter(|c| !c.is_whitespace())
        .eq(b.chars().filter(|c| !c.is_whitespace()))
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample variance (n - 1 denominator)
fn variance(xs: &[f64]) -> f64 {
    covariance(xs, xs)
}

fn covariance(xs: &[f64], ys: &[f64]) -> f64 {
    let mx = mean(xs);
    let my = mean(ys);
    let sum: f64 = xs.iter().zip(ys).map(|(x, y)| (x - mx) * (y - my)).sum();
    sum / (xs.len() as f64 - 1.0)
}

/// Two-sided one-sample t-test of `mean(xs) == 0`.
fn one_sample_t(xs: &[f64], df: f64, name: &str) -> Result<TermEstimate, FitError> {
    let estimate = mean(xs);
    let std_error = (variance(xs) / xs.len() as f64).sqrt();
    if !(std_error > 0.0 && std_error.is_finite()) {
        return Err(FitError::Degenerate(format!(
            "zero between-subject variance for {name}"
        )));
    }
    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| FitError::Degenerate(format!("t distribution with {df} df: {e}")))?;
    let t = estimate / std_error;
    let p_value = (2.0 * dist.sf(t.abs())).clamp(0.0, 1.0);
    Ok(TermEstimate::fixed(name, estimate, std_error, p_value))
}
