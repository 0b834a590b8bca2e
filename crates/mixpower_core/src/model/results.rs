//! Fit output and the persisted per-replication results.

use serde::{Deserialize, Serialize};

use super::design::DesignParameters;

/// Whether a model term is population-level or a variance component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    Fixed,
    Random,
}

/// A single estimated model term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermEstimate {
    pub term_name: String,
    pub effect_type: EffectType,
    pub estimate: f64,
    /// Not reported for variance components
    pub std_error: Option<f64>,
    pub p_value: Option<f64>,
}

impl TermEstimate {
    pub fn fixed(name: impl Into<String>, estimate: f64, std_error: f64, p_value: f64) -> Self {
        Self {
            term_name: name.into(),
            effect_type: EffectType::Fixed,
            estimate,
            std_error: Some(std_error),
            p_value: Some(p_value),
        }
    }

    pub fn random(name: impl Into<String>, estimate: f64) -> Self {
        Self {
            term_name: name.into(),
            effect_type: EffectType::Random,
            estimate,
            std_error: None,
            p_value: None,
        }
    }

    #[must_use]
    pub fn is_fixed(&self) -> bool {
        self.effect_type == EffectType::Fixed
    }
}

/// Output of a `Fitter`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FitResult {
    pub terms: Vec<TermEstimate>,
    /// Non-fatal convergence warnings, in emission order
    pub warnings: Vec<String>,
}

impl FitResult {
    /// Look up a term by name
    #[must_use]
    pub fn term(&self, name: &str) -> Option<&TermEstimate> {
        self.terms.iter().find(|t| t.term_name == name)
    }
}

/// One replication's fit, tagged with the design that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicationResult {
    /// Grid row index
    pub replication: usize,
    pub params: DesignParameters,
    /// Empty when the fit failed
    pub terms: Vec<TermEstimate>,
    /// Captured warning text, or the failure message; empty if none
    pub warnings: String,
    pub failed: bool,
}

impl ReplicationResult {
    #[must_use]
    pub fn term(&self, name: &str) -> Option<&TermEstimate> {
        self.terms.iter().find(|t| t.term_name == name)
    }

    /// Flatten into persisted rows: one per term, or a single empty row for
    /// a replication with no terms.
    #[must_use]
    pub fn to_rows(&self) -> Vec<ResultRow> {
        if self.terms.is_empty() {
            return vec![ResultRow::new(self, None)];
        }
        self.terms
            .iter()
            .map(|t| ResultRow::new(self, Some(t)))
            .collect()
    }
}

/// A flattened `ReplicationResult` row as written to the sink.
///
/// Design columns are repeated across all terms of a replication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub replication: usize,
    pub n_subjects: usize,
    pub n_trials: usize,
    pub intercept: f64,
    pub effect: f64,
    pub tau_intercept: f64,
    pub tau_slope: f64,
    pub rho: f64,
    pub sigma: f64,
    pub term_name: Option<String>,
    pub effect_type: Option<EffectType>,
    pub estimate: Option<f64>,
    pub std_error: Option<f64>,
    pub p_value: Option<f64>,
    #[serde(default)]
    pub warnings: String,
    #[serde(default)]
    pub failed: bool,
}

impl ResultRow {
    fn new(result: &ReplicationResult, term: Option<&TermEstimate>) -> Self {
        let p = &result.params;
        Self {
            replication: result.replication,
            n_subjects: p.n_subjects,
            n_trials: p.n_trials,
            intercept: p.intercept,
            effect: p.effect,
            tau_intercept: p.tau_intercept,
            tau_slope: p.tau_slope,
            rho: p.rho,
            sigma: p.sigma,
            term_name: term.map(|t| t.term_name.clone()),
            effect_type: term.map(|t| t.effect_type),
            estimate: term.map(|t| t.estimate),
            std_error: term.and_then(|t| t.std_error),
            p_value: term.and_then(|t| t.p_value),
            warnings: result.warnings.clone(),
            failed: result.failed,
        }
    }

    #[must_use]
    pub fn params(&self) -> DesignParameters {
        DesignParameters {
            n_subjects: self.n_subjects,
            n_trials: self.n_trials,
            intercept: self.intercept,
            effect: self.effect,
            tau_intercept: self.tau_intercept,
            tau_slope: self.tau_slope,
            rho: self.rho,
            sigma: self.sigma,
        }
    }

    /// The term carried by this row, if it is not an empty failure row
    #[must_use]
    pub fn term(&self) -> Option<TermEstimate> {
        Some(TermEstimate {
            term_name: self.term_name.clone()?,
            effect_type: self.effect_type?,
            estimate: self.estimate?,
            std_error: self.std_error,
            p_value: self.p_value,
        })
    }
}

/// Regroup consecutive rows of the same replication.
///
/// Rows are expected in sink order; a replication index that reappears
/// after another one starts a new result.
#[must_use]
pub fn rows_to_results(rows: Vec<ResultRow>) -> Vec<ReplicationResult> {
    let mut results: Vec<ReplicationResult> = Vec::new();
    for row in rows {
        let term = row.term();
        match results.last_mut() {
            Some(last) if last.replication == row.replication => {
                last.terms.extend(term);
            }
            _ => results.push(ReplicationResult {
                replication: row.replication,
                params: row.params(),
                terms: term.into_iter().collect(),
                warnings: row.warnings,
                failed: row.failed,
            }),
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result(replication: usize, failed: bool) -> ReplicationResult {
        let terms = if failed {
            vec![]
        } else {
            vec![
                TermEstimate::fixed("(Intercept)", 1000.0, 20.0, 0.0001),
                TermEstimate::fixed("conditiontreatment", 48.0, 9.0, 0.001),
                TermEstimate::random("sd__Observation", 199.0),
            ]
        };
        ReplicationResult {
            replication,
            params: DesignParameters::default(),
            terms,
            warnings: if failed { "degenerate".into() } else { String::new() },
            failed,
        }
    }

    #[test]
    fn test_failed_replication_flattens_to_single_empty_row() {
        let rows = sample_result(3, true).to_rows();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].failed);
        assert!(rows[0].term_name.is_none());
        assert!(rows[0].term().is_none());
        assert_eq!(rows[0].warnings, "degenerate");
    }

    #[test]
    fn test_rows_regroup_into_replications() {
        let originals = vec![
            sample_result(0, false),
            sample_result(1, true),
            sample_result(2, false),
        ];
        let rows: Vec<ResultRow> = originals.iter().flat_map(|r| r.to_rows()).collect();
        assert_eq!(rows.len(), 7);
        assert_eq!(rows_to_results(rows), originals);
    }
}
