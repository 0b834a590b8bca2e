//! Reduce per-replication results into power and recovery statistics.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::model::{DesignField, ReplicationResult};

/// Conventional significance threshold
pub const DEFAULT_ALPHA: f64 = 0.05;

/// The grouping field and its value for one summary row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupValue {
    pub field: DesignField,
    pub value: f64,
}

/// Summary of one fixed-effect term within one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerSummary {
    pub group: Option<GroupValue>,
    pub term_name: String,
    /// Estimates contributing to this row
    pub n: usize,
    pub mean_estimate: f64,
    /// Mean over estimates that report a standard error
    pub mean_std_error: Option<f64>,
    /// Fraction of estimates with `p_value < alpha`
    pub power: f64,
    /// Monte Carlo standard error of `power`
    pub power_mc_error: f64,
}

#[derive(Default)]
struct Accumulator {
    n: usize,
    estimate_sum: f64,
    std_error_sum: f64,
    std_error_n: usize,
    significant: usize,
}

/// Summarize fixed-effect terms, grouped by term and optionally by a design
/// field.
///
/// Failed replications carry no terms and do not contribute. A missing
/// p-value counts as not significant. Rows come back ordered by group value,
/// then by first appearance of the term. Empty input gives empty output.
#[must_use]
pub fn summarize(
    results: &[ReplicationResult],
    group_by: Option<DesignField>,
    alpha: f64,
) -> Vec<PowerSummary> {
    let mut index: FxHashMap<(Option<u64>, &str), usize> = FxHashMap::default();
    let mut keys: Vec<(Option<f64>, &str)> = Vec::new();
    let mut accumulators: Vec<Accumulator> = Vec::new();

    for result in results {
        // + 0.0 folds -0.0 into 0.0 so both land in the same group
        let group = group_by.map(|field| field.value(&result.params) + 0.0);
        for term in result.terms.iter().filter(|t| t.is_fixed()) {
            let key = (group.map(f64::to_bits), term.term_name.as_str());
            let slot = *index.entry(key).or_insert_with(|| {
                keys.push((group, term.term_name.as_str()));
                accumulators.push(Accumulator::default());
                accumulators.len() - 1
            });
            let acc = &mut accumulators[slot];
            acc.n += 1;
            acc.estimate_sum += term.estimate;
            if let Some(se) = term.std_error {
                acc.std_error_sum += se;
                acc.std_error_n += 1;
            }
            if term.p_value.is_some_and(|p| p < alpha) {
                acc.significant += 1;
            }
        }
    }

    let mut summaries: Vec<PowerSummary> = keys
        .into_iter()
        .zip(accumulators)
        .filter(|(_, acc)| acc.n > 0)
        .map(|((group, term_name), acc)| {
            let n = acc.n as f64;
            let power = acc.significant as f64 / n;
            PowerSummary {
                group: group_by
                    .zip(group)
                    .map(|(field, value)| GroupValue { field, value }),
                term_name: term_name.to_string(),
                n: acc.n,
                mean_estimate: acc.estimate_sum / n,
                mean_std_error: (acc.std_error_n > 0)
                    .then(|| acc.std_error_sum / acc.std_error_n as f64),
                power,
                power_mc_error: (power * (1.0 - power) / n).sqrt(),
            }
        })
        .collect();

    summaries.sort_by(|a, b| {
        let av = a.group.map_or(f64::NEG_INFINITY, |g| g.value);
        let bv = b.group.map_or(f64::NEG_INFINITY, |g| g.value);
        av.total_cmp(&bv)
    });
    summaries
}

/// `(group value, power)` points of one term, sorted by group value.
///
/// Ungrouped summaries have no x-coordinate and are skipped.
#[must_use]
pub fn power_curve(summaries: &[PowerSummary], term_name: &str) -> Vec<(f64, f64)> {
    let mut points: Vec<(f64, f64)> = summaries
        .iter()
        .filter(|s| s.term_name == term_name)
        .filter_map(|s| s.group.map(|g| (g.value, s.power)))
        .collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    points
}
