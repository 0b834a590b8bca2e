//! Simulated observations and the per-subject random effects behind them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Experimental condition of a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Baseline,
    Treatment,
}

impl Condition {
    /// Both levels in generation order
    pub const LEVELS: [Condition; 2] = [Condition::Baseline, Condition::Treatment];

    #[must_use]
    pub fn is_treatment(self) -> bool {
        self == Condition::Treatment
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Baseline => f.write_str("baseline"),
            Condition::Treatment => f.write_str("treatment"),
        }
    }
}

/// One simulated observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// 1-based subject id
    pub subject_id: usize,
    pub condition: Condition,
    pub response: f64,
}

/// A subject's deviation from the fixed intercept (`t0`) and effect (`t1`)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RandomEffect {
    pub t0: f64,
    pub t1: f64,
}

/// Random effects for subjects `1..=n`, drawn once per replication.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubjectRandomEffects {
    effects: Vec<RandomEffect>,
}

impl SubjectRandomEffects {
    /// Subject `i + 1` receives `effects[i]`.
    #[must_use]
    pub fn new(effects: Vec<RandomEffect>) -> Self {
        Self { effects }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Effects of a 1-based subject id
    #[must_use]
    pub fn get(&self, subject_id: usize) -> Option<RandomEffect> {
        subject_id
            .checked_sub(1)
            .and_then(|i| self.effects.get(i))
            .copied()
    }

    /// Iterate `(subject_id, effect)` in subject order
    pub fn iter(&self) -> impl Iterator<Item = (usize, RandomEffect)> + '_ {
        self.effects.iter().enumerate().map(|(i, e)| (i + 1, *e))
    }
}
