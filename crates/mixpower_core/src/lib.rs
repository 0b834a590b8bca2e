//! Monte Carlo power analysis for hierarchical experimental designs
//!
//! This crate estimates the statistical power of a multi-subject,
//! multi-trial, two-condition design by simulation:
//! - Correlated per-subject random intercepts and slopes
//! - Trial-level data generation with Gaussian residual noise
//! - Mixed-model fitting behind the [`fit::Fitter`] trait, with a built-in
//!   closed-form fitter for balanced designs
//! - Replication sweeps over a parameter grid, checkpointed to a resumable
//!   JSON-lines store
//! - Aggregation into power and parameter-recovery summaries
//!
//! ```ignore
//! use mixpower_core::aggregate::{DEFAULT_ALPHA, summarize};
//! use mixpower_core::fit::BalancedFitter;
//! use mixpower_core::model::DesignField;
//! use mixpower_core::sweep::{SweepAxis, SweepConfig, SweepOptions, run_sweep};
//!
//! let config = SweepConfig {
//!     axes: vec![SweepAxis::new(DesignField::NSubjects, vec![10.0, 20.0, 40.0])],
//!     replications: 500,
//!     ..Default::default()
//! };
//! let outcome = run_sweep(&config.expand()?, &BalancedFitter, &SweepOptions::default(), None)?;
//! let power = summarize(&outcome.results, Some(DesignField::NSubjects), DEFAULT_ALPHA);
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod aggregate;
pub mod error;
pub mod fit;
pub mod generate;
pub mod random_effects;
pub mod replication;
pub mod store;
pub mod sweep;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod model;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use error::{FitError, SimulationError, StoreError};
pub use fit::{BalancedFitter, Fitter, MODEL_FORMULA};
pub use model::{DesignField, DesignParameters, ReplicationResult};
