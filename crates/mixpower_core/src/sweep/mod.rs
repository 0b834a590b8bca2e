//! Replication sweeps over a grid of design parameters.
//!
//! ```ignore
//! use mixpower_core::fit::BalancedFitter;
//! use mixpower_core::model::DesignField;
//! use mixpower_core::sweep::{SweepAxis, SweepConfig, SweepOptions, run_sweep};
//!
//! let config = SweepConfig {
//!     axes: vec![SweepAxis::range(DesignField::NSubjects, 2.0, 10.0, 9)],
//!     replications: 200,
//!     ..Default::default()
//! };
//! let grid = config.expand()?;
//! let options = SweepOptions {
//!     sink: Some("power.jsonl".into()),
//!     ..Default::default()
//! };
//! let outcome = run_sweep(&grid, &BalancedFitter, &options, None)?;
//! ```

mod config;
mod driver;

pub use config::{SweepAxis, SweepConfig};
pub use driver::{SweepOptions, SweepOutcome, SweepProgress, derive_seeds, run_sweep};
