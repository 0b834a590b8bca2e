//! Property and scenario tests for the power-simulation engine
//!
//! Tests are organized by topic:
//! - `sampling` - Random-effect covariance recovery
//! - `generation` - Dataset shape and condition means
//! - `replication` - Fit-and-tag replications, failure capture, effect recovery
//! - `sweep` - Grid driver, resumable sink, reproducibility
//! - `calibration` - Type I error and power trends across sweeps
