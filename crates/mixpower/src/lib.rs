//! Command-line front end for `mixpower_core`
//!
//! - `mixpower run`: build a sweep from flags and/or a YAML sweep file, run
//!   it against a resumable JSON-lines sink, and print the power table
//! - `mixpower summarize`: reduce a stored sink to power per term, as a
//!   table or JSON

pub mod cli;
pub mod commands;
pub mod logging;
pub mod report;
pub mod sweep_file;

pub use cli::{Cli, Command};
pub use logging::init_logging;
