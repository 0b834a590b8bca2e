//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use mixpower_core::aggregate::DEFAULT_ALPHA;
use mixpower_core::model::{DesignField, DesignParameters};
use mixpower_core::replication::WarningPolicy;
use mixpower_core::sweep::SweepAxis;

use crate::sweep_file::parse_vary;

#[derive(Parser, Debug)]
#[command(name = "mixpower")]
#[command(about = "Monte Carlo power analysis for multi-subject, multi-trial designs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    pub log_level: String,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a replication sweep and print its power table
    Run(RunArgs),
    /// Summarize the results stored in a sink
    Summarize(SummarizeArgs),
}

/// How multiple warnings from one fit are recorded
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WarningsArg {
    #[default]
    Last,
    First,
    Concat,
}

impl From<WarningsArg> for WarningPolicy {
    fn from(arg: WarningsArg) -> Self {
        match arg {
            WarningsArg::Last => WarningPolicy::Last,
            WarningsArg::First => WarningPolicy::First,
            WarningsArg::Concat => WarningPolicy::Concatenate,
        }
    }
}

/// Design flags; each one overrides the sweep file (or the default design)
#[derive(Args, Debug, Default, Clone)]
pub struct DesignArgs {
    #[arg(long)]
    pub n_subjects: Option<usize>,
    /// Trials per subject per condition
    #[arg(long)]
    pub n_trials: Option<usize>,
    #[arg(long, allow_negative_numbers = true)]
    pub intercept: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub effect: Option<f64>,
    #[arg(long)]
    pub tau_intercept: Option<f64>,
    #[arg(long)]
    pub tau_slope: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub rho: Option<f64>,
    #[arg(long)]
    pub sigma: Option<f64>,
}

impl DesignArgs {
    /// Apply every flag that was given on top of `base`
    pub fn apply_to(&self, base: &mut DesignParameters) {
        if let Some(v) = self.n_subjects {
            base.n_subjects = v;
        }
        if let Some(v) = self.n_trials {
            base.n_trials = v;
        }
        if let Some(v) = self.intercept {
            base.intercept = v;
        }
        if let Some(v) = self.effect {
            base.effect = v;
        }
        if let Some(v) = self.tau_intercept {
            base.tau_intercept = v;
        }
        if let Some(v) = self.tau_slope {
            base.tau_slope = v;
        }
        if let Some(v) = self.rho {
            base.rho = v;
        }
        if let Some(v) = self.sigma {
            base.sigma = v;
        }
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// YAML sweep file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub design: DesignArgs,

    /// Sweep a field: FIELD=v1,v2,... or FIELD=min:max:steps (repeatable)
    #[arg(long = "vary", value_name = "SPEC", value_parser = parse_vary)]
    pub axes: Vec<SweepAxis>,

    /// Replications per design point
    #[arg(short, long)]
    pub replications: Option<usize>,

    /// Master seed for the sweep
    #[arg(long)]
    pub seed: Option<u64>,

    /// JSON-lines result file; a sink that already holds data is reused
    #[arg(long)]
    pub sink: Option<PathBuf>,

    /// Run replications one at a time instead of in parallel batches
    #[arg(long)]
    pub sequential: bool,

    #[arg(long, value_enum, default_value_t = WarningsArg::Last)]
    pub warnings: WarningsArg,

    /// Significance level for the power table
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Skip the power table
    #[arg(long)]
    pub no_summary: bool,
}

#[derive(Args, Debug)]
pub struct SummarizeArgs {
    /// JSON-lines result file written by `mixpower run`
    pub sink: PathBuf,

    /// Group power by this design field
    #[arg(short, long)]
    pub group_by: Option<DesignField>,

    /// Significance level
    #[arg(long, default_value_t = DEFAULT_ALPHA)]
    pub alpha: f64,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_axes_and_overrides() {
        let cli = Cli::try_parse_from([
            "mixpower",
            "run",
            "--n-trials",
            "20",
            "--rho",
            "-0.3",
            "--vary",
            "n_subjects=2:10:9",
            "--vary",
            "effect=0,50",
            "--replications",
            "10",
            "--sequential",
            "--warnings",
            "concat",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.design.n_trials, Some(20));
        assert_eq!(args.design.rho, Some(-0.3));
        assert_eq!(args.axes.len(), 2);
        assert_eq!(args.axes[0].field, DesignField::NSubjects);
        assert_eq!(args.axes[0].len(), 9);
        assert_eq!(args.replications, Some(10));
        assert!(args.sequential);
        assert_eq!(WarningPolicy::from(args.warnings), WarningPolicy::Concatenate);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_parse_summarize() {
        let cli = Cli::try_parse_from([
            "mixpower",
            "summarize",
            "power.jsonl",
            "--group-by",
            "effect",
            "--json",
            "--log-level",
            "debug",
        ])
        .unwrap();
        let Command::Summarize(args) = cli.command else {
            panic!("expected summarize");
        };
        assert_eq!(args.sink, PathBuf::from("power.jsonl"));
        assert_eq!(args.group_by, Some(DesignField::Effect));
        assert_eq!(args.alpha, DEFAULT_ALPHA);
        assert!(args.json);
        assert_eq!(cli.log_level, "debug");
    }

    #[test]
    fn test_bad_vary_spec_is_rejected() {
        assert!(Cli::try_parse_from(["mixpower", "run", "--vary", "slope=1"]).is_err());
        assert!(Cli::try_parse_from(["mixpower", "summarize", "x", "--group-by", "nope"]).is_err());
    }

    #[test]
    fn test_design_args_override_only_given_fields() {
        let mut base = DesignParameters::default();
        DesignArgs {
            effect: Some(0.0),
            sigma: Some(50.0),
            ..Default::default()
        }
        .apply_to(&mut base);
        assert_eq!(base.effect, 0.0);
        assert_eq!(base.sigma, 50.0);
        assert_eq!(base.n_subjects, DesignParameters::default().n_subjects);
    }
}
