//! `run` and `summarize` subcommands.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use color_eyre::eyre::{WrapErr, bail};
use mixpower_core::aggregate::{DEFAULT_ALPHA, PowerSummary, summarize};
use mixpower_core::fit::BalancedFitter;
use mixpower_core::model::DesignField;
use mixpower_core::store::ResultStore;
use mixpower_core::sweep::{SweepConfig, SweepOptions, SweepOutcome, SweepProgress, run_sweep};

use crate::cli::{RunArgs, SummarizeArgs};
use crate::report::{format_power_table, power_json};
use crate::sweep_file::SweepFile;

/// How often a running sweep logs its progress
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// A fully resolved `run` invocation
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub config: SweepConfig,
    pub options: SweepOptions,
    pub alpha: f64,
}

impl RunPlan {
    /// Field the power table is grouped by
    pub fn group_by(&self) -> Option<DesignField> {
        self.config.primary_field()
    }
}

fn check_alpha(alpha: f64) -> color_eyre::Result<f64> {
    if !(alpha > 0.0 && alpha < 1.0) {
        bail!("alpha must be in (0, 1), got {alpha}");
    }
    Ok(alpha)
}

/// Merge the sweep file (if any) with command-line flags; flags win.
pub fn plan_run(args: &RunArgs) -> color_eyre::Result<RunPlan> {
    let file = match &args.config {
        Some(path) => SweepFile::load(path)?,
        None => SweepFile::default(),
    };

    let mut config = file.sweep_config();
    args.design.apply_to(&mut config.base);
    config.axes.extend(args.axes.iter().cloned());
    if let Some(replications) = args.replications {
        config.replications = replications;
    }

    let mut options = SweepOptions {
        sink: args.sink.clone().or(file.sink),
        warning_policy: args.warnings.into(),
        ..Default::default()
    };
    if let Some(seed) = args.seed.or(file.seed) {
        options.seed = seed;
    }
    if args.sequential {
        options.parallel = false;
    }

    let alpha = check_alpha(args.alpha.or(file.alpha).unwrap_or(DEFAULT_ALPHA))?;

    Ok(RunPlan {
        config,
        options,
        alpha,
    })
}

/// Expand the grid and run the sweep, logging progress while it runs.
pub fn execute_run(plan: &RunPlan) -> color_eyre::Result<SweepOutcome> {
    let grid = plan
        .config
        .expand()
        .wrap_err("invalid sweep configuration")?;
    tracing::info!(
        points = plan.config.total_points(),
        replications = plan.config.replications,
        rows = grid.len(),
        "expanded sweep grid"
    );

    let progress = SweepProgress::new(grid.len());
    let finished = AtomicBool::new(false);
    let outcome = std::thread::scope(|scope| {
        scope.spawn(|| report_progress(&progress, &finished));
        // Stops the reporter even if the sweep unwinds
        let _finished = FinishOnDrop(&finished);
        run_sweep(&grid, &BalancedFitter, &plan.options, Some(&progress))
    })
    .wrap_err("sweep failed")?;

    if outcome.resumed {
        tracing::info!(
            sink = ?plan.options.sink,
            "sink already held results; reporting them without rerunning"
        );
    }
    let failed = outcome.failed_count();
    if failed > 0 {
        tracing::warn!(failed, total = outcome.results.len(), "some fits failed");
    }
    Ok(outcome)
}

/// Describe a reused sink whose size does not match the requested grid
pub fn incomplete_note(outcome: &SweepOutcome, sink: Option<&Path>) -> Option<String> {
    if !outcome.is_incomplete() {
        return None;
    }
    let sink = sink.map_or_else(|| "the sink".to_string(), |p| p.display().to_string());
    Some(format!(
        "{} holds {} of {} replications, probably from an interrupted sweep; \
         remove it to rerun",
        sink,
        outcome.results.len(),
        outcome.expected
    ))
}

struct FinishOnDrop<'a>(&'a AtomicBool);

impl Drop for FinishOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

fn report_progress(progress: &SweepProgress, finished: &AtomicBool) {
    let tick = Duration::from_millis(100);
    let mut waited = Duration::ZERO;
    while !finished.load(Ordering::Relaxed) {
        std::thread::sleep(tick);
        waited += tick;
        if waited >= PROGRESS_INTERVAL {
            waited = Duration::ZERO;
            tracing::info!(
                completed = progress.completed(),
                total = progress.total(),
                "sweep progress"
            );
        }
    }
}

pub fn run(args: RunArgs) -> color_eyre::Result<()> {
    let plan = plan_run(&args)?;
    let outcome = execute_run(&plan)?;

    if let Some(note) = incomplete_note(&outcome, plan.options.sink.as_deref()) {
        eprintln!("warning: {note}");
    }
    if !args.no_summary {
        let summaries = summarize(&outcome.results, plan.group_by(), plan.alpha);
        print!("{}", format_power_table(&summaries, plan.alpha));
    }
    Ok(())
}

/// Load a sink and reduce it to power summaries
pub fn summarize_sink(
    sink: &Path,
    group_by: Option<DesignField>,
    alpha: f64,
) -> color_eyre::Result<Vec<PowerSummary>> {
    let alpha = check_alpha(alpha)?;
    let store = ResultStore::new(PathBuf::from(sink));
    if !store
        .has_data()
        .wrap_err_with(|| format!("failed to read {}", sink.display()))?
    {
        bail!("no results stored at {}", sink.display());
    }
    let results = store
        .load()
        .wrap_err_with(|| format!("failed to load results from {}", sink.display()))?;
    tracing::info!(
        replications = results.len(),
        failed = results.iter().filter(|r| r.failed).count(),
        "loaded results"
    );
    Ok(summarize(&results, group_by, alpha))
}

pub fn summarize_command(args: SummarizeArgs) -> color_eyre::Result<()> {
    let summaries = summarize_sink(&args.sink, args.group_by, args.alpha)?;
    if args.json {
        println!("{}", power_json(&summaries)?);
    } else {
        print!("{}", format_power_table(&summaries, args.alpha));
    }
    Ok(())
}
