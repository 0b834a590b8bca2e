//! Sweep driver: runs a replication per grid row with resumable persistence.
//!
//! Each grid row gets its own random stream, derived up front from a single
//! master seed, so a sweep is reproducible whether rows run one at a time or
//! in parallel batches. When a sink is configured the driver is its only
//! writer and appends results in grid order as they complete.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

use crate::error::SimulationError;
use crate::fit::Fitter;
use crate::model::{DesignParameters, ReplicationResult};
use crate::replication::{WarningPolicy, run_replication};
use crate::store::{ResultStore, StoreWriter};

/// Progress tracking for a running sweep
#[derive(Debug, Clone)]
pub struct SweepProgress {
    completed: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
    cancelled: Arc<AtomicBool>,
}

impl SweepProgress {
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            completed: Arc::new(AtomicUsize::new(0)),
            total: Arc::new(AtomicUsize::new(total)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    pub fn increment(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset(&self, total: usize) {
        self.completed.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
    }

    /// Stop the sweep before its next row (or batch) starts
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

impl Default for SweepProgress {
    fn default() -> Self {
        Self::new(0)
    }
}

/// How a sweep is executed and where its results go
#[derive(Debug, Clone)]
pub struct SweepOptions {
    /// Master seed for the per-row random streams
    pub seed: u64,
    /// Result file; `None` keeps results in memory only
    pub sink: Option<PathBuf>,
    pub warning_policy: WarningPolicy,
    /// Run rows on the rayon pool (requires the `parallel` feature)
    pub parallel: bool,
    /// Rows per parallel batch; each batch is appended once it completes
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 8)
        .unwrap_or(8)
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            sink: None,
            warning_policy: WarningPolicy::default(),
            parallel: cfg!(feature = "parallel"),
            batch_size: default_batch_size(),
        }
    }
}

/// Results of a sweep
#[derive(Debug, Clone, Default)]
pub struct SweepOutcome {
    pub results: Vec<ReplicationResult>,
    /// True when the sink already held data and nothing was run
    pub resumed: bool,
    /// Rows in the grid the sweep was asked to run
    pub expected: usize,
}

impl SweepOutcome {
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.failed).count()
    }

    /// A reused sink whose replication count does not match the grid, as
    /// left behind by an interrupted sweep or written for another grid.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        self.results.len() != self.expected
    }
}

/// Derive one independent seed per grid row from the master seed.
#[must_use]
pub fn derive_seeds(seed: u64, rows: usize) -> Vec<u64> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..rows).map(|_| rng.next_u64()).collect()
}

/// Run one replication per grid row.
///
/// - Every row is validated before any work starts.
/// - If `options.sink` already holds data, nothing is run and the stored
///   results are returned with `resumed = true`. There is no per-row resume;
///   a stored count that differs from the grid is logged and reported
///   through [`SweepOutcome::is_incomplete`].
/// - Otherwise each result is appended to the sink as soon as it (or, in
///   parallel mode, its batch) completes. A failed append aborts the sweep.
/// - Fit failures are recorded per row and never abort the sweep.
pub fn run_sweep<F: Fitter + ?Sized>(
    grid: &[DesignParameters],
    fitter: &F,
    options: &SweepOptions,
    progress: Option<&SweepProgress>,
) -> Result<SweepOutcome, SimulationError> {
    for params in grid {
        params.validate()?;
    }

    let store = options.sink.as_ref().map(ResultStore::new);
    if let Some(store) = &store
        && store.has_data().map_err(SimulationError::SinkRead)?
    {
        let results = store.load().map_err(SimulationError::SinkRead)?;
        tracing::info!(
            sink = %store.path().display(),
            replications = results.len(),
            "sink already holds results, skipping sweep"
        );
        let outcome = SweepOutcome {
            results,
            resumed: true,
            expected: grid.len(),
        };
        if outcome.is_incomplete() {
            tracing::warn!(
                sink = %store.path().display(),
                stored = outcome.results.len(),
                expected = outcome.expected,
                "reused sink does not match the grid; remove it to rerun the sweep"
            );
        }
        return Ok(outcome);
    }

    if grid.is_empty() {
        return Ok(SweepOutcome::default());
    }

    tracing::info!(
        rows = grid.len(),
        seed = options.seed,
        parallel = options.parallel,
        sink = ?options.sink,
        "starting sweep"
    );

    if let Some(p) = progress {
        p.reset(grid.len());
    }
    let seeds = derive_seeds(options.seed, grid.len());
    let mut writer = store
        .as_ref()
        .map(ResultStore::writer)
        .transpose()
        .map_err(SimulationError::SinkWrite)?;

    let results = if options.parallel {
        run_batched(grid, &seeds, fitter, options, progress, writer.as_mut())?
    } else {
        run_sequential(grid, &seeds, fitter, options, progress, writer.as_mut())?
    };

    let outcome = SweepOutcome {
        results,
        resumed: false,
        expected: grid.len(),
    };
    tracing::info!(
        replications = outcome.results.len(),
        failed = outcome.failed_count(),
        "sweep finished"
    );
    Ok(outcome)
}

fn run_row<F: Fitter + ?Sized>(
    index: usize,
    grid: &[DesignParameters],
    seeds: &[u64],
    fitter: &F,
    policy: WarningPolicy,
) -> Result<ReplicationResult, SimulationError> {
    let mut rng = SmallRng::seed_from_u64(seeds[index]);
    let result = run_replication(&mut rng, index, &grid[index], fitter, policy)?;
    tracing::debug!(replication = index, failed = result.failed, "replication complete");
    Ok(result)
}

fn record(
    result: &ReplicationResult,
    writer: Option<&mut StoreWriter>,
) -> Result<(), SimulationError> {
    if let Some(w) = writer {
        w.append(result).map_err(SimulationError::SinkWrite)?;
    }
    Ok(())
}

fn run_sequential<F: Fitter + ?Sized>(
    grid: &[DesignParameters],
    seeds: &[u64],
    fitter: &F,
    options: &SweepOptions,
    progress: Option<&SweepProgress>,
    mut writer: Option<&mut StoreWriter>,
) -> Result<Vec<ReplicationResult>, SimulationError> {
    let mut results = Vec::with_capacity(grid.len());
    for index in 0..grid.len() {
        if let Some(p) = progress
            && p.is_cancelled()
        {
            return Err(SimulationError::Cancelled);
        }
        let result = run_row(index, grid, seeds, fitter, options.warning_policy)?;
        record(&result, writer.as_deref_mut())?;
        if let Some(p) = progress {
            p.increment();
        }
        results.push(result);
    }
    Ok(results)
}

#[cfg(feature = "parallel")]
fn run_batched<F: Fitter + ?Sized>(
    grid: &[DesignParameters],
    seeds: &[u64],
    fitter: &F,
    options: &SweepOptions,
    progress: Option<&SweepProgress>,
    mut writer: Option<&mut StoreWriter>,
) -> Result<Vec<ReplicationResult>, SimulationError> {
    use rayon::iter::{IntoParallelIterator, ParallelIterator};

    let batch_size = options.batch_size.max(1);
    let mut results = Vec::with_capacity(grid.len());
    for start in (0..grid.len()).step_by(batch_size) {
        if let Some(p) = progress
            && p.is_cancelled()
        {
            return Err(SimulationError::Cancelled);
        }
        let end = (start + batch_size).min(grid.len());
        let batch: Vec<Result<ReplicationResult, SimulationError>> = (start..end)
            .into_par_iter()
            .map(|index| {
                let result = run_row(index, grid, seeds, fitter, options.warning_policy);
                if let Some(p) = progress {
                    p.increment();
                }
                result
            })
            .collect();

        // Single writer: append in grid order once the batch is complete
        for result in batch {
            let result = result?;
            record(&result, writer.as_deref_mut())?;
            results.push(result);
        }
    }
    Ok(results)
}

#[cfg(not(feature = "parallel"))]
fn run_batched<F: Fitter + ?Sized>(
    grid: &[DesignParameters],
    seeds: &[u64],
    fitter: &F,
    options: &SweepOptions,
    progress: Option<&SweepProgress>,
    writer: Option<&mut StoreWriter>,
) -> Result<Vec<ReplicationResult>, SimulationError> {
    tracing::debug!("parallel feature disabled, running sequentially");
    run_sequential(grid, seeds, fitter, options, progress, writer)
}
