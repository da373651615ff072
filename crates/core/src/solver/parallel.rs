//! Worker pool and cancellation for the parallel sweeps
//!
//! Every sweep and reduction of the filter is a fork-join over independent
//! lanes (rows or columns) run on a dedicated, fixed-size rayon pool. The
//! calling thread blocks until all lane tasks have finished, so the join at
//! the end of each operation is the barrier between phases. Partial sums of
//! a reduction are combined by rayon's parallel `reduce`, so no shared
//! accumulator is ever written concurrently.
//!
//! Cancellation is cooperative: the token is checked once before each
//! operation is dispatched. Tasks already running are not interrupted.

use crate::core_types::Grid;
use crate::error::FilterError;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared flag requesting that running and future solves stop.
///
/// Clones share the same flag, so a token handed to another thread can
/// cancel a solve running on this one.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the not-cancelled state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clear a previous request so the filter can be used again
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Fail with `Cancelled` if cancellation has been requested
    ///
    /// # Errors
    ///
    /// Returns `FilterError::Cancelled` when the flag is set.
    pub fn check(&self) -> Result<(), FilterError> {
        if self.is_cancelled() {
            Err(FilterError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Fixed-size worker pool executing the per-lane tasks.
///
/// Started at construction and stopped by an explicit [`shutdown`](Self::shutdown);
/// every operation after shutdown fails with `PoolShutDown`.
pub struct WorkerPool {
    pool: Option<rayon::ThreadPool>,
    threads: usize,
}

impl WorkerPool {
    /// Start a pool with `threads` named worker threads
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for zero threads and `PoolBuild` when the
    /// threads cannot be spawned.
    pub fn new(threads: usize) -> Result<Self, FilterError> {
        if threads == 0 {
            return Err(FilterError::invalid_config(
                "worker_count",
                "must be at least 1",
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("adi-worker-{i}"))
            .build()
            .map_err(|e| FilterError::PoolBuild(e.to_string()))?;

        info!("Started worker pool with {} threads", threads);
        Ok(Self {
            pool: Some(pool),
            threads,
        })
    }

    /// Number of worker threads the pool was started with
    #[must_use]
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Whether the pool still accepts work
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.pool.is_some()
    }

    /// Stop the worker threads. Calling it again is a no-op.
    pub fn shutdown(&mut self) {
        if self.pool.take().is_some() {
            info!("Worker pool with {} threads shut down", self.threads);
        }
    }

    fn pool(&self) -> Result<&rayon::ThreadPool, FilterError> {
        self.pool.as_ref().ok_or(FilterError::PoolShutDown)
    }

    /// Run `task(i)` for every lane `i in 0..count` and collect the results
    /// in lane order.
    ///
    /// Blocks until every task has finished. The first task error aborts the
    /// operation and is returned; the other results are discarded.
    ///
    /// # Errors
    ///
    /// `Cancelled` if the token is set before dispatch, `PoolShutDown` after
    /// shutdown, otherwise the first task error.
    pub fn map_lanes<T, F>(
        &self,
        count: usize,
        cancel: &CancellationToken,
        task: F,
    ) -> Result<Vec<T>, FilterError>
    where
        T: Send,
        F: Fn(usize) -> Result<T, FilterError> + Sync + Send,
    {
        let pool = self.pool()?;
        cancel.check()?;
        debug!("Dispatching {} lane tasks", count);
        pool.install(|| (0..count).into_par_iter().map(&task).collect())
    }

    /// Fill every row of `out` in parallel; `task(y, row)` writes row `y`.
    ///
    /// # Errors
    ///
    /// `Cancelled` if the token is set before dispatch, `PoolShutDown` after
    /// shutdown.
    pub fn fill_rows<F>(
        &self,
        out: &mut Grid,
        cancel: &CancellationToken,
        task: F,
    ) -> Result<(), FilterError>
    where
        F: Fn(usize, &mut [f64]) + Sync + Send,
    {
        let pool = self.pool()?;
        cancel.check()?;
        let width = out.width();
        if width == 0 {
            return Ok(());
        }
        pool.install(|| {
            out.as_mut_slice()
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(y, row)| task(y, row));
        });
        Ok(())
    }

    /// Sum per-row pairs of partial results over `rows` rows.
    ///
    /// `task(y)` returns the two partial sums of row `y`; they are combined
    /// component-wise after all rows are done.
    ///
    /// # Errors
    ///
    /// `Cancelled` if the token is set before dispatch, `PoolShutDown` after
    /// shutdown.
    pub fn reduce_rows<F>(
        &self,
        rows: usize,
        cancel: &CancellationToken,
        task: F,
    ) -> Result<(f64, f64), FilterError>
    where
        F: Fn(usize) -> (f64, f64) + Sync + Send,
    {
        let pool = self.pool()?;
        cancel.check()?;
        Ok(pool.install(|| {
            (0..rows)
                .into_par_iter()
                .map(&task)
                .reduce(|| (0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1))
        }))
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.pool.is_some() {
            warn!("Worker pool dropped without an explicit shutdown");
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads)
            .field("running", &self.is_running())
            .finish()
    }
}
