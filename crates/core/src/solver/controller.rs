//! Linear and nonlinear filter drivers
//!
//! [`AnisotropicFilter`] owns the worker pool and the configuration and
//! exposes the two filter modes:
//!
//! - **linear**: one ADI step with the constant coefficient `D0`;
//! - **nonlinear**: a fixed-point iteration on the gradient-dependent
//!   coefficient. Each iteration seeds the coefficient from an extrapolated
//!   previous result
//!
//!   ```text
//!   seed = prev + k · (prev − prev_prev)
//!   ```
//!
//!   re-solves the step from the original input, and stops when the
//!   normalised residual
//!
//!   ```text
//!   r = 2 · Σ(a − b)² / Σ(a² + b²)
//!   ```
//!
//!   between two successive results drops to the tolerance, or after
//!   [`MAX_ITERATIONS`] iterations.

use super::adi::AdiStepper;
use super::diffusivity::{diffusivity_field, DiffusivityParams};
use super::parallel::{CancellationToken, WorkerPool};
use super::profiler::ProfilerScope;
use crate::core_types::{BoundarySums, FilterConfig, Grid};
use crate::error::FilterError;
use tracing::{debug, info, warn};

/// Hard cap on fixed-point iterations per nonlinear solve
pub const MAX_ITERATIONS: usize = 100;

/// Result of a nonlinear solve with its convergence record
#[derive(Debug, Clone, PartialEq)]
pub struct NonLinearOutcome {
    /// Filtered grid
    pub grid: Grid,
    /// Number of fixed-point iterations performed (1..=`MAX_ITERATIONS`)
    pub iterations: usize,
    /// Residual of the last iteration
    pub residual: f64,
    /// Whether the residual reached the tolerance before the cap
    pub converged: bool,
}

/// Edge-preserving diffusion filter solved by the ADI scheme.
///
/// The worker pool is started by [`new`](Self::new) and must be stopped
/// with [`shutdown`](Self::shutdown) once the filter is no longer needed.
#[derive(Debug)]
pub struct AnisotropicFilter {
    config: FilterConfig,
    params: DiffusivityParams,
    pool: WorkerPool,
    cancel: CancellationToken,
}

impl AnisotropicFilter {
    /// Validate `config` and start the worker pool
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for out-of-range settings, `PoolBuild` if the worker
    /// threads cannot be started.
    pub fn new(config: FilterConfig) -> Result<Self, FilterError> {
        config.validate()?;
        let pool = WorkerPool::new(config.worker_count)?;
        info!(
            "Created anisotropic filter: D0={}, scale={}, eps={}, anisotropy={}, k={}, f={:?}",
            config.base_diffusion,
            config.nonlinearity_scale,
            config.tolerance,
            config.anisotropy,
            config.acceleration,
            config.edge_stopping
        );
        Ok(Self {
            params: DiffusivityParams::from_config(&config),
            config,
            pool,
            cancel: CancellationToken::new(),
        })
    }

    /// Configuration the filter was built with
    #[must_use]
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Handle for requesting cooperative cancellation from another thread
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Number of threads in the worker pool
    #[must_use]
    pub fn worker_threads(&self) -> usize {
        self.pool.threads()
    }

    /// Whether the worker pool is still running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.pool.is_running()
    }

    /// Stop the worker pool. Later solves fail with `PoolShutDown`.
    pub fn shutdown(&mut self) {
        self.pool.shutdown();
    }

    fn stepper(&self) -> AdiStepper<'_> {
        AdiStepper::new(
            &self.pool,
            &self.cancel,
            self.config.boundary,
            self.config.base_diffusion,
        )
    }

    /// Diffusion-coefficient field of `grid`
    ///
    /// # Errors
    ///
    /// `Cancelled` or `PoolShutDown` from the worker pool.
    pub fn diffusivity(&self, grid: &Grid) -> Result<Grid, FilterError> {
        diffusivity_field(grid, &self.params, &self.pool, &self.cancel)
    }

    /// One ADI step with the spatially constant coefficient `D0` and zero
    /// boundary sums.
    ///
    /// # Errors
    ///
    /// `GridTooSmall` for grids under 3×3, `Cancelled`, `PoolShutDown` or
    /// `SingularSystem` from the step.
    pub fn solve_linear(&self, grid: &Grid) -> Result<Grid, FilterError> {
        let _scope = ProfilerScope::new("solve_linear");
        let (width, height) = grid.shape();
        let coef = Grid::with_value(width, height, self.config.base_diffusion);
        self.stepper()
            .step(grid, &coef, &coef, &BoundarySums::zeros(width, height))
    }

    /// Nonlinear fixed-point solve; returns the filtered grid only.
    ///
    /// # Errors
    ///
    /// See [`solve_non_linear_report`](Self::solve_non_linear_report).
    pub fn solve_non_linear(&self, grid: &Grid) -> Result<Grid, FilterError> {
        self.solve_non_linear_report(grid).map(|outcome| outcome.grid)
    }

    /// Nonlinear fixed-point solve with iteration count and final residual.
    ///
    /// # Errors
    ///
    /// `GridTooSmall` for grids under 3×3, `Cancelled` when a cancellation
    /// request is seen before any sweep or reduction, `PoolShutDown`, or the
    /// first `SingularSystem` raised by a lane.
    pub fn solve_non_linear_report(&self, grid: &Grid) -> Result<NonLinearOutcome, FilterError> {
        let _scope = ProfilerScope::new("solve_non_linear");
        let (width, height) = grid.shape();
        let sums = BoundarySums::zeros(width, height);
        let stepper = self.stepper();
        let acceleration = self.config.acceleration;

        let old_coef = self.diffusivity(grid)?;
        let mut prev_prev = grid.clone();
        let mut prev = grid.clone();
        let mut iterations = 0;

        loop {
            let seed = self.extrapolate(&prev, &prev_prev, acceleration)?;
            let new_coef = self.diffusivity(&seed)?;
            let result = stepper.step(grid, &old_coef, &new_coef, &sums)?;
            iterations += 1;

            let residual = self.calc_difference(&result, &prev)?;
            debug!("Nonlinear iteration {}: residual {:e}", iterations, residual);
            prev_prev = std::mem::replace(&mut prev, result);

            let converged = residual <= self.config.tolerance;
            if converged || iterations >= MAX_ITERATIONS {
                if !converged {
                    warn!(
                        "Nonlinear solve stopped after {} iterations with residual {:e} (eps {:e})",
                        iterations, residual, self.config.tolerance
                    );
                }
                return Ok(NonLinearOutcome {
                    grid: prev,
                    iterations,
                    residual,
                    converged,
                });
            }
        }
    }

    /// Normalised squared difference `2·Σ(a−b)² / Σ(a²+b²)` of two grids.
    ///
    /// Two identically zero grids have difference `0`.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if the grids differ in shape, `Cancelled` or
    /// `PoolShutDown` from the worker pool.
    pub fn calc_difference(&self, a: &Grid, b: &Grid) -> Result<f64, FilterError> {
        a.ensure_same_shape(b)?;
        let (diff, total) = self.pool.reduce_rows(a.height(), &self.cancel, |y| {
            a.row(y)
                .iter()
                .zip(b.row(y))
                .fold((0.0, 0.0), |(diff, total), (&u, &v)| {
                    (diff + (u - v) * (u - v), total + u * u + v * v)
                })
        })?;
        if total == 0.0 {
            Ok(0.0)
        } else {
            Ok(2.0 * diff / total)
        }
    }

    /// Extrapolated seed `prev + k·(prev − prev_prev)`, computed row by row
    fn extrapolate(&self, prev: &Grid, prev_prev: &Grid, k: f64) -> Result<Grid, FilterError> {
        prev.ensure_same_shape(prev_prev)?;
        let mut seed = Grid::new(prev.width(), prev.height());
        self.pool.fill_rows(&mut seed, &self.cancel, |y, row| {
            for ((out, &p), &pp) in row.iter_mut().zip(prev.row(y)).zip(prev_prev.row(y)) {
                *out = p + k * (p - pp);
            }
        })?;
        Ok(seed)
    }
}
