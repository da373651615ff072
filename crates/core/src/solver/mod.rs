//! Anisotropic diffusion solver
//!
//! The solver is layered bottom-up:
//!
//! - [`tridiagonal`]: implicit solve of a single row or column lane
//! - [`adi`]: one ADI step (row sweep, then column sweep)
//! - [`diffusivity`]: gradient-dependent diffusion-coefficient field
//! - [`controller`]: linear and nonlinear filter drivers
//! - [`parallel`]: worker pool and cancellation shared by all of the above
//!
//! # Example
//!
//! ```rust,no_run
//! use adi_filter_core::solver::AnisotropicFilter;
//! use adi_filter_core::{FilterConfig, Grid};
//!
//! let mut filter = AnisotropicFilter::new(FilterConfig::default())?;
//! let image = Grid::with_value(64, 48, 1.0);
//! let _smoothed = filter.solve_non_linear(&image)?;
//! filter.shutdown();
//! # Ok::<(), adi_filter_core::FilterError>(())
//! ```

pub mod adi;
pub mod controller;
pub mod diffusivity;
pub mod parallel;
pub mod profiler;
pub mod tridiagonal;

// Re-exports
pub use adi::AdiStepper;
pub use controller::{AnisotropicFilter, NonLinearOutcome, MAX_ITERATIONS};
pub use diffusivity::{cell_diffusivity, diffusivity_field, DiffusivityParams};
pub use parallel::{CancellationToken, WorkerPool};
pub use profiler::ProfilerScope;
pub use tridiagonal::solve_lane;
