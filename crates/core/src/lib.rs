//! ADI Anisotropic Diffusion Filter Core Library
//!
//! Edge-preserving smoothing of 2D intensity images by nonlinear diffusion.
//! Each filter step is solved implicitly with the Crank-Nicholson
//! Alternating-Direction-Implicit scheme and the Perona-Malik edge-stopping
//! coefficient; the row and column solves run in parallel on a dedicated
//! worker pool.
//!
//! ## Layout
//!
//! - [`core_types`]: grids, boundary conditions and filter configuration
//! - [`solver`]: lane solver, ADI step, diffusivity, iteration control
//! - [`sequence`]: repeated filtering with per-frame output
//! - [`pattern`]: synthetic noisy test image

// Core types and utilities
pub mod core_types;
pub mod error;

// Numerical solver
pub mod solver;

// Drivers
pub mod pattern;
pub mod sequence;

// Re-export core types
pub use core_types::{BoundaryCoefficients, BoundarySums, EdgeStopping, FilterConfig, Grid, GridStats};
pub use error::FilterError;

// Re-export solver types
pub use solver::{AnisotropicFilter, CancellationToken, NonLinearOutcome, WorkerPool};

// Re-export drivers
pub use pattern::TestPattern;
pub use sequence::{run_sequence, FilterMode, SequenceReport, DEFAULT_STEPS, MAX_STEPS};
