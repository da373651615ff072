//! Core types and utilities

pub mod boundary;
pub mod config;
pub mod grid;

pub use boundary::{BoundaryCoefficients, BoundarySums};
pub use config::{EdgeStopping, FilterConfig};
pub use grid::{Grid, GridStats};
