//! Gradient-dependent diffusion coefficient
//!
//! Implements the Perona-Malik edge-stopping coefficient
//!
//! ```text
//! D(i,k) = D0 · f(λ · (gx²/(1−α) + gy²/(1+α)))
//! ```
//!
//! Where:
//! - `gx = u[i][k+1] − u[i][k−1]`, `gy = u[i+1][k] − u[i−1][k]` (central differences)
//! - `λ = 1/scale²` is the nonlinearity factor
//! - `α` is the anisotropy weighting of x- against y-gradients
//! - `f` is the configured edge-stopping function
//!
//! # Boundary treatment
//!
//! The two outermost rows and columns on each side are not given the full
//! stencil:
//! - boundary rows (away from the corners) use only `gx`
//! - boundary columns (away from the corners) use only `gy`
//! - the corner blocks, outermost along both lanes, are set to `D0`
//!
//! Non-finite results are replaced by zero, so the field is always finite and
//! non-negative for non-negative `D0`.

use super::parallel::{CancellationToken, WorkerPool};
use crate::core_types::{EdgeStopping, FilterConfig, Grid};
use crate::error::FilterError;

/// Width of the band treated as boundary on each side of a lane
pub const BOUNDARY_BAND: usize = 2;

/// Parameters of the diffusion-coefficient computation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffusivityParams {
    /// Base diffusion coefficient `D0`
    pub base: f64,
    /// Squared-gradient multiplier `λ = 1/scale²`
    pub nonlinear_factor: f64,
    /// Anisotropy `α` in `[0, 1)`
    pub anisotropy: f64,
    /// Edge-stopping function `f`
    pub edge_stopping: EdgeStopping,
}

impl DiffusivityParams {
    /// Extract the diffusivity parameters from a filter configuration
    #[must_use]
    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            base: config.base_diffusion,
            nonlinear_factor: config.nonlinear_factor(),
            anisotropy: config.anisotropy,
            edge_stopping: config.edge_stopping,
        }
    }

    #[inline]
    fn stop(&self, squared: f64) -> f64 {
        finite_or_zero(self.base * self.edge_stopping.apply(squared * self.nonlinear_factor))
    }
}

#[inline]
fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Whether lane index `i` of a lane of length `len` lies in the boundary band
#[inline]
pub(crate) fn in_boundary_band(i: usize, len: usize) -> bool {
    i < BOUNDARY_BAND || i + BOUNDARY_BAND >= len
}

/// Diffusion coefficient of a single cell (`x` = column, `y` = row)
#[must_use]
pub fn cell_diffusivity(grid: &Grid, x: usize, y: usize, params: &DiffusivityParams) -> f64 {
    let (width, height) = grid.shape();
    let row_band = in_boundary_band(y, height);
    let col_band = in_boundary_band(x, width);

    match (row_band, col_band) {
        (true, true) => params.base,
        (true, false) => {
            let gx = grid.get(x + 1, y) - grid.get(x - 1, y);
            params.stop(gx * gx / (1.0 - params.anisotropy))
        }
        (false, true) => {
            let gy = grid.get(x, y + 1) - grid.get(x, y - 1);
            params.stop(gy * gy / (1.0 + params.anisotropy))
        }
        (false, false) => {
            let gx = grid.get(x + 1, y) - grid.get(x - 1, y);
            let gy = grid.get(x, y + 1) - grid.get(x, y - 1);
            params.stop(gx * gx / (1.0 - params.anisotropy) + gy * gy / (1.0 + params.anisotropy))
        }
    }
}

/// Compute the full diffusion-coefficient field of `grid`, one row per task.
///
/// # Errors
///
/// `Cancelled` if cancellation was requested before dispatch, `PoolShutDown`
/// if the pool has been stopped.
pub fn diffusivity_field(
    grid: &Grid,
    params: &DiffusivityParams,
    pool: &WorkerPool,
    cancel: &CancellationToken,
) -> Result<Grid, FilterError> {
    let mut out = Grid::new(grid.width(), grid.height());
    pool.fill_rows(&mut out, cancel, |y, row| {
        for (x, cell) in row.iter_mut().enumerate() {
            *cell = cell_diffusivity(grid, x, y, params);
        }
    })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params(edge_stopping: EdgeStopping, anisotropy: f64) -> DiffusivityParams {
        DiffusivityParams {
            base: 0.3,
            nonlinear_factor: 1.0 / (30.0 * 30.0),
            anisotropy,
            edge_stopping,
        }
    }

    fn ramp(width: usize, height: usize) -> Grid {
        let mut grid = Grid::new(width, height);
        for y in 0..height {
            for x in 0..width {
                grid.set(x, y, 10.0 * x as f64 + 3.0 * (y * y) as f64);
            }
        }
        grid
    }

    fn field(grid: &Grid, p: &DiffusivityParams) -> Grid {
        let mut pool = WorkerPool::new(2).unwrap();
        let out = diffusivity_field(grid, p, &pool, &CancellationToken::new()).unwrap();
        pool.shutdown();
        out
    }

    #[test]
    fn test_uniform_grid_gives_base_everywhere() {
        let grid = Grid::with_value(8, 6, 42.0);
        let out = field(&grid, &params(EdgeStopping::Rational, 0.0));
        assert!(out.as_slice().iter().all(|&d| d == 0.3));
    }

    #[test]
    fn test_interior_uses_both_gradients() {
        let grid = ramp(9, 9);
        let p = params(EdgeStopping::Exponential, 0.25);
        let out = field(&grid, &p);

        let (x, y) = (4, 4);
        let gx = grid.get(x + 1, y) - grid.get(x - 1, y);
        let gy = grid.get(x, y + 1) - grid.get(x, y - 1);
        let expected =
            0.3 * (-(gx * gx / 0.75 + gy * gy / 1.25) / 900.0_f64).exp();
        assert_relative_eq!(out.get(x, y), expected, max_relative = 1e-12);
    }

    #[test]
    fn test_boundary_bands_use_reduced_stencil() {
        let grid = ramp(9, 9);
        let p = params(EdgeStopping::Rational, 0.0);
        let out = field(&grid, &p);

        // Row band: x-gradient only
        let gx = grid.get(5, 1) - grid.get(3, 1);
        assert_relative_eq!(out.get(4, 1), 0.3 / (1.0 + gx * gx / 900.0), max_relative = 1e-12);
        assert_relative_eq!(out.get(4, 8), 0.3 / (1.0 + gx * gx / 900.0), max_relative = 1e-12);

        // Column band: y-gradient only
        let gy = grid.get(0, 5) - grid.get(0, 3);
        assert_relative_eq!(out.get(0, 4), 0.3 / (1.0 + gy * gy / 900.0), max_relative = 1e-12);

        // Corners are constant
        for &(x, y) in &[(0, 0), (1, 1), (8, 0), (7, 8), (0, 7), (8, 8)] {
            assert_eq!(out.get(x, y), 0.3, "corner ({x}, {y})");
        }
    }

    #[test]
    fn test_boundary_bands_weight_anisotropy() {
        let grid = ramp(9, 9);
        let alpha = 0.4;
        let out = field(&grid, &params(EdgeStopping::Rational, alpha));

        // Row band divides gx² by 1 − α
        let gx = grid.get(5, 1) - grid.get(3, 1);
        let row_band = 0.3 / (1.0 + gx * gx / (1.0 - alpha) / 900.0);
        assert_relative_eq!(out.get(4, 1), row_band, max_relative = 1e-12);
        assert_relative_eq!(out.get(4, 7), row_band, max_relative = 1e-12);

        // Column band divides gy² by 1 + α
        let gy = grid.get(8, 5) - grid.get(8, 3);
        let col_band = 0.3 / (1.0 + gy * gy / (1.0 + alpha) / 900.0);
        assert_relative_eq!(out.get(8, 4), col_band, max_relative = 1e-12);
        assert_relative_eq!(out.get(1, 4), col_band, max_relative = 1e-12);

        // The weighting moves both bands off the isotropic values
        let isotropic = field(&grid, &params(EdgeStopping::Rational, 0.0));
        assert!(out.get(4, 1) < isotropic.get(4, 1));
        assert!(out.get(8, 4) > isotropic.get(8, 4));
    }

    #[test]
    fn test_non_finite_coefficient_becomes_zero() {
        let mut grid = Grid::new(6, 6);
        grid.set(1, 3, f64::INFINITY);
        grid.set(3, 3, f64::INFINITY);
        let out = field(&grid, &params(EdgeStopping::Rational, 0.0));
        // inf - inf is NaN at (2, 3)
        assert_eq!(out.get(2, 3), 0.0);
        assert!(out.as_slice().iter().all(|d| d.is_finite() && *d >= 0.0));
    }

    #[test]
    fn test_steep_edge_suppresses_diffusion() {
        let mut grid = Grid::new(10, 10);
        for y in 0..10 {
            for x in 5..10 {
                grid.set(x, y, 100.0);
            }
        }
        let out = field(&grid, &params(EdgeStopping::Exponential, 0.0));
        assert!(out.get(4, 5) < 1e-4, "edge cell should barely diffuse");
        assert_eq!(out.get(2, 5), 0.3);
    }

    #[test]
    fn test_anisotropy_weights_x_gradients_more() {
        let mut along_x = Grid::new(9, 9);
        let mut along_y = Grid::new(9, 9);
        for y in 0..9 {
            for x in 0..9 {
                along_x.set(x, y, 5.0 * x as f64);
                along_y.set(x, y, 5.0 * y as f64);
            }
        }
        let p = params(EdgeStopping::Rational, 0.5);
        let dx = field(&along_x, &p).get(4, 4);
        let dy = field(&along_y, &p).get(4, 4);
        assert!(dx < dy, "x-gradients are divided by 1-α and must damp more");
    }
}
