//! One Alternating-Direction-Implicit time step
//!
//! A step is a row sweep followed by a column sweep:
//!
//! 1. every row is solved implicitly (edges 0 and 2 close the rows) into an
//!    intermediate grid;
//! 2. every column of the intermediate grid is solved implicitly (edges 1
//!    and 3 close the columns) into the output grid.
//!
//! The two leftmost and two rightmost columns carry no usable y-gradient
//! information, so their column solves use a constant `D0` lane for both the
//! old and the new coefficients. Those lanes are private to the step, and the
//! caller's coefficient grids are never written.

use super::diffusivity::in_boundary_band;
use super::parallel::{CancellationToken, WorkerPool};
use super::tridiagonal::{solve_lane, MIN_LANE_LEN};
use crate::core_types::{BoundaryCoefficients, BoundarySums, Grid};
use crate::error::FilterError;
use tracing::debug;

/// Executes ADI steps on a worker pool
pub struct AdiStepper<'a> {
    pool: &'a WorkerPool,
    cancel: &'a CancellationToken,
    bc: BoundaryCoefficients,
    base_diffusion: f64,
}

impl<'a> AdiStepper<'a> {
    /// Create a stepper bound to a pool and cancellation token
    ///
    /// # Arguments
    ///
    /// * `pool` - Worker pool running the lane tasks
    /// * `cancel` - Token checked before each sweep
    /// * `bc` - Robin coefficients closing every lane
    /// * `base_diffusion` - Constant coefficient used for the boundary columns
    #[must_use]
    pub fn new(
        pool: &'a WorkerPool,
        cancel: &'a CancellationToken,
        bc: BoundaryCoefficients,
        base_diffusion: f64,
    ) -> Self {
        Self {
            pool,
            cancel,
            bc,
            base_diffusion,
        }
    }

    /// Advance `data` by one ADI step
    ///
    /// # Arguments
    ///
    /// * `data` - Grid at the start of the step
    /// * `old_coef` - Diffusion coefficients for the explicit part
    /// * `new_coef` - Diffusion coefficients for the implicit part
    /// * `sums` - Boundary right-hand sides for all four edges
    ///
    /// # Errors
    ///
    /// - `ShapeMismatch` if the coefficient grids or sums do not match `data`
    /// - `GridTooSmall` if either dimension is below three
    /// - `Cancelled` / `PoolShutDown` from the worker pool
    /// - the first `SingularSystem` raised by a lane
    pub fn step(
        &self,
        data: &Grid,
        old_coef: &Grid,
        new_coef: &Grid,
        sums: &BoundarySums,
    ) -> Result<Grid, FilterError> {
        data.ensure_same_shape(old_coef)?;
        data.ensure_same_shape(new_coef)?;
        if !sums.is_consistent() || sums.shape() != data.shape() {
            return Err(FilterError::ShapeMismatch {
                expected: data.shape(),
                actual: sums.shape(),
            });
        }
        let (width, height) = data.shape();
        let shortest = width.min(height);
        if shortest < MIN_LANE_LEN {
            return Err(FilterError::GridTooSmall {
                min: MIN_LANE_LEN,
                actual: shortest,
            });
        }

        debug!("ADI row sweep over {} rows", height);
        let rows = self.pool.map_lanes(height, self.cancel, |y| {
            solve_lane(
                data.row(y),
                sums.row_pair(y),
                old_coef.row(y),
                new_coef.row(y),
                &self.bc,
            )
        })?;
        let intermediate = Grid::from_rows(&rows)?;

        let constant = vec![self.base_diffusion; height];
        debug!("ADI column sweep over {} columns", width);
        let columns = self.pool.map_lanes(width, self.cancel, |x| {
            let lane = intermediate.column(x);
            if in_boundary_band(x, width) {
                solve_lane(&lane, sums.column_pair(x), &constant, &constant, &self.bc)
            } else {
                solve_lane(
                    &lane,
                    sums.column_pair(x),
                    &old_coef.column(x),
                    &new_coef.column(x),
                    &self.bc,
                )
            }
        })?;

        Ok(Grid::from_columns(&columns, height))
    }
}
