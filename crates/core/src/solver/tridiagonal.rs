//! Implicit lane solve (Thomas algorithm)
//!
//! One half-step of the ADI scheme along a single row or column. The
//! Crank-Nicholson discretisation of `∂u/∂t = ∂/∂x (D ∂u/∂x)` on a lane of
//! length `n` gives, for every interior index `m`:
//!
//! ```text
//! −b·u'[m−1] + c·u'[m] − a·u'[m+1] = d
//!
//! a = (D'[m] + D'[m+1]) / 2
//! b = (D'[m−1] + D'[m]) / 2
//! c = a + b + 1
//! d = (D[m] + D[m+1])/2 · u[m+1] + (D[m−1] + D[m])/2 · u[m−1]
//!     − (D[m] + (D[m−1] + D[m+1])/2 − 1) · u[m]
//! ```
//!
//! where `D'` are the new (implicit) coefficients, `D` the old (explicit)
//! ones and `u` the current lane values. The system is closed by the Robin
//! relations of [`BoundaryCoefficients`], each folded into the neighbouring
//! interior equation so that the matrix stays tridiagonal.
//!
//! The fold divides by `a` next to the lower end and by `b` next to the upper
//! end, so it breaks down where the diffusivity vanishes (`exp(−x)` underflows
//! to exactly 0 across strong edges). Every Thomas pivot is therefore checked
//! against the size of its row. When one is too small the lane is solved again
//! by banded Gaussian elimination with partial pivoting on the unfolded
//! system, which only fails for a genuinely singular matrix.

use crate::core_types::BoundaryCoefficients;
use crate::error::FilterError;
use tracing::trace;

/// Smallest lane the three-point scheme can solve
pub const MIN_LANE_LEN: usize = 3;

/// Relative size below which a Thomas pivot is rejected
const PIVOT_TOLERANCE: f64 = 1e-6;

/// Sub- and superdiagonals of the unfolded lane system
const BAND: usize = 2;

/// Stored entries per row: the band plus the fill-in of row swaps
const ROW_WIDTH: usize = 3 * BAND + 1;

/// Coefficients of the interior equation at index `m`
#[derive(Debug, Clone, Copy)]
struct Stencil {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
}

#[inline]
fn stencil(m: usize, data: &[f64], coef_old: &[f64], coef: &[f64]) -> Stencil {
    let a = (coef[m] + coef[m + 1]) / 2.0;
    let b = (coef[m - 1] + coef[m]) / 2.0;
    let d = (coef_old[m] + coef_old[m + 1]) / 2.0 * data[m + 1]
        + (coef_old[m - 1] + coef_old[m]) / 2.0 * data[m - 1]
        - (coef_old[m] + (coef_old[m - 1] + coef_old[m + 1]) / 2.0 - 1.0) * data[m];
    Stencil {
        a,
        b,
        c: a + b + 1.0,
        d,
    }
}

/// Accept a pivot only when it is finite and not negligible against `scale`
#[inline]
fn pivot(value: f64, scale: f64) -> Option<f64> {
    (value.is_finite() && value.abs() > PIVOT_TOLERANCE * scale).then_some(value)
}

/// Thomas algorithm on the folded system. `None` when a pivot is rejected.
fn thomas(
    data: &[f64],
    b_sum: [f64; 2],
    coef_old: &[f64],
    coef: &[f64],
    bc: &BoundaryCoefficients,
) -> Option<Vec<f64>> {
    let n = data.len();
    let (c0, c1, c2) = (bc.c0(), bc.c1(), bc.c2());
    let bc_scale = c0.abs() + c1.abs() + c2.abs();
    let mut p = vec![0.0; n - 1];
    let mut q = vec![0.0; n - 1];

    // Lower boundary relation combined with the equation at m = 1
    let first = stencil(1, data, coef_old, coef);
    let factor = 1.0 / pivot(c0 * first.a - c2 * first.b, bc_scale * first.c)?;
    p[0] = (c2 * first.c + c1 * first.a) * factor;
    q[0] = (b_sum[0] * first.a + c2 * first.d) * factor;

    // Forward elimination
    let mut last = first;
    for m in 1..n - 1 {
        let s = stencil(m, data, coef_old, coef);
        let factor = 1.0 / pivot(s.c + s.b * p[m - 1], s.c)?;
        p[m] = -s.a * factor;
        q[m] = (s.d + s.b * q[m - 1]) * factor;
        last = s;
    }

    // Upper boundary relation combined with the equation at m = n - 2
    let mut result = vec![0.0; n];
    let g = c1 * last.b + c0 * last.c;
    let denominator = pivot(c2 * last.b - c0 * last.a - p[n - 2] * g, bc_scale * last.c)?;
    result[n - 1] = (b_sum[1] * last.b + c0 * last.d - q[n - 2] * g) / denominator;

    // Back substitution
    for m in (0..n - 1).rev() {
        result[m] = q[m] - p[m] * result[m + 1];
    }
    Some(result)
}

/// Unfolded lane system in band storage.
///
/// Row `i` keeps columns `i − BAND ..= i + 2·BAND`; entry `(i, j)` lives in
/// slot `j + BAND − i`.
struct BandedSystem {
    rows: Vec<[f64; ROW_WIDTH]>,
    rhs: Vec<f64>,
}

impl BandedSystem {
    fn assemble(
        data: &[f64],
        b_sum: [f64; 2],
        coef_old: &[f64],
        coef: &[f64],
        bc: &BoundaryCoefficients,
    ) -> Self {
        let n = data.len();
        let mut system = Self {
            rows: vec![[0.0; ROW_WIDTH]; n],
            rhs: vec![0.0; n],
        };
        for (offset, value) in bc.0.iter().enumerate() {
            system.set(0, offset, *value);
            system.set(n - 1, n - 3 + offset, *value);
        }
        system.rhs[0] = b_sum[0];
        system.rhs[n - 1] = b_sum[1];

        for m in 1..n - 1 {
            let s = stencil(m, data, coef_old, coef);
            system.set(m, m - 1, -s.b);
            system.set(m, m, s.c);
            system.set(m, m + 1, -s.a);
            system.rhs[m] = s.d;
        }
        system
    }

    #[inline]
    fn get(&self, i: usize, j: usize) -> f64 {
        self.rows[i][j + BAND - i]
    }

    #[inline]
    fn set(&mut self, i: usize, j: usize, value: f64) {
        self.rows[i][j + BAND - i] = value;
    }

    /// Gaussian elimination with partial pivoting, then back substitution
    fn solve(mut self) -> Result<Vec<f64>, FilterError> {
        let n = self.rhs.len();
        for k in 0..n {
            let last_row = (k + BAND).min(n - 1);
            let last_col = (k + 2 * BAND).min(n - 1);

            let pivot_row = (k..=last_row)
                .max_by(|&x, &y| self.get(x, k).abs().total_cmp(&self.get(y, k).abs()))
                .unwrap_or(k);
            let pivot = self.get(pivot_row, k);
            if pivot == 0.0 || !pivot.is_finite() {
                return Err(FilterError::SingularSystem { index: k });
            }
            if pivot_row != k {
                for j in k..=last_col {
                    let (upper, lower) = (self.get(k, j), self.get(pivot_row, j));
                    self.set(k, j, lower);
                    self.set(pivot_row, j, upper);
                }
                self.rhs.swap(k, pivot_row);
            }

            for i in k + 1..=last_row {
                let factor = self.get(i, k) / pivot;
                if factor == 0.0 {
                    continue;
                }
                for j in k..=last_col {
                    let value = self.get(i, j) - factor * self.get(k, j);
                    self.set(i, j, value);
                }
                self.rhs[i] -= factor * self.rhs[k];
            }
        }

        let mut result = vec![0.0; n];
        for k in (0..n).rev() {
            let last_col = (k + 2 * BAND).min(n - 1);
            let tail: f64 = (k + 1..=last_col).map(|j| self.get(k, j) * result[j]).sum();
            result[k] = (self.rhs[k] - tail) / self.get(k, k);
        }
        Ok(result)
    }
}

/// Solve one implicit half-step along a lane.
///
/// # Arguments
///
/// * `data` - Current lane values `u[0..n)`
/// * `b_sum` - Right-hand sides `[s0, s1]` of the lower and upper boundary relations
/// * `coef_old` - Diffusion coefficients of the previous step (explicit part)
/// * `coef` - Diffusion coefficients of the current step (implicit part)
/// * `bc` - Robin coefficients closing both ends
///
/// # Returns
///
/// The updated lane, same length as `data`.
///
/// # Errors
///
/// - `GridTooSmall` if the lane is shorter than [`MIN_LANE_LEN`]
/// - `ShapeMismatch` if the coefficient lanes differ in length from `data`
/// - `SingularSystem` if the lane system itself is singular, with the column
///   whose pivot vanished
pub fn solve_lane(
    data: &[f64],
    b_sum: [f64; 2],
    coef_old: &[f64],
    coef: &[f64],
    bc: &BoundaryCoefficients,
) -> Result<Vec<f64>, FilterError> {
    let n = data.len();
    if n < MIN_LANE_LEN {
        return Err(FilterError::GridTooSmall {
            min: MIN_LANE_LEN,
            actual: n,
        });
    }
    for lane in [coef_old, coef] {
        if lane.len() != n {
            return Err(FilterError::ShapeMismatch {
                expected: (n, 1),
                actual: (lane.len(), 1),
            });
        }
    }

    if let Some(result) = thomas(data, b_sum, coef_old, coef, bc) {
        return Ok(result);
    }
    trace!("Thomas pivot rejected on lane of {n}, using pivoted elimination");
    BandedSystem::assemble(data, b_sum, coef_old, coef, bc).solve()
}
