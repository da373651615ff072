//! Boundary conditions for the lane solves
//!
//! Every row and column solve is closed at both ends by a three-point Robin
//! relation. At the lower end of a lane of length `n`:
//!
//! ```text
//! c0·u[0] + c1·u[1] + c2·u[2] = s0
//! ```
//!
//! and mirrored at the upper end:
//!
//! ```text
//! c0·u[n-3] + c1·u[n-2] + c2·u[n-1] = s1
//! ```
//!
//! The coefficients are fixed for a filter instance; the right-hand sides
//! `s0`/`s1` come from [`BoundarySums`], one value per lane.

use serde::{Deserialize, Serialize};

/// Three-coefficient Robin relation `{c0, c1, c2}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryCoefficients(pub [f64; 3]);

impl BoundaryCoefficients {
    /// Zero-derivative relation `u[2] - u[0] = s`.
    pub const REFLECTIVE: Self = Self([-1.0, 0.0, 1.0]);

    /// Create coefficients from the three weights
    #[must_use]
    pub fn new(c0: f64, c1: f64, c2: f64) -> Self {
        Self([c0, c1, c2])
    }

    /// Weight of the outermost point
    #[inline]
    #[must_use]
    pub fn c0(&self) -> f64 {
        self.0[0]
    }

    /// Weight of the middle point
    #[inline]
    #[must_use]
    pub fn c1(&self) -> f64 {
        self.0[1]
    }

    /// Weight of the innermost point
    #[inline]
    #[must_use]
    pub fn c2(&self) -> f64 {
        self.0[2]
    }

    /// Whether all three weights are finite
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|c| c.is_finite())
    }
}

impl Default for BoundaryCoefficients {
    fn default() -> Self {
        Self::REFLECTIVE
    }
}

/// Right-hand sides of the boundary relations, one array per edge.
///
/// Edges 0 and 2 close the row lanes (one value per row), edges 1 and 3
/// close the column lanes (one value per column).
#[derive(Debug, Clone, PartialEq)]
pub struct BoundarySums {
    /// Edge 0: lower end of each row (length = height)
    pub left: Vec<f64>,
    /// Edge 1: lower end of each column (length = width)
    pub top: Vec<f64>,
    /// Edge 2: upper end of each row (length = height)
    pub right: Vec<f64>,
    /// Edge 3: upper end of each column (length = width)
    pub bottom: Vec<f64>,
}

impl BoundarySums {
    /// All-zero sums for a `width × height` grid
    #[must_use]
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            left: vec![0.0; height],
            top: vec![0.0; width],
            right: vec![0.0; height],
            bottom: vec![0.0; width],
        }
    }

    /// `(width, height)` the sums were sized for
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.top.len(), self.left.len())
    }

    /// Whether opposing edges agree in length
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.left.len() == self.right.len() && self.top.len() == self.bottom.len()
    }

    /// Sums closing row `y`
    #[inline]
    #[must_use]
    pub fn row_pair(&self, y: usize) -> [f64; 2] {
        [self.left[y], self.right[y]]
    }

    /// Sums closing column `x`
    #[inline]
    #[must_use]
    pub fn column_pair(&self, x: usize) -> [f64; 2] {
        [self.top[x], self.bottom[x]]
    }
}
