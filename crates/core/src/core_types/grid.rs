//! Intensity grid used for pixel values and diffusion coefficients
//!
//! A grid is a dense `height × width` array of `f64` in row-major order.
//! Rows are the x-direction lanes of the ADI scheme, columns the y-direction
//! lanes.

use crate::error::FilterError;

/// Dense 2D grid of `f64` values.
///
/// Stores `height` rows of `width` values each, in row-major order
/// (`y * width + x`).
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    data: Vec<f64>,
    width: usize,
    height: usize,
}

/// Summary statistics of a grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridStats {
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
    /// Sum of all values
    pub sum: f64,
    /// Arithmetic mean
    pub mean: f64,
}

impl Grid {
    /// Create a new grid with given dimensions, initialized to zero
    ///
    /// # Arguments
    ///
    /// * `width` - Number of columns (xsize)
    /// * `height` - Number of rows (ysize)
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self::with_value(width, height, 0.0)
    }

    /// Create a new grid with given dimensions, every cell set to `value`
    #[must_use]
    pub fn with_value(width: usize, height: usize, value: f64) -> Self {
        Self {
            data: vec![value; width * height],
            width,
            height,
        }
    }

    /// Build a grid from row-major data
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if `data.len() != width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<f64>) -> Result<Self, FilterError> {
        if data.len() != width * height {
            return Err(FilterError::ShapeMismatch {
                expected: (width, height),
                actual: (data.len(), 1),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Build a grid from a list of rows
    ///
    /// # Errors
    ///
    /// Returns `RaggedRows` when the rows differ in length.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self, FilterError> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(width * height);
        for (row, values) in rows.iter().enumerate() {
            let values = values.as_ref();
            if values.len() != width {
                return Err(FilterError::RaggedRows {
                    row,
                    expected: width,
                    actual: values.len(),
                });
            }
            data.extend_from_slice(values);
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Assemble a grid from equally long column lanes (`columns[x][y]`).
    pub(crate) fn from_columns(columns: &[Vec<f64>], height: usize) -> Self {
        let width = columns.len();
        let mut data = vec![0.0; width * height];
        for (x, column) in columns.iter().enumerate() {
            for (y, &value) in column.iter().enumerate().take(height) {
                data[y * width + x] = value;
            }
        }
        Self {
            data,
            width,
            height,
        }
    }

    /// Number of columns (xsize)
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows (ysize)
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)`
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Get reference to grid data in row-major order
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Get mutable reference to grid data
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Borrow row `y`
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`
    #[must_use]
    pub fn row(&self, y: usize) -> &[f64] {
        assert!(y < self.height, "Row out of bounds");
        &self.data[y * self.width..(y + 1) * self.width]
    }

    /// Copy column `x` out into a new lane
    ///
    /// # Panics
    ///
    /// Panics if `x >= width`
    #[must_use]
    pub fn column(&self, x: usize) -> Vec<f64> {
        assert!(x < self.width, "Column out of bounds");
        self.data.iter().skip(x).step_by(self.width).copied().collect()
    }

    /// Get value at grid position
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f64 {
        assert!(
            x < self.width && y < self.height,
            "Coordinates out of bounds"
        );
        self.data[y * self.width + x]
    }

    /// Set value at grid position
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds
    pub fn set(&mut self, x: usize, y: usize, value: f64) {
        assert!(
            x < self.width && y < self.height,
            "Coordinates out of bounds"
        );
        self.data[y * self.width + x] = value;
    }

    /// Fail with `ShapeMismatch` unless `other` has the same shape
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` carrying both shapes.
    pub fn ensure_same_shape(&self, other: &Grid) -> Result<(), FilterError> {
        if self.shape() == other.shape() {
            Ok(())
        } else {
            Err(FilterError::ShapeMismatch {
                expected: self.shape(),
                actual: other.shape(),
            })
        }
    }

    /// Min, max, sum and mean of all cells. An empty grid reports zeros.
    #[must_use]
    pub fn stats(&self) -> GridStats {
        if self.data.is_empty() {
            return GridStats {
                min: 0.0,
                max: 0.0,
                sum: 0.0,
                mean: 0.0,
            };
        }
        let (min, max, sum) = self.data.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), &v| (min.min(v), max.max(v), sum + v),
        );
        GridStats {
            min,
            max,
            sum,
            mean: sum / self.data.len() as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_creation() {
        let grid = Grid::new(10, 20);
        assert_eq!(grid.width(), 10);
        assert_eq!(grid.height(), 20);
        assert_eq!(grid.as_slice().len(), 200);
        assert!(grid.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_grid_get_set_row_major() {
        let mut grid = Grid::new(10, 10);
        grid.set(3, 4, 123.45);
        assert_eq!(grid.get(3, 4), 123.45);
        assert_eq!(grid.as_slice()[4 * 10 + 3], 123.45);
        assert_eq!(grid.row(4)[3], 123.45);
        assert_eq!(grid.column(3)[4], 123.45);
    }

    #[test]
    fn test_from_rows_and_columns_agree() {
        let grid = Grid::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(grid.shape(), (3, 2));

        let columns: Vec<Vec<f64>> = (0..3).map(|x| grid.column(x)).collect();
        assert_eq!(columns[1], vec![2.0, 5.0]);
        assert_eq!(Grid::from_columns(&columns, 2), grid);
    }

    #[test]
    fn test_from_rows_rejects_ragged_input() {
        let err = Grid::from_rows(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert_eq!(
            err,
            FilterError::RaggedRows {
                row: 1,
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_from_vec_checks_length() {
        assert!(Grid::from_vec(2, 2, vec![0.0; 4]).is_ok());
        assert!(Grid::from_vec(2, 2, vec![0.0; 5]).is_err());
    }

    #[test]
    fn test_shape_check() {
        let a = Grid::new(4, 5);
        assert!(a.ensure_same_shape(&Grid::new(4, 5)).is_ok());
        assert_eq!(
            a.ensure_same_shape(&Grid::new(5, 4)),
            Err(FilterError::ShapeMismatch {
                expected: (4, 5),
                actual: (5, 4)
            })
        );
    }

    #[test]
    fn test_stats() {
        let grid = Grid::from_rows(&[[1.0, -2.0], [3.0, 6.0]]).unwrap();
        let stats = grid.stats();
        assert_eq!(stats.min, -2.0);
        assert_eq!(stats.max, 6.0);
        assert_eq!(stats.sum, 8.0);
        assert_eq!(stats.mean, 2.0);
    }

    #[test]
    #[should_panic(expected = "Coordinates out of bounds")]
    fn test_grid_bounds_check() {
        let grid = Grid::new(10, 10);
        let _ = grid.get(10, 5);
    }
}
