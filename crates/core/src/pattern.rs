//! Synthetic test image
//!
//! A bright square centred on a dark background with additive uniform
//! noise. The default levels correspond to a 16-bit image: noise amplitude
//! `2^14`, signal `2^15`.

use crate::core_types::Grid;
use crate::error::FilterError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Parameters of the noisy-square test image
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestPattern {
    /// Image width (xsize)
    pub width: usize,
    /// Image height (ysize)
    pub height: usize,
    /// Upper bound of the uniform noise added to every pixel
    pub noise: f64,
    /// Intensity of the square
    pub signal: f64,
    /// Side of the square relative to the shorter image side, in `[0.1, 1]`
    pub scale: f64,
    /// RNG seed
    pub seed: u64,
}

impl Default for TestPattern {
    fn default() -> Self {
        Self {
            width: 300,
            height: 200,
            noise: 16384.0,
            signal: 32768.0,
            scale: 0.5,
            seed: 0,
        }
    }
}

impl TestPattern {
    /// Check the parameters
    ///
    /// # Errors
    ///
    /// `InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.width == 0 || self.height == 0 {
            return Err(FilterError::invalid_config(
                "width",
                format!("image must be non-empty, got {}x{}", self.width, self.height),
            ));
        }
        if !(self.noise.is_finite() && self.noise >= 0.0) {
            return Err(FilterError::invalid_config("noise", "must be finite and >= 0"));
        }
        if !self.signal.is_finite() {
            return Err(FilterError::invalid_config("signal", "must be finite"));
        }
        if !(0.1..=1.0).contains(&self.scale) {
            return Err(FilterError::invalid_config(
                "scale",
                format!("must be in [0.1, 1], got {}", self.scale),
            ));
        }
        Ok(())
    }

    /// Pixel bounds `(x0, y0, side)` of the square
    fn square(&self) -> (usize, usize, usize) {
        let shorter = self.width.min(self.height);
        let side = ((shorter as f64 * self.scale).round() as usize).clamp(1, shorter);
        ((self.width - side) / 2, (self.height - side) / 2, side)
    }

    /// Render the image. The same parameters always give the same grid.
    ///
    /// # Errors
    ///
    /// See [`validate`](Self::validate).
    pub fn generate(&self) -> Result<Grid, FilterError> {
        self.validate()?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let (x0, y0, side) = self.square();
        let mut grid = Grid::new(self.width, self.height);

        for y in 0..self.height {
            for x in 0..self.width {
                let inside = (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y);
                let base = if inside { self.signal } else { 0.0 };
                let noise = if self.noise > 0.0 {
                    rng.random_range(0.0..self.noise)
                } else {
                    0.0
                };
                grid.set(x, y, base + noise);
            }
        }
        Ok(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_without_noise() {
        let pattern = TestPattern {
            width: 10,
            height: 8,
            noise: 0.0,
            signal: 5.0,
            scale: 0.5,
            seed: 1,
        };
        let grid = pattern.generate().unwrap();
        // side 4, starting at (3, 2)
        for y in 0..8 {
            for x in 0..10 {
                let inside = (3..7).contains(&x) && (2..6).contains(&y);
                assert_eq!(grid.get(x, y), if inside { 5.0 } else { 0.0 }, "({x}, {y})");
            }
        }
    }

    #[test]
    fn test_noise_is_bounded_and_seeded() {
        let pattern = TestPattern {
            width: 40,
            height: 30,
            noise: 10.0,
            signal: 100.0,
            ..TestPattern::default()
        };
        let a = pattern.generate().unwrap();
        let b = pattern.generate().unwrap();
        assert_eq!(a, b);

        let stats = a.stats();
        assert!(stats.min >= 0.0);
        assert!(stats.max < 110.0);

        let other = TestPattern { seed: 7, ..pattern }.generate().unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn test_default_dimensions() {
        let grid = TestPattern::default().generate().unwrap();
        assert_eq!(grid.shape(), (300, 200));
    }

    #[test]
    fn test_invalid_parameters() {
        let bad_scale = TestPattern {
            scale: 1.5,
            ..TestPattern::default()
        };
        assert!(matches!(
            bad_scale.generate(),
            Err(FilterError::InvalidConfig { param: "scale", .. })
        ));
        let empty = TestPattern {
            width: 0,
            ..TestPattern::default()
        };
        assert!(empty.validate().is_err());
        let negative = TestPattern {
            noise: -1.0,
            ..TestPattern::default()
        };
        assert!(matches!(
            negative.validate(),
            Err(FilterError::InvalidConfig { param: "noise", .. })
        ));
    }
}
