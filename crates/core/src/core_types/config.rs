//! Filter configuration
//!
//! All scalar settings recognised at filter construction. The defaults are
//! the values the desktop front end pre-fills in its form: reflective
//! boundaries, `D0 = 0.3`, tolerance `1e-6`, acceleration `0.3`, a
//! nonlinearity scale sized for 16-bit intensities and the rational
//! edge-stopping function. The form overwrites the front end's internal field
//! initialisers (`D0 = 0.01`, tolerance `1e-10`, acceleration `0.5`) before
//! any filter runs, so those are never used.

use super::boundary::BoundaryCoefficients;
use crate::error::FilterError;
use serde::{Deserialize, Serialize};

/// Monotonically decreasing edge-stopping function applied to the scaled
/// squared gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeStopping {
    /// `1 / (1 + x)`
    #[default]
    Rational,
    /// `exp(-x)`
    Exponential,
}

impl EdgeStopping {
    /// Evaluate the function at `x`
    #[inline]
    #[must_use]
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Self::Rational => 1.0 / (1.0 + x),
            Self::Exponential => (-x).exp(),
        }
    }
}

/// Configuration for an [`AnisotropicFilter`](crate::solver::AnisotropicFilter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Robin coefficients closing every lane
    pub boundary: BoundaryCoefficients,

    /// Base diffusion coefficient `D0` (finite, ≥ 0).
    ///
    /// Used directly by the linear filter and as the prefactor of the
    /// edge-stopping function in the nonlinear one.
    pub base_diffusion: f64,

    /// Gradient scale; squared gradients are divided by its square.
    ///
    /// Typical values follow the intensity range:
    /// - 30: 8-bit images
    /// - 1e4: 16-bit images
    /// - 1e8: 32-bit images
    pub nonlinearity_scale: f64,

    /// Convergence threshold on the normalised residual (> 0).
    pub tolerance: f64,

    /// Weighting of x- against y-gradients, in `[0, 1)`.
    pub anisotropy: f64,

    /// Number of worker threads (≥ 1).
    pub worker_count: usize,

    /// Extrapolation coefficient of the diffusivity seed, in `[0, 1]`.
    pub acceleration: f64,

    /// Edge-stopping function variant.
    pub edge_stopping: EdgeStopping,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            boundary: BoundaryCoefficients::REFLECTIVE,
            base_diffusion: 0.3,
            nonlinearity_scale: 1e4,
            tolerance: 1e-6,
            anisotropy: 0.0,
            worker_count: default_worker_count(),
            acceleration: 0.3,
            edge_stopping: EdgeStopping::Rational,
        }
    }
}

impl FilterConfig {
    /// Squared-gradient multiplier `1 / scale²`
    #[must_use]
    pub fn nonlinear_factor(&self) -> f64 {
        1.0 / (self.nonlinearity_scale * self.nonlinearity_scale)
    }

    /// Check every field against its accepted range
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<(), FilterError> {
        if !self.boundary.is_finite() {
            return Err(FilterError::invalid_config(
                "boundary",
                format!("coefficients must be finite, got {:?}", self.boundary.0),
            ));
        }
        if !self.base_diffusion.is_finite() || self.base_diffusion < 0.0 {
            return Err(FilterError::invalid_config(
                "base_diffusion",
                format!("must be finite and non-negative, got {}", self.base_diffusion),
            ));
        }
        if !self.nonlinearity_scale.is_finite() || self.nonlinearity_scale <= 0.0 {
            return Err(FilterError::invalid_config(
                "nonlinearity_scale",
                format!(
                    "must be finite and positive, got {}",
                    self.nonlinearity_scale
                ),
            ));
        }
        if !self.nonlinear_factor().is_finite() {
            return Err(FilterError::invalid_config(
                "nonlinearity_scale",
                format!(
                    "too small, 1/scale² overflows for {}",
                    self.nonlinearity_scale
                ),
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(FilterError::invalid_config(
                "tolerance",
                format!("must be finite and positive, got {}", self.tolerance),
            ));
        }
        if !(0.0..1.0).contains(&self.anisotropy) {
            return Err(FilterError::invalid_config(
                "anisotropy",
                format!("must be in [0, 1), got {}", self.anisotropy),
            ));
        }
        if self.worker_count == 0 {
            return Err(FilterError::invalid_config(
                "worker_count",
                "must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.acceleration) {
            return Err(FilterError::invalid_config(
                "acceleration",
                format!("must be in [0, 1], got {}", self.acceleration),
            ));
        }
        Ok(())
    }
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}
