//! Repeated filtering of an image
//!
//! Applies the filter a fixed number of times, feeding each result into the
//! next step, and keeps every intermediate frame.

use crate::core_types::Grid;
use crate::error::FilterError;
use crate::solver::{AnisotropicFilter, ProfilerScope};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Default number of filter steps in a sequence
pub const DEFAULT_STEPS: usize = 10;

/// Largest accepted number of filter steps
pub const MAX_STEPS: usize = 1000;

/// Which filter is applied at every step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Constant coefficient, one ADI step
    Linear,
    /// Gradient-dependent coefficient, fixed-point iteration
    #[default]
    NonLinear,
}

/// Frames and timing of a filter sequence
#[derive(Debug, Clone)]
pub struct SequenceReport {
    /// Result of every completed step, in order (the input is not included)
    pub frames: Vec<Grid>,
    /// Wall time spent in the filter steps
    pub elapsed: Duration,
    /// Whether the run was stopped by a cancellation request
    pub cancelled: bool,
}

impl SequenceReport {
    /// Last produced frame, if any step completed
    #[must_use]
    pub fn last_frame(&self) -> Option<&Grid> {
        self.frames.last()
    }
}

/// Apply `filter` `steps` times starting from `initial`.
///
/// `on_frame(step, frame)` is called after each completed step (`step`
/// counts from 1). A cancellation request seen between or during steps ends
/// the run early; the frames completed so far are kept and the report is
/// marked as cancelled.
///
/// # Errors
///
/// `InvalidConfig` if `steps` is outside `1..=MAX_STEPS`, otherwise any
/// non-cancellation error raised by a filter step.
pub fn run_sequence<F>(
    filter: &AnisotropicFilter,
    initial: &Grid,
    steps: usize,
    mode: FilterMode,
    mut on_frame: F,
) -> Result<SequenceReport, FilterError>
where
    F: FnMut(usize, &Grid),
{
    if !(1..=MAX_STEPS).contains(&steps) {
        return Err(FilterError::invalid_config(
            "steps",
            format!("must be in 1..={MAX_STEPS}, got {steps}"),
        ));
    }

    info!("Running {} {:?} filter steps on {:?} grid", steps, mode, initial.shape());
    let token = filter.cancellation_token();
    let scope = ProfilerScope::new("run_sequence");
    let mut frames: Vec<Grid> = Vec::with_capacity(steps);
    let mut cancelled = false;

    for step in 1..=steps {
        if token.is_cancelled() {
            cancelled = true;
            break;
        }
        let input = frames.last().unwrap_or(initial);
        let result = match mode {
            FilterMode::Linear => filter.solve_linear(input),
            FilterMode::NonLinear => filter.solve_non_linear(input),
        };
        match result {
            Ok(frame) => {
                debug!("Step {}/{} done", step, steps);
                on_frame(step, &frame);
                frames.push(frame);
            }
            Err(FilterError::Cancelled) => {
                cancelled = true;
                break;
            }
            Err(e) => return Err(e),
        }
    }

    let elapsed = scope.elapsed();
    if cancelled {
        info!("Sequence cancelled after {} of {} steps", frames.len(), steps);
    } else {
        info!("Sequence finished in {:.3} ms", elapsed.as_secs_f64() * 1000.0);
    }
    Ok(SequenceReport {
        frames,
        elapsed,
        cancelled,
    })
}
