//! Nonlinear filter behaviour: termination, edge preservation, residuals,
//! cancellation and pool lifecycle

mod common;

use adi_filter_core::solver::MAX_ITERATIONS;
use adi_filter_core::{
    run_sequence, EdgeStopping, FilterConfig, FilterError, FilterMode, Grid, TestPattern,
};
use approx::assert_relative_eq;

/// Left half 0, right half 100; the edge runs between columns 9 and 10
fn step_edge() -> Grid {
    let mut grid = Grid::new(20, 12);
    for y in 0..12 {
        for x in 10..20 {
            grid.set(x, y, 100.0);
        }
    }
    grid
}

fn edge_config(edge_stopping: EdgeStopping) -> FilterConfig {
    FilterConfig {
        nonlinearity_scale: 30.0,
        edge_stopping,
        ..FilterConfig::default()
    }
}

#[test]
fn test_nonlinear_preserves_edges_better_than_linear() {
    let mut f = common::filter(edge_config(EdgeStopping::Exponential));
    let grid = step_edge();
    let nonlinear = f.solve_non_linear(&grid).unwrap();
    let linear = f.solve_linear(&grid).unwrap();

    for y in [2, 6, 9] {
        let kept = nonlinear.get(10, y) - nonlinear.get(9, y);
        let blurred = linear.get(10, y) - linear.get(9, y);
        assert!(kept > 90.0, "row {y}: nonlinear jump {kept}");
        assert!(blurred < 50.0, "row {y}: linear jump {blurred}");
    }
    f.shutdown();
}

#[test]
fn test_exponential_keeps_high_contrast_horizontal_edge() {
    // exp(-1111) underflows, so the rows next to the edge get zero diffusivity
    let mut grid = Grid::new(20, 12);
    for y in 6..12 {
        for x in 0..20 {
            grid.set(x, y, 1000.0);
        }
    }
    let mut f = common::filter(edge_config(EdgeStopping::Exponential));
    let field = f.diffusivity(&grid).unwrap();
    assert!(field.row(5).iter().all(|&d| d == 0.0));

    let outcome = f.solve_non_linear_report(&grid).unwrap();
    assert!(outcome.converged);
    assert!(outcome.grid.as_slice().iter().all(|v| v.is_finite()));
    let linear = f.solve_linear(&grid).unwrap();
    for x in 2..18 {
        let kept = outcome.grid.get(x, 6) - outcome.grid.get(x, 5);
        let blurred = linear.get(x, 6) - linear.get(x, 5);
        assert!(kept > 900.0, "column {x}: nonlinear jump {kept}");
        assert!(blurred < 500.0, "column {x}: linear jump {blurred}");
    }
    f.shutdown();
}

#[test]
fn test_nonlinear_terminates_on_noisy_input() {
    let image = TestPattern {
        width: 40,
        height: 30,
        noise: 20.0,
        signal: 100.0,
        seed: 11,
        ..TestPattern::default()
    }
    .generate()
    .unwrap();

    for edge_stopping in [EdgeStopping::Rational, EdgeStopping::Exponential] {
        for anisotropy in [0.0, 0.5] {
            let mut f = common::filter(FilterConfig {
                anisotropy,
                ..edge_config(edge_stopping)
            });
            let outcome = f.solve_non_linear_report(&image).unwrap();
            assert!(outcome.iterations >= 1 && outcome.iterations <= MAX_ITERATIONS);
            assert_eq!(outcome.converged, outcome.residual <= 1e-6);
            assert!(outcome.grid.as_slice().iter().all(|v| v.is_finite()));
            f.shutdown();
        }
    }
}

#[test]
fn test_tiny_tolerance_still_terminates() {
    let mut f = common::filter(FilterConfig {
        tolerance: f64::MIN_POSITIVE,
        ..edge_config(EdgeStopping::Rational)
    });
    let image = TestPattern {
        width: 16,
        height: 16,
        noise: 50.0,
        signal: 100.0,
        seed: 3,
        ..TestPattern::default()
    }
    .generate()
    .unwrap();
    let outcome = f.solve_non_linear_report(&image).unwrap();
    assert!(outcome.iterations <= MAX_ITERATIONS);
    assert_eq!(outcome.converged, outcome.residual <= f64::MIN_POSITIVE);
    f.shutdown();
}

#[test]
fn test_diffusivity_is_finite_and_non_negative() {
    let mut f = common::filter(FilterConfig {
        anisotropy: 0.3,
        ..edge_config(EdgeStopping::Rational)
    });
    let mut grid = TestPattern {
        width: 24,
        height: 18,
        ..TestPattern::default()
    }
    .generate()
    .unwrap();
    grid.set(5, 5, f64::INFINITY);
    grid.set(7, 5, f64::INFINITY);

    let field = f.diffusivity(&grid).unwrap();
    assert_eq!(field.shape(), grid.shape());
    assert!(field.as_slice().iter().all(|d| d.is_finite() && *d >= 0.0));
    assert!(field.stats().max <= 0.3);
    f.shutdown();
}

#[test]
fn test_calc_difference_properties() {
    let mut f = common::filter(FilterConfig::default());
    let pattern = TestPattern {
        width: 15,
        height: 10,
        seed: 1,
        ..TestPattern::default()
    };
    let a = pattern.generate().unwrap();
    let b = TestPattern { seed: 2, ..pattern }.generate().unwrap();

    assert_eq!(f.calc_difference(&a, &a).unwrap(), 0.0);
    assert_eq!(f.calc_difference(&Grid::new(5, 5), &Grid::new(5, 5)).unwrap(), 0.0);
    assert_relative_eq!(
        f.calc_difference(&a, &b).unwrap(),
        f.calc_difference(&b, &a).unwrap(),
        max_relative = 1e-12
    );
    // Opposite grids are maximally different
    let mut negated = a.clone();
    negated.as_mut_slice().iter_mut().for_each(|v| *v = -*v);
    assert_relative_eq!(f.calc_difference(&a, &negated).unwrap(), 4.0, max_relative = 1e-12);

    assert!(matches!(
        f.calc_difference(&a, &Grid::new(10, 15)),
        Err(FilterError::ShapeMismatch { .. })
    ));
    f.shutdown();
}

#[test]
fn test_cancellation_then_recovery() {
    let mut f = common::filter(FilterConfig::default());
    let grid = step_edge();
    let token = f.cancellation_token();

    token.cancel();
    assert_eq!(f.solve_non_linear(&grid), Err(FilterError::Cancelled));
    assert_eq!(f.solve_linear(&grid), Err(FilterError::Cancelled));

    let report = run_sequence(&f, &grid, 4, FilterMode::Linear, |_, _| {}).unwrap();
    assert!(report.cancelled);
    assert!(report.frames.is_empty());

    token.reset();
    assert!(f.solve_non_linear(&grid).is_ok());
    f.shutdown();
}

#[test]
fn test_solve_after_shutdown_fails() {
    let mut f = common::filter(FilterConfig::default());
    assert!(f.is_running());
    f.shutdown();
    assert!(!f.is_running());
    assert_eq!(f.solve_linear(&step_edge()), Err(FilterError::PoolShutDown));
    assert_eq!(f.solve_non_linear(&step_edge()), Err(FilterError::PoolShutDown));
}

#[test]
fn test_nonlinear_sequence_smooths_noise_keeps_square() {
    let pattern = TestPattern {
        width: 32,
        height: 24,
        noise: 10.0,
        signal: 100.0,
        seed: 5,
        ..TestPattern::default()
    };
    let image = pattern.generate().unwrap();
    let mut f = common::filter(edge_config(EdgeStopping::Exponential));
    let report = run_sequence(&f, &image, 3, FilterMode::NonLinear, |_, _| {}).unwrap();

    assert_eq!(report.frames.len(), 3);
    let last = report.last_frame().unwrap();
    // Centre of the square stays bright, far corner stays dark
    assert!(last.get(16, 12) > 90.0);
    assert!(last.get(1, 1) < 15.0);
    f.shutdown();
}
