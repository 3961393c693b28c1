use std::{cell::Cell, convert::Infallible};

use approx::assert_relative_eq;
use thiserror::Error;

use dfo_core::{Model, OptimizationProblem};

use super::{
    Action, Bounds, Config, ConfigError, Error, Event, Status, Step, maximize_unobserved,
    minimize, minimize_unobserved,
};

/// Wraps a plain function of `x` as a model and counts its calls.
struct Function<const N: usize> {
    f: fn(&[f64; N]) -> f64,
    calls: Cell<usize>,
}

impl<const N: usize> Function<N> {
    fn new(f: fn(&[f64; N]) -> f64) -> Self {
        Self {
            f,
            calls: Cell::new(0),
        }
    }
}

impl<const N: usize> Model for Function<N> {
    type Input = [f64; N];
    type Output = f64;
    type Error = Infallible;

    fn call(&self, x: &[f64; N]) -> Result<f64, Self::Error> {
        self.calls.set(self.calls.get() + 1);
        Ok((self.f)(x))
    }
}

/// Objective: use the model output directly.
struct ObjectiveOutput;

impl<const N: usize> OptimizationProblem<N> for ObjectiveOutput {
    type Input = [f64; N];
    type Output = f64;
    type Error = Infallible;

    fn input(&self, x: &[f64; N]) -> Result<Self::Input, Self::Error> {
        Ok(*x)
    }

    fn objective(&self, _input: &[f64; N], output: &f64) -> Result<f64, Self::Error> {
        Ok(*output)
    }
}

fn shifted_bowl(x: &[f64; 2]) -> f64 {
    (x[0] - 1.0).powi(2) + (x[1] - 2.0).powi(2)
}

fn rosenbrock(x: &[f64; 2]) -> f64 {
    100.0 * (x[1] - x[0] * x[0]).powi(2) + (1.0 - x[0]).powi(2)
}

#[test]
fn minimizes_shifted_bowl() {
    let model = Function::new(shifted_bowl);
    let bounds = Bounds::new([-10.0; 2], [10.0; 2]).unwrap();
    let config = Config::new(1.0, 1e-6, 1000)
        .unwrap()
        .with_interpolation_points(5);

    let solution = minimize_unobserved(&model, &ObjectiveOutput, [0.0, 0.0], &bounds, &config)
        .expect("should converge");

    assert_eq!(solution.status, Status::Converged);
    assert_relative_eq!(solution.x[0], 1.0, epsilon = 1e-4);
    assert_relative_eq!(solution.x[1], 2.0, epsilon = 1e-4);
    assert!(solution.objective < 1e-8);
    assert_eq!(solution.evals, model.calls.get());
    assert_eq!(solution.snapshot.input, solution.x);
    assert_relative_eq!(solution.rho, 1e-6);
}

#[test]
fn minimizes_rosenbrock() {
    let model = Function::new(rosenbrock);
    let bounds = Bounds::new([-5.0; 2], [5.0; 2]).unwrap();
    let config = Config::new(1.0, 1e-8, 2000)
        .unwrap()
        .with_interpolation_points(6);

    let solution = minimize_unobserved(&model, &ObjectiveOutput, [-1.2, 1.0], &bounds, &config)
        .expect("should converge");

    assert_eq!(solution.status, Status::Converged);
    assert!(solution.objective < 1e-8);
    assert_relative_eq!(solution.x[0], 1.0, epsilon = 1e-3);
    assert_relative_eq!(solution.x[1], 1.0, epsilon = 1e-3);
    assert!(solution.evals < 2000);
}

#[test]
fn stops_exactly_on_active_bound() {
    // The unconstrained minimum x = 0 lies below the lower bound x >= 1.
    let model = Function::new(|x: &[f64; 2]| x[0] * x[0] + (x[1] - 3.0).powi(2));
    let bounds = Bounds::new([1.0, -10.0], [10.0, 10.0]).unwrap();

    let solution = minimize_unobserved(
        &model,
        &ObjectiveOutput,
        [5.0, 0.0],
        &bounds,
        &Config::default(),
    )
    .expect("should converge");

    assert_eq!(solution.status, Status::Converged);
    assert_eq!(solution.x[0], 1.0);
    assert_relative_eq!(solution.x[1], 3.0, epsilon = 1e-4);
}

#[test]
fn too_few_interpolation_points_fail_before_evaluating() {
    let model = Function::new(shifted_bowl);
    let config = Config::default().with_interpolation_points(3);

    let result = minimize_unobserved(
        &model,
        &ObjectiveOutput,
        [0.0, 0.0],
        &Bounds::unbounded(),
        &config,
    );

    assert!(matches!(
        result,
        Err(Error::InvalidConfig(ConfigError::InterpolationPoints {
            npt: 3,
            min: 4,
            max: 6
        }))
    ));
    assert_eq!(model.calls.get(), 0);
}

#[test]
fn budget_smaller_than_initial_set_is_exhausted() {
    let model = Function::new(shifted_bowl);
    let config = Config::new(1.0, 1e-6, 3).unwrap();

    let result = minimize_unobserved(
        &model,
        &ObjectiveOutput,
        [0.0, 0.0],
        &Bounds::unbounded(),
        &config,
    );

    assert!(matches!(result, Err(Error::BudgetExceeded { max_evals: 3 })));
    assert_eq!(model.calls.get(), 3);
}

#[test]
fn budget_exhaustion_after_initialization_is_an_error() {
    let model = Function::new(rosenbrock);
    let config = Config::new(1.0, 1e-8, 20).unwrap();

    let result = minimize_unobserved(
        &model,
        &ObjectiveOutput,
        [-1.2, 1.0],
        &Bounds::unbounded(),
        &config,
    );

    assert!(matches!(result, Err(Error::BudgetExceeded { max_evals: 20 })));
    assert_eq!(model.calls.get(), 20);
}

#[test]
fn maximizes_with_caller_sign() {
    let model = Function::new(|x: &[f64; 2]| 5.0 - (x[0] - 1.0).powi(2) - (x[1] + 1.0).powi(2));

    let solution = maximize_unobserved(
        &model,
        &ObjectiveOutput,
        [0.0, 0.0],
        &Bounds::unbounded(),
        &Config::default(),
    )
    .expect("should converge");

    assert_eq!(solution.status, Status::Converged);
    assert_relative_eq!(solution.x[0], 1.0, epsilon = 1e-4);
    assert_relative_eq!(solution.x[1], -1.0, epsilon = 1e-4);
    assert_relative_eq!(solution.objective, 5.0, epsilon = 1e-8);
}

#[test]
fn three_variables_with_mixed_bounds() {
    let model = Function::new(|x: &[f64; 3]| {
        (x[0] - 0.5).powi(2) + 2.0 * (x[1] + 3.0).powi(2) + (x[2] - x[0]).powi(2) + x[1]
    });
    // x[1] is pushed against its lower bound.
    let bounds = Bounds::new([-1.0, -2.0, f64::NEG_INFINITY], [1.0, 2.0, f64::INFINITY]).unwrap();
    let config = Config::new(0.5, 1e-7, 2000).unwrap();

    let solution = minimize_unobserved(&model, &ObjectiveOutput, [0.0, 0.0, 0.0], &bounds, &config)
        .expect("should converge");

    assert_eq!(solution.status, Status::Converged);
    assert_relative_eq!(solution.x[0], 0.5, epsilon = 1e-4);
    assert_eq!(solution.x[1], -2.0);
    assert_relative_eq!(solution.x[2], 0.5, epsilon = 1e-4);
}

#[test]
fn every_evaluation_is_feasible_and_best_is_monotone() {
    let model = Function::new(rosenbrock);
    // The unconstrained minimum (1, 1) is outside; the start point is too.
    let bounds = Bounds::new([-2.0, -1.0], [0.5, 2.0]).unwrap();

    let mut xs = Vec::new();
    let mut bests = Vec::new();
    let observer = |event: &Event<'_, _, _, 2>| {
        xs.push(event.x());
        if let Some(best) = event.best() {
            bests.push(best.objective);
        }
        None
    };

    let solution = minimize(
        &model,
        &ObjectiveOutput,
        [3.0, 0.0],
        &bounds,
        &Config::new(0.5, 1e-6, 3000).unwrap(),
        observer,
    )
    .expect("should converge");

    assert_eq!(xs.len(), solution.evals);
    for x in &xs {
        for i in 0..2 {
            assert!(x[i] >= bounds.lower()[i] && x[i] <= bounds.upper()[i]);
        }
    }
    assert!(bests.windows(2).all(|pair| pair[1] <= pair[0]));
    assert_eq!(*bests.last().unwrap(), solution.objective);
    assert_eq!(solution.x[0], 0.5);
}

#[test]
fn runs_are_bit_identical() {
    let run = || {
        let model = Function::new(rosenbrock);
        let mut trace = Vec::new();
        let observer = |event: &Event<'_, _, _, 2>| {
            trace.push(event.x().map(f64::to_bits));
            None
        };
        let solution = minimize(
            &model,
            &ObjectiveOutput,
            [-1.2, 1.0],
            &Bounds::new([-5.0; 2], [5.0; 2]).unwrap(),
            &Config::new(1.0, 1e-6, 2000).unwrap(),
            observer,
        )
        .expect("should converge");
        (trace, solution.x.map(f64::to_bits))
    };

    assert_eq!(run(), run());
}

#[test]
fn events_report_steps_in_order() {
    let model = Function::new(shifted_bowl);
    let mut steps = Vec::new();
    let observer = |event: &Event<'_, _, _, 2>| {
        steps.push(event.step());
        None
    };

    minimize(
        &model,
        &ObjectiveOutput,
        [0.0, 0.0],
        &Bounds::unbounded(),
        &Config::default(),
        observer,
    )
    .expect("should converge");

    assert!(steps[..5].iter().all(|&step| step == Step::Initial));
    assert!(steps[5..].iter().all(|&step| step != Step::Initial));
    assert!(steps.contains(&Step::TrustRegion));

    // Only the closing evaluation of a short step is reported as final.
    let last = steps.len() - 1;
    assert!(steps[..last].iter().all(|&step| step != Step::Final));
}

#[test]
fn observer_can_stop_early() {
    let model = Function::new(rosenbrock);
    let mut count = 0;
    let observer = |_event: &Event<'_, _, _, 2>| {
        count += 1;
        (count == 12).then_some(Action::StopEarly)
    };

    let solution = minimize(
        &model,
        &ObjectiveOutput,
        [-1.2, 1.0],
        &Bounds::unbounded(),
        &Config::default(),
        observer,
    )
    .expect("should stop cleanly");

    assert_eq!(solution.status, Status::StoppedByObserver);
    assert_eq!(solution.evals, 12);
    assert_eq!(model.calls.get(), 12);
    assert!(solution.objective <= rosenbrock(&[-1.2, 1.0]));
}

#[derive(Debug, Error)]
#[error("input below the valid range")]
struct BelowRange;

/// Fails whenever the first variable drops below one half.
struct Fragile;

impl Model for Fragile {
    type Input = [f64; 2];
    type Output = f64;
    type Error = BelowRange;

    fn call(&self, x: &[f64; 2]) -> Result<f64, Self::Error> {
        if x[0] < 0.5 {
            Err(BelowRange)
        } else {
            Ok(x[0] + x[1])
        }
    }
}

#[test]
fn model_failure_without_action_errors() {
    // The fourth initial point (0, 1) is the first to fail.
    let result = minimize_unobserved(
        &Fragile,
        &ObjectiveOutput,
        [1.0, 1.0],
        &Bounds::new([-1.0; 2], [5.0; 2]).unwrap(),
        &Config::default(),
    );

    assert!(matches!(result, Err(Error::Model(_))));
}

#[test]
fn model_failure_stops_early() {
    let observer = |event: &Event<'_, _, _, 2>| match event {
        Event::ModelFailed { .. } => Some(Action::StopEarly),
        _ => None,
    };

    let solution = minimize(
        &Fragile,
        &ObjectiveOutput,
        [1.0, 1.0],
        &Bounds::new([-1.0; 2], [5.0; 2]).unwrap(),
        &Config::default(),
        observer,
    )
    .expect("should stop cleanly");

    assert_eq!(solution.status, Status::StoppedByObserver);
    assert_eq!(solution.evals, 4);
    assert_eq!(solution.x, [1.0, 1.0]);
    assert_relative_eq!(solution.objective, 2.0);
}

#[test]
fn stopping_before_any_success_is_an_error() {
    let observer = |_event: &Event<'_, _, _, 2>| Some(Action::StopEarly);

    let result = minimize(
        &Fragile,
        &ObjectiveOutput,
        [0.0, 1.0],
        &Bounds::new([-1.0; 2], [5.0; 2]).unwrap(),
        &Config::default(),
        observer,
    );

    assert!(matches!(result, Err(Error::NoSuccessfulEvaluation)));
}
