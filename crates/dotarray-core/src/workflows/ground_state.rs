use crate::core::VectorList;
use crate::core::capacitance::CapacitanceModel;
use crate::engine::batch::Regime;
use crate::engine::config::SolveOptions;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use nalgebra::DVector;
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use std::time::Instant;
use tracing::{error, info, instrument};

/// Row-sum tolerance of closed-array results at zero temperature.
const CHARGE_TOLERANCE: f64 = 1e-6;
/// Row-sum tolerance of thermally averaged closed-array results.
const THERMAL_CHARGE_TOLERANCE: f64 = 1e-3;

/// Ground states of an open array for a batch of gate-voltage vectors.
///
/// `vg` may have any rank `>= 1`; its last axis holds the `n_gate` voltages of one point. The
/// result has the same leading shape with a last axis of length `n_dot`.
#[instrument(skip_all, name = "ground_state_open", fields(core = %options.core))]
pub fn ground_state_open(
    vg: ArrayViewD<'_, f64>,
    model: &CapacitanceModel,
    options: &SolveOptions,
    reporter: &ProgressReporter,
) -> Result<ArrayD<f64>, EngineError> {
    solve_batch(vg, Regime::Open, model, options, reporter)
}

/// Ground states of a closed array holding exactly `n_charge` charges.
///
/// Fails with [`EngineError::Infeasible`] when the charge cannot fit under
/// `max_charge_carriers`; it is never clamped.
#[instrument(skip_all, name = "ground_state_closed", fields(core = %options.core, n_charge = n_charge))]
pub fn ground_state_closed(
    vg: ArrayViewD<'_, f64>,
    n_charge: u32,
    model: &CapacitanceModel,
    options: &SolveOptions,
    reporter: &ProgressReporter,
) -> Result<ArrayD<f64>, EngineError> {
    solve_batch(vg, Regime::Closed { n_charge }, model, options, reporter)
}

fn solve_batch(
    vg: ArrayViewD<'_, f64>,
    regime: Regime,
    model: &CapacitanceModel,
    options: &SolveOptions,
    reporter: &ProgressReporter,
) -> Result<ArrayD<f64>, EngineError> {
    options.validate()?;
    let (leading_shape, points) = flatten_voltages(&vg, model.n_gate())?;

    reporter.report(Progress::PhaseStart {
        name: "Ground State",
    });
    info!(points = points.len(), "Solving ground states.");
    let start = Instant::now();

    reporter.report(Progress::TaskStart {
        total_steps: points.len() as u64,
    });
    let solver = options.core.solver();
    let solutions = match regime {
        Regime::Open => solver.ground_state_open(&points, model, options, reporter),
        Regime::Closed { n_charge } => {
            solver.ground_state_closed(&points, n_charge, model, options, reporter)
        }
    }?;
    reporter.report(Progress::TaskFinish);

    if solutions.len() != points.len() {
        return Err(EngineError::Internal(format!(
            "{} core returned {} solutions for {} points",
            solver.name(),
            solutions.len(),
            points.len()
        )));
    }
    check_consistency(&points, &solutions, regime, options.temperature)?;

    info!(
        points = points.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Ground states solved."
    );
    reporter.report(Progress::PhaseFinish);

    assemble(leading_shape, model.n_dot(), &solutions)
}

/// Splits `vg` into its leading shape and a row-major list of voltage vectors.
fn flatten_voltages(
    vg: &ArrayViewD<'_, f64>,
    n_gate: usize,
) -> Result<(Vec<usize>, VectorList), EngineError> {
    let shape = vg.shape();
    match shape.split_last() {
        Some((&last, leading)) if last == n_gate => {
            let points: VectorList = vg
                .rows()
                .into_iter()
                .map(|row| DVector::from_iterator(n_gate, row.iter().copied()))
                .collect();
            if let Some(index) = points
                .iter()
                .position(|point| point.iter().any(|value| !value.is_finite()))
            {
                return Err(EngineError::NonFiniteVoltage { index });
            }
            Ok((leading.to_vec(), points))
        }
        _ => Err(EngineError::Shape {
            expected: n_gate,
            actual: shape.to_vec(),
        }),
    }
}

fn assemble(
    mut shape: Vec<usize>,
    n_dot: usize,
    solutions: &[DVector<f64>],
) -> Result<ArrayD<f64>, EngineError> {
    shape.push(n_dot);
    let data: Vec<f64> = solutions
        .iter()
        .flat_map(|n| n.iter().copied())
        .collect();
    ArrayD::from_shape_vec(IxDyn(&shape), data)
        .map_err(|e| EngineError::Internal(format!("failed to reshape solutions: {e}")))
}

fn check_consistency(
    points: &[DVector<f64>],
    solutions: &[DVector<f64>],
    regime: Regime,
    temperature: f64,
) -> Result<(), EngineError> {
    for (index, (vg, n)) in points.iter().zip(solutions).enumerate() {
        let violation = match regime {
            Regime::Open => n
                .iter()
                .any(|&value| !(value >= 0.0))
                .then(|| "negative number of charges".to_string()),
            Regime::Closed { n_charge } => {
                let tolerance = if temperature > 0.0 {
                    THERMAL_CHARGE_TOLERANCE
                } else {
                    CHARGE_TOLERANCE
                };
                let total = n.sum();
                (!((total - f64::from(n_charge)).abs() <= tolerance))
                    .then(|| format!("total charge {total} differs from {n_charge}"))
            }
        };

        if let Some(reason) = violation {
            error!(index, %reason, "Physical consistency check failed.");
            return Err(EngineError::PhysicalConsistency {
                index,
                input: vg.iter().copied().collect(),
                output: n.iter().copied().collect(),
                reason,
            });
        }
    }
    Ok(())
}
