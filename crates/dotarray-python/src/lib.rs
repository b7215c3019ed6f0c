//! Python bindings for the dotarray ground-state solvers.
//!
//! ```python
//! import numpy as np
//! import dotarray_py
//!
//! vg = np.stack(np.meshgrid(x, y, indexing="ij"), axis=-1)  # (nx, ny, n_gate)
//! n = dotarray_py.ground_state_closed(vg, 2, cgd, cdd, np.linalg.inv(cdd), core="rust")
//! changes = dotarray_py.dot_occupation_changes(n)
//! ```
//!
//! Voltages are `float64` arrays of any rank `(..., n_gate)`; occupations come back with the
//! same leading shape, `(..., n_dot)`.

use dotarray::backends::Core;
use dotarray::core::capacitance::CapacitanceModel;
use dotarray::core::transitions;
use dotarray::engine::config::{SolveOptions, SolveOptionsBuilder};
use dotarray::engine::error::EngineError;
use dotarray::engine::progress::ProgressReporter;
use dotarray::workflows;
use nalgebra::DMatrix;
use numpy::{
    IntoPyArray, PyArray2, PyArrayDyn, PyReadonlyArray2, PyReadonlyArray3, PyReadonlyArrayDyn,
};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

const INVERSE_TOLERANCE: f64 = 1e-6;

fn to_matrix(a: PyReadonlyArray2<'_, f64>) -> DMatrix<f64> {
    let a = a.as_array();
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

fn to_py_err(e: EngineError) -> PyErr {
    match e {
        EngineError::Relaxation { .. }
        | EngineError::PhysicalConsistency { .. }
        | EngineError::Generation(_)
        | EngineError::Internal(_) => PyRuntimeError::new_err(e.to_string()),
        _ => PyValueError::new_err(e.to_string()),
    }
}

fn build_options(
    core: &str,
    threshold: f64,
    polish: bool,
    t: f64,
    max_charge_carriers: Option<u32>,
) -> PyResult<SolveOptions> {
    let core: Core = core
        .parse()
        .map_err(|e: dotarray::engine::config::ConfigError| PyValueError::new_err(e.to_string()))?;
    SolveOptionsBuilder::new()
        .core(core)
        .threshold(threshold)
        .polish(polish)
        .temperature(t)
        .max_charge_carriers(max_charge_carriers)
        .build()
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Ground-state occupations of an open array.
///
/// Args:
///     vg: Gate voltages of shape `(..., n_gate)`.
///     cgd: Gate-dot coupling, `n_dot x n_gate`.
///     cdd_inv: Inverse of the Maxwell dot-dot capacitance matrix.
///     threshold: Branching threshold in [0, 1]; 1 is always exact.
///     polish: Polish the relaxed solution before rounding.
///     t: Temperature; 0 returns integer occupations.
///     core: Backend identifier (rust, jax, brute_force, python or their short forms).
///     max_charge_carriers: Per-dot charge cap; required by the brute-force core.
///
/// Returns:
///     Occupations of shape `(..., n_dot)`.
///
/// Raises:
///     ValueError: On malformed input or options.
///     RuntimeError: When the solver itself fails.
#[pyfunction]
#[pyo3(signature = (vg, cgd, cdd_inv, threshold=1.0, polish=true, t=0.0, core="rust", max_charge_carriers=None))]
#[allow(clippy::too_many_arguments)]
pub fn ground_state_open<'py>(
    py: Python<'py>,
    vg: PyReadonlyArrayDyn<'py, f64>,
    cgd: PyReadonlyArray2<'py, f64>,
    cdd_inv: PyReadonlyArray2<'py, f64>,
    threshold: f64,
    polish: bool,
    t: f64,
    core: &str,
    max_charge_carriers: Option<u32>,
) -> PyResult<Bound<'py, PyArrayDyn<f64>>> {
    let model = CapacitanceModel::from_inverse(to_matrix(cdd_inv), to_matrix(cgd))
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    let options = build_options(core, threshold, polish, t, max_charge_carriers)?;
    let vg = vg.as_array().to_owned();

    let n = py
        .allow_threads(|| {
            workflows::ground_state_open(vg.view(), &model, &options, &ProgressReporter::new())
        })
        .map_err(to_py_err)?;
    Ok(n.into_pyarray(py))
}

/// Ground-state occupations of a closed array holding exactly `n_charge` charges.
///
/// Takes the same keyword arguments as `ground_state_open`. `cdd_inv` must be the inverse of
/// `cdd`.
#[pyfunction]
#[pyo3(signature = (vg, n_charge, cgd, cdd, cdd_inv, threshold=1.0, polish=true, t=0.0, core="rust", max_charge_carriers=None))]
#[allow(clippy::too_many_arguments)]
pub fn ground_state_closed<'py>(
    py: Python<'py>,
    vg: PyReadonlyArrayDyn<'py, f64>,
    n_charge: u32,
    cgd: PyReadonlyArray2<'py, f64>,
    cdd: PyReadonlyArray2<'py, f64>,
    cdd_inv: PyReadonlyArray2<'py, f64>,
    threshold: f64,
    polish: bool,
    t: f64,
    core: &str,
    max_charge_carriers: Option<u32>,
) -> PyResult<Bound<'py, PyArrayDyn<f64>>> {
    let model = CapacitanceModel::new(to_matrix(cdd), to_matrix(cgd))
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    let cdd_inv = to_matrix(cdd_inv);
    if cdd_inv.shape() != model.cdd_inv().shape()
        || (&cdd_inv - model.cdd_inv()).amax() > INVERSE_TOLERANCE
    {
        return Err(PyValueError::new_err("'cdd_inv' is not the inverse of 'cdd'"));
    }
    let options = build_options(core, threshold, polish, t, max_charge_carriers)?;
    let vg = vg.as_array().to_owned();

    let n = py
        .allow_threads(|| {
            workflows::ground_state_closed(
                vg.view(),
                n_charge,
                &model,
                &options,
                &ProgressReporter::new(),
            )
        })
        .map_err(to_py_err)?;
    Ok(n.into_pyarray(py))
}

/// Pixels of a 2D occupation map `(nx, ny, n_dot)` where the charge configuration changes.
///
/// Returns a boolean array of shape `(nx - 1, ny - 1)`.
#[pyfunction]
pub fn dot_occupation_changes<'py>(
    py: Python<'py>,
    n: PyReadonlyArray3<'py, f64>,
) -> Bound<'py, PyArray2<bool>> {
    transitions::dot_occupation_changes(n.as_array()).into_pyarray(py)
}

/// Ground states of capacitively coupled quantum-dot arrays.
#[pymodule]
fn dotarray_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(ground_state_open, m)?)?;
    m.add_function(wrap_pyfunction!(ground_state_closed, m)?)?;
    m.add_function(wrap_pyfunction!(dot_occupation_changes, m)?)?;
    Ok(())
}

