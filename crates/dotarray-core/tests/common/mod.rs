#![allow(dead_code)]

use dotarray::backends::Core;
use dotarray::core::capacitance::CapacitanceModel;
use dotarray::core::energy::FreeEnergy;
use dotarray::engine::config::{SolveOptions, SolveOptionsBuilder};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array3, ArrayD, Axis};

/// Two weakly coupled dots, each under its own plunger gate.
pub fn double_dot() -> CapacitanceModel {
    CapacitanceModel::from_non_maxwell(
        DMatrix::from_row_slice(2, 2, &[0.0, 0.1, 0.1, 0.0]),
        DMatrix::from_row_slice(2, 2, &[1.0, 0.2, 0.2, 1.0]),
    )
    .unwrap()
}

/// Two dots with a stronger mutual coupling and a shared barrier gate.
pub fn coupled_double_dot() -> CapacitanceModel {
    CapacitanceModel::from_non_maxwell(
        DMatrix::from_row_slice(2, 2, &[0.0, 0.25, 0.25, 0.0]),
        DMatrix::from_row_slice(2, 3, &[1.0, 0.15, 0.3, 0.1, 0.9, 0.3]),
    )
    .unwrap()
}

/// Three dots in a row with nearest- and next-nearest-neighbour coupling.
pub fn triple_dot() -> CapacitanceModel {
    CapacitanceModel::from_non_maxwell(
        DMatrix::from_row_slice(3, 3, &[0.0, 0.1, 0.05, 0.1, 0.0, 0.1, 0.05, 0.1, 0.0]),
        DMatrix::from_row_slice(3, 3, &[1.0, 0.2, 0.05, 0.2, 1.0, 0.2, 0.05, 0.2, 1.0]),
    )
    .unwrap()
}

/// Five dots in a ring, each under its own gate with a weak cross coupling to its neighbours.
pub fn five_dot_ring() -> CapacitanceModel {
    let cdd = DMatrix::from_fn(5, 5, |i, j| match (i + 5 - j) % 5 {
        1 | 4 => 0.2,
        2 | 3 => 0.05,
        _ => 0.0,
    });
    let cgd = DMatrix::from_fn(5, 5, |i, j| match (i + 5 - j) % 5 {
        0 => 1.0,
        1 | 4 => 0.15,
        _ => 0.0,
    });
    CapacitanceModel::from_non_maxwell(cdd, cgd).unwrap()
}

pub fn options(core: Core) -> SolveOptions {
    SolveOptionsBuilder::new().core(core).build().unwrap()
}

/// A `resolution x resolution` sweep of gates `x_gate` and `y_gate`, other gates held at
/// `offset`. Shape `(resolution, resolution, n_gate)`.
pub fn sweep_2d(
    n_gate: usize,
    x_gate: usize,
    y_gate: usize,
    range: (f64, f64),
    resolution: usize,
    offset: f64,
) -> ArrayD<f64> {
    let step = (range.1 - range.0) / (resolution - 1) as f64;
    Array3::from_shape_fn((resolution, resolution, n_gate), |(i, j, gate)| {
        if gate == x_gate {
            range.0 + step * i as f64
        } else if gate == y_gate {
            range.0 + step * j as f64
        } else {
            offset
        }
    })
    .into_dyn()
}

/// The occupations of an `(..., n_dot)` result as a flat list of vectors.
pub fn rows(array: &ArrayD<f64>) -> Vec<DVector<f64>> {
    let last = Axis(array.ndim() - 1);
    array
        .lanes(last)
        .into_iter()
        .map(|lane| DVector::from_iterator(lane.len(), lane.iter().copied()))
        .collect()
}

/// Free energy of `n` at gate voltages `vg`.
pub fn free_energy(model: &CapacitanceModel, n: &DVector<f64>, vg: &DVector<f64>) -> f64 {
    FreeEnergy::new(model.cdd_inv()).evaluate(n, &model.induced_charge(vg))
}
