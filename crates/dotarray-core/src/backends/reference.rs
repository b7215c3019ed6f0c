use super::{Capabilities, GroundStateSolver};
use crate::core::VectorList;
use crate::core::capacitance::CapacitanceModel;
use crate::engine::batch::{GroundStateKernel, Regime};
use crate::engine::config::SolveOptions;
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use nalgebra::DVector;

/// Strictly sequential solver with a single workspace for the whole batch.
///
/// Slow but simple; the other backends are checked against it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceSolver;

impl GroundStateSolver for ReferenceSolver {
    fn name(&self) -> &'static str {
        "python"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            threshold: true,
            polish: true,
        }
    }

    fn ground_state_open(
        &self,
        vg: &[DVector<f64>],
        model: &CapacitanceModel,
        options: &SolveOptions,
        reporter: &ProgressReporter,
    ) -> Result<VectorList, EngineError> {
        GroundStateKernel::new(model, Regime::Open, options)?.solve_sequential(vg, reporter)
    }

    fn ground_state_closed(
        &self,
        vg: &[DVector<f64>],
        n_charge: u32,
        model: &CapacitanceModel,
        options: &SolveOptions,
        reporter: &ProgressReporter,
    ) -> Result<VectorList, EngineError> {
        GroundStateKernel::new(model, Regime::Closed { n_charge }, options)?
            .solve_sequential(vg, reporter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::Core;
    use crate::engine::config::SolveOptionsBuilder;
    use nalgebra::DMatrix;

    #[test]
    fn open_ground_state_is_never_negative() {
        let model = CapacitanceModel::from_non_maxwell(
            DMatrix::from_row_slice(2, 2, &[0.0, 0.3, 0.3, 0.0]),
            DMatrix::from_row_slice(2, 2, &[1.0, 0.1, 0.1, 1.0]),
        )
        .unwrap();
        let options = SolveOptionsBuilder::new()
            .core(Core::Reference)
            .threshold(0.2)
            .build()
            .unwrap();
        let vg: VectorList = (0..30)
            .map(|i| DVector::from_column_slice(&[-2.0 + 0.2 * i as f64, 1.5 - 0.1 * i as f64]))
            .collect();

        let solutions = ReferenceSolver
            .ground_state_open(&vg, &model, &options, &ProgressReporter::new())
            .unwrap();
        assert_eq!(solutions.len(), vg.len());
        for n in &solutions {
            assert!(n.iter().all(|&value| value >= 0.0 && value.fract() == 0.0), "n = {n}");
        }
    }
}
