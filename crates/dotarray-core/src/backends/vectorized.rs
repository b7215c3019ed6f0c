use super::{Capabilities, GroundStateSolver, adapt_options};
use crate::core::VectorList;
use crate::core::capacitance::CapacitanceModel;
use crate::engine::batch::{GroundStateKernel, Regime};
use crate::engine::config::SolveOptions;
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use nalgebra::DVector;
use tracing::instrument;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Maps a pure single-vector solve over the batch.
///
/// Every vector gets a cold workspace, so no state flows between points. The threshold is
/// fixed at 1 and the relaxed solution is never polished.
#[derive(Debug, Clone, Copy, Default)]
pub struct VectorizedSolver;

const CAPABILITIES: Capabilities = Capabilities {
    threshold: false,
    polish: false,
};

fn solve_one(kernel: &GroundStateKernel<'_>, vg: &DVector<f64>) -> Result<DVector<f64>, EngineError> {
    let mut relaxer = kernel.relaxer()?;
    kernel.solve_point(&mut relaxer, vg)
}

impl VectorizedSolver {
    #[instrument(skip_all, name = "vectorized_batch", fields(points = vg.len(), regime = ?regime))]
    fn solve(
        &self,
        vg: &[DVector<f64>],
        regime: Regime,
        model: &CapacitanceModel,
        options: &SolveOptions,
        reporter: &ProgressReporter,
    ) -> Result<VectorList, EngineError> {
        let options = adapt_options(self.name(), CAPABILITIES, options);
        let kernel = GroundStateKernel::new(model, regime, &options)?;

        #[cfg(not(feature = "parallel"))]
        let iterator = vg.iter();

        #[cfg(feature = "parallel")]
        let iterator = vg.par_iter();

        iterator
            .map(|point| -> Result<DVector<f64>, EngineError> {
                let n = solve_one(&kernel, point)?;
                reporter.advance(1);
                Ok(n)
            })
            .collect()
    }
}

impl GroundStateSolver for VectorizedSolver {
    fn name(&self) -> &'static str {
        "jax"
    }

    fn capabilities(&self) -> Capabilities {
        CAPABILITIES
    }

    fn ground_state_open(
        &self,
        vg: &[DVector<f64>],
        model: &CapacitanceModel,
        options: &SolveOptions,
        reporter: &ProgressReporter,
    ) -> Result<VectorList, EngineError> {
        self.solve(vg, Regime::Open, model, options, reporter)
    }

    fn ground_state_closed(
        &self,
        vg: &[DVector<f64>],
        n_charge: u32,
        model: &CapacitanceModel,
        options: &SolveOptions,
        reporter: &ProgressReporter,
    ) -> Result<VectorList, EngineError> {
        self.solve(vg, Regime::Closed { n_charge }, model, options, reporter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::Core;
    use crate::engine::config::SolveOptionsBuilder;
    use nalgebra::DMatrix;

    fn double_dot() -> CapacitanceModel {
        CapacitanceModel::from_non_maxwell(
            DMatrix::from_row_slice(2, 2, &[0.0, 0.1, 0.1, 0.0]),
            DMatrix::from_row_slice(2, 2, &[1.0, 0.2, 0.2, 1.0]),
        )
        .unwrap()
    }

    fn vector(values: &[f64]) -> DVector<f64> {
        DVector::from_column_slice(values)
    }

    #[test]
    fn low_threshold_is_accepted_and_treated_as_one() {
        let model = double_dot();
        let low = SolveOptionsBuilder::new()
            .core(Core::Vectorized)
            .threshold(0.0)
            .build()
            .unwrap();
        let full = SolveOptionsBuilder::new()
            .core(Core::Vectorized)
            .build()
            .unwrap();
        let vg = vec![vector(&[0.45, 0.1]), vector(&[1.6, 0.55]), vector(&[2.0, 2.0])];
        let reporter = ProgressReporter::new();

        assert_eq!(
            VectorizedSolver
                .ground_state_open(&vg, &model, &low, &reporter)
                .unwrap(),
            VectorizedSolver
                .ground_state_open(&vg, &model, &full, &reporter)
                .unwrap()
        );
    }

    #[test]
    fn closed_results_hold_the_requested_charge() {
        let model = double_dot();
        let options = SolveOptionsBuilder::new()
            .core(Core::Vectorized)
            .build()
            .unwrap();
        let vg: VectorList = (0..20)
            .map(|i| vector(&[0.2 * i as f64, 1.0 - 0.05 * i as f64]))
            .collect();
        let solutions = VectorizedSolver
            .ground_state_closed(&vg, 3, &model, &options, &ProgressReporter::new())
            .unwrap();
        assert!(solutions.iter().all(|n| n.sum() == 3.0));
    }

    #[test]
    fn scenario_single_charge_follows_the_biased_gate() {
        let model = double_dot();
        let options = SolveOptionsBuilder::new()
            .core(Core::Vectorized)
            .build()
            .unwrap();
        let solutions = VectorizedSolver
            .ground_state_closed(
                &[vector(&[1.0, 0.0]), vector(&[0.0, 1.0])],
                1,
                &model,
                &options,
                &ProgressReporter::new(),
            )
            .unwrap();
        assert_eq!(solutions, vec![vector(&[1.0, 0.0]), vector(&[0.0, 1.0])]);
    }

    #[test]
    fn large_open_voltages_match_the_native_core_exactly() {
        let model = double_dot();
        let vg = vec![vector(&[1e6, 0.0])];
        let reporter = ProgressReporter::new();
        let options = |core| SolveOptionsBuilder::new().core(core).build().unwrap();

        let vectorized = VectorizedSolver
            .ground_state_open(&vg, &model, &options(Core::Vectorized), &reporter)
            .unwrap();
        let native = crate::backends::native::NativeSolver
            .ground_state_open(&vg, &model, &options(Core::Native), &reporter)
            .unwrap();

        assert_eq!(vectorized, vec![vector(&[1e6, 2e5])]);
        assert_eq!(vectorized, native);
    }
}
