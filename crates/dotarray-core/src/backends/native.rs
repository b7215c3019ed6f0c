use super::{Capabilities, GroundStateSolver};
use crate::core::VectorList;
use crate::core::capacitance::CapacitanceModel;
use crate::engine::batch::{GroundStateKernel, Regime};
use crate::engine::config::SolveOptions;
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use nalgebra::DVector;
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Voltage vectors per chunk. Chunk boundaries never depend on the thread count, so results
/// are identical however many workers run.
pub const CHUNK_SIZE: usize = 64;

/// Chunked, warm-started solver; chunks run in parallel with the `parallel` feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeSolver;

impl NativeSolver {
    #[instrument(skip_all, name = "native_batch", fields(points = vg.len(), regime = ?regime))]
    fn solve(
        &self,
        vg: &[DVector<f64>],
        regime: Regime,
        model: &CapacitanceModel,
        options: &SolveOptions,
        reporter: &ProgressReporter,
    ) -> Result<VectorList, EngineError> {
        let kernel = GroundStateKernel::new(model, regime, options)?;

        #[cfg(not(feature = "parallel"))]
        let chunks = vg.chunks(CHUNK_SIZE);

        #[cfg(feature = "parallel")]
        let chunks = vg.par_chunks(CHUNK_SIZE);

        let results: Vec<Result<VectorList, EngineError>> = chunks
            .map(|chunk| kernel.solve_sequential(chunk, reporter))
            .collect();

        let mut solutions = Vec::with_capacity(vg.len());
        for chunk in results {
            solutions.extend(chunk?);
        }
        debug!(
            chunks = vg.len().div_ceil(CHUNK_SIZE),
            "Native batch solved."
        );
        Ok(solutions)
    }
}

impl GroundStateSolver for NativeSolver {
    fn name(&self) -> &'static str {
        "rust"
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
