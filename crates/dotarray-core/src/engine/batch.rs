use super::config::SolveOptions;
use super::corrector::IntegerCorrector;
use super::error::EngineError;
use super::progress::ProgressReporter;
use super::relaxer::{ContinuousRelaxer, QpProblem};
use crate::core::VectorList;
use crate::core::capacitance::CapacitanceModel;
use crate::core::energy::FreeEnergy;
use nalgebra::DVector;
use tracing::{debug, instrument};

/// Whether the total number of charges in the array is free or fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    Open,
    Closed { n_charge: u32 },
}

/// Relax-then-correct solver for single voltage vectors of one regime.
///
/// The kernel owns the fixed QP structure. Callers acquire a [`ContinuousRelaxer`] per batch
/// or per chunk with [`GroundStateKernel::relaxer`] and feed it through
/// [`GroundStateKernel::solve_point`].
pub struct GroundStateKernel<'a> {
    model: &'a CapacitanceModel,
    regime: Regime,
    problem: QpProblem,
    options: &'a SolveOptions,
}

impl<'a> GroundStateKernel<'a> {
    pub fn new(
        model: &'a CapacitanceModel,
        regime: Regime,
        options: &'a SolveOptions,
    ) -> Result<Self, EngineError> {
        let problem = match regime {
            Regime::Open => QpProblem::open(model.cdd_inv(), options.max_charge_carriers),
            Regime::Closed { n_charge } => {
                check_capacity(model.n_dot(), n_charge, options.max_charge_carriers)?;
                QpProblem::closed(model.cdd_inv(), n_charge, options.max_charge_carriers)
            }
        };
        Ok(Self {
            model,
            regime,
            problem,
            options,
        })
    }

    pub fn relaxer(&self) -> Result<ContinuousRelaxer<'_>, EngineError> {
        Ok(ContinuousRelaxer::new(
            self.model,
            &self.problem,
            self.options.solver,
            self.options.polish,
        )?)
    }

    fn corrector(&self) -> IntegerCorrector<'a> {
        IntegerCorrector::new(
            FreeEnergy::new(self.model.cdd_inv()),
            self.options.threshold,
            self.options.temperature,
            self.options.max_charge_carriers,
        )
    }

    pub fn solve_point(
        &self,
        relaxer: &mut ContinuousRelaxer<'_>,
        vg: &DVector<f64>,
    ) -> Result<DVector<f64>, EngineError> {
        if vg.len() != self.model.n_gate() {
            return Err(EngineError::Shape {
                expected: self.model.n_gate(),
                actual: vec![vg.len()],
            });
        }

        let (n_continuous, v) = relaxer.relax(vg)?;
        let corrector = self.corrector();
        match self.regime {
            Regime::Open => corrector.correct_open(&n_continuous, &v),
            Regime::Closed { n_charge } => corrector.correct_closed(
                &n_continuous,
                &v,
                n_charge,
                self.options.closed_correction,
            ),
        }
    }

    /// Solves a run of voltage vectors in order with one warm-started relaxer.
    #[instrument(level = "debug", skip_all, name = "sequential_batch", fields(points = vg.len()))]
    pub fn solve_sequential(
        &self,
        vg: &[DVector<f64>],
        reporter: &ProgressReporter,
    ) -> Result<VectorList, EngineError> {
        let mut relaxer = self.relaxer()?;
        let mut solutions = Vec::with_capacity(vg.len());
        for point in vg {
            solutions.push(self.solve_point(&mut relaxer, point)?);
            reporter.advance(1);
        }
        debug!(points = solutions.len(), "Sequential batch solved.");
        Ok(solutions)
    }
}

/// Fails with [`EngineError::Infeasible`] when `n_charge` charges cannot fit on the dots.
pub fn check_capacity(
    n_dot: usize,
    n_charge: u32,
    max_charge_carriers: Option<u32>,
) -> Result<(), EngineError> {
    if let Some(n_max) = max_charge_carriers {
        let capacity = n_dot as u64 * u64::from(n_max);
        if u64::from(n_charge) > capacity {
            return Err(EngineError::Infeasible {
                n_charge,
                reason: format!(
                    "{n_dot} dots holding at most {n_max} charges each fit only {capacity}"
                ),
            });
        }
    }
    Ok(())
}
