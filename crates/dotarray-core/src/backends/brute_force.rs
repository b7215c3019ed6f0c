use super::{Capabilities, GroundStateSolver, adapt_options};
use crate::core::VectorList;
use crate::core::capacitance::CapacitanceModel;
use crate::core::configurations::{closed_configurations_brute_force, open_configurations};
use crate::core::energy::{FreeEnergy, select_configuration};
use crate::engine::batch::check_capacity;
use crate::engine::config::SolveOptions;
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use nalgebra::DVector;
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const NAME: &str = "brute_force";

const CAPABILITIES: Capabilities = Capabilities {
    threshold: false,
    polish: false,
};

/// Scores every admissible configuration against every voltage vector.
///
/// Exact by construction and only tractable for a handful of dots with small occupation
/// bounds. The open regime needs `max_charge_carriers` to bound the enumeration.
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForceSolver;

fn score_batch(
    vg: &[DVector<f64>],
    configurations: &[DVector<f64>],
    model: &CapacitanceModel,
    temperature: f64,
    reporter: &ProgressReporter,
) -> Result<VectorList, EngineError> {
    let energy = FreeEnergy::new(model.cdd_inv());

    let solve = |point: &DVector<f64>| -> Result<DVector<f64>, EngineError> {
        if point.len() != model.n_gate() {
            return Err(EngineError::Shape {
                expected: model.n_gate(),
                actual: vec![point.len()],
            });
        }
        let v = model.induced_charge(point);
        let energies = energy.evaluate_all(configurations, &v);
        let n = select_configuration(configurations, &energies, temperature).ok_or_else(|| {
            EngineError::Internal("brute-force configuration set is empty".to_string())
        })?;
        reporter.advance(1);
        Ok(n)
    };

    #[cfg(not(feature = "parallel"))]
    let iterator = vg.iter();

    #[cfg(feature = "parallel")]
    let iterator = vg.par_iter();

    iterator.map(solve).collect()
}

impl GroundStateSolver for BruteForceSolver {
    fn name(&self) -> &'static str {
        NAME
    }

    fn capabilities(&self) -> Capabilities {
        CAPABILITIES
    }

    #[instrument(skip_all, name = "brute_force_open", fields(points = vg.len()))]
    fn ground_state_open(
        &self,
        vg: &[DVector<f64>],
        model: &CapacitanceModel,
        options: &SolveOptions,
        reporter: &ProgressReporter,
    ) -> Result<VectorList, EngineError> {
        let options = adapt_options(NAME, CAPABILITIES, options);
        let n_max = options
            .max_charge_carriers
            .ok_or(EngineError::MissingParameter {
                core: NAME,
                parameter: "max_charge_carriers",
            })?;

        let configurations = open_configurations(model.n_dot(), n_max)?;
        debug!(configurations = configurations.len(), "Enumerated open configurations.");
        score_batch(vg, &configurations, model, options.temperature, reporter)
    }

    #[instrument(skip_all, name = "brute_force_closed", fields(points = vg.len(), n_charge = n_charge))]
    fn ground_state_closed(
        &self,
        vg: &[DVector<f64>],
        n_charge: u32,
        model: &CapacitanceModel,
        options: &SolveOptions,
        reporter: &ProgressReporter,
    ) -> Result<VectorList, EngineError> {
        let options = adapt_options(NAME, CAPABILITIES, options);
        check_capacity(model.n_dot(), n_charge, options.max_charge_carriers)?;

        let configurations =
            closed_configurations_brute_force(model.n_dot(), n_charge, options.max_charge_carriers)?;
        if configurations.is_empty() {
            return Err(EngineError::Infeasible {
                n_charge,
                reason: format!("no configuration of {} dots holds that charge", model.n_dot()),
            });
        }
        debug!(configurations = configurations.len(), "Enumerated closed configurations.");
        score_batch(vg, &configurations, model, options.temperature, reporter)
    }
}
