use super::config::ConfigError;
use super::relaxer::RelaxError;
use crate::core::capacitance::CapacitanceError;
use crate::core::configurations::GenerationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("The shape of vg is incorrect: expected (..., {expected}) but got {actual:?}")]
    Shape { expected: usize, actual: Vec<usize> },

    #[error("Gate voltages at batch index {index} contain non-finite values")]
    NonFiniteVoltage { index: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("The '{core}' core requires '{parameter}' to be set")]
    MissingParameter {
        core: &'static str,
        parameter: &'static str,
    },

    #[error("Continuous relaxation failed: {source}")]
    Relaxation {
        #[from]
        source: RelaxError,
    },

    #[error("No integer charge configuration holds {n_charge} charge(s): {reason}")]
    Infeasible { n_charge: u32, reason: String },

    #[error("Physical consistency violated at batch index {index}: {reason} (vg = {input:?}, n = {output:?})")]
    PhysicalConsistency {
        index: usize,
        input: Vec<f64>,
        output: Vec<f64>,
        reason: String,
    },

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Capacitance(#[from] CapacitanceError),

    #[error("Internal logic error: {0}")]
    Internal(String),
}
