//! # Backends Module
//!
//! Interchangeable implementations of the batch ground-state solver.
//!
//! Every backend answers the same two questions (open and closed ground states of a flat list
//! of voltage vectors) and must agree with the others at zero temperature wherever their
//! supported options overlap. They differ in execution strategy:
//!
//! - **Native** ([`native`]) - Fixed-size chunks, one warm-started QP workspace per chunk,
//!   chunks solved in parallel
//! - **Vectorized** ([`vectorized`]) - A pure per-vector map with a fresh workspace each time
//! - **Brute Force** ([`brute_force`]) - Scores every admissible configuration; the test oracle
//! - **Reference** ([`reference`]) - One workspace, strictly sequential
//!
//! A backend that does not support a requested option logs a warning and falls back to the
//! behaviour it does support instead of failing.

pub mod brute_force;
pub mod native;
pub mod reference;
pub mod vectorized;

use crate::core::VectorList;
use crate::core::capacitance::CapacitanceModel;
use crate::engine::config::{ConfigError, SolveOptions};
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use nalgebra::DVector;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// The backend a batch is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Core {
    Native,
    Vectorized,
    BruteForce,
    Reference,
}

impl Core {
    pub const ALL: [Core; 4] = [
        Core::Native,
        Core::Vectorized,
        Core::BruteForce,
        Core::Reference,
    ];

    /// The canonical identifier, as accepted by [`Core::from_str`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Core::Native => "rust",
            Core::Vectorized => "jax",
            Core::BruteForce => "brute_force",
            Core::Reference => "python",
        }
    }

    pub fn solver(&self) -> &'static dyn GroundStateSolver {
        match self {
            Core::Native => &native::NativeSolver,
            Core::Vectorized => &vectorized::VectorizedSolver,
            Core::BruteForce => &brute_force::BruteForceSolver,
            Core::Reference => &reference::ReferenceSolver,
        }
    }
}

impl FromStr for Core {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rust" | "r" | "native" => Ok(Core::Native),
            "jax" | "j" | "vectorized" => Ok(Core::Vectorized),
            "brute_force" | "jax_brute_force" | "b" | "brute-force" => Ok(Core::BruteForce),
            "python" | "p" | "reference" => Ok(Core::Reference),
            _ => Err(ConfigError::UnknownCore(s.to_string())),
        }
    }
}

impl fmt::Display for Core {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options a backend honours. Unsupported ones are replaced by [`adapt_options`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Honours `threshold < 1`.
    pub threshold: bool,
    pub polish: bool,
}

pub trait GroundStateSolver: Sync {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Integer occupations minimizing the free energy with a free total charge.
    fn ground_state_open(
        &self,
        vg: &[DVector<f64>],
        model: &CapacitanceModel,
        options: &SolveOptions,
        reporter: &ProgressReporter,
    ) -> Result<VectorList, EngineError>;

    /// Integer occupations minimizing the free energy with exactly `n_charge` charges.
    fn ground_state_closed(
        &self,
        vg: &[DVector<f64>],
        n_charge: u32,
        model: &CapacitanceModel,
        options: &SolveOptions,
        reporter: &ProgressReporter,
    ) -> Result<VectorList, EngineError>;
}

/// Replaces the options a backend cannot honour with the ones it implements.
pub(crate) fn adapt_options(name: &str, capabilities: Capabilities, options: &SolveOptions) -> SolveOptions {
    let mut adapted = options.clone();
    if !capabilities.threshold && options.threshold < 1.0 {
        warn!(
            core = name,
            threshold = options.threshold,
            "The {name} core does not support threshold < 1.0, using a threshold of 1.0."
        );
        adapted.threshold = 1.0;
    }
    if !capabilities.polish && options.polish {
        debug!(core = name, "Polishing is not supported by this core and is skipped.");
        adapted.polish = false;
    }
    adapted
}
