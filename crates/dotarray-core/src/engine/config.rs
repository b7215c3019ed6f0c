use crate::backends::Core;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Threshold must lie in [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("Temperature must be finite and non-negative, got {0}")]
    InvalidTemperature(f64),

    #[error("Invalid QP solver setting '{name}': {value}")]
    InvalidSolverSetting { name: &'static str, value: f64 },

    #[error(
        "Incorrect core '{0}', it must be one of: rust (r), jax (j), brute_force (jax_brute_force, b), python (p)"
    )]
    UnknownCore(String),

    #[error("Unknown closed-array correction '{0}', expected 'combinatorial' or 'branching'")]
    UnknownClosedCorrection(String),
}

/// How the integer correction searches for a closed-array ground state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClosedCorrection {
    /// All floor / floor + 1 combinations that hold exactly `n_charge` charges.
    #[default]
    Combinatorial,
    /// Floor/ceil branching over the least certain dots only, falling back to
    /// [`ClosedCorrection::Combinatorial`] when no branched candidate conserves charge.
    Branching,
}

impl std::str::FromStr for ClosedCorrection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "combinatorial" | "exact" => Ok(Self::Combinatorial),
            "branching" | "branch" => Ok(Self::Branching),
            _ => Err(ConfigError::UnknownClosedCorrection(s.to_string())),
        }
    }
}

/// Numerical settings of the OSQP quadratic-program solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    pub max_iterations: usize,
    pub eps_abs: f64,
    pub eps_rel: f64,
    /// Initial ADMM step size; OSQP scales it up on equality rows.
    pub rho: f64,
    pub sigma: f64,
    /// Over-relaxation parameter in `(0, 2)`.
    pub alpha: f64,
    /// Reuse the previous iterate of a workspace as the starting point of the next solve.
    pub warm_start: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: 4000,
            eps_abs: 1e-5,
            eps_rel: 1e-5,
            rho: 0.1,
            sigma: 1e-6,
            alpha: 1.0,
            warm_start: true,
        }
    }
}

impl SolverSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("eps_abs", self.eps_abs),
            ("eps_rel", self.eps_rel),
            ("rho", self.rho),
            ("sigma", self.sigma),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidSolverSetting { name, value });
            }
        }
        if !(self.alpha > 0.0 && self.alpha < 2.0) {
            return Err(ConfigError::InvalidSolverSetting {
                name: "alpha",
                value: self.alpha,
            });
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidSolverSetting {
                name: "max_iterations",
                value: 0.0,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveOptions {
    pub core: Core,
    pub threshold: f64,
    pub temperature: f64,
    pub polish: bool,
    pub max_charge_carriers: Option<u32>,
    pub closed_correction: ClosedCorrection,
    pub solver: SolverSettings,
}

impl SolveOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::InvalidThreshold(self.threshold));
        }
        if !(self.temperature.is_finite() && self.temperature >= 0.0) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }
        self.solver.validate()
    }
}

#[derive(Default)]
pub struct SolveOptionsBuilder {
    core: Option<Core>,
    threshold: Option<f64>,
    temperature: Option<f64>,
    polish: Option<bool>,
    max_charge_carriers: Option<u32>,
    closed_correction: Option<ClosedCorrection>,
    solver: Option<SolverSettings>,
}

impl SolveOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn core(mut self, core: Core) -> Self {
        self.core = Some(core);
        self
    }
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
    pub fn polish(mut self, polish: bool) -> Self {
        self.polish = Some(polish);
        self
    }
    pub fn max_charge_carriers(mut self, n_max: Option<u32>) -> Self {
        self.max_charge_carriers = n_max;
        self
    }
    pub fn closed_correction(mut self, correction: ClosedCorrection) -> Self {
        self.closed_correction = Some(correction);
        self
    }
    pub fn solver_settings(mut self, settings: SolverSettings) -> Self {
        self.solver = Some(settings);
        self
    }

    pub fn build(self) -> Result<SolveOptions, ConfigError> {
        let options = SolveOptions {
            core: self.core.ok_or(ConfigError::MissingParameter("core"))?,
            threshold: self.threshold.unwrap_or(1.0),
            temperature: self.temperature.unwrap_or(0.0),
            polish: self.polish.unwrap_or(true),
            max_charge_carriers: self.max_charge_carriers,
            closed_correction: self.closed_correction.unwrap_or_default(),
            solver: self.solver.unwrap_or_default(),
        };
        options.validate()?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_fills_defaults_around_required_core() {
        let options = SolveOptionsBuilder::new().core(Core::Native).build().unwrap();
        assert_eq!(options.core, Core::Native);
        assert_eq!(options.threshold, 1.0);
        assert_eq!(options.temperature, 0.0);
        assert!(options.polish);
        assert_eq!(options.max_charge_carriers, None);
        assert_eq!(options.closed_correction, ClosedCorrection::Combinatorial);
        assert_eq!(options.solver, SolverSettings::default());
    }

    #[test]
    fn build_fails_without_core() {
        assert_eq!(
            SolveOptionsBuilder::new().build(),
            Err(ConfigError::MissingParameter("core"))
        );
    }

    #[test]
    fn build_rejects_threshold_outside_unit_interval() {
        let result = SolveOptionsBuilder::new()
            .core(Core::Reference)
            .threshold(1.5)
            .build();
        assert_eq!(result, Err(ConfigError::InvalidThreshold(1.5)));
    }

    #[test]
    fn build_rejects_negative_or_infinite_temperature() {
        let negative = SolveOptionsBuilder::new()
            .core(Core::Reference)
            .temperature(-1.0)
            .build();
        assert_eq!(negative, Err(ConfigError::InvalidTemperature(-1.0)));

        let infinite = SolveOptionsBuilder::new()
            .core(Core::Reference)
            .temperature(f64::INFINITY)
            .build();
        assert!(matches!(infinite, Err(ConfigError::InvalidTemperature(_))));
    }

    #[test]
    fn build_rejects_invalid_solver_settings() {
        let settings = SolverSettings {
            alpha: 2.5,
            ..SolverSettings::default()
        };
        let result = SolveOptionsBuilder::new()
            .core(Core::Native)
            .solver_settings(settings)
            .build();
        assert_eq!(
            result,
            Err(ConfigError::InvalidSolverSetting {
                name: "alpha",
                value: 2.5
            })
        );
    }

    #[test]
    fn closed_correction_parses_case_insensitively() {
        assert_eq!(
            "Branching".parse::<ClosedCorrection>(),
            Ok(ClosedCorrection::Branching)
        );
        assert_eq!(
            "EXACT".parse::<ClosedCorrection>(),
            Ok(ClosedCorrection::Combinatorial)
        );
        assert!("greedy".parse::<ClosedCorrection>().is_err());
    }
}
