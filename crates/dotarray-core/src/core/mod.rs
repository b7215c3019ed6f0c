//! # Core Module
//!
//! Stateless building blocks shared by every solver backend.
//!
//! - **Capacitance Model** ([`capacitance`]) - Validated `Cdd`, `Cdd⁻¹` and `Cgd` matrices,
//!   Maxwell conversion and derived quantities such as the optimal gate voltages
//! - **Free Energy** ([`energy`]) - The quadratic form scoring a charge configuration and the
//!   hard/thermal selection over a candidate set
//! - **Configuration Generators** ([`configurations`]) - Enumeration of integer charge
//!   configurations for the open and closed regimes
//! - **Transitions** ([`transitions`]) - Detection of charge transitions in 2D occupation maps
//!
//! No other module evaluates the free energy on its own; everything goes through
//! [`energy::FreeEnergy`].

pub mod capacitance;
pub mod configurations;
pub mod energy;
pub mod transitions;

use nalgebra::DVector;

/// An ordered list of vectors (gate voltages, or dot occupations), one per batch point.
pub type VectorList = Vec<DVector<f64>>;
