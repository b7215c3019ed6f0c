//! # dotarray Core Library
//!
//! Ground-state charge configurations of capacitively coupled quantum-dot arrays.
//!
//! For every gate-voltage vector of a sweep, the library finds the integer dot occupation
//! that minimizes the electrostatic free energy `F(n) = (n - v)ᵀ Cdd⁻¹ (n - v)`, where
//! `v = Cgd · vg`, either with an unconstrained total charge (open array) or with a fixed
//! number of charges (closed array). A finite temperature replaces the hard minimum with a
//! Boltzmann-weighted average over the candidate configurations.
//!
//! ## Architecture
//!
//! - **[`core`]: The Foundation.** Stateless data and mathematics: the capacitance model,
//!   the free-energy form and the generators of candidate charge configurations.
//!
//! - **[`engine`]: The Logic Core.** The continuous relaxation (a warm-started quadratic
//!   program), the integer correction around the relaxed solution, and the batch loop that
//!   ties both together.
//!
//! - **[`backends`]: Execution Strategies.** Interchangeable implementations of the batch
//!   solver (native parallel, vectorized, brute force, sequential reference), selected through
//!   the [`backends::Core`] enumeration.
//!
//! - **[`workflows`]: The Public API.** Shape validation, dispatch and physical-consistency
//!   checks over arbitrary-rank voltage batches.

pub mod backends;
pub mod core;
pub mod engine;
pub mod workflows;
