//! # Engine Module
//!
//! The numerical heart of the solver: everything between a validated voltage vector and the
//! integer charge configuration reported for it.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Validated solve options, the backend choice and the QP
//!   solver settings
//! - **Continuous Relaxation** ([`relaxer`]) - Warm-started OSQP solution of the box- and
//!   charge-constrained quadratic program, with optional polishing
//! - **Integer Correction** ([`corrector`]) - Floor/ceil branching around the relaxed solution
//!   and hard or thermal selection over the scored candidates
//! - **Batch Kernel** ([`batch`]) - Relax-then-correct for one regime, shared by the backends
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress reporting
//! - **Error Handling** ([`error`]) - The error type every public operation returns

pub mod batch;
pub mod config;
pub mod corrector;
pub mod error;
pub mod progress;
pub mod relaxer;
