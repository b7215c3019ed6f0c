//! # Workflows Module
//!
//! The public entry points of the library.
//!
//! [`ground_state::ground_state_open`] and [`ground_state::ground_state_closed`] accept gate
//! voltages of any rank, check their shape against the capacitance model, dispatch the
//! flattened batch to the backend selected in the options, verify that every result is
//! physically consistent and hand back occupations of the matching shape.

pub mod ground_state;

pub use ground_state::{ground_state_closed, ground_state_open};
