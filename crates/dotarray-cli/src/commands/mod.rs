pub mod model;
pub mod optimal_vg;
pub mod solve;
