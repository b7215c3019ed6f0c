use dotarray::core::capacitance::CapacitanceModel;
use dotarray::engine::config::SolveOptions;

pub struct AppConfig {
    pub model: CapacitanceModel,
    pub options: SolveOptions,
    /// `Some` for a closed array holding exactly this many charges.
    pub n_charge: Option<u32>,
}
