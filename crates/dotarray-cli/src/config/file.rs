use crate::error::{CliError, Result};
use dotarray::core::capacitance::CapacitanceModel;
use nalgebra::DMatrix;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Contents of a TOML model file.
///
/// ```toml
/// [model]
/// cdd = [[0.0, 0.1], [0.1, 0.0]]
/// cgd = [[1.0, 0.2], [0.2, 1.0]]
///
/// [solver]
/// core = "rust"
/// threshold = 0.5
///
/// [solver.qp]
/// max-iterations = 8000
/// ```
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub model: FileModelConfig,
    pub solver: Option<FileSolverConfig>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileModelConfig {
    pub cdd: Vec<Vec<f64>>,
    pub cgd: Vec<Vec<f64>>,
    /// Whether `cdd` is already in Maxwell form. Otherwise it holds the raw interdot
    /// capacitances and the diagonal is derived from the row sums.
    #[serde(default)]
    pub maxwell: bool,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileSolverConfig {
    pub core: Option<String>,
    pub threshold: Option<f64>,
    pub temperature: Option<f64>,
    pub polish: Option<bool>,
    pub max_charge_carriers: Option<u32>,
    pub closed_correction: Option<String>,
    pub n_charge: Option<u32>,
    pub qp: Option<FileQpConfig>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileQpConfig {
    pub max_iterations: Option<usize>,
    pub eps_abs: Option<f64>,
    pub eps_rel: Option<f64>,
    pub rho: Option<f64>,
    pub sigma: Option<f64>,
    pub alpha: Option<f64>,
    pub warm_start: Option<bool>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading model file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}

impl FileModelConfig {
    pub fn to_model(&self) -> Result<CapacitanceModel> {
        let cdd = to_matrix("cdd", &self.cdd)?;
        let cgd = to_matrix("cgd", &self.cgd)?;
        let model = if self.maxwell {
            CapacitanceModel::new(cdd, cgd)?
        } else {
            CapacitanceModel::from_non_maxwell(cdd, cgd)?
        };
        debug!(
            n_dot = model.n_dot(),
            n_gate = model.n_gate(),
            "Capacitance model built."
        );
        Ok(model)
    }
}

fn to_matrix(name: &str, rows: &[Vec<f64>]) -> Result<DMatrix<f64>> {
    let n_cols = rows.first().map_or(0, Vec::len);
    if let Some(index) = rows.iter().position(|row| row.len() != n_cols) {
        return Err(CliError::Config(format!(
            "Row {} of `model.{}` has {} entries, expected {}",
            index,
            name,
            rows[index].len(),
            n_cols
        )));
    }
    Ok(DMatrix::from_row_iterator(
        rows.len(),
        n_cols,
        rows.iter().flatten().copied(),
    ))
}
