use crate::cli::OptimalVgArgs;
use crate::config::FileConfig;
use crate::error::{CliError, Result};
use crate::utils::parser;
use itertools::Itertools;
use nalgebra::DVector;
use tracing::info;

pub fn run(args: OptimalVgArgs) -> Result<()> {
    let model = FileConfig::from_file(&args.model)?.model.to_model()?;
    let target = parser::parse_vector(&args.n).map_err(|e| CliError::Argument(e.to_string()))?;

    info!(rcond = args.rcond, "Computing gate voltages for occupation {:?}", target);
    let vg = model.optimal_vg(&DVector::from_vec(target), args.rcond)?;

    println!("{}", format_vector(&vg));
    Ok(())
}

fn format_vector(v: &DVector<f64>) -> String {
    v.iter().map(|x| format!("{x:.6}")).join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_model(dir: &std::path::Path) -> std::path::PathBuf {
        let path = dir.join("model.toml");
        fs::write(
            &path,
            "[model]\ncdd = [[0.0, 0.1], [0.1, 0.0]]\ncgd = [[1.0, 0.2], [0.2, 1.0]]\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn formats_components_with_fixed_precision() {
        let v = DVector::from_vec(vec![0.5, -1.25]);
        assert_eq!(format_vector(&v), "0.500000,-1.250000");
    }

    #[test]
    fn solves_for_a_valid_target() {
        let dir = tempdir().unwrap();
        let args = OptimalVgArgs {
            model: write_model(dir.path()),
            n: "0.5,1.5".to_string(),
            rcond: 1e-3,
        };
        run(args).unwrap();
    }

    #[test]
    fn wrong_target_length_is_a_model_error() {
        let dir = tempdir().unwrap();
        let args = OptimalVgArgs {
            model: write_model(dir.path()),
            n: "0.5,1.5,2.5".to_string(),
            rcond: 1e-3,
        };
        assert!(matches!(run(args), Err(CliError::Model(_))));
    }

    #[test]
    fn unparsable_target_is_an_argument_error() {
        let dir = tempdir().unwrap();
        let args = OptimalVgArgs {
            model: write_model(dir.path()),
            n: "half,one".to_string(),
            rcond: 1e-3,
        };
        assert!(matches!(run(args), Err(CliError::Argument(_))));
    }
}
