use crate::cli::SolveArgs;
use crate::config::build_config;
use crate::data;
use crate::error::{CliError, Result};
use crate::utils::progress::SweepProgress;
use dotarray::engine::progress::ProgressReporter;
use dotarray::workflows;
use ndarray::Ix2;
use tracing::info;

pub fn run(args: SolveArgs) -> Result<()> {
    info!("Merging configuration from model file and CLI arguments...");
    let config = build_config(&args)?;

    info!("Loading gate voltages from {:?}", &args.input);
    let vg = data::read_voltages(&args.input)?;
    let n_points = vg.nrows();

    let progress = SweepProgress::new();
    let reporter = ProgressReporter::with_callback(progress.callback());

    match config.n_charge {
        Some(n_charge) => println!(
            "Solving {} closed ground state(s) with {} charge(s) on the '{}' core...",
            n_points, n_charge, config.options.core
        ),
        None => println!(
            "Solving {} open ground state(s) on the '{}' core...",
            n_points, config.options.core
        ),
    }

    let vg = vg.into_dyn();
    let occupations = match config.n_charge {
        Some(n_charge) => workflows::ground_state_closed(
            vg.view(),
            n_charge,
            &config.model,
            &config.options,
            &reporter,
        )?,
        None => workflows::ground_state_open(vg.view(), &config.model, &config.options, &reporter)?,
    };
    let occupations = occupations
        .into_dimensionality::<Ix2>()
        .map_err(|e| CliError::Other(anyhow::anyhow!("Unexpected solution shape: {}", e)))?;

    info!("Writing occupations to {:?}", &args.output);
    data::write_occupations(&args.output, occupations.view())?;
    println!(
        "✓ {} occupation vector(s) written to: {}",
        occupations.nrows(),
        args.output.display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::PolishMode;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn args(dir: &std::path::Path, closed: Option<u32>, core: &str) -> SolveArgs {
        fs::write(
            dir.join("model.toml"),
            "[model]\ncdd = [[0.0, 0.1], [0.1, 0.0]]\ncgd = [[1.0, 0.2], [0.2, 1.0]]\n",
        )
        .unwrap();
        fs::write(dir.join("vg.csv"), "vg0,vg1\n1.0,0.0\n0.0,1.0\n2.0,0.5\n").unwrap();
        SolveArgs {
            model: dir.join("model.toml"),
            input: dir.join("vg.csv"),
            output: dir.join("n.csv"),
            closed,
            core: Some(core.to_string()),
            threshold: None,
            temperature: None,
            max_charge_carriers: Some(4),
            closed_correction: None,
            polish: PolishMode::default(),
            set_values: vec![],
        }
    }

    #[test]
    fn closed_solve_writes_one_row_per_voltage() {
        let dir = tempdir().unwrap();
        let args = args(dir.path(), Some(1), "rust");
        let output: PathBuf = args.output.clone();
        run(args).unwrap();

        let content = fs::read_to_string(output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["n0,n1", "1,0", "0,1", "1,0"]);
    }

    #[test]
    fn open_solve_runs_on_every_core() {
        for core in ["rust", "jax", "brute_force", "python"] {
            let dir = tempdir().unwrap();
            let args = args(dir.path(), None, core);
            let output = args.output.clone();
            run(args).unwrap();

            let content = fs::read_to_string(output).unwrap();
            assert_eq!(content.lines().count(), 4, "{core}");
        }
    }

    #[test]
    fn infeasible_charge_is_reported() {
        let dir = tempdir().unwrap();
        let args = args(dir.path(), Some(9), "rust");
        assert!(matches!(run(args), Err(CliError::Core(_))));
    }
}
