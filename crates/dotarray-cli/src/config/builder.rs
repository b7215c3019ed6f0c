use super::file::{FileConfig, FileQpConfig, FileSolverConfig};
use super::models::AppConfig;
use crate::cli::SolveArgs;
use crate::error::{CliError, Result};
use dotarray::backends::Core;
use dotarray::engine::config::{ClosedCorrection, SolveOptionsBuilder, SolverSettings};
use std::str::FromStr;

/// Merges the model file, `-S` overrides and explicit flags into a validated configuration.
///
/// Flags win over `-S` values, which win over the file; anything left unset falls back to the
/// library defaults, with `rust` as the default core.
pub fn build_config(args: &SolveArgs) -> Result<AppConfig> {
    let file_config = FileConfig::from_file(&args.model)?;
    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let model = file_config.model.to_model()?;
    let solver_file = file_config.solver.take().unwrap_or_default();

    let core = match args.core.as_deref().or(solver_file.core.as_deref()) {
        Some(name) => Core::from_str(name).map_err(|e| CliError::Config(e.to_string()))?,
        None => Core::Native,
    };
    let closed_correction = match args
        .closed_correction
        .as_deref()
        .or(solver_file.closed_correction.as_deref())
    {
        Some(name) => {
            ClosedCorrection::from_str(name).map_err(|e| CliError::Config(e.to_string()))?
        }
        None => ClosedCorrection::default(),
    };

    let mut builder = SolveOptionsBuilder::new()
        .core(core)
        .closed_correction(closed_correction)
        .max_charge_carriers(args.max_charge_carriers.or(solver_file.max_charge_carriers))
        .solver_settings(merge_qp(solver_file.qp));

    if let Some(threshold) = args.threshold.or(solver_file.threshold) {
        builder = builder.threshold(threshold);
    }
    if let Some(temperature) = args.temperature.or(solver_file.temperature) {
        builder = builder.temperature(temperature);
    }
    if let Some(polish) = args.polish.as_option().or(solver_file.polish) {
        builder = builder.polish(polish);
    }

    let options = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(AppConfig {
        model,
        options,
        n_charge: args.closed.or(solver_file.n_charge),
    })
}

fn merge_qp(file_val: Option<FileQpConfig>) -> SolverSettings {
    let file_val = file_val.unwrap_or_default();
    let defaults = SolverSettings::default();
    SolverSettings {
        max_iterations: file_val.max_iterations.unwrap_or(defaults.max_iterations),
        eps_abs: file_val.eps_abs.unwrap_or(defaults.eps_abs),
        eps_rel: file_val.eps_rel.unwrap_or(defaults.eps_rel),
        rho: file_val.rho.unwrap_or(defaults.rho),
        sigma: file_val.sigma.unwrap_or(defaults.sigma),
        alpha: file_val.alpha.unwrap_or(defaults.alpha),
        warm_start: file_val.warm_start.unwrap_or(defaults.warm_start),
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value))
    })
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };
        let key = key.trim();

        let solver: &mut FileSolverConfig = config.solver.get_or_insert_with(Default::default);
        if let Some(qp_key) = key.strip_prefix("solver.qp.") {
            let qp = solver.qp.get_or_insert_with(Default::default);
            match qp_key {
                "max-iterations" => {
                    qp.max_iterations = Some(parse_value(key, value_str, "integer")?)
                }
                "eps-abs" => qp.eps_abs = Some(parse_value(key, value_str, "float")?),
                "eps-rel" => qp.eps_rel = Some(parse_value(key, value_str, "float")?),
                "rho" => qp.rho = Some(parse_value(key, value_str, "float")?),
                "sigma" => qp.sigma = Some(parse_value(key, value_str, "float")?),
                "alpha" => qp.alpha = Some(parse_value(key, value_str, "float")?),
                "warm-start" => qp.warm_start = Some(parse_value(key, value_str, "boolean")?),
                _ => return Err(unsupported_key(key)),
            }
            continue;
        }

        match key {
            "solver.core" => solver.core = Some(value_str.trim().to_string()),
            "solver.threshold" => solver.threshold = Some(parse_value(key, value_str, "float")?),
            "solver.temperature" => {
                solver.temperature = Some(parse_value(key, value_str, "float")?)
            }
            "solver.polish" => solver.polish = Some(parse_value(key, value_str, "boolean")?),
            "solver.max-charge-carriers" => {
                solver.max_charge_carriers = Some(parse_value(key, value_str, "integer")?)
            }
            "solver.closed-correction" => {
                solver.closed_correction = Some(value_str.trim().to_string())
            }
            "solver.n-charge" => solver.n_charge = Some(parse_value(key, value_str, "integer")?),
            _ => return Err(unsupported_key(key)),
        }
    }
    Ok(config)
}

fn unsupported_key(key: &str) -> CliError {
    CliError::Config(format!(
        "Unsupported configuration key for --set: '{}'",
        key
    ))
}
