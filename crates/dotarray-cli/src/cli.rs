use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "dotarray developers",
    version,
    about = "dotarray CLI - Ground-state charge configurations of quantum-dot arrays over gate-voltage sweeps.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute ground-state occupations for every gate-voltage vector of a CSV file.
    Solve(SolveArgs),
    /// Print the Maxwell capacitance matrices of a model and its suggested threshold.
    Model(ModelArgs),
    /// Compute the gate voltages that centre the array on a target occupation.
    OptimalVg(OptimalVgArgs),
}

/// Arguments for the `solve` subcommand.
#[derive(Args, Debug)]
pub struct SolveArgs {
    // --- Core Arguments ---
    /// Path to the model file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub model: PathBuf,

    /// CSV file with one gate-voltage vector per row.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// CSV file the occupations are written to, one row per input row.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    // --- Solver Overrides ---
    /// Solve a closed array holding exactly this many charges.
    /// Without it (and without `solver.n-charge` in the model file) the array is open.
    #[arg(long, value_name = "INT")]
    pub closed: Option<u32>,

    /// Backend: rust (r), jax (j), brute_force (jax_brute_force, b) or python (p).
    #[arg(long, value_name = "NAME")]
    pub core: Option<String>,

    /// Branching threshold of the integer correction, in [0, 1].
    #[arg(short, long, value_name = "FLOAT")]
    pub threshold: Option<f64>,

    /// Temperature of the thermal average; 0 reports the hard minimum.
    #[arg(short = 'T', long, value_name = "FLOAT")]
    pub temperature: Option<f64>,

    /// Maximum number of charges on any single dot.
    #[arg(long, value_name = "INT")]
    pub max_charge_carriers: Option<u32>,

    /// Closed-array correction strategy: combinatorial or branching.
    #[arg(long, value_name = "NAME")]
    pub closed_correction: Option<String>,

    /// Override `solver.polish` from the model file.
    #[command(flatten)]
    pub polish: PolishMode,

    /// Set a specific configuration value, overriding the model file.
    /// Can be used multiple times. Example: -S solver.qp.max-iterations=8000
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// A group to handle mutually exclusive boolean flags for polishing the relaxed solution.
#[derive(Args, Debug, Clone, Copy, Default)]
#[group(required = false, multiple = false)]
pub struct PolishMode {
    /// Polish the relaxed solution with an exact solve on the guessed active set.
    #[arg(long)]
    pub polish: bool,
    /// Report the relaxed solution of the iterative solver as is.
    #[arg(long)]
    pub no_polish: bool,
}

impl PolishMode {
    pub fn as_option(&self) -> Option<bool> {
        match (self.polish, self.no_polish) {
            (true, false) => Some(true),
            (false, true) => Some(false),
            _ => None,
        }
    }
}

/// Arguments for the `model` subcommand.
#[derive(Args, Debug)]
pub struct ModelArgs {
    /// Path to the model file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub model: PathBuf,
}

/// Arguments for the `optimal-vg` subcommand.
#[derive(Args, Debug)]
pub struct OptimalVgArgs {
    /// Path to the model file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub model: PathBuf,

    /// Target occupation, one comma-separated value per dot (e.g. 0.5,1.5).
    #[arg(short, long, required = true, value_name = "LIST", allow_hyphen_values = true)]
    pub n: String,

    /// Relative cutoff below which singular values are discarded.
    #[arg(long, value_name = "FLOAT", default_value_t = 1e-3)]
    pub rcond: f64,
}
