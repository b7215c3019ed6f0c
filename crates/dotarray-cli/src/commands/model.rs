use crate::cli::ModelArgs;
use crate::config::FileConfig;
use crate::error::Result;
use tracing::info;

pub fn run(args: ModelArgs) -> Result<()> {
    info!("Loading model from {:?}", &args.model);
    let model = FileConfig::from_file(&args.model)?.model.to_model()?;

    println!("Dots: {}, gates: {}", model.n_dot(), model.n_gate());
    println!("Cdd (Maxwell):{:.6}", model.cdd());
    println!("Cdd⁻¹:{:.6}", model.cdd_inv());
    println!("Cgd:{:.6}", model.cgd());
    println!("Suggested threshold: {:.4}", model.suggested_threshold());

    Ok(())
}
