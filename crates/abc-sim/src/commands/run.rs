use std::error::Error;

use clap::Args;
use tracing::info;

use super::{archive_config, emit_json, load_config, CommonArgs};

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args.common)?;
    let summary = abc_mcmc::run(&config)?;
    info!(
        variant = %summary.variant,
        samples = summary.samples.len(),
        eps = summary.context.eps,
        "run complete"
    );
    emit_json(&config, "summary.json", &summary)?;
    archive_config(&config)?;
    Ok(())
}
