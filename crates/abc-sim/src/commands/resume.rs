use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use tracing::info;

use super::{emit_json, load_config, CommonArgs};

#[derive(Args, Debug)]
pub struct ResumeArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Calibration context written by a previous run (`calibration/context.json`).
    #[arg(long)]
    pub context: PathBuf,
}

pub fn run(args: &ResumeArgs) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args.common)?;
    let summary = abc_mcmc::resume(&config, &args.context)?;
    info!(
        variant = %summary.variant,
        samples = summary.samples.len(),
        "resumed run complete"
    );
    emit_json(&config, "summary.json", &summary)
}
