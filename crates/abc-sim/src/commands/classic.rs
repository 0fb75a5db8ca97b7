use std::error::Error;

use clap::Args;
use tracing::info;

use super::{archive_config, load_config, CommonArgs};

#[derive(Args, Debug)]
pub struct ClassicArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Number of draws, overriding `classic.samples`.
    #[arg(long)]
    pub samples: Option<usize>,
}

pub fn run(args: &ClassicArgs) -> Result<(), Box<dyn Error>> {
    let mut config = load_config(&args.common)?;
    if let Some(samples) = args.samples {
        config.classic.samples = samples;
    }
    let outcome = abc_mcmc::classic(&config)?;
    let best = outcome
        .samples
        .distances
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    info!(
        samples = outcome.samples.len(),
        best_distance = best,
        files = outcome.artefacts.len(),
        "classic abc complete"
    );
    if outcome.artefacts.is_empty() {
        println!("{}", serde_json::to_string_pretty(&outcome.samples)?);
    }
    archive_config(&config)?;
    Ok(())
}
