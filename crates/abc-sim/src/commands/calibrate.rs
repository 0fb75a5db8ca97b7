use std::error::Error;

use abc_mcmc::{build_work_function, calibrate_with};
use clap::Args;
use tracing::info;

use super::{archive_config, emit_json, load_config, CommonArgs};

#[derive(Args, Debug)]
pub struct CalibrateArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

pub fn run(args: &CalibrateArgs) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args.common)?;
    let work = build_work_function(&config.work, config.limits.len())?;
    let outcome = calibrate_with(&config, &work)?;
    info!(
        eps1 = outcome.report.eps1,
        eps2 = outcome.report.eps2,
        accepted = outcome.report.accepted,
        warnings = outcome.report.warnings.len(),
        "calibration complete"
    );
    emit_json(&config, "calibration_report.json", &outcome.report)?;
    archive_config(&config)?;
    Ok(())
}
