use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    calibrate::{self, CalibrateArgs},
    classic::{self, ClassicArgs},
    resume::{self, ResumeArgs},
    run::{self, RunArgs},
};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "abc-sim", about = "ABC calibration and MCMC sampling CLI")]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Calibrate and run the MCMC chains.
    Run(RunArgs),
    /// Run only the two calibration rounds.
    Calibrate(CalibrateArgs),
    /// Run the chains from a stored calibration context.
    Resume(ResumeArgs),
    /// Classic rejection ABC over draws from the initial box.
    Classic(ClassicArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .init();

    match cli.command {
        Command::Run(args) => run::run(&args),
        Command::Calibrate(args) => calibrate::run(&args),
        Command::Resume(args) => resume::run(&args),
        Command::Classic(args) => classic::run(&args),
    }
}
