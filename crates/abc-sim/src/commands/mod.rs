pub mod calibrate;
pub mod classic;
pub mod resume;
pub mod run;

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use abc_mcmc::RunConfig;
use clap::Args;
use serde::Serialize;

/// Options shared by every subcommand.
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// YAML configuration describing the run.
    #[arg(long)]
    pub config: PathBuf,
    /// Output directory, overriding `output.run_directory`.
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Master seed, overriding `seed_policy.master_seed`.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Worker count, overriding `workers`.
    #[arg(long)]
    pub workers: Option<usize>,
}

/// Loads the YAML config and applies command-line overrides.
pub fn load_config(args: &CommonArgs) -> Result<RunConfig, Box<dyn Error>> {
    let text = fs::read_to_string(&args.config)?;
    let mut config = RunConfig::from_yaml(&text)?;
    if let Some(out) = &args.out {
        config.output.run_directory = Some(out.clone());
    }
    if let Some(seed) = args.seed {
        config.seed_policy.master_seed = seed;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    config.validate()?;
    Ok(config)
}

/// Writes `value` as pretty JSON into the run directory, or to stdout when
/// the run has none.
pub fn emit_json<T: Serialize>(config: &RunConfig, name: &str, value: &T) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(value)?;
    match config.output.run_directory.as_deref() {
        Some(dir) => write_file(dir, name, &json),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

fn write_file(dir: &Path, name: &str, contents: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(dir)?;
    fs::write(dir.join(name), contents)?;
    Ok(())
}

/// Writes the effective configuration, overrides applied, next to the run
/// artefacts.
pub fn archive_config(config: &RunConfig) -> Result<(), Box<dyn Error>> {
    match config.output.run_directory.as_deref() {
        Some(dir) => write_file(dir, "config.yaml", &serde_yaml::to_string(config)?),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = "work:\n  case: identity\n  reference: [0.5]\nlimits:\n  - [0.0, 1.0]\n";

    #[test]
    fn archived_config_carries_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        fs::write(&path, CONFIG).unwrap();
        let out = dir.path().join("run");
        let args = CommonArgs {
            config: path,
            out: Some(out.clone()),
            seed: Some(99),
            workers: Some(3),
        };

        let config = load_config(&args).unwrap();
        archive_config(&config).unwrap();

        let archived = RunConfig::from_yaml(&fs::read_to_string(out.join("config.yaml")).unwrap()).unwrap();
        assert_eq!(archived, config);
        assert_eq!(archived.seed_policy.master_seed, 99);
        assert_eq!(archived.workers, 3);
        assert_eq!(archived.output.run_directory.as_deref(), Some(out.as_path()));
    }

    #[test]
    fn archive_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("taken");
        fs::write(&blocker, "not a directory").unwrap();
        let mut config = RunConfig::from_yaml(CONFIG).unwrap();
        config.output.run_directory = Some(blocker);
        assert!(archive_config(&config).is_err());
    }
}
