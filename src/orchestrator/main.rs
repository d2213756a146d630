use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use topology_deployer::orchestrator::settings::{create_sample_config, Settings};

#[derive(Debug, Parser)]
#[command(name = "topology-deployer", about = "Topology deployment configuration tooling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a configuration file populated with the defaults
    SampleConfig { path: PathBuf },
    /// Load and validate configuration, then print the effective values
    CheckConfig { path: Option<PathBuf> },
}

fn main() -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "warn");
    }
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::SampleConfig { path } => {
            create_sample_config(&path)?;
            println!("Sample configuration written to: {}", path.display());
        }
        Command::CheckConfig { path } => {
            let settings = match path {
                Some(path) => Settings::load(Some(&path))?,
                None => Settings::new()?,
            };
            log::info!("Loaded settings: {settings:?}");

            let rendered =
                toml::to_string_pretty(&settings).context("Failed to render settings")?;
            println!("{rendered}");
            println!("artifact = {}", settings.artifact_path().display());
            println!("cluster config = {}", settings.serialized_cluster_config()?);
        }
    }

    Ok(())
}
