#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use link_preview::logging;
use link_preview::settings::{JsonFileStore, Settings, SettingsStore};
use link_preview::simulate::{Script, Simulation};

/// Hover link preview engine
#[derive(Parser)]
#[command(name = "link-preview", version)]
#[command(about = "Replay link preview sessions and inspect settings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON session script and print the transcript
    Simulate {
        /// Script to replay
        script: PathBuf,

        /// Settings file to start from instead of the script's own settings
        #[arg(long)]
        settings: Option<PathBuf>,
    },

    /// Print the effective settings
    Settings {
        /// Only print where the settings file lives
        #[arg(long)]
        path: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log = logging::init()?;

    match cli.command {
        Commands::Simulate { script, settings } => {
            let mut script = Script::from_file(&script)?;
            if let Some(path) = settings {
                let raw = JsonFileStore::new(&path)
                    .load()
                    .with_context(|| format!("Failed to load settings from {}", path.display()))?;
                // The session runs on an in-memory copy; the file is never written
                script.settings = raw;
            }

            let transcript = Simulation::run(&script, Some(&log))?;
            info!(entries = transcript.len(), "Simulation finished");
            println!("{}", serde_json::to_string_pretty(&transcript)?);
        }
        Commands::Settings { path } => {
            let store = JsonFileStore::new(JsonFileStore::default_path());
            if path {
                println!("{}", store.path().display());
                return Ok(());
            }
            let raw = store.load().context("Failed to load settings")?;
            println!("{}", serde_json::to_string_pretty(&Settings::from_raw(&raw))?);
        }
    }

    Ok(())
}
