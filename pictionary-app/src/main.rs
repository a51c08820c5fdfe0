mod app;
mod client;

pub use app::App;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pictionary", version, about = "Two-player drawing and guessing experiment")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run simulated pairs through every phase and export the trials
    Simulate {
        #[arg(long, default_value_t = 2)]
        groups: u32,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value = "pictionary_wait_for_complete")]
        preset: String,
        /// JSON config file; overrides --preset
        #[arg(long)]
        config: Option<PathBuf>,
        /// Probability that a simulated responder guesses right
        #[arg(long, default_value_t = 0.8)]
        accuracy: f64,
        /// Write the CSV here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the named session configurations
    Presets,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = App::new(cli)?;
    app.run()?;

    Ok(())
}
