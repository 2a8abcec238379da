//! ReelCut CLI
//!
//! Assembles broadcast-ready highlight reels from a rundown of per-play
//! clips with word-accurate commentary selections.
//!
//! # Usage
//!
//! ```bash
//! reelcut assemble --rundown rundown.json --output reel.mp4 --transitions ./transitions
//! reelcut narrate --manifest narration.json --output reel.mp4
//! reelcut transcribe --url "https://cdn.example.com/play.mp4"
//! reelcut probe --input reel.mp4
//! ```

use anyhow::Result;
use clap::Parser;
use tracing::info;

use reelcut::cli::{commands, Cli, Commands};

/// Main entry point for the ReelCut CLI application
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Parse command line arguments
    let cli = Cli::parse();

    // Execute the requested command
    match cli.command {
        Commands::Assemble(args) => {
            info!("Executing assemble command");
            commands::assemble(args).await?;
        }
        Commands::Narrate(args) => {
            info!("Executing narrate command");
            commands::narrate(args).await?;
        }
        Commands::Transcribe(args) => {
            info!("Executing transcribe command");
            commands::transcribe(args).await?;
        }
        Commands::Probe(args) => {
            info!("Executing probe command");
            commands::probe(args).await?;
        }
    }

    Ok(())
}
