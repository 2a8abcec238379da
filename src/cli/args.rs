//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;

/// Arguments for the assemble command
#[derive(Args, Debug)]
pub struct AssembleArgs {
    /// Rundown JSON file
    #[arg(short, long)]
    pub rundown: PathBuf,

    /// Output MP4 path
    #[arg(short, long)]
    pub output: PathBuf,

    /// Directory of pre-rendered transition graphics ({top|bot}-{1..9}.mp4)
    #[arg(short, long)]
    pub transitions: Option<PathBuf>,

    /// Pipeline configuration TOML
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the narrate command
#[derive(Args, Debug)]
pub struct NarrateArgs {
    /// Narration manifest JSON (clips, analyses, narration segments)
    #[arg(short, long)]
    pub manifest: PathBuf,

    /// Output MP4 path
    #[arg(short, long)]
    pub output: PathBuf,

    /// Pipeline configuration TOML
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the transcribe command
#[derive(Args, Debug)]
pub struct TranscribeArgs {
    /// Clip source URL
    #[arg(short, long)]
    pub url: String,

    /// Pipeline configuration TOML
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the probe command
#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Input media file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Pipeline configuration TOML
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
