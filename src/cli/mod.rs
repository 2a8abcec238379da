//! CLI module for ReelCut
//!
//! This module handles command-line argument parsing and command execution.

pub mod args;
pub mod commands;

use clap::{Parser, Subcommand};

use self::args::{AssembleArgs, NarrateArgs, ProbeArgs, TranscribeArgs};

/// ReelCut highlight assembler
///
/// Builds a single broadcast-ready MP4 from a rundown of per-play clips,
/// word-level commentary selections, inning transitions, and an optional
/// title card.
#[derive(Parser)]
#[command(name = "reelcut")]
#[command(about = "ReelCut - baseball highlight reel assembly")]
#[command(version)]
pub struct Cli {
    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Assemble a rundown into a highlight reel
    Assemble(AssembleArgs),
    /// Assemble the synced-narration variant from a narration manifest
    Narrate(NarrateArgs),
    /// Transcribe a clip's commentary with word-level timestamps
    Transcribe(TranscribeArgs),
    /// Inspect a local media file
    Probe(ProbeArgs),
}
