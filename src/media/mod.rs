//! Media tool abstraction
//!
//! The only part of the crate that knows an external media processor's
//! command-line surface. Every other component speaks in the semantic
//! operations of [`MediaTool`]; a second backend could be swapped in without
//! touching the rest of the pipeline.

pub mod ffmpeg;

pub use ffmpeg::FfmpegTool;

use std::path::Path;

use async_trait::async_trait;

use crate::error::ReelCutResult;

/// Container-level facts about a media file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Video frame rate
    pub fps: f64,
    /// Total video frames
    pub frame_count: u64,
}

impl ProbeInfo {
    /// Length of one frame period in seconds
    pub fn frame_period(&self) -> f64 {
        if self.fps > 0.0 {
            1.0 / self.fps
        } else {
            0.0
        }
    }
}

/// Frame-accurate operations over an external media processor.
///
/// Operations block until the external process exits. None of them retry;
/// retrying is the orchestrator's decision.
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Inspect a media file. Fails with `MediaCorrupt` on unreadable input.
    async fn probe(&self, path: &Path) -> ReelCutResult<ProbeInfo>;

    /// Re-encode the span `[start, end)` of `input` into `output`, seeking
    /// precisely before the input. With `audio_fade` set, a short linear
    /// audio fade-in is applied at the start and a fade-out before the end.
    async fn trim(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        end: f64,
        audio_fade: bool,
    ) -> ReelCutResult<()>;

    /// Concatenate inputs via a concat demuxer, re-encoding to normalise
    /// timebase and codec parameters. The output audio track is contiguous.
    async fn concat_reencode(&self, inputs: &[&Path], output: &Path) -> ReelCutResult<()>;

    /// Run a declared filter graph over the inputs, mapping the named output
    /// pads into `output`. Error-propagates the tool's stderr tail.
    async fn exec_filter_graph(
        &self,
        inputs: &[&Path],
        graph: &str,
        mappings: &[&str],
        output: &Path,
    ) -> ReelCutResult<()>;

    /// Render a mono 16 kHz WAV of the input's audio, for transcription
    async fn extract_audio(&self, input: &Path, output: &Path) -> ReelCutResult<()>;
}
