//! Pipeline configuration
//!
//! All tunables recognised by the assembly pipeline, loadable from a TOML
//! file and overridable from the CLI. Defaults match broadcast output:
//! 30 fps H.264 with a 10-frame dissolve between timeline items.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReelCutError, ReelCutResult};

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Max parallel per-clip tasks
    pub concurrency: usize,
    /// Dissolve length in frames
    pub crossfade_frames: u32,
    /// Output frame rate
    pub fps: u32,
    /// Buffer added around each selected run, in seconds
    pub segment_buffer_seconds: f64,
    /// Intervals closer than this after buffering are merged, in seconds
    pub merge_gap_seconds: f64,
    /// Linear audio fade applied at interval boundaries, in milliseconds
    pub boundary_fade_ms: u32,
    /// Transcription cache time-to-live, in days
    pub transcript_ttl_days: i64,
    /// Soft cap on cache entries before eviction
    pub cache_max_entries: usize,
    /// Ordered provider list; the first is primary, the rest fall back
    pub transcription_providers: Vec<String>,
    /// Original-audio gain inside a narration window
    pub ducking_floor: f64,
    /// Original-audio gain outside narration windows
    pub ducking_ceiling: f64,
    /// Gain applied to each narration track
    pub narration_gain: f64,
    /// Gain applied after the final mix
    pub final_gain: f64,
    /// Parent of per-run scratch directories
    pub working_dir_root: PathBuf,
    /// Directory holding persistent transcription cache entries
    pub cache_dir: PathBuf,
    /// Encoder preset (speed vs size balance)
    pub preset: String,
    /// Constant rate factor for the H.264 encoder
    pub crf: u8,
    /// ffmpeg binary
    pub ffmpeg_path: PathBuf,
    /// ffprobe binary
    pub ffprobe_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            crossfade_frames: 10,
            fps: 30,
            segment_buffer_seconds: 0.15,
            merge_gap_seconds: 0.5,
            boundary_fade_ms: 50,
            transcript_ttl_days: 7,
            cache_max_entries: 50,
            transcription_providers: vec!["whisper".to_string(), "deepgram".to_string()],
            ducking_floor: 0.2,
            ducking_ceiling: 0.7,
            narration_gain: 2.0,
            final_gain: 1.5,
            working_dir_root: std::env::temp_dir().join("reelcut"),
            cache_dir: std::env::temp_dir().join("reelcut-transcripts"),
            preset: "medium".to_string(),
            crf: 23,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file, falling back to defaults for any
    /// field the file omits
    pub fn load(path: &Path) -> ReelCutResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ReelCutError::Config {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ReelCutError::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values a user can plausibly get wrong
    pub fn validate(&self) -> ReelCutResult<()> {
        if self.concurrency == 0 {
            return Err(ReelCutError::Config {
                message: "concurrency must be at least 1".to_string(),
            });
        }
        if self.fps == 0 {
            return Err(ReelCutError::Config {
                message: "fps must be at least 1".to_string(),
            });
        }
        if self.crf > 51 {
            return Err(ReelCutError::Config {
                message: format!("crf {} is invalid (must be 0-51)", self.crf),
            });
        }
        if self.segment_buffer_seconds < 0.0 {
            return Err(ReelCutError::Config {
                message: "segment_buffer_seconds cannot be negative".to_string(),
            });
        }
        if self.transcription_providers.is_empty() {
            return Err(ReelCutError::Config {
                message: "transcription_providers cannot be empty".to_string(),
            });
        }
        if self.ducking_floor > self.ducking_ceiling {
            return Err(ReelCutError::Config {
                message: "ducking_floor cannot exceed ducking_ceiling".to_string(),
            });
        }
        Ok(())
    }

    /// Crossfade length in seconds at the configured frame rate
    pub fn crossfade_seconds(&self) -> f64 {
        f64::from(self.crossfade_frames) / f64::from(self.fps)
    }
}
