//! Synced narration: the alternative terminal assembly path
//!
//! Instead of preserving the original commentary, each clip is trimmed
//! around its action window, the trims are concatenated without crossfades
//! (so cumulative-offset math stays exact), and generated narration audio is
//! overlaid at positions computed relative to each clip's action peak. The
//! original audio bed is ducked while narration plays.

pub mod tts;

pub use tts::{ElevenLabsSynthesizer, SpeechSynthesizer};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ReelCutError, ReelCutResult};
use crate::media::MediaTool;
use crate::utils::time::format_seconds;

/// Seconds of context kept on both sides of the action window
const ACTION_WINDOW_BUFFER: f64 = 1.5;
/// A `before_action` narration ends this long before the peak
const BEFORE_ACTION_LEAD: f64 = 0.5;
/// An `after_action` narration starts this long after the peak
const AFTER_ACTION_DELAY: f64 = 1.0;
/// Ducking windows extend this far past the narration's end
const DUCK_RELEASE: f64 = 0.5;

/// Action timestamps for one clip, from the external vision analyser
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActionAnalysis {
    /// Seconds where the decisive action begins
    pub action_start: f64,
    /// The single moment the decisive event occurs
    pub action_peak: f64,
    /// Seconds where the action has resolved
    pub action_end: f64,
    /// The clip's full duration
    pub total_duration: f64,
}

impl ActionAnalysis {
    /// The span to keep: the action window widened by the context buffer,
    /// clamped to the clip bounds
    pub fn trim_window(&self) -> (f64, f64) {
        let start = (self.action_start - ACTION_WINDOW_BUFFER).max(0.0);
        let end = (self.action_end + ACTION_WINDOW_BUFFER).min(self.total_duration);
        (start, end)
    }
}

/// External vision analyser interface (consumed, not implemented here)
#[async_trait]
pub trait ActionAnalyzer: Send + Sync {
    async fn analyze(&self, video: &[u8], context: &str) -> ReelCutResult<ActionAnalysis>;
}

/// When a narration plays relative to its clip's action peak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrationTiming {
    BeforeAction,
    DuringAction,
    AfterAction,
    Bridge,
}

/// One narration audio segment to overlay
#[derive(Debug, Clone)]
pub struct NarrationSegment {
    /// Clip the narration belongs to
    pub clip_id: String,
    /// Local narration audio file
    pub audio_path: PathBuf,
    /// Narration audio duration in seconds
    pub duration: f64,
    pub timing: NarrationTiming,
}

/// A clip entering the narration path, with its analysis when available
#[derive(Debug, Clone)]
pub struct NarratedClip {
    pub clip_id: String,
    pub media_path: PathBuf,
    pub analysis: Option<ActionAnalysis>,
}

/// A clip that survived trimming, with its timeline bookkeeping
#[derive(Debug, Clone)]
struct PlacedClip {
    clip_id: String,
    trimmed_path: PathBuf,
    /// Where the trimmed clip begins on the final timeline
    start_in_final: f64,
    /// The action peak's position inside the trimmed clip
    action_peak_in_clip: f64,
}

/// Start time of a narration on the final timeline, clamped at 0
fn narration_start(
    start_in_final: f64,
    action_peak_in_clip: f64,
    timing: NarrationTiming,
    narration_duration: f64,
) -> f64 {
    let peak = start_in_final + action_peak_in_clip;
    let start = match timing {
        NarrationTiming::BeforeAction => peak - narration_duration - BEFORE_ACTION_LEAD,
        NarrationTiming::DuringAction => peak,
        NarrationTiming::AfterAction => peak + AFTER_ACTION_DELAY,
        NarrationTiming::Bridge => start_in_final,
    };
    start.max(0.0)
}

/// Build the ducking-and-overlay mix graph.
///
/// Input 0 is the concatenated timeline; inputs 1..=N are narration tracks.
/// The original audio passes through a time-varying gain that sits at
/// `ceiling` outside narration windows and drops to `floor` inside them;
/// each narration is delayed into position and boosted; everything is mixed
/// without renormalisation and a final gain is applied. The mix bus is
/// capped by a limiter so stacked narrations cannot clip the output.
pub fn build_mix_graph(
    windows: &[(f64, f64)],
    starts_ms: &[u64],
    floor: f64,
    ceiling: f64,
    narration_gain: f64,
    final_gain: f64,
) -> (String, Vec<String>) {
    let mut graph = String::new();

    if windows.is_empty() {
        graph.push_str(&format!("[0:a]volume={ceiling}[aout]"));
        return (graph, vec!["0:v".to_string(), "[aout]".to_string()]);
    }

    let inside: Vec<String> = windows
        .iter()
        .map(|(start, end)| {
            format!(
                "between(t,{},{})",
                format_seconds(*start),
                format_seconds(*end + DUCK_RELEASE)
            )
        })
        .collect();
    graph.push_str(&format!(
        "[0:a]volume='if(gt({},0),{},{})':eval=frame[bed];",
        inside.join("+"),
        floor,
        ceiling,
    ));

    for (index, start_ms) in starts_ms.iter().enumerate() {
        graph.push_str(&format!(
            "[{input}:a]adelay={ms}|{ms},volume={gain}[n{index}];",
            input = index + 1,
            ms = start_ms,
            gain = narration_gain,
        ));
    }

    graph.push_str("[bed]");
    for index in 0..starts_ms.len() {
        graph.push_str(&format!("[n{index}]"));
    }
    graph.push_str(&format!(
        "amix=inputs={count}:duration=first:normalize=0,volume={final_gain},alimiter=limit=0.95[aout]",
        count = starts_ms.len() + 1,
    ));

    (graph, vec!["0:v".to_string(), "[aout]".to_string()])
}

/// Assembles the narration variant of the timeline
pub struct SyncedNarrationMixer {
    tool: Arc<dyn MediaTool>,
    ducking_floor: f64,
    ducking_ceiling: f64,
    narration_gain: f64,
    final_gain: f64,
}

impl SyncedNarrationMixer {
    pub fn new(
        tool: Arc<dyn MediaTool>,
        ducking_floor: f64,
        ducking_ceiling: f64,
        narration_gain: f64,
        final_gain: f64,
    ) -> Self {
        Self {
            tool,
            ducking_floor,
            ducking_ceiling,
            narration_gain,
            final_gain,
        }
    }

    /// Produce the narrated reel. Returns the ids of clips excluded for
    /// missing analyses.
    pub async fn mix(
        &self,
        clips: &[NarratedClip],
        narrations: &[NarrationSegment],
        work_dir: &Path,
        output: &Path,
    ) -> ReelCutResult<Vec<String>> {
        let mut excluded = Vec::new();
        let mut placed: Vec<PlacedClip> = Vec::new();
        let mut cursor = 0.0;

        for clip in clips {
            let Some(analysis) = clip.analysis else {
                warn!(clip = %clip.clip_id, "no action analysis, excluding from narration timeline");
                excluded.push(clip.clip_id.clone());
                continue;
            };

            let (trim_start, trim_end) = analysis.trim_window();
            let trimmed = work_dir.join(format!("narrated-{}.mp4", clip.clip_id));
            self.tool
                .trim(&clip.media_path, &trimmed, trim_start, trim_end, false)
                .await?;

            placed.push(PlacedClip {
                clip_id: clip.clip_id.clone(),
                trimmed_path: trimmed,
                start_in_final: cursor,
                action_peak_in_clip: analysis.action_peak - trim_start,
            });
            cursor += trim_end - trim_start;
        }

        if placed.is_empty() {
            return Err(ReelCutError::Validation {
                message: "no clips with analyses to narrate".to_string(),
            });
        }

        // Plain concat keeps the cumulative offsets exact; a crossfade here
        // would shift every downstream narration position.
        let timeline = work_dir.join("narration-timeline.mp4");
        let trimmed_refs: Vec<&Path> = placed.iter().map(|p| p.trimmed_path.as_path()).collect();
        self.tool.concat_reencode(&trimmed_refs, &timeline).await?;

        let mut starts_ms: Vec<u64> = Vec::new();
        let mut windows: Vec<(f64, f64)> = Vec::new();
        let mut tracks: Vec<&Path> = Vec::new();
        for narration in narrations {
            let Some(clip) = placed.iter().find(|p| p.clip_id == narration.clip_id) else {
                warn!(
                    clip = %narration.clip_id,
                    "narration references a clip outside the timeline, skipping"
                );
                continue;
            };
            let start = narration_start(
                clip.start_in_final,
                clip.action_peak_in_clip,
                narration.timing,
                narration.duration,
            );
            starts_ms.push((start * 1000.0).round() as u64);
            windows.push((start, start + narration.duration));
            tracks.push(narration.audio_path.as_path());
        }

        info!(
            clips = placed.len(),
            narrations = tracks.len(),
            "mixing narration timeline"
        );

        let (graph, mappings) = build_mix_graph(
            &windows,
            &starts_ms,
            self.ducking_floor,
            self.ducking_ceiling,
            self.narration_gain,
            self.final_gain,
        );
        let mapping_refs: Vec<&str> = mappings.iter().map(String::as_str).collect();

        let mut inputs: Vec<&Path> = vec![timeline.as_path()];
        inputs.extend(tracks);
        self.tool
            .exec_filter_graph(&inputs, &graph, &mapping_refs, output)
            .await?;

        for clip in &placed {
            let _ = tokio::fs::remove_file(&clip.trimmed_path).await;
        }
        let _ = tokio::fs::remove_file(&timeline).await;

        Ok(excluded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis() -> ActionAnalysis {
        ActionAnalysis {
            action_start: 4.0,
            action_peak: 5.0,
            action_end: 6.0,
            total_duration: 12.0,
        }
    }

    #[test]
    fn test_trim_window_buffers_and_clamps() {
        let (start, end) = analysis().trim_window();
        assert!((start - 2.5).abs() < 1e-9);
        assert!((end - 7.5).abs() < 1e-9);

        let tight = ActionAnalysis {
            action_start: 0.5,
            action_peak: 1.0,
            action_end: 9.0,
            total_duration: 10.0,
        };
        let (start, end) = tight.trim_window();
        assert_eq!(start, 0.0);
        assert_eq!(end, 10.0);
    }

    #[test]
    fn test_narration_start_variants() {
        // Clip starts at 10.0 on the timeline, peak 2.5 s into the trim
        let before = narration_start(10.0, 2.5, NarrationTiming::BeforeAction, 2.0);
        assert!((before - 10.0).abs() < 1e-9); // 12.5 - 2.0 - 0.5

        let during = narration_start(10.0, 2.5, NarrationTiming::DuringAction, 2.0);
        assert!((during - 12.5).abs() < 1e-9);

        let after = narration_start(10.0, 2.5, NarrationTiming::AfterAction, 2.0);
        assert!((after - 13.5).abs() < 1e-9);

        let bridge = narration_start(10.0, 2.5, NarrationTiming::Bridge, 2.0);
        assert!((bridge - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_narration_start_clamped_at_zero() {
        let start = narration_start(0.0, 1.0, NarrationTiming::BeforeAction, 5.0);
        assert_eq!(start, 0.0);
    }

    #[test]
    fn test_mix_graph_ducks_and_delays() {
        let windows = [(10.0, 12.0), (20.0, 21.5)];
        let starts = [10_000, 20_000];
        let (graph, mappings) = build_mix_graph(&windows, &starts, 0.2, 0.7, 2.0, 1.5);

        // Ducking windows extend half a second past the narration end
        assert!(graph.contains("between(t,10.000,12.500)"));
        assert!(graph.contains("between(t,20.000,22.000)"));
        assert!(graph.contains("if(gt(between(t,10.000,12.500)+between(t,20.000,22.000),0),0.2,0.7)"));

        assert!(graph.contains("[1:a]adelay=10000|10000,volume=2[n0]"));
        assert!(graph.contains("[2:a]adelay=20000|20000,volume=2[n1]"));

        // Three sources mixed without renormalisation, then the final gain
        assert!(graph.contains("amix=inputs=3:duration=first:normalize=0,volume=1.5"));
        assert!(graph.contains("alimiter"));
        assert_eq!(mappings, vec!["0:v", "[aout]"]);
    }

    #[test]
    fn test_mix_graph_without_narrations_keeps_bed_level() {
        let (graph, mappings) = build_mix_graph(&[], &[], 0.2, 0.7, 2.0, 1.5);
        assert_eq!(graph, "[0:a]volume=0.7[aout]");
        assert_eq!(mappings, vec!["0:v", "[aout]"]);
    }
}
