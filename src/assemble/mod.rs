//! Timeline assembly: fragments and transitions into the final reel
//!
//! Adjacent items are joined with a short dissolve. Every crossfade overlaps
//! two items, so each stage shortens the timeline by one fade length; the
//! stage offsets account for that cumulatively. Filter-graph construction is
//! pure so the arithmetic is testable without an encoder.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{ReelCutError, ReelCutResult};
use crate::media::MediaTool;
use crate::utils::time::format_seconds;

/// Seconds of the source reel used for the title card
const TITLE_CARD_SECONDS: f64 = 1.5;
/// Audio fade-out at the end of the title card
const TITLE_CARD_FADE_SECONDS: f64 = 0.3;

/// One item ready for the timeline, with its probed duration
#[derive(Debug, Clone)]
pub struct TimelineInput {
    pub path: PathBuf,
    pub duration: f64,
}

/// Build the `(n-1)`-stage crossfade chain for `durations`.
///
/// Video inputs are normalised to a common timebase and frame rate, audio to
/// one async-aware 48 kHz stream; each stage emits a `fade` video transition
/// and a triangular audio crossfade of `crossfade` seconds. Returns the graph
/// and the output pad mappings.
pub fn build_crossfade_graph(durations: &[f64], crossfade: f64, fps: u32) -> (String, Vec<String>) {
    let n = durations.len();
    debug_assert!(n >= 2);

    let mut graph = String::new();
    for i in 0..n {
        graph.push_str(&format!(
            "[{i}:v]settb=AVTB,fps={fps},setpts=PTS-STARTPTS[v{i}];"
        ));
        graph.push_str(&format!(
            "[{i}:a]aresample=48000:async=1,asetpts=PTS-STARTPTS[a{i}];"
        ));
    }

    let mut elapsed = 0.0;
    let mut video_in = "[v0]".to_string();
    let mut audio_in = "[a0]".to_string();
    for stage in 0..n - 1 {
        // Each prior crossfade consumed one fade length of timeline, so the
        // next fade starts at the cumulative duration minus the overlaps.
        elapsed += durations[stage];
        let offset = elapsed - (stage as f64 + 1.0) * crossfade;

        let video_out = format!("[vx{stage}]");
        let audio_out = format!("[ax{stage}]");
        graph.push_str(&format!(
            "{video_in}[v{next}]xfade=transition=fade:duration={d}:offset={o}{video_out};",
            next = stage + 1,
            d = format_seconds(crossfade),
            o = format_seconds(offset),
        ));
        graph.push_str(&format!(
            "{audio_in}[a{next}]acrossfade=d={d}:c1=tri:c2=tri{audio_out};",
            next = stage + 1,
            d = format_seconds(crossfade),
        ));
        video_in = video_out;
        audio_in = audio_out;
    }

    // Trim the trailing separator
    graph.pop();

    (graph, vec![video_in, audio_in])
}

/// Expected final duration of `durations` joined with `crossfade` dissolves
pub fn expected_timeline_duration(durations: &[f64], crossfade: f64) -> f64 {
    let total: f64 = durations.iter().sum();
    total - crossfade * durations.len().saturating_sub(1) as f64
}

/// Joins per-clip fragments, transitions, and the title card into one MP4
pub struct TimelineAssembler {
    tool: Arc<dyn MediaTool>,
    crossfade_seconds: f64,
    fps: u32,
}

impl TimelineAssembler {
    pub fn new(tool: Arc<dyn MediaTool>, crossfade_seconds: f64, fps: u32) -> Self {
        Self {
            tool,
            crossfade_seconds,
            fps,
        }
    }

    /// Extract the title-card fragment: the first seconds of the source
    /// reel, with the tail audio faded to silence.
    pub async fn title_card_fragment(&self, source: &Path, output: &Path) -> ReelCutResult<()> {
        let fade_start = TITLE_CARD_SECONDS - TITLE_CARD_FADE_SECONDS;
        let graph = format!(
            "[0:v]trim=start=0:end={len},setpts=PTS-STARTPTS,settb=AVTB,fps={fps}[vout];\
             [0:a]atrim=start=0:end={len},asetpts=PTS-STARTPTS,aresample=48000:async=1,\
             afade=t=out:st={fade_start}:d={fade}[aout]",
            len = format_seconds(TITLE_CARD_SECONDS),
            fps = self.fps,
            fade_start = format_seconds(fade_start),
            fade = format_seconds(TITLE_CARD_FADE_SECONDS),
        );
        self.tool
            .exec_filter_graph(&[source], &graph, &["[vout]", "[aout]"], output)
            .await
    }

    /// Join `inputs` in order into `output`, crossfading adjacent items.
    ///
    /// Unreadable inputs are excluded and their positions returned, unless
    /// exclusion would leave the timeline empty.
    pub async fn assemble(&self, inputs: &[PathBuf], output: &Path) -> ReelCutResult<Vec<usize>> {
        let mut excluded = Vec::new();
        let mut timeline: Vec<TimelineInput> = Vec::new();

        for (index, path) in inputs.iter().enumerate() {
            match self.tool.probe(path).await {
                Ok(info) => timeline.push(TimelineInput {
                    path: path.clone(),
                    duration: info.duration,
                }),
                Err(e) => {
                    warn!(input = %path.display(), "excluding unreadable timeline input: {}", e);
                    excluded.push(index);
                }
            }
        }

        if timeline.is_empty() {
            return Err(ReelCutError::MediaCorrupt {
                path: output.display().to_string(),
                message: "every timeline input was unreadable".to_string(),
            });
        }

        let durations: Vec<f64> = timeline.iter().map(|t| t.duration).collect();
        info!(
            items = timeline.len(),
            expected_seconds = %format!(
                "{:.2}",
                expected_timeline_duration(&durations, self.crossfade_seconds)
            ),
            "assembling timeline"
        );

        let paths: Vec<&Path> = timeline.iter().map(|t| t.path.as_path()).collect();
        if let [only] = *paths.as_slice() {
            // Nothing to crossfade; a re-encoding concat normalises the lone
            // input to the output parameters.
            self.tool.concat_reencode(&[only], output).await?;
            return Ok(excluded);
        }

        let (graph, mappings) = build_crossfade_graph(&durations, self.crossfade_seconds, self.fps);
        let mapping_refs: Vec<&str> = mappings.iter().map(String::as_str).collect();
        self.tool
            .exec_filter_graph(&paths, &graph, &mapping_refs, output)
            .await?;

        Ok(excluded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_account_for_prior_fades() {
        // Full rundown: title card + transition + two plays + transition +
        // play, 10-frame dissolves at 30 fps
        let durations = [1.5, 2.0, 0.9, 1.5, 2.0, 2.0];
        let crossfade = 10.0 / 30.0;
        let (graph, mappings) = build_crossfade_graph(&durations, crossfade, 30);

        // offset_0 = 1.5 - 1*0.333
        assert!(graph.contains("offset=1.167"));
        // offset_1 = 3.5 - 2*0.333
        assert!(graph.contains("offset=2.833"));
        // Five stages for six inputs
        assert_eq!(graph.matches("xfade=").count(), 5);
        assert_eq!(graph.matches("acrossfade=").count(), 5);
        assert_eq!(mappings, vec!["[vx4]", "[ax4]"]);
    }

    #[test]
    fn test_graph_normalises_every_input() {
        let durations = [4.0, 5.0];
        let (graph, _) = build_crossfade_graph(&durations, 0.5, 30);
        assert!(graph.contains("[0:v]settb=AVTB,fps=30,setpts=PTS-STARTPTS[v0]"));
        assert!(graph.contains("[1:a]aresample=48000:async=1,asetpts=PTS-STARTPTS[a1]"));
        assert!(graph.contains("[v0][v1]xfade=transition=fade:duration=0.500:offset=3.500[vx0]"));
        assert!(graph.contains("[a0][a1]acrossfade=d=0.500:c1=tri:c2=tri[ax0]"));
        assert!(!graph.ends_with(';'));
    }

    #[test]
    fn test_expected_timeline_duration() {
        let durations = [1.5, 2.0, 0.9, 1.5, 2.0, 2.0];
        let expected = expected_timeline_duration(&durations, 1.0 / 3.0);
        assert!((expected - 8.233).abs() < 0.01);

        // A single item keeps its own duration
        assert_eq!(expected_timeline_duration(&[4.2], 0.333), 4.2);
    }
}
