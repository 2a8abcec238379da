//! Integration tests for the synced-narration mixer over a mock media tool

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use reelcut::error::{ReelCutError, ReelCutResult};
use reelcut::media::{MediaTool, ProbeInfo};
use reelcut::narrate::{
    ActionAnalysis, NarratedClip, NarrationSegment, NarrationTiming, SyncedNarrationMixer,
};

/// Minimal recording mock for the mixer's tool calls
#[derive(Default)]
struct MockTool {
    ops: Mutex<Vec<String>>,
}

impl MockTool {
    fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaTool for MockTool {
    async fn probe(&self, path: &Path) -> ReelCutResult<ProbeInfo> {
        if !path.exists() {
            return Err(ReelCutError::MediaCorrupt {
                path: path.display().to_string(),
                message: "unreadable".to_string(),
            });
        }
        Ok(ProbeInfo {
            duration: 8.0,
            fps: 30.0,
            frame_count: 240,
        })
    }

    async fn trim(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        end: f64,
        audio_fade: bool,
    ) -> ReelCutResult<()> {
        self.ops.lock().unwrap().push(format!(
            "trim {} [{:.2},{:.2}) fade={}",
            input.file_name().unwrap().to_string_lossy(),
            start,
            end,
            audio_fade
        ));
        tokio::fs::write(output, b"trimmed").await?;
        Ok(())
    }

    async fn concat_reencode(&self, inputs: &[&Path], output: &Path) -> ReelCutResult<()> {
        self.ops
            .lock()
            .unwrap()
            .push(format!("concat n={}", inputs.len()));
        tokio::fs::write(output, b"timeline").await?;
        Ok(())
    }

    async fn exec_filter_graph(
        &self,
        inputs: &[&Path],
        graph: &str,
        _mappings: &[&str],
        output: &Path,
    ) -> ReelCutResult<()> {
        self.ops
            .lock()
            .unwrap()
            .push(format!("graph n={} {}", inputs.len(), graph));
        tokio::fs::write(output, b"mixed").await?;
        Ok(())
    }

    async fn extract_audio(&self, _input: &Path, output: &Path) -> ReelCutResult<()> {
        tokio::fs::write(output, b"wav").await?;
        Ok(())
    }
}

fn stage_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"media").unwrap();
    path
}

fn mixer(tool: Arc<MockTool>) -> SyncedNarrationMixer {
    SyncedNarrationMixer::new(tool, 0.2, 0.7, 2.0, 1.5)
}

#[tokio::test]
async fn test_clips_trimmed_around_action_and_narration_placed() {
    let dir = TempDir::new().unwrap();
    let tool = Arc::new(MockTool::default());

    let clips = vec![
        NarratedClip {
            clip_id: "p1".to_string(),
            media_path: stage_file(dir.path(), "p1.mp4"),
            // Window [4.0, 6.0] widens to [2.5, 7.5]: five seconds kept
            analysis: Some(ActionAnalysis {
                action_start: 4.0,
                action_peak: 5.0,
                action_end: 6.0,
                total_duration: 12.0,
            }),
        },
        NarratedClip {
            clip_id: "p2".to_string(),
            media_path: stage_file(dir.path(), "p2.mp4"),
            // Window clamps at the clip start
            analysis: Some(ActionAnalysis {
                action_start: 1.0,
                action_peak: 1.5,
                action_end: 2.0,
                total_duration: 10.0,
            }),
        },
    ];
    let narrations = vec![NarrationSegment {
        clip_id: "p2".to_string(),
        audio_path: stage_file(dir.path(), "n0.mp3"),
        duration: 2.0,
        timing: NarrationTiming::DuringAction,
    }];

    let output = dir.path().join("narrated.mp4");
    let excluded = mixer(tool.clone())
        .mix(&clips, &narrations, dir.path(), &output)
        .await
        .unwrap();

    assert!(excluded.is_empty());
    assert!(output.is_file());

    let ops = tool.ops();
    // Action-window trims carry no boundary fades
    assert!(ops.iter().any(|op| op.contains("p1.mp4 [2.50,7.50) fade=false")));
    assert!(ops.iter().any(|op| op.contains("p2.mp4 [0.00,3.50) fade=false")));
    // Plain concat keeps offset math exact
    assert!(ops.iter().any(|op| op == "concat n=2"));

    // p2 starts at 5.0 on the timeline (after p1's five seconds); its peak
    // sits 1.5 s into the trim, so a during_action narration lands at 6.5 s
    let graph = ops.iter().find(|op| op.starts_with("graph")).unwrap();
    assert!(graph.contains("adelay=6500|6500"));
    assert!(graph.contains("between(t,6.500,9.000)"));
    assert!(graph.contains("normalize=0"));
}

#[tokio::test]
async fn test_clip_without_analysis_is_excluded() {
    let dir = TempDir::new().unwrap();
    let tool = Arc::new(MockTool::default());

    let clips = vec![
        NarratedClip {
            clip_id: "kept".to_string(),
            media_path: stage_file(dir.path(), "kept.mp4"),
            analysis: Some(ActionAnalysis {
                action_start: 2.0,
                action_peak: 3.0,
                action_end: 4.0,
                total_duration: 10.0,
            }),
        },
        NarratedClip {
            clip_id: "unanalysed".to_string(),
            media_path: stage_file(dir.path(), "unanalysed.mp4"),
            analysis: None,
        },
    ];

    let output = dir.path().join("narrated.mp4");
    let excluded = mixer(tool.clone())
        .mix(&clips, &[], dir.path(), &output)
        .await
        .unwrap();

    assert_eq!(excluded, vec!["unanalysed".to_string()]);
    let ops = tool.ops();
    assert!(ops.iter().any(|op| op == "concat n=1"));
    assert!(!ops.iter().any(|op| op.contains("unanalysed.mp4")));
}

#[tokio::test]
async fn test_all_clips_unanalysed_is_an_error() {
    let dir = TempDir::new().unwrap();
    let tool = Arc::new(MockTool::default());

    let clips = vec![NarratedClip {
        clip_id: "only".to_string(),
        media_path: stage_file(dir.path(), "only.mp4"),
        analysis: None,
    }];

    let output = dir.path().join("narrated.mp4");
    let result = mixer(tool).mix(&clips, &[], dir.path(), &output).await;
    assert!(matches!(result, Err(ReelCutError::Validation { .. })));
}

#[tokio::test]
async fn test_narration_for_excluded_clip_skipped() {
    let dir = TempDir::new().unwrap();
    let tool = Arc::new(MockTool::default());

    let clips = vec![
        NarratedClip {
            clip_id: "kept".to_string(),
            media_path: stage_file(dir.path(), "kept.mp4"),
            analysis: Some(ActionAnalysis {
                action_start: 2.0,
                action_peak: 3.0,
                action_end: 4.0,
                total_duration: 10.0,
            }),
        },
        NarratedClip {
            clip_id: "gone".to_string(),
            media_path: stage_file(dir.path(), "gone.mp4"),
            analysis: None,
        },
    ];
    let narrations = vec![NarrationSegment {
        clip_id: "gone".to_string(),
        audio_path: stage_file(dir.path(), "orphan.mp3"),
        duration: 1.0,
        timing: NarrationTiming::Bridge,
    }];

    let output = dir.path().join("narrated.mp4");
    mixer(tool.clone())
        .mix(&clips, &narrations, dir.path(), &output)
        .await
        .unwrap();

    // The orphaned narration never entered the mix graph
    let ops = tool.ops();
    let graph = ops.iter().find(|op| op.starts_with("graph")).unwrap();
    assert!(graph.starts_with("graph n=1"));
    assert!(!graph.contains("adelay"));
}
