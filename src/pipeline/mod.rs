//! Pipeline orchestration
//!
//! The orchestrator is the only scheduler in the crate: it validates the
//! rundown, fans out per-clip work under a bounded concurrency gate,
//! reorders results back into rundown order, and hands the surviving
//! fragments to the terminal assembly stage. It owns one scoped working
//! directory per run and deletes it on every exit path.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::assemble::TimelineAssembler;
use crate::config::PipelineConfig;
use crate::error::{ReelCutError, ReelCutResult};
use crate::fetch::AssetFetcher;
use crate::media::MediaTool;
use crate::model::{Clip, Rundown, RundownItem};
use crate::narrate::{NarratedClip, NarrationSegment, SyncedNarrationMixer};
use crate::segment::{build_segments, reduce_selection};
use crate::surgeon::ClipSurgeon;
use crate::transcribe::TranscriptionService;

/// Outcome of one rundown item
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    Included,
    Skipped { reason: String },
    Failed { kind: String, message: String },
}

/// Per-item report entry, in rundown order
#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
    pub label: String,
    #[serde(flatten)]
    pub status: ItemStatus,
}

/// Result of a completed run
#[derive(Debug, Serialize)]
pub struct AssemblyReport {
    /// Where the finished MP4 landed
    pub output: PathBuf,
    /// One entry per rundown item
    pub items: Vec<ItemReport>,
}

/// Top-level highlight assembly driver
pub struct Pipeline {
    config: PipelineConfig,
    tool: Arc<dyn MediaTool>,
    fetcher: Arc<AssetFetcher>,
    transcriber: Arc<TranscriptionService>,
    transitions_dir: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        tool: Arc<dyn MediaTool>,
        fetcher: Arc<AssetFetcher>,
        transcriber: Arc<TranscriptionService>,
    ) -> Self {
        Self {
            config,
            tool,
            fetcher,
            transcriber,
            transitions_dir: None,
        }
    }

    /// Directory holding the pre-rendered inning-transition graphics
    pub fn with_transitions_dir(mut self, dir: PathBuf) -> Self {
        self.transitions_dir = Some(dir);
        self
    }

    /// Assemble the rundown into a single MP4 at `output`.
    ///
    /// Per-clip failures drop the clip (with a reported status) as long as at
    /// least one play survives; assembly-stage failures are fatal. The scoped
    /// working directory is deleted on completion, failure, and cancellation.
    pub async fn assemble(
        &self,
        rundown: &Rundown,
        output: &Path,
        cancel: CancellationToken,
    ) -> ReelCutResult<AssemblyReport> {
        rundown.validate()?;

        let work_dir = self.create_work_dir(&rundown.game_id)?;
        let result = self.assemble_in(rundown, output, &work_dir, cancel).await;
        remove_work_dir(&work_dir).await;
        result
    }

    /// Assemble the synced-narration variant: fetch each clip, trim around
    /// its action window, and overlay positioned narration over a ducked
    /// commentary bed.
    pub async fn assemble_narrated(
        &self,
        game_id: &str,
        clips: Vec<(Clip, Option<crate::narrate::ActionAnalysis>)>,
        narrations: Vec<NarrationSegment>,
        output: &Path,
        cancel: CancellationToken,
    ) -> ReelCutResult<AssemblyReport> {
        let work_dir = self.create_work_dir(game_id)?;
        let result = self
            .narrate_in(clips, narrations, output, &work_dir, cancel)
            .await;
        remove_work_dir(&work_dir).await;
        result
    }

    fn create_work_dir(&self, game_id: &str) -> ReelCutResult<PathBuf> {
        let token = Uuid::new_v4().simple().to_string();
        let dir = self
            .config
            .working_dir_root
            .join(format!("{}-{}", game_id, &token[..8]));
        std::fs::create_dir_all(&dir)?;
        info!(work_dir = %dir.display(), "created working directory");
        Ok(dir)
    }

    async fn assemble_in(
        &self,
        rundown: &Rundown,
        output: &Path,
        work_dir: &Path,
        cancel: CancellationToken,
    ) -> ReelCutResult<AssemblyReport> {
        // Fan out the plays under the concurrency gate; transitions and the
        // title card resolve cheaply on the collection pass.
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut handles = Vec::new();
        for (position, item) in rundown.items.iter().enumerate() {
            let RundownItem::Play { clip, selection } = item else {
                continue;
            };

            let job = PlayJob {
                position,
                clip: clip.clone(),
                selection: selection.clone(),
            };
            let stage = PlayStage {
                config: self.config.clone(),
                tool: self.tool.clone(),
                fetcher: self.fetcher.clone(),
                transcriber: self.transcriber.clone(),
                work_dir: work_dir.to_path_buf(),
                cancel: cancel.clone(),
            };
            let semaphore = semaphore.clone();
            handles.push((
                position,
                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| ReelCutError::Cancelled)?;
                    stage.process(job).await
                }),
            ));
        }

        let mut fragments: Vec<Option<ReelCutResult<PathBuf>>> =
            (0..rundown.items.len()).map(|_| None).collect();
        for (position, handle) in handles {
            let joined = handle.await.map_err(|e| ReelCutError::InvariantViolation {
                message: format!("play task panicked: {}", e),
            })?;
            fragments[position] = Some(joined);
        }

        if cancel.is_cancelled() {
            return Err(ReelCutError::Cancelled);
        }

        // Collect in rundown order
        let assembler = TimelineAssembler::new(
            self.tool.clone(),
            self.config.crossfade_seconds(),
            self.config.fps,
        );
        let mut reports: Vec<ItemReport> = Vec::with_capacity(rundown.items.len());
        let mut inputs: Vec<PathBuf> = Vec::new();
        let mut input_positions: Vec<usize> = Vec::new();
        let mut first_play_error: Option<ReelCutError> = None;
        let mut surviving_plays = 0usize;

        for (position, item) in rundown.items.iter().enumerate() {
            let label = item.label();
            match item {
                RundownItem::Play { .. } => match fragments[position].take() {
                    Some(Ok(fragment)) => {
                        surviving_plays += 1;
                        inputs.push(fragment);
                        input_positions.push(reports.len());
                        reports.push(ItemReport {
                            label,
                            status: ItemStatus::Included,
                        });
                    }
                    Some(Err(e)) if e.is_clip_recoverable() => {
                        warn!(item = %label, "dropping play: {}", e);
                        reports.push(ItemReport {
                            label,
                            status: ItemStatus::Failed {
                                kind: e.kind().to_string(),
                                message: e.to_string(),
                            },
                        });
                        if first_play_error.is_none() {
                            first_play_error = Some(e);
                        }
                    }
                    Some(Err(e)) => return Err(e),
                    None => {
                        return Err(ReelCutError::InvariantViolation {
                            message: format!("play at position {} produced no result", position),
                        })
                    }
                },
                RundownItem::Transition { key } => {
                    let resolved = self
                        .transitions_dir
                        .as_deref()
                        .map(|dir| key.resolve(dir));
                    match resolved {
                        Some(path) if path.is_file() => {
                            inputs.push(path);
                            input_positions.push(reports.len());
                            reports.push(ItemReport {
                                label,
                                status: ItemStatus::Included,
                            });
                        }
                        _ => {
                            warn!(item = %label, "skipped: missing transition file");
                            reports.push(ItemReport {
                                label,
                                status: ItemStatus::Skipped {
                                    reason: "missing transition file".to_string(),
                                },
                            });
                        }
                    }
                }
                RundownItem::TitleCard { source_url } => {
                    let fragment = work_dir.join("title-card.mp4");
                    let built = async {
                        let source = self.fetcher.fetch(source_url, work_dir).await?;
                        assembler.title_card_fragment(&source, &fragment).await
                    }
                    .await;
                    match built {
                        Ok(()) => {
                            inputs.push(fragment);
                            input_positions.push(reports.len());
                            reports.push(ItemReport {
                                label,
                                status: ItemStatus::Included,
                            });
                        }
                        Err(e) if e.is_clip_recoverable() => {
                            warn!(item = %label, "dropping title card: {}", e);
                            reports.push(ItemReport {
                                label,
                                status: ItemStatus::Failed {
                                    kind: e.kind().to_string(),
                                    message: e.to_string(),
                                },
                            });
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        if surviving_plays == 0 {
            return Err(first_play_error.unwrap_or(ReelCutError::Validation {
                message: "no plays survived the per-clip stage".to_string(),
            }));
        }

        if cancel.is_cancelled() {
            return Err(ReelCutError::Cancelled);
        }

        // Terminal assembly; failures here are fatal
        let assembled = work_dir.join("final.mp4");
        let excluded = assembler.assemble(&inputs, &assembled).await?;
        for index in excluded {
            let report = &mut reports[input_positions[index]];
            report.status = ItemStatus::Skipped {
                reason: "unreadable at assembly".to_string(),
            };
        }

        move_result(&assembled, output).await?;
        info!(output = %output.display(), "assembly complete");

        Ok(AssemblyReport {
            output: output.to_path_buf(),
            items: reports,
        })
    }

    async fn narrate_in(
        &self,
        clips: Vec<(Clip, Option<crate::narrate::ActionAnalysis>)>,
        narrations: Vec<NarrationSegment>,
        output: &Path,
        work_dir: &Path,
        cancel: CancellationToken,
    ) -> ReelCutResult<AssemblyReport> {
        let mut narrated: Vec<NarratedClip> = Vec::new();
        let mut reports: Vec<ItemReport> = Vec::new();

        for (clip, analysis) in &clips {
            if cancel.is_cancelled() {
                return Err(ReelCutError::Cancelled);
            }
            let label = format!("play:{}", clip.id);
            match self.fetcher.fetch(&clip.source, work_dir).await {
                Ok(media_path) => {
                    narrated.push(NarratedClip {
                        clip_id: clip.id.clone(),
                        media_path,
                        analysis: *analysis,
                    });
                    reports.push(ItemReport {
                        label,
                        status: ItemStatus::Included,
                    });
                }
                Err(e) if e.is_clip_recoverable() => {
                    warn!(item = %label, "dropping clip: {}", e);
                    reports.push(ItemReport {
                        label,
                        status: ItemStatus::Failed {
                            kind: e.kind().to_string(),
                            message: e.to_string(),
                        },
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let mixer = SyncedNarrationMixer::new(
            self.tool.clone(),
            self.config.ducking_floor,
            self.config.ducking_ceiling,
            self.config.narration_gain,
            self.config.final_gain,
        );
        let assembled = work_dir.join("final.mp4");
        let excluded = mixer.mix(&narrated, &narrations, work_dir, &assembled).await?;
        for clip_id in excluded {
            let label = format!("play:{}", clip_id);
            if let Some(report) = reports.iter_mut().find(|r| r.label == label) {
                report.status = ItemStatus::Skipped {
                    reason: "no action analysis".to_string(),
                };
            }
        }

        move_result(&assembled, output).await?;
        Ok(AssemblyReport {
            output: output.to_path_buf(),
            items: reports,
        })
    }
}

/// Per-play work order
struct PlayJob {
    position: usize,
    clip: Clip,
    selection: BTreeSet<usize>,
}

/// Everything a spawned play task needs, cloned out of the pipeline
struct PlayStage {
    config: PipelineConfig,
    tool: Arc<dyn MediaTool>,
    fetcher: Arc<AssetFetcher>,
    transcriber: Arc<TranscriptionService>,
    work_dir: PathBuf,
    cancel: CancellationToken,
}

impl PlayStage {
    /// Fetch, transcribe, build segments, reduce, cut; strictly sequential
    async fn process(&self, job: PlayJob) -> ReelCutResult<PathBuf> {
        if self.cancel.is_cancelled() {
            return Err(ReelCutError::Cancelled);
        }
        let media_path = self.fetcher.fetch(&job.clip.source, &self.work_dir).await?;

        if self.cancel.is_cancelled() {
            return Err(ReelCutError::Cancelled);
        }
        let transcript = self
            .transcriber
            .transcribe(&job.clip.source, &media_path, &self.work_dir)
            .await?;

        let segments = build_segments(&transcript.words, transcript.duration);
        let intervals = reduce_selection(
            &segments,
            &job.selection,
            self.config.segment_buffer_seconds,
            self.config.merge_gap_seconds,
        )?;
        if intervals.is_empty() {
            return Err(ReelCutError::Validation {
                message: format!("play {} selected nothing", job.clip.id),
            });
        }

        if self.cancel.is_cancelled() {
            return Err(ReelCutError::Cancelled);
        }
        let fragment = self.work_dir.join(format!("fragment-{}.mp4", job.position));
        ClipSurgeon::new(self.tool.clone())
            .extract(&media_path, &intervals, &fragment)
            .await?;
        Ok(fragment)
    }
}

/// Move the finished file to the caller's path, copying across devices
async fn move_result(from: &Path, to: &Path) -> ReelCutResult<()> {
    if let Some(parent) = to.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(_) => {
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await?;
            Ok(())
        }
    }
}

/// Best-effort removal of the run's working directory
async fn remove_work_dir(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        warn!(dir = %dir.display(), "failed to remove working directory: {}", e);
    }
}
