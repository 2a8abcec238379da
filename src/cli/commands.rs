//! Command execution handlers
//!
//! Builds the production component stack from configuration and drives the
//! pipeline. Ctrl-C installs a cancellation signal; the orchestrator lets
//! in-flight tool calls finish and removes its working directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::args::{AssembleArgs, NarrateArgs, ProbeArgs, TranscribeArgs};
use crate::config::PipelineConfig;
use crate::error::{ReelCutError, ReelCutResult};
use crate::fetch::AssetFetcher;
use crate::media::{FfmpegTool, MediaTool};
use crate::model::{Clip, Rundown};
use crate::narrate::{
    ActionAnalysis, ElevenLabsSynthesizer, NarrationSegment, NarrationTiming, SpeechSynthesizer,
};
use crate::pipeline::Pipeline;
use crate::transcribe::{provider_by_name, TranscriptCache, TranscriptionProvider, TranscriptionService};

fn load_config(path: Option<&Path>) -> ReelCutResult<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path),
        None => Ok(PipelineConfig::default()),
    }
}

fn build_providers(config: &PipelineConfig) -> ReelCutResult<Vec<Box<dyn TranscriptionProvider>>> {
    let mut providers = Vec::new();
    for name in &config.transcription_providers {
        match provider_by_name(name) {
            Some(provider) => providers.push(provider),
            None => {
                return Err(ReelCutError::Config {
                    message: format!("unknown transcription provider '{}'", name),
                })
            }
        }
    }
    Ok(providers)
}

fn build_pipeline(config: &PipelineConfig) -> ReelCutResult<(Pipeline, Arc<dyn MediaTool>)> {
    config.validate()?;
    let tool: Arc<dyn MediaTool> = Arc::new(FfmpegTool::from_config(config));
    let fetcher = Arc::new(AssetFetcher::new()?);
    let cache = TranscriptCache::new(
        config.cache_dir.clone(),
        config.transcript_ttl_days,
        config.cache_max_entries,
    )?;
    let transcriber = Arc::new(TranscriptionService::new(
        build_providers(config)?,
        cache,
        tool.clone(),
    ));
    let pipeline = Pipeline::new(config.clone(), tool.clone(), fetcher, transcriber);
    Ok((pipeline, tool))
}

fn cancellation_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("cancellation requested, letting in-flight work finish");
            trigger.cancel();
        }
    });
    cancel
}

/// Execute the assemble command
pub async fn assemble(args: AssembleArgs) -> ReelCutResult<()> {
    let config = load_config(args.config.as_deref())?;
    let rundown_json = std::fs::read_to_string(&args.rundown)?;
    let rundown = Rundown::from_json(&rundown_json)?;
    info!(
        game = %rundown.game_id,
        items = rundown.items.len(),
        plays = rundown.play_count(),
        "loaded rundown"
    );

    let (mut pipeline, _tool) = build_pipeline(&config)?;
    if let Some(dir) = args.transitions {
        pipeline = pipeline.with_transitions_dir(dir);
    }

    let report = pipeline
        .assemble(&rundown, &args.output, cancellation_on_ctrl_c())
        .await?;
    println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
    Ok(())
}

/// Narration manifest: the clips, their externally computed action analyses,
/// and the narration segments to overlay
#[derive(Debug, Deserialize)]
struct NarrationManifest {
    game_id: String,
    clips: Vec<ManifestClip>,
    narrations: Vec<ManifestNarration>,
}

#[derive(Debug, Deserialize)]
struct ManifestClip {
    clip: Clip,
    analysis: Option<ActionAnalysis>,
}

#[derive(Debug, Deserialize)]
struct ManifestNarration {
    clip_id: String,
    timing: NarrationTiming,
    /// Pre-rendered narration audio; when absent, `text` is synthesized
    audio_path: Option<PathBuf>,
    text: Option<String>,
    #[serde(default = "default_voice")]
    voice_id: String,
    #[serde(default)]
    style: String,
}

fn default_voice() -> String {
    "broadcast".to_string()
}

/// Execute the narrate command
pub async fn narrate(args: NarrateArgs) -> ReelCutResult<()> {
    let config = load_config(args.config.as_deref())?;
    let manifest_json = std::fs::read_to_string(&args.manifest)?;
    let manifest: NarrationManifest =
        serde_json::from_str(&manifest_json).map_err(|e| ReelCutError::Validation {
            message: format!("malformed narration manifest: {}", e),
        })?;

    let (pipeline, tool) = build_pipeline(&config)?;

    // Resolve narration audio up front: synthesize text segments, then probe
    // every track for its duration.
    let tts = ElevenLabsSynthesizer::from_env();
    let narration_dir = config.working_dir_root.join("narration-audio");
    std::fs::create_dir_all(&narration_dir)?;

    let mut narrations: Vec<NarrationSegment> = Vec::new();
    for (index, entry) in manifest.narrations.iter().enumerate() {
        let audio_path = match (&entry.audio_path, &entry.text) {
            (Some(path), _) => path.clone(),
            (None, Some(text)) => {
                let bytes = tts.synthesize(text, &entry.voice_id, &entry.style).await?;
                let path = narration_dir.join(format!("narration-{}.mp3", index));
                tokio::fs::write(&path, bytes).await?;
                path
            }
            (None, None) => {
                return Err(ReelCutError::Validation {
                    message: format!(
                        "narration {} for clip {} has neither audio nor text",
                        index, entry.clip_id
                    ),
                })
            }
        };
        let duration = tool.probe(&audio_path).await?.duration;
        narrations.push(NarrationSegment {
            clip_id: entry.clip_id.clone(),
            audio_path,
            duration,
            timing: entry.timing,
        });
    }

    let clips = manifest
        .clips
        .into_iter()
        .map(|c| (c.clip, c.analysis))
        .collect();

    let report = pipeline
        .assemble_narrated(
            &manifest.game_id,
            clips,
            narrations,
            &args.output,
            cancellation_on_ctrl_c(),
        )
        .await?;
    println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
    Ok(())
}

/// Execute the transcribe command
pub async fn transcribe(args: TranscribeArgs) -> ReelCutResult<()> {
    let config = load_config(args.config.as_deref())?;
    config.validate()?;

    let tool: Arc<dyn MediaTool> = Arc::new(FfmpegTool::from_config(&config));
    let fetcher = AssetFetcher::new()?;
    let cache = TranscriptCache::new(
        config.cache_dir.clone(),
        config.transcript_ttl_days,
        config.cache_max_entries,
    )?;
    let transcriber = TranscriptionService::new(build_providers(&config)?, cache, tool);

    let work_dir = config.working_dir_root.join("transcribe");
    std::fs::create_dir_all(&work_dir)?;
    let media_path = fetcher.fetch(&args.url, &work_dir).await?;
    let transcript = transcriber.transcribe(&args.url, &media_path, &work_dir).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&transcript).unwrap_or_default()
    );
    Ok(())
}

/// Execute the probe command
pub async fn probe(args: ProbeArgs) -> ReelCutResult<()> {
    let config = load_config(args.config.as_deref())?;
    let tool = FfmpegTool::from_config(&config);
    let info = tool.probe(&args.input).await?;
    println!(
        "duration: {:.3}s  fps: {:.3}  frames: {}",
        info.duration, info.fps, info.frame_count
    );
    Ok(())
}
