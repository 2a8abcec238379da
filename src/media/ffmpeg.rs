//! ffmpeg/ffprobe adapter
//!
//! Spawns a fresh child process per operation, captures stderr for error
//! reporting, and enforces a per-operation deadline. Every encode invocation
//! shares one parameter set (H.264 + AAC at a fixed frame rate) so fragments
//! produced by different calls join cleanly.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::{ReelCutError, ReelCutResult};
use crate::media::{MediaTool, ProbeInfo};
use crate::utils::{stderr_tail, time::format_seconds};

/// Lines of stderr kept when a tool invocation fails
const STDERR_TAIL_LINES: usize = 15;

/// ffmpeg-based media tool
pub struct FfmpegTool {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    preset: String,
    crf: u8,
    fps: u32,
    /// Boundary audio fade length in seconds
    boundary_fade: f64,
    timeout: Duration,
}

impl FfmpegTool {
    /// Build the tool from pipeline configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg_path.clone(),
            ffprobe: config.ffprobe_path.clone(),
            preset: config.preset.clone(),
            crf: config.crf,
            fps: config.fps,
            boundary_fade: f64::from(config.boundary_fade_ms) / 1000.0,
            timeout: Duration::from_secs(300),
        }
    }

    /// Override the per-operation deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Shared encode parameters appended to every re-encoding invocation
    fn encode_args(&self) -> Vec<String> {
        vec![
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            self.preset.clone(),
            "-crf".into(),
            self.crf.to_string(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-r".into(),
            self.fps.to_string(),
            "-c:a".into(),
            "aac".into(),
            "-ar".into(),
            "48000".into(),
            "-ac".into(),
            "2".into(),
        ]
    }

    /// Run a tool invocation to completion, enforcing the deadline
    async fn run(&self, stage: &str, program: &Path, args: &[String]) -> ReelCutResult<Vec<u8>> {
        debug!(stage, "running {} {}", program.display(), args.join(" "));

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ReelCutError::Timeout {
                stage: stage.to_string(),
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|e| ReelCutError::MediaFailure {
                stage: stage.to_string(),
                exit_code: None,
                stderr_tail: format!("failed to spawn {}: {}", program.display(), e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReelCutError::MediaFailure {
                stage: stage.to_string(),
                exit_code: output.status.code(),
                stderr_tail: stderr_tail(&stderr, STDERR_TAIL_LINES),
            });
        }

        Ok(output.stdout)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse an ffprobe rational like "30000/1001"
fn parse_frame_rate(raw: &str) -> Option<f64> {
    match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                None
            } else {
                Some(num / den)
            }
        }
        None => raw.parse().ok(),
    }
}

#[async_trait]
impl MediaTool for FfmpegTool {
    async fn probe(&self, path: &Path) -> ReelCutResult<ProbeInfo> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-select_streams".to_string(),
            "v:0".to_string(),
            "-show_entries".to_string(),
            "stream=r_frame_rate,nb_frames:format=duration".to_string(),
            "-of".to_string(),
            "json".to_string(),
            path.to_string_lossy().to_string(),
        ];

        let stdout = self
            .run("probe", &self.ffprobe, &args)
            .await
            .map_err(|e| ReelCutError::MediaCorrupt {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let parsed: ProbeOutput =
            serde_json::from_slice(&stdout).map_err(|e| ReelCutError::MediaCorrupt {
                path: path.display().to_string(),
                message: format!("unparseable probe output: {}", e),
            })?;

        let duration = parsed
            .format
            .and_then(|f| f.duration)
            .and_then(|d| d.parse::<f64>().ok())
            .ok_or_else(|| ReelCutError::MediaCorrupt {
                path: path.display().to_string(),
                message: "no container duration".to_string(),
            })?;

        let stream = parsed.streams.first();
        let fps = stream
            .and_then(|s| s.r_frame_rate.as_deref())
            .and_then(parse_frame_rate)
            .unwrap_or(f64::from(self.fps));
        let frame_count = stream
            .and_then(|s| s.nb_frames.as_deref())
            .and_then(|n| n.parse::<u64>().ok())
            .unwrap_or_else(|| (duration * fps).round() as u64);

        Ok(ProbeInfo {
            duration,
            fps,
            frame_count,
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
        let duration = end - start;
        if duration <= 0.0 {
            return Err(ReelCutError::InvariantViolation {
                message: format!("trim span collapsed: [{}, {})", start, end),
            });
        }

        let mut args = vec![
            "-y".to_string(),
            "-ss".to_string(),
            format_seconds(start),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-t".to_string(),
            format_seconds(duration),
        ];

        if audio_fade {
            let fade = self.boundary_fade.min(duration / 2.0);
            args.push("-af".to_string());
            args.push(format!(
                "afade=t=in:st=0:d={},afade=t=out:st={}:d={}",
                format_seconds(fade),
                format_seconds(duration - fade),
                format_seconds(fade)
            ));
        }

        args.extend(self.encode_args());
        args.push(output.to_string_lossy().to_string());

        self.run("trim", &self.ffmpeg, &args).await?;
        Ok(())
    }

    async fn concat_reencode(&self, inputs: &[&Path], output: &Path) -> ReelCutResult<()> {
        if inputs.is_empty() {
            return Err(ReelCutError::InvariantViolation {
                message: "concat with no inputs".to_string(),
            });
        }

        // Concat demuxer wants a list file; single quotes in paths are
        // escaped the way the demuxer expects.
        let list_path = output.with_extension("concat.txt");
        let mut list = String::new();
        for input in inputs {
            let escaped = input.to_string_lossy().replace('\'', "'\\''");
            list.push_str(&format!("file '{}'\n", escaped));
        }
        tokio::fs::write(&list_path, list).await?;

        let mut args = vec![
            "-y".to_string(),
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            list_path.to_string_lossy().to_string(),
            "-af".to_string(),
            "aresample=async=1".to_string(),
        ];
        args.extend(self.encode_args());
        args.push(output.to_string_lossy().to_string());

        let result = self.run("concat", &self.ffmpeg, &args).await;
        let _ = tokio::fs::remove_file(&list_path).await;
        result?;
        Ok(())
    }

    async fn exec_filter_graph(
        &self,
        inputs: &[&Path],
        graph: &str,
        mappings: &[&str],
        output: &Path,
    ) -> ReelCutResult<()> {
        let mut args = vec!["-y".to_string()];
        for input in inputs {
            args.push("-i".to_string());
            args.push(input.to_string_lossy().to_string());
        }
        args.push("-filter_complex".to_string());
        args.push(graph.to_string());
        for mapping in mappings {
            args.push("-map".to_string());
            args.push((*mapping).to_string());
        }
        args.extend(self.encode_args());
        args.push(output.to_string_lossy().to_string());

        self.run("filter_graph", &self.ffmpeg, &args).await?;
        Ok(())
    }

    async fn extract_audio(&self, input: &Path, output: &Path) -> ReelCutResult<()> {
        let args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-vn".to_string(),
            "-ac".to_string(),
            "1".to_string(),
            "-ar".to_string(),
            "16000".to_string(),
            "-c:a".to_string(),
            "pcm_s16le".to_string(),
            output.to_string_lossy().to_string(),
        ];

        self.run("extract_audio", &self.ffmpeg, &args).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate_rational() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        let ntsc = parse_frame_rate("30000/1001").unwrap();
        assert!((ntsc - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_parse_frame_rate_plain_and_invalid() {
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("30/0"), None);
        assert_eq!(parse_frame_rate("N/A"), None);
    }

    #[test]
    fn test_probe_output_parsing() {
        let raw = r#"{
            "streams": [{"r_frame_rate": "30/1", "nb_frames": "300"}],
            "format": {"duration": "10.000000"}
        }"#;
        let parsed: ProbeOutput = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.streams.len(), 1);
        assert_eq!(parsed.format.unwrap().duration.unwrap(), "10.000000");
    }

    #[test]
    fn test_frame_period() {
        let info = ProbeInfo {
            duration: 10.0,
            fps: 30.0,
            frame_count: 300,
        };
        assert!((info.frame_period() - 0.0333).abs() < 0.001);
    }
}
