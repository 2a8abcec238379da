//! Clip surgery: extract the selected intervals of one clip into a fragment
//!
//! Each interval is re-encoded with identical parameters so that the joins
//! are frame- and sample-clean, with a short audio fade on both sides of
//! every cut. Re-encoding rather than stream copy is required because the
//! micro-fades introduce per-segment filter state that a stream copy cannot
//! represent.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::error::{ReelCutError, ReelCutResult};
use crate::media::MediaTool;
use crate::model::Interval;
use crate::utils::time::format_clock;

/// Extracts interval sets from fetched clips
pub struct ClipSurgeon {
    tool: Arc<dyn MediaTool>,
}

impl ClipSurgeon {
    pub fn new(tool: Arc<dyn MediaTool>) -> Self {
        Self { tool }
    }

    /// Produce a single MP4 at `output` containing exactly `intervals` of
    /// `input`, concatenated in order.
    ///
    /// The output's duration equals the interval sum to within one frame
    /// period.
    pub async fn extract(
        &self,
        input: &Path,
        intervals: &[Interval],
        output: &Path,
    ) -> ReelCutResult<()> {
        if intervals.is_empty() {
            return Err(ReelCutError::InvariantViolation {
                message: format!("no intervals to extract from {}", input.display()),
            });
        }

        let started = Instant::now();
        let total: f64 = intervals.iter().map(Interval::duration).sum();
        info!(
            input = %input.display(),
            intervals = intervals.len(),
            kept = %format_clock(total),
            "extracting intervals"
        );

        if let [only] = intervals {
            self.tool
                .trim(input, output, only.start, only.end, true)
                .await?;
            debug!(elapsed = ?started.elapsed(), "single-interval extraction done");
            return Ok(());
        }

        // Multiple intervals: trim each with the shared encoding parameters,
        // then join through the concat demuxer.
        let mut parts: Vec<PathBuf> = Vec::with_capacity(intervals.len());
        let mut result = Ok(());
        for (index, interval) in intervals.iter().enumerate() {
            let part = part_path(output, index);
            match self
                .tool
                .trim(input, &part, interval.start, interval.end, true)
                .await
            {
                Ok(()) => parts.push(part),
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }

        if result.is_ok() {
            let part_refs: Vec<&Path> = parts.iter().map(PathBuf::as_path).collect();
            result = self.tool.concat_reencode(&part_refs, output).await;
        }

        for part in &parts {
            let _ = tokio::fs::remove_file(part).await;
        }

        result?;
        debug!(elapsed = ?started.elapsed(), "multi-interval extraction done");
        Ok(())
    }
}

/// Temp name for interval `index`, beside the final output
fn part_path(output: &Path, index: usize) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("fragment");
    output.with_file_name(format!("{}.part{}.mp4", stem, index))
}
