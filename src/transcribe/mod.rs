//! Transcription service
//!
//! Turns a clip's source URL into a word-level transcript. Results are
//! cached durably by source URL; concurrent requests for the same URL are
//! coalesced into a single provider submission; and when the primary
//! provider fails, the fallback gets the job.

pub mod cache;
pub mod provider;

pub use cache::{CacheEntry, TranscriptCache};
pub use provider::{provider_by_name, ProviderTranscript, TranscriptionProvider};

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::error::{ReelCutError, ReelCutResult};
use crate::media::MediaTool;
use crate::model::Word;

/// A normalised transcription result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub words: Vec<Word>,
    /// Audio duration in seconds
    pub duration: f64,
}

type InflightTable = Mutex<HashMap<String, Arc<OnceCell<Transcript>>>>;

/// Transcription service over configured providers and a durable cache
pub struct TranscriptionService {
    providers: Vec<Box<dyn TranscriptionProvider>>,
    cache: TranscriptCache,
    tool: Arc<dyn MediaTool>,
    inflight: InflightTable,
}

impl TranscriptionService {
    pub fn new(
        providers: Vec<Box<dyn TranscriptionProvider>>,
        cache: TranscriptCache,
        tool: Arc<dyn MediaTool>,
    ) -> Self {
        Self {
            providers,
            cache,
            tool,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Transcribe the already-fetched media at `media_path`, keyed by its
    /// source URL.
    ///
    /// The cache is consulted first; on a miss a mono 16 kHz rendering of the
    /// audio goes to the first configured provider that succeeds, and the
    /// result is stored under the URL. Concurrent callers for one URL share
    /// a single submission.
    pub async fn transcribe(
        &self,
        source_url: &str,
        media_path: &Path,
        work_dir: &Path,
    ) -> ReelCutResult<Transcript> {
        let cell = {
            let mut table = self.inflight.lock().await;
            table
                .entry(source_url.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let result = cell
            .get_or_try_init(|| self.transcribe_uncoalesced(source_url, media_path, work_dir))
            .await
            .cloned();

        // Drop the table entry so a failed attempt can be retried later and
        // settled entries do not accumulate.
        let mut table = self.inflight.lock().await;
        table.remove(source_url);

        result
    }

    async fn transcribe_uncoalesced(
        &self,
        source_url: &str,
        media_path: &Path,
        work_dir: &Path,
    ) -> ReelCutResult<Transcript> {
        if let Some((words, duration)) = self.cache.get(source_url) {
            debug!(url = source_url, "transcription cache hit");
            return Ok(Transcript { words, duration });
        }

        let audio_path = work_dir.join(format!(
            "{}.wav",
            media_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("audio")
        ));
        self.tool.extract_audio(media_path, &audio_path).await?;

        let duration = self.tool.probe(&audio_path).await?.duration;
        let audio = tokio::fs::read(&audio_path).await?;

        let transcript = self.submit_to_providers(source_url, &audio, duration).await?;
        let _ = tokio::fs::remove_file(&audio_path).await;

        self.cache
            .put(source_url, &transcript.words, transcript.duration)?;
        Ok(transcript)
    }

    /// Walk the provider list in order, allowing one retry per provider
    async fn submit_to_providers(
        &self,
        source_url: &str,
        audio: &[u8],
        duration: f64,
    ) -> ReelCutResult<Transcript> {
        for provider in &self.providers {
            if !provider.is_configured() {
                debug!(provider = provider.name(), "provider not configured, skipping");
                continue;
            }

            for attempt in 0..2 {
                match provider.transcribe(audio, "audio/wav", "en").await {
                    Ok(raw) => {
                        info!(
                            provider = provider.name(),
                            words = raw.words.len(),
                            "transcription complete"
                        );
                        return Ok(normalize(raw, duration));
                    }
                    Err(e) => {
                        warn!(
                            provider = provider.name(),
                            attempt,
                            "transcription attempt failed: {}",
                            e
                        );
                    }
                }
            }
        }

        Err(ReelCutError::TranscriptionUnavailable {
            url: source_url.to_string(),
        })
    }
}

/// Normalise a provider result: clamp confidences, enforce ordering, and
/// settle the duration (the audio rendering's probed duration wins over the
/// provider's estimate).
fn normalize(raw: ProviderTranscript, probed_duration: f64) -> Transcript {
    let mut words = raw.words;
    words.retain(|w| w.end > w.start && !w.text.is_empty());
    words.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));
    for word in &mut words {
        word.confidence = word.confidence.clamp(0.0, 1.0);
    }

    let duration = if probed_duration > 0.0 {
        probed_duration
    } else {
        raw.duration
            .unwrap_or_else(|| words.last().map(|w| w.end).unwrap_or(0.0))
    };

    Transcript { words, duration }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_sorts_and_filters() {
        let raw = ProviderTranscript {
            words: vec![
                Word::new("second", 1.0, 1.5, 0.9),
                Word::new("first", 0.0, 0.5, 0.8),
                Word::new("", 2.0, 2.5, 0.7),
                Word::new("collapsed", 3.0, 3.0, 0.6),
            ],
            duration: Some(4.0),
        };
        let transcript = normalize(raw, 5.0);
        assert_eq!(transcript.words.len(), 2);
        assert_eq!(transcript.words[0].text, "first");
        assert_eq!(transcript.duration, 5.0);
    }

    #[test]
    fn test_normalize_duration_fallbacks() {
        let raw = ProviderTranscript {
            words: vec![Word::new("only", 0.0, 1.0, 1.0)],
            duration: None,
        };
        let transcript = normalize(raw, 0.0);
        assert_eq!(transcript.duration, 1.0);
    }
}
