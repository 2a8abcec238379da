//! Transcription provider adapters
//!
//! Two hosted speech-to-text providers sit behind one trait; the pipeline
//! configuration orders them and the service falls back from one to the
//! next. Only this module knows either provider's wire format.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{ReelCutError, ReelCutResult};
use crate::model::Word;

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(120);

/// A provider's raw result, before normalisation
#[derive(Debug, Clone)]
pub struct ProviderTranscript {
    pub words: Vec<Word>,
    /// Audio duration when the provider reports one
    pub duration: Option<f64>,
}

/// A hosted speech-to-text service
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    /// Name used in configuration and logs
    fn name(&self) -> &'static str;

    /// Whether the provider has the configuration it needs (API key)
    fn is_configured(&self) -> bool;

    /// Submit audio for word-level transcription
    async fn transcribe(
        &self,
        audio: &[u8],
        mime_type: &str,
        language: &str,
    ) -> ReelCutResult<ProviderTranscript>;
}

/// Build a provider by its configured name
pub fn provider_by_name(name: &str) -> Option<Box<dyn TranscriptionProvider>> {
    match name {
        "whisper" => Some(Box::new(WhisperProvider::from_env())),
        "deepgram" => Some(Box::new(DeepgramProvider::from_env())),
        _ => None,
    }
}

fn http_client() -> ReelCutResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(PROVIDER_TIMEOUT)
        .build()
        .map_err(|e| ReelCutError::Config {
            message: format!("failed to build HTTP client: {}", e),
        })
}

// ---------------------------------------------------------------------------
// Whisper (OpenAI)
// ---------------------------------------------------------------------------

/// OpenAI Whisper with word-level timestamp granularity
pub struct WhisperProvider {
    api_key: Option<String>,
    endpoint: String,
}

impl WhisperProvider {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            endpoint: "https://api.openai.com/v1/audio/transcriptions".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    words: Vec<WhisperWord>,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperWord {
    word: String,
    start: f64,
    end: f64,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    avg_logprob: f64,
}

impl WhisperResponse {
    /// The word-granular response carries no per-word probability, so each
    /// word inherits confidence from its enclosing segment's average
    /// log-probability.
    fn confidence_at(&self, time: f64) -> f64 {
        self.segments
            .iter()
            .find(|s| time >= s.start && time < s.end)
            .map(|s| s.avg_logprob.exp().clamp(0.0, 1.0))
            .unwrap_or(1.0)
    }
}

#[async_trait]
impl TranscriptionProvider for WhisperProvider {
    fn name(&self) -> &'static str {
        "whisper"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        mime_type: &str,
        language: &str,
    ) -> ReelCutResult<ProviderTranscript> {
        let api_key = self.api_key.as_ref().ok_or_else(|| ReelCutError::Config {
            message: "whisper provider has no API key".to_string(),
        })?;

        let file_part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name("audio.wav")
            .mime_str(mime_type)
            .map_err(|e| ReelCutError::Config {
                message: format!("invalid mime type {}: {}", mime_type, e),
            })?;
        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("model", "whisper-1")
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "word")
            .text("timestamp_granularities[]", "segment")
            .text("language", language.to_string());

        let response = http_client()?
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ReelCutError::Network {
                url: self.endpoint.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReelCutError::UpstreamRejected {
                url: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let parsed: WhisperResponse =
            response.json().await.map_err(|e| ReelCutError::Network {
                url: self.endpoint.clone(),
                message: format!("unparseable response: {}", e),
            })?;

        let words = parsed
            .words
            .iter()
            .map(|w| {
                Word::new(
                    w.word.trim(),
                    w.start,
                    w.end,
                    parsed.confidence_at(w.start),
                )
            })
            .collect();

        Ok(ProviderTranscript {
            words,
            duration: parsed.duration,
        })
    }
}

// ---------------------------------------------------------------------------
// Deepgram
// ---------------------------------------------------------------------------

/// Deepgram nova-2, which reports per-word confidence natively
pub struct DeepgramProvider {
    api_key: Option<String>,
    endpoint: String,
}

impl DeepgramProvider {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("DEEPGRAM_API_KEY").ok(),
            endpoint: "https://api.deepgram.com/v1/listen".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeepgramResponse {
    metadata: Option<DeepgramMetadata>,
    results: DeepgramResults,
}

#[derive(Debug, Deserialize)]
struct DeepgramMetadata {
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(Debug, Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(Debug, Deserialize)]
struct DeepgramAlternative {
    #[serde(default)]
    words: Vec<DeepgramWord>,
}

#[derive(Debug, Deserialize)]
struct DeepgramWord {
    word: String,
    start: f64,
    end: f64,
    #[serde(default)]
    confidence: Option<f64>,
}

#[async_trait]
impl TranscriptionProvider for DeepgramProvider {
    fn name(&self) -> &'static str {
        "deepgram"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        mime_type: &str,
        language: &str,
    ) -> ReelCutResult<ProviderTranscript> {
        let api_key = self.api_key.as_ref().ok_or_else(|| ReelCutError::Config {
            message: "deepgram provider has no API key".to_string(),
        })?;

        let response = http_client()?
            .post(&self.endpoint)
            .query(&[
                ("model", "nova-2"),
                ("punctuate", "true"),
                ("language", language),
            ])
            .header(reqwest::header::AUTHORIZATION, format!("Token {}", api_key))
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| ReelCutError::Network {
                url: self.endpoint.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReelCutError::UpstreamRejected {
                url: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let parsed: DeepgramResponse =
            response.json().await.map_err(|e| ReelCutError::Network {
                url: self.endpoint.clone(),
                message: format!("unparseable response: {}", e),
            })?;

        let words = parsed
            .results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map(|a| {
                a.words
                    .iter()
                    .map(|w| Word::new(w.word.trim(), w.start, w.end, w.confidence.unwrap_or(1.0)))
                    .collect()
            })
            .unwrap_or_default();

        Ok(ProviderTranscript {
            words,
            duration: parsed.metadata.and_then(|m| m.duration),
        })
    }
}
