//! Text-to-speech provider for narration audio

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::error::{ReelCutError, ReelCutResult};

const TTS_TIMEOUT: Duration = Duration::from_secs(120);

/// Converts narration text to audio
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Render `text` as MP3 bytes in the given voice and delivery style
    async fn synthesize(&self, text: &str, voice_id: &str, style: &str) -> ReelCutResult<Vec<u8>>;
}

/// ElevenLabs text-to-speech
pub struct ElevenLabsSynthesizer {
    api_key: Option<String>,
    base_url: String,
}

impl ElevenLabsSynthesizer {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("ELEVENLABS_API_KEY").ok(),
            base_url: "https://api.elevenlabs.io/v1/text-to-speech".to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str, voice_id: &str, style: &str) -> ReelCutResult<Vec<u8>> {
        let api_key = self.api_key.as_ref().ok_or_else(|| ReelCutError::Config {
            message: "text-to-speech provider has no API key".to_string(),
        })?;

        let url = format!("{}/{}", self.base_url, voice_id);
        let body = json!({
            "text": text,
            "model_id": "eleven_multilingual_v2",
            "voice_settings": {
                "stability": 0.5,
                "similarity_boost": 0.75,
                "style": style,
            }
        });

        let client = reqwest::Client::builder()
            .timeout(TTS_TIMEOUT)
            .build()
            .map_err(|e| ReelCutError::Config {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        let response = client
            .post(&url)
            .header("xi-api-key", api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&body)
            .send()
            .await
            .map_err(|e| ReelCutError::Network {
                url: url.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReelCutError::UpstreamRejected {
                url,
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| ReelCutError::Network {
            url,
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}
