//! ElevenLabs text-to-speech over HTTP.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Serialize;

use crate::audio::MIME_MPEG;
use crate::config::{ElevenLabsConfig, SynthesisConfig};
use crate::error::ConvoiceError;
use crate::tts::{SpeechSynthesizer, SynthesizedAudio, http_client, response_mime};

const XI_API_KEY_HEADER: &str = "xi-api-key";

#[derive(Debug, Serialize)]
struct TextToSpeechBody<'a> {
    text: &'a str,
    model_id: &'a str,
}

/// Client for `POST /v1/text-to-speech/{voice_id}`.
pub struct ElevenLabsSynthesizer {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    model_id: String,
    output_format: String,
}

impl ElevenLabsSynthesizer {
    pub fn new(
        api_key: impl Into<String>,
        config: &ElevenLabsConfig,
        settings: &SynthesisConfig,
    ) -> Result<Self, ConvoiceError> {
        Ok(Self {
            http: http_client(settings)?,
            api_key: api_key.into(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model_id: config.model_id.clone(),
            output_format: config.output_format.clone(),
        })
    }

    fn endpoint(&self, voice_id: &str) -> String {
        format!("{}/v1/text-to-speech/{}", self.api_base, voice_id)
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    fn name(&self) -> &'static str {
        "elevenlabs"
    }

    async fn synthesize(
        &mut self,
        voice_id: &str,
        text: &str,
    ) -> Result<SynthesizedAudio, ConvoiceError> {
        let body = TextToSpeechBody {
            text,
            model_id: &self.model_id,
        };

        let response = self
            .http
            .post(self.endpoint(voice_id))
            .query(&[("output_format", self.output_format.as_str())])
            .header(XI_API_KEY_HEADER, &self.api_key)
            .header(ACCEPT, MIME_MPEG)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error response: {}", e));
            return Err(ConvoiceError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let mime_type = response_mime(&response, MIME_MPEG);
        let bytes = response.bytes().await?.to_vec();
        tracing::debug!(voice_id, bytes = bytes.len(), "elevenlabs audio received");

        Ok(SynthesizedAudio { bytes, mime_type })
    }
}
