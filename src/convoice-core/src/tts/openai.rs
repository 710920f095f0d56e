//! OpenAI-compatible `/audio/speech` synthesis.

use async_trait::async_trait;
use serde::Serialize;

use crate::audio::MIME_MPEG;
use crate::config::{OpenAiConfig, SynthesisConfig};
use crate::error::ConvoiceError;
use crate::tts::{SpeechSynthesizer, SynthesizedAudio, http_client, response_mime};

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

pub struct OpenAiSynthesizer {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl OpenAiSynthesizer {
    pub fn new(
        api_key: impl Into<String>,
        config: &OpenAiConfig,
        settings: &SynthesisConfig,
    ) -> Result<Self, ConvoiceError> {
        Ok(Self {
            http: http_client(settings)?,
            api_key: api_key.into(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSynthesizer {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn synthesize(
        &mut self,
        voice_id: &str,
        text: &str,
    ) -> Result<SynthesizedAudio, ConvoiceError> {
        let request = SpeechRequest {
            model: &self.model,
            input: text,
            voice: voice_id,
            response_format: "mp3",
        };

        let response = self
            .http
            .post(format!("{}/audio/speech", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
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
        tracing::debug!(voice_id, bytes = bytes.len(), "openai audio received");

        Ok(SynthesizedAudio { bytes, mime_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn test_speech_request_shape() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/audio/speech")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::Json(json!({
                "model": "tts-1",
                "input": "Good morning",
                "voice": "nova",
                "response_format": "mp3",
            })))
            .with_status(200)
            .with_header("content-type", "audio/mpeg")
            .with_body(b"mp3bytes")
            .create_async()
            .await;

        let config = OpenAiConfig {
            api_base: format!("{}/v1", server.url()),
            ..OpenAiConfig::default()
        };
        let mut synth =
            OpenAiSynthesizer::new("sk-test", &config, &SynthesisConfig::default()).unwrap();

        let audio = synth.synthesize("nova", "Good morning").await.unwrap();
        mock.assert_async().await;
        assert_eq!(audio.bytes, b"mp3bytes".to_vec());
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/audio/speech")
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let config = OpenAiConfig {
            api_base: server.url(),
            ..OpenAiConfig::default()
        };
        let mut synth =
            OpenAiSynthesizer::new("sk-test", &config, &SynthesisConfig::default()).unwrap();

        let err = synth.synthesize("onyx", "Hi").await.unwrap_err();
        assert!(matches!(err, ConvoiceError::Api { status: 500, .. }));
    }
}
