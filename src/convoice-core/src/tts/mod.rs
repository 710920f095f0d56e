//! Speech synthesis providers.
//!
//! A synthesizer turns one piece of text into one encoded audio payload for
//! a given voice. Which voice a turn uses is decided by the caller from the
//! configured [`VoicePair`](crate::config::VoicePair).

pub mod elevenlabs;
#[cfg(feature = "kokoro")]
pub mod kokoro;
pub mod openai;

use async_trait::async_trait;
use std::time::Duration;

use crate::config::{Config, ProviderKind, SynthesisConfig};
use crate::error::ConvoiceError;

pub use elevenlabs::ElevenLabsSynthesizer;
#[cfg(feature = "kokoro")]
pub use kokoro::KokoroSynthesizer;
pub use openai::OpenAiSynthesizer;

/// Encoded audio returned by a provider.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`, e.g. `audio/mpeg`.
    pub mime_type: String,
}

/// A text-to-speech backend.
#[async_trait]
pub trait SpeechSynthesizer: Send {
    /// Short provider name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Synthesize `text` with the given provider-specific voice.
    async fn synthesize(
        &mut self,
        voice_id: &str,
        text: &str,
    ) -> Result<SynthesizedAudio, ConvoiceError>;
}

/// Build the shared HTTP client for remote providers.
pub(crate) fn http_client(settings: &SynthesisConfig) -> Result<reqwest::Client, ConvoiceError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .build()
        .map_err(|e| ConvoiceError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

/// Read the MIME type from a response, falling back to `default`.
pub(crate) fn response_mime(response: &reqwest::Response, default: &str) -> String {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Create the synthesizer selected by `provider`.
///
/// `api_key` is required by the remote providers and ignored by kokoro.
pub async fn build_synthesizer(
    config: &Config,
    provider: ProviderKind,
    api_key: Option<String>,
) -> Result<Box<dyn SpeechSynthesizer>, ConvoiceError> {
    let require_key = |key: Option<String>| {
        key.filter(|k| !k.trim().is_empty()).ok_or_else(|| {
            ConvoiceError::ConfigError(format!("An API key is required for {}", provider))
        })
    };

    match provider {
        ProviderKind::ElevenLabs => Ok(Box::new(ElevenLabsSynthesizer::new(
            require_key(api_key)?,
            &config.elevenlabs,
            &config.synthesis,
        )?)),
        ProviderKind::OpenAi => Ok(Box::new(OpenAiSynthesizer::new(
            require_key(api_key)?,
            &config.openai,
            &config.synthesis,
        )?)),
        #[cfg(feature = "kokoro")]
        ProviderKind::Kokoro => Ok(Box::new(
            KokoroSynthesizer::new(config.kokoro.clone()).await?,
        )),
        #[cfg(not(feature = "kokoro"))]
        ProviderKind::Kokoro => Err(ConvoiceError::ConfigError(
            "This build does not include the kokoro provider (enable the `kokoro` feature)"
                .to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_remote_provider_requires_key() {
        let config = Config::default();
        let err = build_synthesizer(&config, ProviderKind::ElevenLabs, None)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ConvoiceError::ConfigError(_)));

        let err = build_synthesizer(&config, ProviderKind::OpenAi, Some("  ".to_string()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ConvoiceError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_build_elevenlabs() {
        let synth = build_synthesizer(
            &Config::default(),
            ProviderKind::ElevenLabs,
            Some("key".to_string()),
        )
        .await
        .unwrap();
        assert_eq!(synth.name(), "elevenlabs");
    }
}
