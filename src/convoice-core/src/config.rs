//! Configuration module for loading TOML config files.
//!
//! Every section is optional; anything left out falls back to the embedded
//! defaults. API keys are never read from the file.

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::ConvoiceError;
use crate::turn::Role;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub synthesis: SynthesisConfig,
    pub elevenlabs: ElevenLabsConfig,
    pub openai: OpenAiConfig,
    pub kokoro: KokoroConfig,
    pub export: ExportConfig,
}

/// Which speech provider turns are sent to.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    ElevenLabs,
    OpenAi,
    Kokoro,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::ElevenLabs => "elevenlabs",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Kokoro => "kokoro",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = ConvoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "elevenlabs" | "eleven" => Ok(ProviderKind::ElevenLabs),
            "openai" => Ok(ProviderKind::OpenAi),
            "kokoro" => Ok(ProviderKind::Kokoro),
            other => Err(ConvoiceError::ConfigError(format!(
                "Unknown provider '{}'. Available providers: elevenlabs, openai, kokoro",
                other
            ))),
        }
    }
}

/// Settings shared by every provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub provider: ProviderKind,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            timeout_secs: 120,
            connect_timeout_secs: 30,
        }
    }
}

/// The fixed role to voice mapping.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct VoicePair {
    pub left: String,
    pub right: String,
}

impl VoicePair {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }

    /// Get voice ID for a speaker role.
    pub fn for_role(&self, role: Role) -> &str {
        match role {
            Role::Left => &self.left,
            Role::Right => &self.right,
        }
    }
}

/// ElevenLabs text-to-speech settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ElevenLabsConfig {
    pub api_base: String,
    pub model_id: String,
    pub output_format: String,
    pub voices: VoicePair,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.elevenlabs.io".to_string(),
            model_id: "eleven_multilingual_v2".to_string(),
            output_format: "mp3_44100_128".to_string(),
            voices: VoicePair::new("EXAVITQu4vr4xnSDxMaL", "FGY2WhTYpPnrIDTdsKH5"),
        }
    }
}

/// OpenAI-compatible `/audio/speech` settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub model: String,
    pub voices: VoicePair,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            model: "tts-1".to_string(),
            voices: VoicePair::new("nova", "onyx"),
        }
    }
}

/// Local kokoro-tiny settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KokoroConfig {
    /// Playback rate applied after synthesis, 1.0 leaves audio untouched.
    pub speed: f32,
    pub voices: VoicePair,
}

impl Default for KokoroConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            voices: VoicePair::new("bf_emma", "bm_george"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Silence inserted between clips in a combined export.
    pub gap_seconds: f32,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConvoiceError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ConvoiceError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Load configuration from string content.
    pub fn from_toml(content: &str) -> Result<Self, ConvoiceError> {
        toml::from_str(content)
            .map_err(|e| ConvoiceError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Voice mapping of the given provider.
    pub fn voices(&self, provider: ProviderKind) -> &VoicePair {
        match provider {
            ProviderKind::ElevenLabs => &self.elevenlabs.voices,
            ProviderKind::OpenAi => &self.openai.voices,
            ProviderKind::Kokoro => &self.kokoro.voices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let config = Config::default();
        assert_eq!(config.synthesis.provider, ProviderKind::ElevenLabs);
        assert_eq!(config.elevenlabs.model_id, "eleven_multilingual_v2");
        assert_eq!(
            config.voices(ProviderKind::ElevenLabs).for_role(Role::Left),
            "EXAVITQu4vr4xnSDxMaL"
        );
        assert_eq!(
            config.voices(ProviderKind::ElevenLabs).for_role(Role::Right),
            "FGY2WhTYpPnrIDTdsKH5"
        );
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [synthesis]
            provider = "openai"

            [openai.voices]
            left = "alloy"
            right = "echo"
            "#,
        )
        .unwrap();

        assert_eq!(config.synthesis.provider, ProviderKind::OpenAi);
        assert_eq!(config.synthesis.timeout_secs, 120);
        assert_eq!(config.openai.model, "tts-1");
        assert_eq!(config.voices(ProviderKind::OpenAi), &VoicePair::new("alloy", "echo"));
        assert_eq!(config.elevenlabs.output_format, "mp3_44100_128");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_toml("[synthesis\nprovider = 3").unwrap_err();
        assert!(matches!(err, ConvoiceError::ConfigError(_)));
    }

    #[test]
    fn test_unknown_provider_in_file() {
        assert!(Config::from_toml("[synthesis]\nprovider = \"espeak\"").is_err());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("convoice.toml");
        fs::write(&path, "[export]\ngap_seconds = 0.25\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.export.gap_seconds, 0.25);
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("ElevenLabs".parse::<ProviderKind>().unwrap(), ProviderKind::ElevenLabs);
        assert_eq!("kokoro".parse::<ProviderKind>().unwrap(), ProviderKind::Kokoro);
        assert!("say".parse::<ProviderKind>().is_err());
    }
}
