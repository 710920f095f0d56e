//! Local synthesis using kokoro-tiny.
//!
//! Audio is generated on this machine and wrapped in WAV so it flows through
//! the same decoder as the remote providers.

use async_trait::async_trait;
use kokoro_tiny::TtsEngine;

use crate::audio::{MIME_WAV, encode_wav};
use crate::config::KokoroConfig;
use crate::error::ConvoiceError;
use crate::tts::{SpeechSynthesizer, SynthesizedAudio};

const SAMPLE_RATE: u32 = 24_000;
/// Kokoro has a strict limit on text length per call.
const MAX_CHUNK_CHARS: usize = 200;
const CHUNK_PAUSE_SAMPLES: usize = 7_200;
const TRAILING_PAD_SAMPLES: usize = 12_000;

pub struct KokoroSynthesizer {
    engine: TtsEngine,
    config: KokoroConfig,
    available_voices: Vec<String>,
}

impl KokoroSynthesizer {
    /// Initialize the TTS engine (downloads model on first run).
    pub async fn new(config: KokoroConfig) -> Result<Self, ConvoiceError> {
        let engine = TtsEngine::new().await.map_err(|e| ConvoiceError::Synthesis {
            provider: "kokoro",
            message: format!("Failed to initialize TTS: {}", e),
        })?;

        let available_voices = engine.voices();
        let synth = Self {
            engine,
            config,
            available_voices,
        };
        synth.validate_voice(&synth.config.voices.left)?;
        synth.validate_voice(&synth.config.voices.right)?;

        Ok(synth)
    }

    pub fn available_voices(&self) -> &[String] {
        &self.available_voices
    }

    fn validate_voice(&self, voice_id: &str) -> Result<(), ConvoiceError> {
        if self.available_voices.iter().any(|v| v == voice_id) {
            return Ok(());
        }

        Err(ConvoiceError::ConfigError(format!(
            "Unknown kokoro voice '{}'. Available voices:\n{}",
            voice_id,
            self.format_available_voices()
        )))
    }

    fn format_available_voices(&self) -> String {
        let mut english_voices: Vec<&String> = self
            .available_voices
            .iter()
            .filter(|v| ["af_", "am_", "bf_", "bm_"].iter().any(|p| v.starts_with(p)))
            .collect();
        english_voices.sort();

        english_voices
            .iter()
            .map(|v| format!("  - {}", v))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl SpeechSynthesizer for KokoroSynthesizer {
    fn name(&self) -> &'static str {
        "kokoro"
    }

    async fn synthesize(
        &mut self,
        voice_id: &str,
        text: &str,
    ) -> Result<SynthesizedAudio, ConvoiceError> {
        self.validate_voice(voice_id)?;

        let chunks = split_into_chunks(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(ConvoiceError::Synthesis {
                provider: "kokoro",
                message: "Nothing to say".to_string(),
            });
        }

        let mut samples = Vec::new();
        for chunk in chunks {
            let chunk_samples = self
                .engine
                .synthesize(&chunk, Some(voice_id))
                .map_err(|e| ConvoiceError::Synthesis {
                    provider: "kokoro",
                    message: e.to_string(),
                })?;
            samples.extend(chunk_samples);
            // Pause between chunks prevents clipped word endings.
            samples.extend(vec![0.0; CHUNK_PAUSE_SAMPLES]);
        }
        samples.extend(vec![0.0; TRAILING_PAD_SAMPLES]);

        let samples = adjust_audio_speed(samples, self.config.speed);

        Ok(SynthesizedAudio {
            bytes: encode_wav(&samples, 1, SAMPLE_RATE)?,
            mime_type: MIME_WAV.to_string(),
        })
    }
}

/// Group sentences into chunks of at most `max_chars`.
///
/// A sentence longer than the limit is broken at commas; a single clause
/// longer than the limit becomes its own oversized chunk.
fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let pieces = text
        .split_inclusive(['.', '!', '?', ';'])
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .flat_map(|sentence| {
            if sentence.len() > max_chars {
                sentence
                    .split_inclusive(',')
                    .map(str::trim)
                    .filter(|clause| !clause.is_empty())
                    .collect()
            } else {
                vec![sentence]
            }
        });

    let mut chunks = Vec::new();
    let mut current = String::new();
    for piece in pieces {
        if !current.is_empty() && current.len() + 1 + piece.len() > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(piece);
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Resample by linear interpolation; `rate > 1.0` speaks faster.
fn adjust_audio_speed(samples: Vec<f32>, rate: f32) -> Vec<f32> {
    if rate <= 0.0 || (rate - 1.0).abs() < 0.001 {
        return samples;
    }

    let len = (samples.len() as f32 / rate) as usize;
    (0..len)
        .filter_map(|i| {
            let position = i as f32 * rate;
            let index = position as usize;
            let frac = position - index as f32;
            match (samples.get(index), samples.get(index + 1)) {
                (Some(a), Some(b)) => Some(a * (1.0 - frac) + b * frac),
                (Some(a), None) => Some(*a),
                _ => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_into_chunks_respects_limit() {
        let text = "Hello world. This is a test. Another sentence here.";
        let chunks = split_into_chunks(text, 30);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.len() <= 30);
        }
    }

    #[test]
    fn test_split_into_chunks_breaks_long_sentence_at_commas() {
        let chunks = split_into_chunks("one, two, three, four.", 10);
        assert_eq!(chunks, vec!["one, two,", "three,", "four."]);
    }

    #[test]
    fn test_split_into_chunks_packs_short_sentences() {
        let chunks = split_into_chunks("Hi. Yes! Ok?", 200);
        assert_eq!(chunks, vec!["Hi. Yes! Ok?"]);
    }

    #[test]
    fn test_split_into_chunks_empty_text() {
        assert!(split_into_chunks("   ", 200).is_empty());
    }

    #[test]
    fn test_adjust_audio_speed_halves_length() {
        let samples = vec![0.5; 100];
        assert_eq!(adjust_audio_speed(samples.clone(), 2.0).len(), 50);
        assert_eq!(adjust_audio_speed(samples, 1.0).len(), 100);
    }

    #[test]
    fn test_adjust_audio_speed_interpolates_when_slowing() {
        let slowed = adjust_audio_speed(vec![0.0, 1.0, 0.0, 1.0], 0.5);
        assert_eq!(slowed.len(), 8);
        assert_eq!(&slowed[..3], &[0.0_f32, 0.5, 1.0][..]);
    }
}
