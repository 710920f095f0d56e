//! Convoice Core Library
//!
//! Turns a two-voice script into synthesized speech: line-based turn
//! parsing, per-turn synthesis through a speech provider, and sequential
//! playback of the resulting clips.

pub mod audio;
pub mod config;
pub mod error;
pub mod playback;
pub mod processor;
pub mod session;
pub mod tts;
pub mod turn;

pub use audio::AudioClip;
pub use config::{Config, ProviderKind, VoicePair};
pub use error::ConvoiceError;
#[cfg(feature = "playback")]
pub use playback::RodioPlayer;
pub use playback::{ClipPlayer, PlaybackReport, SilentPlayer};
pub use processor::ProcessReport;
pub use session::{Session, SessionCallback, SessionEvent};
pub use tts::{SpeechSynthesizer, SynthesizedAudio, build_synthesizer};
pub use turn::{Conversation, Role, Turn, format_seconds};
