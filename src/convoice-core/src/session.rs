//! Conversation session state.
//!
//! Owns the turn list, the busy flags and the collaborators used to
//! synthesize and play turns. Front ends drive it through the two actions,
//! [`Session::process`] and [`Session::play`], and observe progress through
//! the event callback.

use std::path::Path;

use crate::audio::{AudioClip, export_wav};
use crate::config::VoicePair;
use crate::error::ConvoiceError;
use crate::playback::{ClipPlayer, PlaybackReport, play_turns};
use crate::processor::{ProcessReport, process_turns};
use crate::tts::SpeechSynthesizer;
use crate::turn::{Conversation, Role, Turn};

/// Callback for session events.
pub type SessionCallback = Box<dyn Fn(SessionEvent) + Send + Sync>;

/// Events emitted while processing or playing.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    ProcessingStarted { pending: usize },
    /// A turn is being sent to the speech provider.
    TurnSynthesizing { sequence_number: usize, role: Role },
    TurnSynthesized {
        sequence_number: usize,
        duration_seconds: f64,
    },
    /// Synthesis failed; the turn stays without audio.
    TurnFailed {
        sequence_number: usize,
        error: String,
    },
    ProcessingFinished { report: ProcessReport },
    PlaybackStarted { clips: usize },
    ClipStarted {
        sequence_number: usize,
        role: Role,
        duration_seconds: f64,
    },
    /// Playback failed; the clip counts as finished.
    ClipFailed {
        sequence_number: usize,
        error: String,
    },
    PlaybackFinished { report: PlaybackReport },
}

pub struct Session {
    conversation: Conversation,
    synthesizer: Box<dyn SpeechSynthesizer>,
    player: Box<dyn ClipPlayer>,
    voices: VoicePair,
    processing: bool,
    playing: bool,
    callback: Option<SessionCallback>,
}

impl Session {
    pub fn new(
        synthesizer: Box<dyn SpeechSynthesizer>,
        player: Box<dyn ClipPlayer>,
        voices: VoicePair,
    ) -> Self {
        Self {
            conversation: Conversation::new(),
            synthesizer,
            player,
            voices,
            processing: false,
            playing: false,
            callback: None,
        }
    }

    /// Set a callback for session events.
    pub fn with_callback(mut self, callback: SessionCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Replace the script with edited text.
    ///
    /// Returns the number of turns whose audio survived the edit.
    pub fn set_text(&mut self, raw: &str) -> usize {
        self.conversation.replace_text(raw)
    }

    /// Append lines to the end of the conversation.
    pub fn append_lines(&mut self, raw: &str) -> usize {
        self.conversation.append(raw)
    }

    pub fn clear(&mut self) {
        self.conversation.clear();
    }

    /// The current script, one turn per line.
    pub fn text(&self) -> String {
        self.conversation.text()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn turns(&self) -> &[Turn] {
        self.conversation.turns()
    }

    pub fn voices(&self) -> &VoicePair {
        &self.voices
    }

    pub fn provider_name(&self) -> &'static str {
        self.synthesizer.name()
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn can_process(&self) -> bool {
        !self.processing
    }

    /// Playback needs every turn to have audio.
    pub fn can_play(&self) -> bool {
        !self.playing && self.conversation.is_fully_processed()
    }

    pub fn total_duration_seconds(&self) -> f64 {
        self.conversation.total_duration_seconds()
    }

    /// Synthesize audio for every turn that lacks it.
    pub async fn process(&mut self) -> Result<ProcessReport, ConvoiceError> {
        if self.processing {
            return Err(ConvoiceError::Busy("processing"));
        }

        self.processing = true;
        let pending = self.conversation.missing_audio().len();
        tracing::info!(
            turns = self.conversation.len(),
            pending,
            provider = self.synthesizer.name(),
            "processing conversation"
        );

        let Self {
            conversation,
            synthesizer,
            voices,
            callback,
            ..
        } = self;
        let emit = |event: SessionEvent| {
            if let Some(callback) = callback.as_ref() {
                callback(event);
            }
        };

        emit(SessionEvent::ProcessingStarted { pending });
        let report = process_turns(
            conversation.turns_mut(),
            synthesizer.as_mut(),
            voices,
            &emit,
        )
        .await;
        emit(SessionEvent::ProcessingFinished {
            report: report.clone(),
        });

        self.processing = false;
        tracing::info!(
            synthesized = report.synthesized,
            failed = report.failed.len(),
            total_seconds = self.conversation.total_duration_seconds(),
            "processing finished"
        );

        Ok(report)
    }

    /// Play every turn in order.
    ///
    /// Refused until every turn has audio.
    pub async fn play(&mut self) -> Result<PlaybackReport, ConvoiceError> {
        if self.playing {
            return Err(ConvoiceError::Busy("playback"));
        }
        let missing = self.conversation.missing_audio();
        if !missing.is_empty() {
            return Err(ConvoiceError::NotReady { missing });
        }

        self.playing = true;
        tracing::info!(clips = self.conversation.len(), "playing conversation");

        let Self {
            conversation,
            player,
            callback,
            ..
        } = self;
        let emit = |event: SessionEvent| {
            if let Some(callback) = callback.as_ref() {
                callback(event);
            }
        };

        emit(SessionEvent::PlaybackStarted {
            clips: conversation.len(),
        });
        let report = play_turns(conversation.turns(), player.as_mut(), &emit).await;
        emit(SessionEvent::PlaybackFinished {
            report: report.clone(),
        });

        self.playing = false;
        Ok(report)
    }

    /// Write every synthesized clip, in order, to one WAV file.
    pub fn export_wav<P: AsRef<Path>>(
        &self,
        path: P,
        gap_seconds: f32,
    ) -> Result<usize, ConvoiceError> {
        let clips: Vec<&AudioClip> = self.turns().iter().filter_map(Turn::clip).collect();
        export_wav(path.as_ref(), &clips, gap_seconds)?;
        tracing::info!(
            path = %path.as_ref().display(),
            clips = clips.len(),
            "exported conversation"
        );
        Ok(clips.len())
    }
}
