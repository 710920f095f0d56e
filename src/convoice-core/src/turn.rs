//! Conversation turns and the line-based turn parser.
//!
//! One line of script is one turn. Speakers alternate by position, starting
//! with the left voice, so a turn's role is always derived from its sequence
//! number and never stored.

use serde::{Deserialize, Serialize};

use crate::audio::AudioClip;

/// One of the two fixed speakers in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// First speaker, owns odd positions (1, 3, 5, ...).
    Left,
    /// Second speaker, owns even positions.
    Right,
}

impl Role {
    /// Role of the turn at a 1-based position.
    pub fn for_position(sequence_number: usize) -> Self {
        if sequence_number % 2 == 1 {
            Role::Left
        } else {
            Role::Right
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Left => "LEFT",
            Role::Right => "RIGHT",
        }
    }
}

/// A single utterance in the conversation.
#[derive(Debug, Clone)]
pub struct Turn {
    sequence_number: usize,
    text: String,
    clip: Option<AudioClip>,
}

impl Turn {
    /// Create an unprocessed turn. The text is trimmed.
    pub fn new(sequence_number: usize, text: &str) -> Self {
        Self {
            sequence_number,
            text: text.trim().to_string(),
            clip: None,
        }
    }

    /// 1-based position in the conversation.
    pub fn sequence_number(&self) -> usize {
        self.sequence_number
    }

    pub fn role(&self) -> Role {
        Role::for_position(self.sequence_number)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn clip(&self) -> Option<&AudioClip> {
        self.clip.as_ref()
    }

    pub fn has_audio(&self) -> bool {
        self.clip.is_some()
    }

    /// Duration of the synthesized clip, zero until one exists.
    pub fn duration_seconds(&self) -> f64 {
        self.clip.as_ref().map_or(0.0, AudioClip::duration_seconds)
    }

    pub(crate) fn set_clip(&mut self, clip: AudioClip) {
        self.clip = Some(clip);
    }
}

/// Parse raw text into turns, numbering from `existing + 1`.
///
/// Every line produces a turn, including empty ones.
pub fn parse_turns(raw: &str, existing: usize) -> Vec<Turn> {
    raw.split('\n')
        .enumerate()
        .map(|(index, line)| Turn::new(existing + index + 1, line))
        .collect()
}

/// The ordered turn list.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(raw: &str) -> Self {
        Self {
            turns: parse_turns(raw, 0),
        }
    }

    /// Append lines after the current turns, continuing the alternation.
    ///
    /// Returns the number of turns added.
    pub fn append(&mut self, raw: &str) -> usize {
        let added = parse_turns(raw, self.turns.len());
        let count = added.len();
        self.turns.extend(added);
        count
    }

    /// Reparse the whole conversation from edited text.
    ///
    /// Positions and roles are reassigned. A clip survives only when the
    /// same position held exactly the same text before the edit. Returns
    /// the number of clips kept.
    pub fn replace_text(&mut self, raw: &str) -> usize {
        let mut previous = std::mem::take(&mut self.turns).into_iter();
        let mut kept = 0;

        self.turns = parse_turns(raw, 0)
            .into_iter()
            .map(|mut turn| {
                if let Some(old) = previous.next() {
                    if old.text == turn.text {
                        if let Some(clip) = old.clip {
                            turn.clip = Some(clip);
                            kept += 1;
                        }
                    }
                }
                turn
            })
            .collect();

        kept
    }

    /// Drop every turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub(crate) fn turns_mut(&mut self) -> &mut [Turn] {
        &mut self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The script text, one turn per line.
    pub fn text(&self) -> String {
        self.turns
            .iter()
            .map(Turn::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_fully_processed(&self) -> bool {
        self.turns.iter().all(Turn::has_audio)
    }

    /// Sequence numbers of turns that still lack audio.
    pub fn missing_audio(&self) -> Vec<usize> {
        self.turns
            .iter()
            .filter(|t| !t.has_audio())
            .map(Turn::sequence_number)
            .collect()
    }

    /// Unrounded sum of every turn's duration.
    pub fn total_duration_seconds(&self) -> f64 {
        self.turns.iter().map(Turn::duration_seconds).sum()
    }
}

/// Format seconds for display, two decimal places.
pub fn format_seconds(seconds: f64) -> String {
    format!("{:.2}", seconds)
}
