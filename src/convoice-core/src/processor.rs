//! Sequential synthesis of conversation turns.

use crate::audio::AudioClip;
use crate::config::VoicePair;
use crate::error::ConvoiceError;
use crate::session::SessionEvent;
use crate::tts::SpeechSynthesizer;
use crate::turn::Turn;

/// Outcome of one processing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessReport {
    /// Turns that received audio in this pass.
    pub synthesized: usize,
    /// Turns that already had audio and were left alone.
    pub skipped: usize,
    /// Sequence numbers of turns that failed and still lack audio.
    pub failed: Vec<usize>,
}

/// Synthesize and decode the audio for a single turn.
pub async fn synthesize_turn(
    turn: &Turn,
    synthesizer: &mut dyn SpeechSynthesizer,
    voices: &VoicePair,
) -> Result<AudioClip, ConvoiceError> {
    let voice_id = voices.for_role(turn.role());
    let audio = synthesizer.synthesize(voice_id, turn.text()).await?;
    AudioClip::decode(&audio.bytes, &audio.mime_type)
}

/// Give every turn lacking audio a clip, strictly in order.
///
/// Turns that already have a clip are skipped. A failed turn is logged,
/// reported and left without audio; the remaining turns are still
/// processed.
pub async fn process_turns(
    turns: &mut [Turn],
    synthesizer: &mut dyn SpeechSynthesizer,
    voices: &VoicePair,
    emit: &dyn Fn(SessionEvent),
) -> ProcessReport {
    let mut report = ProcessReport::default();

    for turn in turns.iter_mut() {
        if turn.has_audio() {
            report.skipped += 1;
            continue;
        }

        let sequence_number = turn.sequence_number();
        emit(SessionEvent::TurnSynthesizing {
            sequence_number,
            role: turn.role(),
        });

        match synthesize_turn(turn, synthesizer, voices).await {
            Ok(clip) => {
                let duration_seconds = clip.duration_seconds();
                tracing::debug!(sequence_number, duration_seconds, "turn synthesized");
                turn.set_clip(clip);
                report.synthesized += 1;
                emit(SessionEvent::TurnSynthesized {
                    sequence_number,
                    duration_seconds,
                });
            }
            Err(e) => {
                tracing::warn!(
                    sequence_number,
                    provider = synthesizer.name(),
                    error = %e,
                    "failed to generate audio"
                );
                report.failed.push(sequence_number);
                emit(SessionEvent::TurnFailed {
                    sequence_number,
                    error: e.to_string(),
                });
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{MIME_WAV, tone_wav};
    use crate::tts::SynthesizedAudio;
    use crate::turn::Conversation;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Returns `frames` worth of WAV per call, failing on listed texts.
    struct ScriptedSynth {
        calls: Arc<Mutex<Vec<(String, String)>>>,
        fail_on: Vec<&'static str>,
    }

    #[async_trait]
    impl SpeechSynthesizer for ScriptedSynth {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn synthesize(
            &mut self,
            voice_id: &str,
            text: &str,
        ) -> Result<SynthesizedAudio, ConvoiceError> {
            self.calls
                .lock()
                .unwrap()
                .push((voice_id.to_string(), text.to_string()));
            if self.fail_on.contains(&text) {
                return Err(ConvoiceError::Api {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            Ok(SynthesizedAudio {
                bytes: tone_wav(text.len() * 100, 1, 1_000),
                mime_type: MIME_WAV.to_string(),
            })
        }
    }

    fn synth(fail_on: Vec<&'static str>) -> (ScriptedSynth, Arc<Mutex<Vec<(String, String)>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            ScriptedSynth {
                calls: Arc::clone(&calls),
                fail_on,
            },
            calls,
        )
    }

    fn voices() -> VoicePair {
        VoicePair::new("L", "R")
    }

    #[tokio::test]
    async fn test_voices_follow_roles_in_order() {
        let mut conversation = Conversation::parse("one\ntwo\nthree");
        let (mut synth, calls) = synth(vec![]);

        let report =
            process_turns(conversation.turns_mut(), &mut synth, &voices(), &|_| {}).await;

        assert_eq!(report.synthesized, 3);
        assert!(report.failed.is_empty());
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                ("L".to_string(), "one".to_string()),
                ("R".to_string(), "two".to_string()),
                ("L".to_string(), "three".to_string()),
            ]
        );
        // "three" is 5 chars -> 500 frames at 1 kHz.
        assert!((conversation.turns()[2].duration_seconds() - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_rerun_makes_no_calls() {
        let mut conversation = Conversation::parse("a\nb");
        let (mut synth, calls) = synth(vec![]);
        process_turns(conversation.turns_mut(), &mut synth, &voices(), &|_| {}).await;
        calls.lock().unwrap().clear();

        let report =
            process_turns(conversation.turns_mut(), &mut synth, &voices(), &|_| {}).await;

        assert_eq!(report.synthesized, 0);
        assert_eq!(report.skipped, 2);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_isolated_to_its_turn() {
        let mut conversation = Conversation::parse("ok\nbad\nfine");
        let (mut synth, _calls) = synth(vec!["bad"]);
        let events = Mutex::new(Vec::new());

        let report = process_turns(
            conversation.turns_mut(),
            &mut synth,
            &voices(),
            &|e| events.lock().unwrap().push(e),
        )
        .await;

        assert_eq!(report.failed, vec![2]);
        assert_eq!(report.synthesized, 2);
        let turns = conversation.turns();
        assert!(turns[0].has_audio());
        assert!(!turns[1].has_audio());
        assert!(turns[2].has_audio());
        // 0.2 s + 0.4 s, the failed turn contributes nothing.
        assert!((conversation.total_duration_seconds() - 0.6).abs() < 1e-9);

        let events = events.into_inner().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            SessionEvent::TurnFailed {
                sequence_number: 2,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn test_retry_only_touches_missing_turns() {
        let mut conversation = Conversation::parse("ok\nbad\nfine");
        let (mut failing, _) = synth(vec!["bad"]);
        process_turns(conversation.turns_mut(), &mut failing, &voices(), &|_| {}).await;

        let (mut healthy, calls) = synth(vec![]);
        let report =
            process_turns(conversation.turns_mut(), &mut healthy, &voices(), &|_| {}).await;

        assert_eq!(report.synthesized, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![("R".to_string(), "bad".to_string())]
        );
        assert!(conversation.is_fully_processed());
    }

    #[tokio::test]
    async fn test_undecodable_audio_counts_as_failure() {
        struct Garbage;

        #[async_trait]
        impl SpeechSynthesizer for Garbage {
            fn name(&self) -> &'static str {
                "garbage"
            }

            async fn synthesize(
                &mut self,
                _voice_id: &str,
                _text: &str,
            ) -> Result<SynthesizedAudio, ConvoiceError> {
                Ok(SynthesizedAudio {
                    bytes: b"not audio at all".to_vec(),
                    mime_type: "audio/mpeg".to_string(),
                })
            }
        }

        let mut conversation = Conversation::parse("hello");
        let report =
            process_turns(conversation.turns_mut(), &mut Garbage, &voices(), &|_| {}).await;

        assert_eq!(report.failed, vec![1]);
        assert!(!conversation.turns()[0].has_audio());
        assert_eq!(conversation.total_duration_seconds(), 0.0);
    }
}
