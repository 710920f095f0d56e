//! Sequential playback of synthesized turns.

use async_trait::async_trait;
use std::time::Duration;

use crate::audio::AudioClip;
use crate::error::ConvoiceError;
use crate::session::SessionEvent;
use crate::turn::Turn;

/// Something that can play a clip to completion.
#[async_trait]
pub trait ClipPlayer: Send {
    /// Play `clip`, resolving once it has finished.
    async fn play(&mut self, clip: &AudioClip) -> Result<(), ConvoiceError>;
}

/// Outcome of one playback pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    pub played: usize,
    /// Turns whose clip failed to play and were treated as finished.
    pub failed: Vec<usize>,
}

/// Play every turn that has a clip, one after another.
///
/// Turns without audio are skipped. A failed clip is logged and treated as
/// finished so the rest of the conversation still plays.
pub async fn play_turns(
    turns: &[Turn],
    player: &mut dyn ClipPlayer,
    emit: &dyn Fn(SessionEvent),
) -> PlaybackReport {
    let mut report = PlaybackReport::default();

    for turn in turns {
        let Some(clip) = turn.clip() else {
            continue;
        };

        let sequence_number = turn.sequence_number();
        emit(SessionEvent::ClipStarted {
            sequence_number,
            role: turn.role(),
            duration_seconds: clip.duration_seconds(),
        });

        match player.play(clip).await {
            Ok(()) => report.played += 1,
            Err(e) => {
                tracing::warn!(sequence_number, error = %e, "error playing audio");
                report.failed.push(sequence_number);
                emit(SessionEvent::ClipFailed {
                    sequence_number,
                    error: e.to_string(),
                });
            }
        }
    }

    report
}

/// Stands in for an output device: waits out each clip's duration.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentPlayer;

#[async_trait]
impl ClipPlayer for SilentPlayer {
    async fn play(&mut self, clip: &AudioClip) -> Result<(), ConvoiceError> {
        tokio::time::sleep(Duration::from_secs_f64(clip.duration_seconds())).await;
        Ok(())
    }
}

/// Plays clips on the default output device.
///
/// The device is opened once, on a dedicated thread, and every clip is fed
/// to the same sink. If the device cannot be opened, the clip fails and the
/// next clip tries again.
#[cfg(feature = "playback")]
#[derive(Debug, Default)]
pub struct RodioPlayer {
    output: Option<OutputThread>,
}

#[cfg(feature = "playback")]
#[async_trait]
impl ClipPlayer for RodioPlayer {
    async fn play(&mut self, clip: &AudioClip) -> Result<(), ConvoiceError> {
        let output = match self.output.take() {
            Some(output) => output,
            None => OutputThread::spawn(RodioDevice::open)?,
        };

        let result = output.play(clip).await;
        if result.is_ok() {
            self.output = Some(output);
        }
        result
    }
}

#[cfg(feature = "playback")]
struct RodioDevice {
    _stream: rodio::OutputStream,
    sink: rodio::Sink,
}

#[cfg(feature = "playback")]
impl RodioDevice {
    fn open() -> Result<Self, ConvoiceError> {
        let mut stream = rodio::OutputStreamBuilder::open_default_stream()
            .map_err(|e| ConvoiceError::Playback(format!("No output device: {}", e)))?;
        stream.log_on_drop(false);
        let sink = rodio::Sink::connect_new(stream.mixer());
        Ok(Self {
            _stream: stream,
            sink,
        })
    }
}

#[cfg(feature = "playback")]
impl OutputDevice for RodioDevice {
    fn play_to_end(&self, samples: Vec<f32>, channels: u16, sample_rate: u32) {
        self.sink.append(rodio::buffer::SamplesBuffer::new(
            channels,
            sample_rate,
            samples,
        ));
        self.sink.sleep_until_end();
    }
}

/// Blocking audio output, owned by the output thread.
#[cfg(any(feature = "playback", test))]
trait OutputDevice {
    fn play_to_end(&self, samples: Vec<f32>, channels: u16, sample_rate: u32);
}

#[cfg(any(feature = "playback", test))]
struct PlayRequest {
    samples: std::sync::Arc<[f32]>,
    channels: u16,
    sample_rate: u32,
    done: tokio::sync::oneshot::Sender<Result<(), ConvoiceError>>,
}

/// Handle to the thread that owns the output device.
///
/// Output streams are not `Send`, so the device is created and dropped on
/// that thread. Dropping the handle stops the thread.
#[cfg(any(feature = "playback", test))]
#[derive(Debug)]
struct OutputThread {
    requests: std::sync::mpsc::Sender<PlayRequest>,
}

#[cfg(any(feature = "playback", test))]
impl OutputThread {
    fn spawn<D, F>(open: F) -> Result<Self, ConvoiceError>
    where
        D: OutputDevice,
        F: FnOnce() -> Result<D, ConvoiceError> + Send + 'static,
    {
        let (requests, incoming) = std::sync::mpsc::channel();
        std::thread::Builder::new()
            .name("convoice-audio".to_string())
            .spawn(move || run_output(open, incoming))?;
        Ok(Self { requests })
    }

    async fn play(&self, clip: &AudioClip) -> Result<(), ConvoiceError> {
        let stopped = || ConvoiceError::Playback("Audio output thread has stopped".to_string());

        let (done, finished) = tokio::sync::oneshot::channel();
        self.requests
            .send(PlayRequest {
                samples: clip.shared_samples(),
                channels: clip.channels(),
                sample_rate: clip.sample_rate(),
                done,
            })
            .map_err(|_| stopped())?;
        finished.await.map_err(|_| stopped())?
    }
}

/// Open the device on the first request, then play requests until the
/// handle is dropped.
#[cfg(any(feature = "playback", test))]
fn run_output<D, F>(open: F, requests: std::sync::mpsc::Receiver<PlayRequest>)
where
    D: OutputDevice,
    F: FnOnce() -> Result<D, ConvoiceError>,
{
    let Ok(first) = requests.recv() else {
        return;
    };
    let device = match open() {
        Ok(device) => device,
        Err(e) => {
            let _ = first.done.send(Err(e));
            return;
        }
    };
    tracing::debug!("audio output opened");

    for request in std::iter::once(first).chain(requests.iter()) {
        device.play_to_end(request.samples.to_vec(), request.channels, request.sample_rate);
        let _ = request.done.send(Ok(()));
    }
}
