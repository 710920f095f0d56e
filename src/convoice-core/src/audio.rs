//! Decoded audio clips and WAV helpers.
//!
//! Every clip returned by a synthesizer is decoded once with symphonia. The
//! decoded frames give the clip its duration and are what the players and
//! the WAV export consume.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::ConvoiceError;

pub const MIME_MPEG: &str = "audio/mpeg";
pub const MIME_WAV: &str = "audio/wav";

/// Longest silence allowed between exported clips.
pub const MAX_GAP_SECONDS: f32 = 60.0;

/// A synthesized clip, decoded to PCM.
#[derive(Debug, Clone)]
pub struct AudioClip {
    samples: Arc<[f32]>,
    channels: u16,
    sample_rate: u32,
    duration_seconds: f64,
}

impl AudioClip {
    /// Decode encoded audio bytes into a clip.
    ///
    /// The duration is computed from the number of decoded frames, never
    /// from container metadata.
    pub fn decode(bytes: &[u8], mime_type: &str) -> Result<Self, ConvoiceError> {
        let decoded = decode_pcm(bytes, extension_for_mime(mime_type))?;

        let frames = decoded.samples.len() / decoded.channels as usize;
        let duration_seconds = frames as f64 / decoded.sample_rate as f64;

        Ok(Self {
            samples: decoded.samples.into(),
            channels: decoded.channels,
            sample_rate: decoded.sample_rate,
            duration_seconds,
        })
    }

    /// Interleaved samples in `[-1.0, 1.0]`.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub(crate) fn shared_samples(&self) -> Arc<[f32]> {
        Arc::clone(&self.samples)
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }
}

struct DecodedPcm {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

fn extension_for_mime(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        _ => None,
    }
}

fn decode_pcm(bytes: &[u8], extension: Option<&str>) -> Result<DecodedPcm, ConvoiceError> {
    if bytes.is_empty() {
        return Err(ConvoiceError::Decode("audio payload is empty".to_string()));
    }

    let source = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| ConvoiceError::Decode(format!("Unrecognized audio format: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ConvoiceError::Decode("No audio track found".to_string()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count() as u16);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| ConvoiceError::Decode(format!("Unsupported codec: {}", e)))?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(ConvoiceError::Decode(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(buffer) => {
                let spec = *buffer.spec();
                sample_rate = Some(spec.rate);
                channels = Some(spec.channels.count() as u16);

                let mut interleaved = SampleBuffer::<f32>::new(buffer.capacity() as u64, spec);
                interleaved.copy_interleaved_ref(buffer);
                samples.extend_from_slice(interleaved.samples());
            }
            // Corrupt frames are skipped, the rest of the stream is still usable.
            Err(SymphoniaError::DecodeError(message)) => {
                tracing::debug!(reason = message, "skipping undecodable packet");
            }
            Err(e) => return Err(ConvoiceError::Decode(e.to_string())),
        }
    }

    let sample_rate = sample_rate
        .filter(|rate| *rate > 0)
        .ok_or_else(|| ConvoiceError::Decode("Unknown sample rate".to_string()))?;
    let channels = channels
        .filter(|count| *count > 0)
        .ok_or_else(|| ConvoiceError::Decode("Unknown channel layout".to_string()))?;

    Ok(DecodedPcm {
        samples,
        channels,
        sample_rate,
    })
}

fn wav_spec(channels: u16, sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Encode interleaved samples as an in-memory 16-bit WAV file.
pub fn encode_wav(
    samples: &[f32],
    channels: u16,
    sample_rate: u32,
) -> Result<Vec<u8>, ConvoiceError> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, wav_spec(channels, sample_rate))
            .map_err(|e| ConvoiceError::Export(format!("Failed to start WAV: {}", e)))?;
        for &sample in samples {
            writer
                .write_sample(to_i16(sample))
                .map_err(|e| ConvoiceError::Export(format!("Failed to write WAV: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| ConvoiceError::Export(format!("Failed to finish WAV: {}", e)))?;
    }
    Ok(cursor.into_inner())
}

/// Combine clips with silence gaps between them.
///
/// All clips must share a channel count and sample rate. Returns the
/// interleaved samples together with that layout.
pub fn combine_clips(
    clips: &[&AudioClip],
    gap_seconds: f32,
) -> Result<(Vec<f32>, u16, u32), ConvoiceError> {
    let first = clips
        .first()
        .ok_or_else(|| ConvoiceError::Export("No clips to combine".to_string()))?;
    let channels = first.channels();
    let sample_rate = first.sample_rate();

    if let Some(odd) = clips
        .iter()
        .find(|c| c.channels() != channels || c.sample_rate() != sample_rate)
    {
        return Err(ConvoiceError::Export(format!(
            "Clips have mismatched layouts: {} ch @ {} Hz vs {} ch @ {} Hz",
            channels,
            sample_rate,
            odd.channels(),
            odd.sample_rate()
        )));
    }

    if !(0.0..=MAX_GAP_SECONDS).contains(&gap_seconds) {
        return Err(ConvoiceError::Export(format!(
            "Gap must be between 0 and {} seconds, got {}",
            MAX_GAP_SECONDS, gap_seconds
        )));
    }
    let gap_frames = (gap_seconds * sample_rate as f32) as usize;
    let silence = vec![0.0; gap_frames * channels as usize];

    let mut combined = Vec::new();
    for (i, clip) in clips.iter().enumerate() {
        if i > 0 {
            combined.extend(&silence);
        }
        combined.extend_from_slice(clip.samples());
    }

    Ok((combined, channels, sample_rate))
}

/// Write clips to a single WAV file on disk.
pub fn export_wav<P: AsRef<Path>>(
    path: P,
    clips: &[&AudioClip],
    gap_seconds: f32,
) -> Result<(), ConvoiceError> {
    let (samples, channels, sample_rate) = combine_clips(clips, gap_seconds)?;

    let mut writer = hound::WavWriter::create(path.as_ref(), wav_spec(channels, sample_rate))
        .map_err(|e| ConvoiceError::Export(format!("Failed to create WAV: {}", e)))?;
    for sample in samples {
        writer
            .write_sample(to_i16(sample))
            .map_err(|e| ConvoiceError::Export(format!("Failed to write WAV: {}", e)))?;
    }
    writer
        .finalize()
        .map_err(|e| ConvoiceError::Export(format!("Failed to finish WAV: {}", e)))
}

#[cfg(test)]
pub(crate) fn tone_wav(frames: usize, channels: u16, sample_rate: u32) -> Vec<u8> {
    let samples: Vec<f32> = (0..frames * channels as usize)
        .map(|i| ((i as f32) * 0.05).sin() * 0.5)
        .collect();
    encode_wav(&samples, channels, sample_rate).expect("encode test wav")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_wav_duration_from_frames() {
        let clip = AudioClip::decode(&tone_wav(24_000, 1, 24_000), MIME_WAV).unwrap();
        assert_eq!(clip.sample_rate(), 24_000);
        assert_eq!(clip.channels(), 1);
        assert_eq!(clip.frames(), 24_000);
        assert!((clip.duration_seconds() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_decode_stereo_counts_frames_not_samples() {
        let clip = AudioClip::decode(&tone_wav(11_025, 2, 22_050), MIME_WAV).unwrap();
        assert_eq!(clip.channels(), 2);
        assert_eq!(clip.samples().len(), 22_050);
        assert!((clip.duration_seconds() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_decode_without_mime_hint() {
        let clip = AudioClip::decode(&tone_wav(800, 1, 8_000), "application/octet-stream").unwrap();
        assert!((clip.duration_seconds() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = AudioClip::decode(b"definitely not audio", MIME_MPEG).unwrap_err();
        assert!(matches!(err, ConvoiceError::Decode(_)));
    }

    #[test]
    fn test_decode_rejects_empty_payload() {
        let err = AudioClip::decode(&[], MIME_MPEG).unwrap_err();
        assert!(matches!(err, ConvoiceError::Decode(_)));
    }

    #[test]
    fn test_combine_clips_inserts_gap() {
        let a = AudioClip::decode(&tone_wav(10, 1, 100), MIME_WAV).unwrap();
        let b = AudioClip::decode(&tone_wav(20, 1, 100), MIME_WAV).unwrap();

        let (combined, channels, rate) = combine_clips(&[&a, &b], 0.05).unwrap();
        assert_eq!(channels, 1);
        assert_eq!(rate, 100);
        // 10 + 5 gap + 20
        assert_eq!(combined.len(), 35);
        assert!(combined[10..15].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_combine_clips_rejects_mismatched_rates() {
        let a = AudioClip::decode(&tone_wav(10, 1, 100), MIME_WAV).unwrap();
        let b = AudioClip::decode(&tone_wav(10, 1, 200), MIME_WAV).unwrap();
        assert!(matches!(
            combine_clips(&[&a, &b], 0.0),
            Err(ConvoiceError::Export(_))
        ));
    }

    #[test]
    fn test_combine_clips_rejects_out_of_range_gap() {
        let a = AudioClip::decode(&tone_wav(10, 1, 100), MIME_WAV).unwrap();
        for gap in [1e12, f32::INFINITY, f32::NAN, -0.5, MAX_GAP_SECONDS + 1.0] {
            assert!(
                matches!(combine_clips(&[&a, &a], gap), Err(ConvoiceError::Export(_))),
                "gap {gap} should be rejected"
            );
        }
        assert!(combine_clips(&[&a, &a], MAX_GAP_SECONDS).is_ok());
    }

    #[test]
    fn test_combine_clips_requires_input() {
        assert!(combine_clips(&[], 0.0).is_err());
    }

    #[test]
    fn test_export_wav_writes_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let a = AudioClip::decode(&tone_wav(100, 1, 1_000), MIME_WAV).unwrap();
        let b = AudioClip::decode(&tone_wav(100, 1, 1_000), MIME_WAV).unwrap();

        export_wav(&path, &[&a, &b], 0.1).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 1_000);
        assert_eq!(reader.duration(), 300);
    }
}
