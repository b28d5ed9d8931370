//! Wire codec for realtime audio: framing and PCM conversion.
//!
//! The capture side reframes arbitrarily sized microphone deliveries into
//! fixed windows, converts them to 16-bit little-endian PCM, and wraps them
//! in transport-ready base64 blobs. The playback side reverses the process
//! for service-delivered audio payloads.

use crate::defaults;
use crate::error::{Result, VoxlinkError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

/// A fixed-size window of mono capture samples, ready for encoding.
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    /// Sequence number for ordering frames.
    pub sequence: u64,
    /// Normalized samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
}

/// Transport-ready representation of one capture window.
///
/// `data` is base64-encoded 16-bit little-endian PCM; `mime_type` declares
/// the encoding and sample rate (e.g. `audio/pcm;rate=16000`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WireAudioBlob {
    pub data: String,
    pub mime_type: String,
}

/// A decoded service audio payload, ready for scheduling.
///
/// Samples are normalized floats, de-interleaved per channel.
#[derive(Debug, Clone)]
pub struct PlaybackChunk {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl PlaybackChunk {
    /// Build a mono chunk directly from normalized samples.
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            channels: vec![samples],
            sample_rate,
        }
    }

    /// Number of sample frames (samples per channel).
    pub fn frame_count(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples for one channel.
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Playback duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Mix all channels down to a single mono buffer by averaging.
    pub fn mixed_mono(&self) -> Vec<f32> {
        match self.channels.len() {
            0 => Vec::new(),
            1 => self.channels[0].clone(),
            n => {
                let frames = self.frame_count();
                let mut mono = vec![0.0f32; frames];
                for channel in &self.channels {
                    for (out, sample) in mono.iter_mut().zip(channel) {
                        *out += sample;
                    }
                }
                for out in &mut mono {
                    *out /= n as f32;
                }
                mono
            }
        }
    }
}

/// Accumulates capture deliveries into fixed-size windows.
///
/// Microphone reads arrive in device-determined sizes; the wire format wants
/// uniform windows. Leftover samples carry over to the next window. Partial
/// windows are never flushed — they are discarded with the session.
#[derive(Debug)]
pub struct FrameAssembler {
    window: usize,
    pending: Vec<f32>,
    sequence: u64,
}

impl FrameAssembler {
    /// Creates an assembler producing windows of `window` mono samples.
    pub fn new(window: usize) -> Self {
        Self {
            window,
            pending: Vec::with_capacity(window),
            sequence: 0,
        }
    }

    /// Creates an assembler with the default capture window size.
    pub fn with_default_window() -> Self {
        Self::new(defaults::CAPTURE_WINDOW)
    }

    /// Feeds samples in, returning every complete window they produce.
    pub fn push(&mut self, samples: &[f32]) -> Vec<CaptureFrame> {
        self.pending.extend_from_slice(samples);

        let mut frames = Vec::new();
        while self.pending.len() >= self.window {
            let rest = self.pending.split_off(self.window);
            let window = std::mem::replace(&mut self.pending, rest);
            frames.push(CaptureFrame {
                sequence: self.sequence,
                samples: window,
            });
            self.sequence += 1;
        }
        frames
    }

    /// Number of samples waiting for the next window.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Encode a window of normalized samples into a transport blob.
///
/// Samples are scaled by 32768 and converted to 16-bit signed PCM with
/// saturation: out-of-range input clips to i16::MIN/MAX rather than
/// wrapping. The decoded byte length is exactly `2 × samples.len()`.
pub fn encode_blob(samples: &[f32], sample_rate: u32) -> WireAudioBlob {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let value = (sample * 32768.0) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }

    WireAudioBlob {
        data: BASE64.encode(&bytes),
        mime_type: defaults::pcm_mime_type(sample_rate),
    }
}

/// Decode raw 16-bit little-endian PCM bytes into a playback chunk.
///
/// Input length must be divisible by `2 × num_channels`; misaligned input is
/// rejected, never truncated. Sample `i` of channel `c` is read from
/// interleaved position `i × num_channels + c` and normalized by 1/32768.
pub fn decode_payload(bytes: &[u8], sample_rate: u32, num_channels: usize) -> Result<PlaybackChunk> {
    if num_channels == 0 {
        return Err(VoxlinkError::Decode {
            message: "channel count must be at least 1".to_string(),
        });
    }

    let frame_bytes = 2 * num_channels;
    if bytes.len() % frame_bytes != 0 {
        return Err(VoxlinkError::Decode {
            message: format!(
                "{} bytes is not aligned to {} channel(s) of 16-bit samples",
                bytes.len(),
                num_channels
            ),
        });
    }

    let frame_count = bytes.len() / frame_bytes;
    let mut channels = vec![Vec::with_capacity(frame_count); num_channels];

    for (channel, samples) in channels.iter_mut().enumerate() {
        for i in 0..frame_count {
            let offset = (i * num_channels + channel) * 2;
            let value = i16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
            samples.push(value as f32 / 32768.0);
        }
    }

    Ok(PlaybackChunk {
        channels,
        sample_rate,
    })
}

/// Decode a base64 audio payload as delivered by the service.
pub fn decode_blob(data: &str, sample_rate: u32, num_channels: usize) -> Result<PlaybackChunk> {
    let bytes = BASE64.decode(data).map_err(|e| VoxlinkError::Decode {
        message: format!("invalid base64 payload: {}", e),
    })?;
    decode_payload(&bytes, sample_rate, num_channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(samples: &[f32]) -> Vec<f32> {
        let blob = encode_blob(samples, defaults::INPUT_SAMPLE_RATE);
        let chunk = decode_blob(&blob.data, defaults::INPUT_SAMPLE_RATE, 1).unwrap();
        chunk.channel(0).to_vec()
    }

    #[test]
    fn test_encode_blob_length_and_mime() {
        let samples = vec![0.0f32; 4096];
        let blob = encode_blob(&samples, 16000);

        assert_eq!(blob.mime_type, "audio/pcm;rate=16000");
        let decoded = BASE64.decode(&blob.data).unwrap();
        assert_eq!(decoded.len(), 2 * samples.len());
    }

    #[test]
    fn test_round_trip_within_quantization_error() {
        let samples: Vec<f32> = (0..1000).map(|i| (i as f32 / 500.0) - 1.0).collect();
        let recovered = round_trip(&samples);

        assert_eq!(recovered.len(), samples.len());
        for (original, restored) in samples.iter().zip(&recovered) {
            assert!(
                (original - restored).abs() <= 1.0 / 32768.0,
                "sample {} decoded as {} (error > 1/32768)",
                original,
                restored
            );
        }
    }

    #[test]
    fn test_encode_saturates_out_of_range_samples() {
        let blob = encode_blob(&[1.5, -1.5], 16000);
        let bytes = BASE64.decode(&blob.data).unwrap();

        let high = i16::from_le_bytes([bytes[0], bytes[1]]);
        let low = i16::from_le_bytes([bytes[2], bytes[3]]);
        assert_eq!(high, i16::MAX);
        assert_eq!(low, i16::MIN);
    }

    #[test]
    fn test_encode_full_scale_positive_saturates() {
        // 1.0 × 32768 exceeds i16::MAX by one; saturation clips it.
        let blob = encode_blob(&[1.0], 16000);
        let bytes = BASE64.decode(&blob.data).unwrap();
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), i16::MAX);
    }

    #[test]
    fn test_decode_rejects_misaligned_mono() {
        let result = decode_payload(&[0u8; 7], 24000, 1);
        assert!(matches!(result, Err(VoxlinkError::Decode { .. })));
    }

    #[test]
    fn test_decode_rejects_misaligned_stereo() {
        // Six bytes is three i16 samples — not a whole stereo frame count.
        let result = decode_payload(&[0u8; 6], 24000, 2);
        assert!(matches!(result, Err(VoxlinkError::Decode { .. })));
    }

    #[test]
    fn test_decode_rejects_zero_channels() {
        let result = decode_payload(&[0u8; 4], 24000, 0);
        assert!(matches!(result, Err(VoxlinkError::Decode { .. })));
    }

    #[test]
    fn test_decode_empty_payload_is_zero_length_chunk() {
        let chunk = decode_payload(&[], 24000, 1).unwrap();
        assert_eq!(chunk.frame_count(), 0);
        assert_eq!(chunk.duration_secs(), 0.0);
    }

    #[test]
    fn test_decode_deinterleaves_stereo() {
        // Interleaved L0 R0 L1 R1 with distinct values.
        let mut bytes = Vec::new();
        for value in [100i16, -100, 200, -200] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }

        let chunk = decode_payload(&bytes, 24000, 2).unwrap();
        assert_eq!(chunk.channel_count(), 2);
        assert_eq!(chunk.frame_count(), 2);
        assert!((chunk.channel(0)[0] - 100.0 / 32768.0).abs() < f32::EPSILON);
        assert!((chunk.channel(1)[0] + 100.0 / 32768.0).abs() < f32::EPSILON);
        assert!((chunk.channel(0)[1] - 200.0 / 32768.0).abs() < f32::EPSILON);
        assert!((chunk.channel(1)[1] + 200.0 / 32768.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_decode_blob_rejects_invalid_base64() {
        let result = decode_blob("not$$base64!!", 24000, 1);
        assert!(matches!(result, Err(VoxlinkError::Decode { .. })));
    }

    #[test]
    fn test_chunk_duration() {
        let bytes = vec![0u8; 24000 * 2]; // one second of mono 24kHz
        let chunk = decode_payload(&bytes, 24000, 1).unwrap();
        assert!((chunk.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_chunk_mixed_mono_averages_channels() {
        let mut bytes = Vec::new();
        for value in [16384i16, -16384, 16384, -16384] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }

        let chunk = decode_payload(&bytes, 24000, 2).unwrap();
        let mono = chunk.mixed_mono();
        assert_eq!(mono.len(), 2);
        assert!(mono.iter().all(|s| s.abs() < f32::EPSILON));
    }

    #[test]
    fn test_assembler_emits_complete_windows() {
        let mut assembler = FrameAssembler::new(4);

        assert!(assembler.push(&[0.1, 0.2]).is_empty());
        assert_eq!(assembler.pending_len(), 2);

        let frames = assembler.push(&[0.3, 0.4, 0.5]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].sequence, 0);
        assert_eq!(frames[0].samples, vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(assembler.pending_len(), 1);
    }

    #[test]
    fn test_assembler_emits_multiple_windows_from_one_push() {
        let mut assembler = FrameAssembler::new(2);
        let frames = assembler.push(&[0.0, 0.1, 0.2, 0.3, 0.4]);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].sequence, 0);
        assert_eq!(frames[1].sequence, 1);
        assert_eq!(frames[1].samples, vec![0.2, 0.3]);
        assert_eq!(assembler.pending_len(), 1);
    }

    #[test]
    fn test_assembler_sequence_increments_across_pushes() {
        let mut assembler = FrameAssembler::new(2);
        let first = assembler.push(&[0.0, 0.0]);
        let second = assembler.push(&[0.0, 0.0]);

        assert_eq!(first[0].sequence, 0);
        assert_eq!(second[0].sequence, 1);
    }

    #[test]
    fn test_assembler_default_window() {
        let mut assembler = FrameAssembler::with_default_window();
        let frames = assembler.push(&vec![0.0f32; defaults::CAPTURE_WINDOW]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples.len(), defaults::CAPTURE_WINDOW);
    }

    #[test]
    fn test_blob_serializes_with_camel_case_mime_type() {
        let blob = encode_blob(&[0.0], 16000);
        let json = serde_json::to_string(&blob).unwrap();
        assert!(json.contains("\"mimeType\""));
        assert!(!json.contains("mime_type"));
    }
}
