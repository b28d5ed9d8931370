//! Real audio output using CPAL: a software mixer on the device clock.
//!
//! Playback chunks are scheduled at absolute frame offsets on the output
//! stream's frame counter. The stream callback mixes every due voice into
//! the device buffer; finished voices are retired for the scheduler to
//! reap. Stopping a voice that already finished is an error the scheduler
//! is expected to discard.

use crate::audio::capture::{is_preferred_device, with_suppressed_stderr};
use crate::audio::codec::PlaybackChunk;
use crate::audio::playback::{AudioOut, SourceId};
use crate::audio::wav::resample;
use crate::error::{Result, VoxlinkError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};

/// One scheduled chunk on the mixer timeline.
#[derive(Debug)]
struct Voice {
    id: SourceId,
    samples: Vec<f32>,
    start_frame: u64,
}

impl Voice {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

/// Mixer state shared with the output stream callback.
#[derive(Debug, Default)]
struct MixerState {
    frames_elapsed: u64,
    next_id: SourceId,
    voices: Vec<Voice>,
    finished: Vec<SourceId>,
}

/// Mix due voices into an interleaved output buffer and retire finished
/// voices. Must stay cheap: it runs inside the device callback.
fn fill_output(state: &mut MixerState, data: &mut [f32], channels: usize) {
    let frames = data.len() / channels;

    for frame in 0..frames {
        let now = state.frames_elapsed + frame as u64;
        let mut mixed = 0.0f32;
        for voice in &state.voices {
            if now >= voice.start_frame {
                let index = (now - voice.start_frame) as usize;
                if index < voice.samples.len() {
                    mixed += voice.samples[index];
                }
            }
        }
        for channel in 0..channels {
            data[frame * channels + channel] = mixed;
        }
    }

    state.frames_elapsed += frames as u64;

    let elapsed = state.frames_elapsed;
    let mut index = 0;
    while index < state.voices.len() {
        if elapsed >= state.voices[index].end_frame() {
            let voice = state.voices.swap_remove(index);
            state.finished.push(voice.id);
        } else {
            index += 1;
        }
    }
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: The stream is only touched while holding the surrounding Mutex,
/// so access is serialized across threads.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Real speaker output implementation using CPAL.
///
/// Requests f32 at the service playback rate (24kHz mono); when the device
/// insists on its native config, chunks are resampled at schedule time and
/// the mixer clock runs at the native rate instead.
pub struct CpalAudioOut {
    state: Arc<Mutex<MixerState>>,
    _stream: Arc<Mutex<Option<SendableStream>>>,
    sample_rate: u32,
}

impl CpalAudioOut {
    /// Create an output backend on the default (or named) output device and
    /// start its stream.
    pub fn new(device_name: Option<&str>, preferred_rate: u32) -> Result<Self> {
        let device = with_suppressed_stderr(|| {
            let host = cpal::default_host();

            if let Some(name) = device_name {
                let devices = host.output_devices().map_err(|e| VoxlinkError::Playback {
                    message: format!("Failed to enumerate output devices: {}", e),
                })?;

                let mut found_device = None;
                for dev in devices {
                    if let Ok(dev_name) = dev.name()
                        && dev_name == name
                    {
                        found_device = Some(dev);
                        break;
                    }
                }

                found_device.ok_or_else(|| VoxlinkError::AudioDeviceNotFound {
                    device: name.to_string(),
                })
            } else {
                if let Ok(devices) = host.output_devices() {
                    for dev in devices {
                        if let Ok(name) = dev.name()
                            && is_preferred_device(&name)
                        {
                            return Ok(dev);
                        }
                    }
                }

                host.default_output_device()
                    .ok_or_else(|| VoxlinkError::AudioDeviceNotFound {
                        device: "default".to_string(),
                    })
            }
        })?;

        let state = Arc::new(Mutex::new(MixerState::default()));

        // Try the preferred config first; PipeWire/PulseAudio convert
        // transparently. Fall back to the device default otherwise.
        let preferred_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(preferred_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_callback = |err| {
            eprintln!("Audio output stream error: {}", err);
        };

        let callback_state = Arc::clone(&state);
        let preferred = device.build_output_stream(
            &preferred_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if let Ok(mut mixer) = callback_state.lock() {
                    fill_output(&mut mixer, data, 1);
                } else {
                    data.fill(0.0);
                }
            },
            err_callback,
            None,
        );

        let (stream, sample_rate) = match preferred {
            Ok(stream) => (stream, preferred_rate),
            Err(_) => {
                let default_config =
                    device
                        .default_output_config()
                        .map_err(|e| VoxlinkError::Playback {
                            message: format!("Failed to query default output config: {}", e),
                        })?;

                if default_config.sample_format() != cpal::SampleFormat::F32 {
                    return Err(VoxlinkError::Playback {
                        message: format!(
                            "Unsupported output sample format: {:?}",
                            default_config.sample_format()
                        ),
                    });
                }

                let native_rate = default_config.sample_rate().0;
                let native_channels = default_config.channels() as usize;
                let stream_config: cpal::StreamConfig = default_config.into();

                let callback_state = Arc::clone(&state);
                let stream = device
                    .build_output_stream(
                        &stream_config,
                        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                            if let Ok(mut mixer) = callback_state.lock() {
                                fill_output(&mut mixer, data, native_channels);
                            } else {
                                data.fill(0.0);
                            }
                        },
                        err_callback,
                        None,
                    )
                    .map_err(|e| VoxlinkError::Playback {
                        message: format!("Failed to build output stream: {}", e),
                    })?;

                (stream, native_rate)
            }
        };

        stream.play().map_err(|e| VoxlinkError::Playback {
            message: format!("Failed to start output stream: {}", e),
        })?;

        Ok(Self {
            state,
            _stream: Arc::new(Mutex::new(Some(SendableStream(stream)))),
            sample_rate,
        })
    }

    /// The rate the mixer clock runs at (device rate, not chunk rate).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl AudioOut for CpalAudioOut {
    fn start_at(&mut self, chunk: PlaybackChunk, when: f64) -> Result<SourceId> {
        let mut samples = chunk.mixed_mono();
        if chunk.sample_rate() != self.sample_rate {
            samples = resample(&samples, chunk.sample_rate(), self.sample_rate);
        }

        let mut state = self.state.lock().map_err(|e| VoxlinkError::Playback {
            message: format!("mixer state poisoned: {}", e),
        })?;

        let id = state.next_id;
        state.next_id += 1;
        let start_frame = (when * self.sample_rate as f64).round() as u64;
        state.voices.push(Voice {
            id,
            samples,
            start_frame,
        });
        Ok(id)
    }

    fn try_stop(&mut self, id: SourceId) -> Result<()> {
        let mut state = self.state.lock().map_err(|e| VoxlinkError::Playback {
            message: format!("mixer state poisoned: {}", e),
        })?;

        match state.voices.iter().position(|v| v.id == id) {
            Some(index) => {
                state.voices.swap_remove(index);
                Ok(())
            }
            None => Err(VoxlinkError::SourceNotFound { id }),
        }
    }

    fn finished(&mut self) -> Vec<SourceId> {
        match self.state.lock() {
            Ok(mut state) => std::mem::take(&mut state.finished),
            Err(_) => Vec::new(),
        }
    }

    fn position(&self) -> f64 {
        self.state
            .lock()
            .map(|s| s.frames_elapsed as f64 / self.sample_rate as f64)
            .unwrap_or(0.0)
    }
}
