//! Audio output for the active track.
//!
//! The player only needs to know where playback is and whether it is still
//! running, so everything it talks to goes through [`Transport`].

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::decode::{AudioData, TrackLoadError};

pub trait Transport {
    /// Seconds of the track consumed so far.
    fn position_secs(&self) -> f32;
    /// False once the track ran out or was stopped.
    fn is_playing(&self) -> bool;
    fn stop(&mut self);
}

/// Plays a mono track on the default output device.
pub struct CpalTransport {
    /// Audio output stream (kept alive)
    stream: cpal::Stream,
    cursor: Arc<AtomicUsize>,
    finished: Arc<AtomicBool>,
    sample_rate: u32,
}

impl CpalTransport {
    /// Open the default output device and start playing `audio` from the top.
    pub fn start(audio: AudioData) -> Result<Self, TrackLoadError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| TrackLoadError::Output("no audio output device found".into()))?;

        let supported = device
            .default_output_config()
            .map_err(|e| TrackLoadError::Output(format!("failed to get audio config: {}", e)))?;

        log::info!(
            "Audio: {} @ {}Hz",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            supported.sample_rate().0
        );

        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        let source = Source {
            samples: Arc::new(audio.samples),
            step: audio.sample_rate as f64 / config.sample_rate.0 as f64,
            phase: 0.0,
            cursor: Arc::new(AtomicUsize::new(0)),
            finished: Arc::new(AtomicBool::new(false)),
        };
        let cursor = Arc::clone(&source.cursor);
        let finished = Arc::clone(&source.finished);

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, source),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, source),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, source),
            other => {
                return Err(TrackLoadError::Output(format!(
                    "unsupported sample format {:?}",
                    other
                )))
            }
        }?;

        stream
            .play()
            .map_err(|e| TrackLoadError::Output(format!("failed to start audio stream: {}", e)))?;

        Ok(Self {
            stream,
            cursor,
            finished,
            sample_rate: audio.sample_rate,
        })
    }
}

impl Transport for CpalTransport {
    fn position_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.cursor.load(Ordering::Relaxed) as f32 / self.sample_rate as f32
    }

    fn is_playing(&self) -> bool {
        !self.finished.load(Ordering::Relaxed)
    }

    fn stop(&mut self) {
        if let Err(e) = self.stream.pause() {
            log::warn!("Failed to pause audio stream: {}", e);
        }
        self.finished.store(true, Ordering::Relaxed);
    }
}

/// Playback state owned by the audio callback.
struct Source {
    samples: Arc<Vec<f32>>,
    /// Source frames advanced per output frame.
    step: f64,
    phase: f64,
    cursor: Arc<AtomicUsize>,
    finished: Arc<AtomicBool>,
}

impl Source {
    /// Next mono sample, linearly interpolated between source frames.
    fn next_sample(&mut self) -> f32 {
        let len = self.samples.len();
        let idx = self.phase as usize;
        if idx >= len {
            self.finished.store(true, Ordering::Relaxed);
            return 0.0;
        }
        let frac = (self.phase - idx as f64) as f32;
        let a = self.samples[idx];
        let b = if idx + 1 < len { self.samples[idx + 1] } else { a };
        self.phase += self.step;
        self.cursor
            .store((self.phase as usize).min(len), Ordering::Relaxed);
        a + (b - a) * frac
    }

    fn fill<S>(&mut self, data: &mut [S], channels: usize)
    where
        S: cpal::Sample + cpal::FromSample<f32>,
    {
        for frame in data.chunks_mut(channels.max(1)) {
            let value = S::from_sample(self.next_sample());
            for out in frame.iter_mut() {
                *out = value;
            }
        }
    }
}

fn build_stream<S>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut source: Source,
) -> Result<cpal::Stream, TrackLoadError>
where
    S: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    device
        .build_output_stream(
            config,
            move |data: &mut [S], _: &cpal::OutputCallbackInfo| source.fill(data, channels),
            |err| log::error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| TrackLoadError::Output(format!("failed to build audio stream: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(samples: Vec<f32>, step: f64) -> Source {
        Source {
            samples: Arc::new(samples),
            step,
            phase: 0.0,
            cursor: Arc::new(AtomicUsize::new(0)),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    #[test]
    fn plays_every_frame_then_finishes() {
        let mut src = source(vec![0.1, 0.2, 0.3], 1.0);
        let mut out = [0.0f32; 8];
        src.fill(&mut out, 2);
        assert_eq!(&out[..6], &[0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);
        assert_eq!(&out[6..], &[0.0, 0.0]);
        assert!(src.finished.load(Ordering::Relaxed));
        assert_eq!(src.cursor.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn interpolates_when_output_rate_is_higher() {
        let mut src = source(vec![0.0, 1.0], 0.5);
        let mut out = [0.0f32; 3];
        src.fill(&mut out, 1);
        assert_eq!(out, [0.0, 0.5, 1.0]);
        assert!(!src.finished.load(Ordering::Relaxed));
    }
}
