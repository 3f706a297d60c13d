mod load_options;
mod loader;
mod resampler;
mod symphonia_loader;

use crate::error::{Result, SonoraError};
pub use load_options::{ConvertToMono, LoadOptions};
pub use loader::AudioDataLoader;
pub use resampler::AudioResampler;
use std::sync::Arc;
use std::time::Duration;
pub use symphonia_loader::SymphoniaLoader;

/// Container for fully decoded audio with reference-counted sharing.
///
/// Samples are stored in **interleaved** f32 format: for stereo,
/// `[L0, R0, L1, R1, ...]`. One frame holds one sample per channel, so
/// `samples.len() == total_frames * channels`. Interleaved storage matches
/// what decoders produce and what the output device consumes, so the mixer
/// never has to shuffle channel layouts.
#[derive(Debug, Clone)]
pub struct SonoraAudioData {
    inner: Arc<AudioDataInner>,
}

#[derive(Debug)]
struct AudioDataInner {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    duration: Duration,
    total_frames: usize,
}

impl SonoraAudioData {
    pub(crate) fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let total_frames = samples.len() / channels as usize;
        let duration = Duration::from_secs_f64(total_frames as f64 / sample_rate as f64);
        Self {
            inner: Arc::new(AudioDataInner {
                samples,
                sample_rate,
                channels,
                duration,
                total_frames,
            }),
        }
    }

    /// Decode an audio file with the default Symphonia-based loader.
    ///
    /// Supports every container/codec Symphonia ships by default (WAV, FLAC,
    /// OGG/Vorbis, ...).
    pub fn from_path(path: &str) -> Result<Arc<Self>> {
        SymphoniaLoader.load(path, &LoadOptions::default())
    }

    /// Decode an audio file with custom loading options.
    pub fn from_path_with_options(path: &str, options: &LoadOptions) -> Result<Arc<Self>> {
        SymphoniaLoader.load(path, options)
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.inner.channels
    }

    pub fn duration(&self) -> Duration {
        self.inner.duration
    }

    pub fn samples(&self) -> &[f32] {
        &self.inner.samples
    }

    pub fn total_frames(&self) -> usize {
        self.inner.total_frames
    }

    pub fn is_empty(&self) -> bool {
        self.inner.samples.is_empty()
    }

    /// Extract one channel as a planar buffer (0-indexed).
    pub fn channel_samples(&self, channel: usize) -> Result<Vec<f32>> {
        if channel >= self.inner.channels as usize {
            return Err(SonoraError::AudioFormat(format!(
                "Channel {} out of range (max: {})",
                channel,
                self.inner.channels - 1
            )));
        }

        Ok(self
            .inner
            .samples
            .chunks(self.inner.channels as usize)
            .map(|frame| frame[channel])
            .collect())
    }

    /// Downmix all channels to mono by averaging.
    pub fn to_mono(&self) -> Self {
        if self.inner.channels == 1 {
            return self.clone();
        }

        let mono: Vec<f32> = self
            .inner
            .samples
            .chunks(self.inner.channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / self.inner.channels as f32)
            .collect();

        Self::new(mono, self.inner.sample_rate, 1)
    }

    /// Resample to a different rate, returning a new instance. A no-op clone
    /// when the rates already match.
    pub fn resample(&self, target_sample_rate: u32) -> Result<Self> {
        if target_sample_rate == self.inner.sample_rate {
            return Ok(self.clone());
        }

        let resampler = AudioResampler::new(
            self.inner.sample_rate,
            target_sample_rate,
            self.inner.channels,
            None,
        )?;
        let resampled = resampler.resample_interleaved(&self.inner.samples)?;

        Ok(Self::new(resampled, target_sample_rate, self.inner.channels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_accounting() {
        let data = SonoraAudioData::new(vec![0.0; 96], 48000, 2);
        assert_eq!(data.total_frames(), 48);
        assert_eq!(data.channels(), 2);
        assert_eq!(data.duration(), Duration::from_millis(1));
    }

    #[test]
    fn channel_extraction() {
        let data = SonoraAudioData::new(vec![0.1, 0.9, 0.2, 0.8], 48000, 2);
        assert_eq!(data.channel_samples(0).unwrap(), vec![0.1, 0.2]);
        assert_eq!(data.channel_samples(1).unwrap(), vec![0.9, 0.8]);
        assert!(data.channel_samples(2).is_err());
    }

    #[test]
    fn mono_downmix_averages() {
        let data = SonoraAudioData::new(vec![0.5, 0.1, -0.5, -0.1], 48000, 2);
        let mono = data.to_mono();
        assert_eq!(mono.channels(), 1);
        let samples = mono.samples();
        assert!((samples[0] - 0.3).abs() < 1e-6);
        assert!((samples[1] + 0.3).abs() < 1e-6);
    }

    #[test]
    fn resample_same_rate_is_identity() {
        let data = SonoraAudioData::new(vec![0.1, 0.2, 0.3, 0.4], 48000, 1);
        let out = data.resample(48000).unwrap();
        assert_eq!(out.samples(), data.samples());
    }
}
