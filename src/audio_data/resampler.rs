use crate::error::{Result, SonoraError};

/// Offline resampler used when a loaded sound's rate differs from the
/// engine's output rate.
///
/// Works on whole buffers at load time; playback never resamples.
pub struct AudioResampler {
    source_sample_rate: u32,
    target_sample_rate: u32,
    channels: u16,
    chunk_size: usize,
}

impl AudioResampler {
    pub fn new(
        source_sample_rate: u32,
        target_sample_rate: u32,
        channels: u16,
        chunk_size: Option<usize>,
    ) -> Result<Self> {
        if source_sample_rate == 0 || target_sample_rate == 0 {
            return Err(SonoraError::AudioFormat(
                "Sample rates must be greater than 0".to_string(),
            ));
        }

        if channels == 0 {
            return Err(SonoraError::AudioFormat(
                "Channel count must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            source_sample_rate,
            target_sample_rate,
            channels,
            chunk_size: chunk_size.unwrap_or(1024),
        })
    }

    /// Resample a single planar channel. The final chunk is zero-padded to
    /// the chunk size, so output may run slightly past the source tail.
    pub fn resample_channel(&self, channel_samples: &[f32]) -> Result<Vec<f32>> {
        if self.source_sample_rate == self.target_sample_rate {
            return Ok(channel_samples.to_vec());
        }

        use rubato::{FftFixedIn, Resampler};

        let mut resampler = FftFixedIn::new(
            self.source_sample_rate as usize,
            self.target_sample_rate as usize,
            self.chunk_size,
            2, // sub_chunks
            1, // single channel
        )
        .map_err(|e| SonoraError::AudioLoading(format!("Failed to create resampler: {}", e)))?;

        let mut output = Vec::new();
        let mut input_index = 0;

        while input_index < channel_samples.len() {
            let remaining = channel_samples.len() - input_index;
            let take = remaining.min(self.chunk_size);

            let mut input_chunk = vec![0.0f32; self.chunk_size];
            input_chunk[..take].copy_from_slice(&channel_samples[input_index..input_index + take]);

            let waves_out = resampler
                .process(&[input_chunk], None)
                .map_err(|e| SonoraError::AudioLoading(format!("Resampling error: {}", e)))?;

            if let Some(first_channel) = waves_out.first() {
                output.extend_from_slice(first_channel);
            }

            input_index += take;
        }

        Ok(output)
    }

    /// Resample an interleaved buffer: split to planar, resample each
    /// channel, re-interleave.
    pub fn resample_interleaved(&self, interleaved: &[f32]) -> Result<Vec<f32>> {
        if self.source_sample_rate == self.target_sample_rate {
            return Ok(interleaved.to_vec());
        }

        let channels = self.channels as usize;
        let mut resampled_channels = Vec::with_capacity(channels);
        for ch in 0..channels {
            let planar: Vec<f32> = interleaved
                .chunks(channels)
                .map(|frame| frame.get(ch).copied().unwrap_or(0.0))
                .collect();
            resampled_channels.push(self.resample_channel(&planar)?);
        }

        let new_frames = resampled_channels[0].len();
        let mut out = Vec::with_capacity(new_frames * channels);
        for frame_idx in 0..new_frames {
            for resampled in &resampled_channels {
                out.push(resampled.get(frame_idx).copied().unwrap_or(0.0));
            }
        }

        Ok(out)
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    pub fn source_sample_rate(&self) -> u32 {
        self.source_sample_rate
    }

    pub fn resample_ratio(&self) -> f64 {
        self.target_sample_rate as f64 / self.source_sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resampler_creation() {
        let resampler = AudioResampler::new(44100, 48000, 2, None).unwrap();
        assert_eq!(resampler.source_sample_rate(), 44100);
        assert_eq!(resampler.target_sample_rate(), 48000);
        assert!((resampler.resample_ratio() - 48000.0 / 44100.0).abs() < 1e-9);
    }

    #[test]
    fn no_resampling_needed() {
        let resampler = AudioResampler::new(44100, 44100, 1, None).unwrap();
        let samples = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(resampler.resample_channel(&samples).unwrap(), samples);
    }

    #[test]
    fn invalid_parameters() {
        assert!(AudioResampler::new(0, 48000, 2, None).is_err());
        assert!(AudioResampler::new(44100, 0, 2, None).is_err());
        assert!(AudioResampler::new(44100, 48000, 0, None).is_err());
    }

    #[test]
    fn upsampling_grows_output() {
        let resampler = AudioResampler::new(24000, 48000, 1, Some(256)).unwrap();
        let input: Vec<f32> = (0..1000)
            .map(|i| (i as f32 * 0.01).sin() * 0.5)
            .collect();
        let output = resampler.resample_channel(&input).unwrap();
        // Zero-padding of the last chunk means output >= the exact ratio.
        assert!(output.len() >= input.len() * 2 - 256);
        assert!(output.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn interleaved_preserves_channel_count() {
        let resampler = AudioResampler::new(22050, 44100, 2, Some(128)).unwrap();
        let interleaved = vec![0.25f32; 512];
        let out = resampler.resample_interleaved(&interleaved).unwrap();
        assert_eq!(out.len() % 2, 0);
        assert!(out.len() >= interleaved.len() - 256);
    }
}
