use crate::{
    audio_data::{AudioDataLoader, ConvertToMono, LoadOptions, SonoraAudioData},
    error::{Result, SonoraError},
};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use symphonia::{
    core::{
        audio::SampleBuffer, codecs::DecoderOptions, errors::Error, formats::FormatOptions,
        io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
    },
    default::{get_codecs, get_probe},
};

/// Default loader built on Symphonia.
///
/// Probes the container, decodes the default track to f32 PCM and optionally
/// downmixes to mono.
pub struct SymphoniaLoader;

impl AudioDataLoader for SymphoniaLoader {
    fn load(&self, path: &str, options: &LoadOptions) -> Result<Arc<SonoraAudioData>> {
        let file = File::open(path)?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                SonoraError::AudioLoading(format!("Failed to probe audio format: {:?}", e))
            })?;

        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| SonoraError::AudioLoading("No default audio track found".to_string()))?;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| SonoraError::AudioLoading("Sample rate not found".to_string()))?;

        let channels = track
            .codec_params
            .channels
            .ok_or_else(|| SonoraError::AudioLoading("Channel count not found".to_string()))?
            .count() as u16;

        let mut decoder = get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| SonoraError::AudioLoading(format!("Failed to create decoder: {:?}", e)))?;

        let mut samples: Vec<f32> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(Error::IoError(_)) => break, // end-of-file
                Err(e) => {
                    return Err(SonoraError::AudioLoading(format!(
                        "Error reading packet: {:?}",
                        e
                    )));
                }
            };

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(Error::IoError(_)) => break, // also EOF in some formats
                Err(Error::DecodeError(_)) => continue, // recoverable corruption
                Err(e) => {
                    return Err(SonoraError::AudioLoading(format!(
                        "Error decoding packet: {:?}",
                        e
                    )));
                }
            };

            let spec = *decoded.spec();
            let capacity = decoded.capacity();

            let mut tmp = SampleBuffer::<f32>::new(capacity as u64, spec);
            tmp.copy_interleaved_ref(decoded);
            samples.extend_from_slice(tmp.samples());
        }

        let (final_samples, final_channels) = match options.convert_to_mono {
            ConvertToMono::Original => (samples, channels),
            ConvertToMono::ForceMono if channels == 1 => (samples, 1),
            ConvertToMono::ForceMono => {
                let mono = samples
                    .chunks(channels as usize)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                    .collect();
                (mono, 1)
            }
        };

        Ok(Arc::new(SonoraAudioData::new(
            final_samples,
            sample_rate,
            final_channels,
        )))
    }
}
