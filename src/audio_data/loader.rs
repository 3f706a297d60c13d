use crate::audio_data::{LoadOptions, SonoraAudioData};
use crate::error::Result;
use std::sync::Arc;

/// Trait for decoding audio files into [`SonoraAudioData`].
///
/// [`SymphoniaLoader`](crate::audio_data::SymphoniaLoader) is the built-in
/// implementation; hosts embedding the rlib can plug in their own decoder for
/// formats Symphonia does not cover.
pub trait AudioDataLoader {
    /// Decode the file at `path` into interleaved f32 samples.
    fn load(&self, path: &str, options: &LoadOptions) -> Result<Arc<SonoraAudioData>>;
}
