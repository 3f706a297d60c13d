//! Engine configuration

/// Describes the output format and mixing limits of a [`crate::world::SonoraWorld`]
/// and the engine driving it.
#[derive(Debug, Clone)]
pub struct SonoraWorldDesc {
    /// Output sample rate in Hz. Sounds are resampled to this rate at load time.
    pub sample_rate: u32,
    /// Frames per render block requested from the device.
    pub block_size: usize,
    /// Output channel count (2 = stereo).
    pub channels: u16,
    /// Upper bound on simultaneously playing sounds.
    pub max_sounds: usize,
    /// When false, sound positions are ignored and everything mixes flat.
    pub enable_spatialization: bool,
}

impl Default for SonoraWorldDesc {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            block_size: 512,
            channels: 2,
            max_sounds: 64,
            enable_spatialization: true,
        }
    }
}

impl SonoraWorldDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    pub fn channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    pub fn max_sounds(mut self, max: usize) -> Self {
        self.max_sounds = max;
        self
    }

    pub fn enable_spatialization(mut self, enable: bool) -> Self {
        self.enable_spatialization = enable;
        self
    }
}
