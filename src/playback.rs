use crate::audio_data::SonoraAudioData;
use glam::Vec3;
use std::sync::Arc;
use uuid::Uuid;

/// Smallest pitch accepted; requested values at or below zero are raised to
/// this so the play cursor always advances.
pub const MIN_PITCH: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Once,
    Infinite,
}

/// Per-sound mixing parameters. These live from load to unload, independent
/// of any playback instance, so a stopped and replayed sound keeps its
/// volume, pan, pitch and position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundParams {
    /// Gain in [0, 1].
    pub volume: f32,
    /// Stereo balance in [-1, 1].
    pub pan: f32,
    /// Playback rate; 1.0 is normal speed.
    pub pitch: f32,
    /// 3D position. `None` until the host positions the sound; a flat sound
    /// skips attenuation and direction panning entirely.
    pub position: Option<Vec3>,
}

impl Default for SoundParams {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pan: 0.0,
            pitch: 1.0,
            position: None,
        }
    }
}

/// One playing (or paused) occurrence of a loaded sound.
///
/// The cursor is a fractional frame index: each output frame advances it by
/// the current pitch, and samples between source frames are linearly
/// interpolated.
#[derive(Debug)]
pub struct PlaybackInstance {
    pub audio: Arc<SonoraAudioData>,
    pub state: PlayState,
    pub loop_mode: LoopMode,
    cursor: f64,
    finished: bool,
}

impl PlaybackInstance {
    pub fn new(audio: Arc<SonoraAudioData>, loop_mode: LoopMode) -> Self {
        let finished = audio.total_frames() == 0;
        Self {
            audio,
            state: PlayState::Playing,
            loop_mode,
            cursor: 0.0,
            finished,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn current_frame(&self) -> usize {
        self.cursor as usize
    }

    fn source_sample(&self, frame: usize, channel: usize) -> f32 {
        let channels = self.audio.channels() as usize;
        let samples = self.audio.samples();
        samples
            .get(frame * channels + channel.min(channels - 1))
            .copied()
            .unwrap_or(0.0)
    }

    /// Linearly interpolated sample at the fractional frame position.
    fn interpolated(&self, position: f64, channel: usize) -> f32 {
        let total = self.audio.total_frames();
        let i0 = position as usize;
        let frac = (position - i0 as f64) as f32;
        let i1 = match self.loop_mode {
            LoopMode::Infinite => (i0 + 1) % total,
            LoopMode::Once => (i0 + 1).min(total - 1),
        };
        let a = self.source_sample(i0, channel);
        let b = self.source_sample(i1, channel);
        a + (b - a) * frac
    }

    /// Mix this instance into an interleaved output buffer, applying the
    /// given left/right gains and pitch. Channels beyond the first two are
    /// left untouched. Returns the number of output frames produced.
    pub fn mix_into(
        &mut self,
        buffer: &mut [f32],
        out_channels: u16,
        left_gain: f32,
        right_gain: f32,
        pitch: f32,
    ) -> usize {
        if self.state != PlayState::Playing || self.finished {
            return 0;
        }

        let out_channels = out_channels as usize;
        let total = self.audio.total_frames();
        let frame_count = buffer.len() / out_channels;
        let step = pitch.max(MIN_PITCH) as f64;
        let stereo_source = self.audio.channels() >= 2;
        let mut frames_mixed = 0;

        for frame_idx in 0..frame_count {
            if self.cursor >= total as f64 {
                match self.loop_mode {
                    LoopMode::Infinite => self.cursor %= total as f64,
                    LoopMode::Once => {
                        self.finished = true;
                        break;
                    }
                }
            }

            let left = self.interpolated(self.cursor, 0);
            let right = if stereo_source {
                self.interpolated(self.cursor, 1)
            } else {
                left
            };

            let base = frame_idx * out_channels;
            if out_channels == 1 {
                buffer[base] += (left * left_gain + right * right_gain) * 0.5;
            } else {
                buffer[base] += left * left_gain;
                buffer[base + 1] += right * right_gain;
            }

            self.cursor += step;
            frames_mixed += 1;
        }

        // A cursor that ran exactly off the end still counts as finished for
        // Once sounds, so is-playing queries flip without another block.
        if self.loop_mode == LoopMode::Once && self.cursor >= total as f64 {
            self.finished = true;
        }

        frames_mixed
    }
}

/// Commands sent from the world to the audio thread, applied at block
/// boundaries.
#[derive(Debug)]
pub enum PlaybackCommand {
    /// Create the params entry for a newly loaded sound.
    Register(Uuid),
    Play {
        id: Uuid,
        audio: Arc<SonoraAudioData>,
        loop_mode: LoopMode,
    },
    Stop(Uuid),
    Pause(Uuid),
    /// Resume a paused sound, or start it from the beginning if it has no
    /// instance (matching a bare engine start on a never-played sound).
    Resume {
        id: Uuid,
        audio: Arc<SonoraAudioData>,
    },
    /// Drop both instance and params for an unloaded sound.
    Unload(Uuid),
    SetVolume(Uuid, f32),
    SetPan(Uuid, f32),
    SetPitch(Uuid, f32),
    SetPosition(Uuid, Vec3),
    SetListenerPosition(Vec3),
    SetListenerOrientation(Vec3),
    SetMasterVolume(f32),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono_data(samples: Vec<f32>) -> Arc<SonoraAudioData> {
        Arc::new(SonoraAudioData::new(samples, 48000, 1))
    }

    #[test]
    fn mixes_mono_into_stereo() {
        let mut instance = PlaybackInstance::new(mono_data(vec![0.5; 8]), LoopMode::Once);
        let mut buffer = vec![0.0f32; 8];
        let frames = instance.mix_into(&mut buffer, 2, 1.0, 1.0, 1.0);
        assert_eq!(frames, 4);
        assert!(buffer.iter().all(|&s| (s - 0.5).abs() < 1e-6));
        assert_eq!(instance.current_frame(), 4);
    }

    #[test]
    fn gains_are_applied_per_channel() {
        let mut instance = PlaybackInstance::new(mono_data(vec![1.0; 4]), LoopMode::Once);
        let mut buffer = vec![0.0f32; 4];
        instance.mix_into(&mut buffer, 2, 0.25, 0.75, 1.0);
        assert!((buffer[0] - 0.25).abs() < 1e-6);
        assert!((buffer[1] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn once_mode_finishes_at_end() {
        let mut instance = PlaybackInstance::new(mono_data(vec![0.1; 4]), LoopMode::Once);
        let mut buffer = vec![0.0f32; 16];
        let frames = instance.mix_into(&mut buffer, 2, 1.0, 1.0, 1.0);
        assert_eq!(frames, 4);
        assert!(instance.is_finished());
        // Tail of the buffer stays silent.
        assert_eq!(buffer[8], 0.0);
    }

    #[test]
    fn infinite_mode_wraps() {
        let mut instance = PlaybackInstance::new(mono_data(vec![0.2; 4]), LoopMode::Infinite);
        let mut buffer = vec![0.0f32; 24];
        let frames = instance.mix_into(&mut buffer, 2, 1.0, 1.0, 1.0);
        assert_eq!(frames, 12);
        assert!(!instance.is_finished());
        assert!(buffer.iter().all(|&s| (s - 0.2).abs() < 1e-6));
    }

    #[test]
    fn pitch_doubles_consumption() {
        let mut instance = PlaybackInstance::new(mono_data(vec![0.3; 8]), LoopMode::Once);
        let mut buffer = vec![0.0f32; 8];
        instance.mix_into(&mut buffer, 2, 1.0, 1.0, 2.0);
        assert_eq!(instance.current_frame(), 8);
        assert!(instance.is_finished());
    }

    #[test]
    fn paused_instance_is_silent() {
        let mut instance = PlaybackInstance::new(mono_data(vec![0.5; 8]), LoopMode::Once);
        instance.state = PlayState::Paused;
        let mut buffer = vec![0.0f32; 8];
        assert_eq!(instance.mix_into(&mut buffer, 2, 1.0, 1.0, 1.0), 0);
        assert!(buffer.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn stereo_source_keeps_channels_separate() {
        let data = Arc::new(SonoraAudioData::new(vec![0.6, -0.4, 0.6, -0.4], 48000, 2));
        let mut instance = PlaybackInstance::new(data, LoopMode::Once);
        let mut buffer = vec![0.0f32; 4];
        instance.mix_into(&mut buffer, 2, 1.0, 1.0, 1.0);
        assert!((buffer[0] - 0.6).abs() < 1e-6);
        assert!((buffer[1] + 0.4).abs() < 1e-6);
    }

    #[test]
    fn empty_audio_is_immediately_finished() {
        let instance = PlaybackInstance::new(mono_data(Vec::new()), LoopMode::Infinite);
        assert!(instance.is_finished());
    }
}
