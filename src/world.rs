use crate::audio_data::{AudioDataLoader, LoadOptions, SonoraAudioData, SymphoniaLoader};
use crate::config::SonoraWorldDesc;
use crate::error::Result;
use crate::mixer::{self, PlaybackState};
use crate::playback::{LoopMode, MIN_PITCH, PlayState, PlaybackCommand};
use crossbeam_channel::{Receiver, Sender, unbounded};
use glam::Vec3;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// The named-sound registry and the host-facing half of the library.
///
/// `SonoraWorld` owns the id-to-handle table and the decoded audio; every
/// operation validates and clamps its arguments here, on the calling thread,
/// then hands a command to the audio thread, which applies it at the next
/// block boundary. Queries read the shared playback state, so they observe
/// the world as of the last rendered block.
pub struct SonoraWorld {
    desc: SonoraWorldDesc,
    names: HashMap<String, Uuid>,
    sources: HashMap<Uuid, Arc<SonoraAudioData>>,
    command_tx: Sender<PlaybackCommand>,
    command_rx: Receiver<PlaybackCommand>,
    state: Arc<Mutex<PlaybackState>>,
}

impl SonoraWorld {
    pub fn new(desc: SonoraWorldDesc) -> Result<Self> {
        let (command_tx, command_rx) = unbounded();
        let state = Arc::new(Mutex::new(PlaybackState::new(desc.max_sounds)));
        Ok(Self {
            desc,
            names: HashMap::new(),
            sources: HashMap::new(),
            command_tx,
            command_rx,
            state,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.desc.sample_rate
    }

    pub fn desc(&self) -> &SonoraWorldDesc {
        &self.desc
    }

    /// Decode `path` and register it under `sound_id`, resampled to the
    /// world's output rate. Loading the same id twice is accepted and keeps
    /// the first data.
    pub fn load_sound(&mut self, path: &str, sound_id: &str) -> Result<()> {
        if self.names.contains_key(sound_id) {
            log::warn!("Sound id '{}' already loaded, ignoring", sound_id);
            return Ok(());
        }

        let audio = SymphoniaLoader.load(path, &LoadOptions::default())?;
        let audio = if audio.sample_rate() != self.desc.sample_rate {
            Arc::new(audio.resample(self.desc.sample_rate)?)
        } else {
            audio
        };

        let id = Uuid::new_v4();
        log::info!(
            "Loaded sound '{}' as id '{}' ({} frames @ {} Hz, {} ch)",
            path,
            sound_id,
            audio.total_frames(),
            audio.sample_rate(),
            audio.channels()
        );
        self.names.insert(sound_id.to_string(), id);
        self.sources.insert(id, audio);
        self.send(PlaybackCommand::Register(id));
        Ok(())
    }

    /// Stop and drop a loaded sound. Unknown ids only warn.
    pub fn unload_sound(&mut self, sound_id: &str) {
        let Some(id) = self.names.remove(sound_id) else {
            log::warn!("Attempted to unload unknown sound id '{}'", sound_id);
            return;
        };
        self.sources.remove(&id);
        self.send(PlaybackCommand::Unload(id));
        log::info!("Unloaded sound id '{}'", sound_id);
    }

    /// Start (or restart) playback from the beginning.
    pub fn play(&self, sound_id: &str, looping: bool) {
        let Some((id, audio)) = self.lookup(sound_id, "play") else {
            return;
        };
        let loop_mode = if looping {
            LoopMode::Infinite
        } else {
            LoopMode::Once
        };
        self.send(PlaybackCommand::Play {
            id,
            audio,
            loop_mode,
        });
        log::info!(
            "Playing sound id '{}' (looping: {})",
            sound_id,
            matches!(loop_mode, LoopMode::Infinite)
        );
    }

    /// Stop playback and reset the cursor to the start. Paused sounds are
    /// left untouched; the audio thread decides, so a play immediately
    /// followed by a stop still stops.
    pub fn stop(&self, sound_id: &str) {
        let Some((id, _)) = self.lookup(sound_id, "stop") else {
            return;
        };
        self.send(PlaybackCommand::Stop(id));
        log::info!("Stop requested for sound id '{}'", sound_id);
    }

    /// Halt playback, keeping the cursor for a later resume.
    pub fn pause(&self, sound_id: &str) {
        let Some((id, _)) = self.lookup(sound_id, "pause") else {
            return;
        };
        self.send(PlaybackCommand::Pause(id));
        log::info!("Paused sound id '{}'", sound_id);
    }

    /// Continue a paused sound; a sound with no live instance starts from
    /// the beginning, non-looping.
    pub fn resume(&self, sound_id: &str) {
        let Some((id, audio)) = self.lookup(sound_id, "resume") else {
            return;
        };
        self.send(PlaybackCommand::Resume { id, audio });
        log::info!("Resumed sound id '{}'", sound_id);
    }

    /// True while the sound is audible: started, not paused, not finished.
    pub fn is_playing(&self, sound_id: &str) -> bool {
        let Some(id) = self.names.get(sound_id) else {
            return false;
        };
        let Ok(state) = self.state.lock() else {
            return false;
        };
        state
            .instances
            .get(id)
            .is_some_and(|i| i.state == PlayState::Playing && !i.is_finished())
    }

    /// Master gain over the final mix, clamped to [0, 1].
    pub fn set_master_volume(&self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        self.send(PlaybackCommand::SetMasterVolume(volume));
        log::debug!("Master volume set to {}", volume);
    }

    pub fn set_sound_volume(&self, sound_id: &str, volume: f32) {
        let Some((id, _)) = self.lookup(sound_id, "set volume for") else {
            return;
        };
        let volume = volume.clamp(0.0, 1.0);
        self.send(PlaybackCommand::SetVolume(id, volume));
        log::debug!("Volume for sound id '{}' set to {}", sound_id, volume);
    }

    pub fn set_sound_pan(&self, sound_id: &str, pan: f32) {
        let Some((id, _)) = self.lookup(sound_id, "set pan for") else {
            return;
        };
        let pan = pan.clamp(-1.0, 1.0);
        self.send(PlaybackCommand::SetPan(id, pan));
        log::debug!("Pan for sound id '{}' set to {}", sound_id, pan);
    }

    pub fn set_sound_pitch(&self, sound_id: &str, pitch: f32) {
        let Some((id, _)) = self.lookup(sound_id, "set pitch for") else {
            return;
        };
        let pitch = if pitch <= 0.0 { MIN_PITCH } else { pitch };
        self.send(PlaybackCommand::SetPitch(id, pitch));
        log::debug!("Pitch for sound id '{}' set to {}", sound_id, pitch);
    }

    /// Give the sound a 3D position; from then on it is attenuated and
    /// panned against the listener.
    pub fn set_sound_position(&self, sound_id: &str, position: Vec3) {
        let Some((id, _)) = self.lookup(sound_id, "set position for") else {
            return;
        };
        self.send(PlaybackCommand::SetPosition(id, position));
        log::debug!("Position for sound id '{}' set to {}", sound_id, position);
    }

    pub fn set_listener_position(&self, position: Vec3) {
        self.send(PlaybackCommand::SetListenerPosition(position));
        log::debug!("Listener position set to {}", position);
    }

    /// Set the listener forward vector (up stays +Y). Zero or non-finite
    /// vectors are rejected.
    pub fn set_listener_orientation(&self, forward: Vec3) {
        if !forward.is_finite() || forward.length_squared() < 1e-12 {
            log::warn!("Ignoring degenerate listener orientation {}", forward);
            return;
        }
        self.send(PlaybackCommand::SetListenerOrientation(forward.normalize()));
        log::debug!("Listener orientation set to {}", forward);
    }

    /// Render callback for [`crate::engine::SonoraEngine`]: drains pending
    /// commands and mixes every playing sound into the block.
    pub fn make_render_callback(
        &self,
    ) -> impl Fn(&mut [f32], u32, u16) -> usize + Send + Sync + use<> {
        let state = self.state.clone();
        let commands = self.command_rx.clone();
        let spatialization = self.desc.enable_spatialization;
        move |buffer: &mut [f32], _sample_rate: u32, channels: u16| {
            mixer::mix_playback_instances(&state, &commands, buffer, channels, spatialization)
                .frames_filled
        }
    }

    pub fn loaded_sound_count(&self) -> usize {
        self.names.len()
    }

    fn lookup(&self, sound_id: &str, action: &str) -> Option<(Uuid, Arc<SonoraAudioData>)> {
        match self.names.get(sound_id) {
            Some(id) => Some((*id, self.sources[id].clone())),
            None => {
                log::warn!("Attempted to {} unknown sound id '{}'", action, sound_id);
                None
            }
        }
    }

    fn send(&self, command: PlaybackCommand) {
        if self.command_tx.send(command).is_err() {
            log::error!("Playback command channel disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &std::path::Path, sample_rate: u32, frames: usize) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..frames {
            writer.write_sample(8000i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn test_world(dir: &tempfile::TempDir, frames: usize) -> SonoraWorld {
        let path = dir.path().join("beep.wav");
        write_wav(&path, 48000, frames);
        let desc = SonoraWorldDesc::default().block_size(64);
        let mut world = SonoraWorld::new(desc).unwrap();
        world.load_sound(path.to_str().unwrap(), "beep").unwrap();
        world
    }

    /// Drive the render path the way the engine would.
    fn render_block(world: &SonoraWorld) -> Vec<f32> {
        let callback = world.make_render_callback();
        let desc = world.desc();
        let mut buffer = vec![0.0f32; desc.block_size * desc.channels as usize];
        callback(&mut buffer, world.sample_rate(), desc.channels);
        buffer
    }

    #[test]
    fn duplicate_load_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut world = test_world(&dir, 256);
        let path = dir.path().join("beep.wav");
        assert!(world.load_sound(path.to_str().unwrap(), "beep").is_ok());
        assert_eq!(world.loaded_sound_count(), 1);
    }

    #[test]
    fn load_failure_leaves_registry_unchanged() {
        let mut world = SonoraWorld::new(SonoraWorldDesc::default()).unwrap();
        assert!(world.load_sound("/no/such/file.wav", "ghost").is_err());
        assert_eq!(world.loaded_sound_count(), 0);
        assert!(!world.is_playing("ghost"));
    }

    #[test]
    fn play_then_mix_then_query() {
        let dir = tempfile::tempdir().unwrap();
        let world = test_world(&dir, 4096);

        assert!(!world.is_playing("beep"));
        world.play("beep", false);
        // Command applies at the next rendered block.
        let buffer = render_block(&world);
        assert!(world.is_playing("beep"));
        assert!(buffer.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn stop_resets_playback() {
        let dir = tempfile::tempdir().unwrap();
        let world = test_world(&dir, 4096);

        world.play("beep", false);
        render_block(&world);
        world.stop("beep");
        render_block(&world);
        assert!(!world.is_playing("beep"));

        // Stopped sounds resume from the beginning.
        world.resume("beep");
        render_block(&world);
        assert!(world.is_playing("beep"));
    }

    #[test]
    fn pause_and_resume_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let world = test_world(&dir, 4096);

        world.play("beep", false);
        render_block(&world);
        world.pause("beep");
        render_block(&world);
        assert!(!world.is_playing("beep"));

        world.resume("beep");
        render_block(&world);
        assert!(world.is_playing("beep"));
    }

    #[test]
    fn one_shot_finishes_on_its_own() {
        let dir = tempfile::tempdir().unwrap();
        // Shorter than one block.
        let world = test_world(&dir, 16);

        world.play("beep", false);
        render_block(&world);
        assert!(!world.is_playing("beep"));
    }

    #[test]
    fn looping_sound_keeps_playing() {
        let dir = tempfile::tempdir().unwrap();
        let world = test_world(&dir, 16);

        world.play("beep", true);
        render_block(&world);
        render_block(&world);
        assert!(world.is_playing("beep"));
    }

    #[test]
    fn unload_stops_playback() {
        let dir = tempfile::tempdir().unwrap();
        let mut world = test_world(&dir, 4096);

        world.play("beep", false);
        render_block(&world);
        world.unload_sound("beep");
        render_block(&world);
        assert!(!world.is_playing("beep"));
        assert_eq!(world.loaded_sound_count(), 0);
    }

    #[test]
    fn unknown_ids_are_no_ops() {
        let dir = tempfile::tempdir().unwrap();
        let mut world = test_world(&dir, 64);

        world.play("nope", false);
        world.stop("nope");
        world.pause("nope");
        world.resume("nope");
        world.set_sound_volume("nope", 0.5);
        world.unload_sound("nope");
        assert!(!world.is_playing("nope"));
        assert_eq!(world.loaded_sound_count(), 1);
    }

    #[test]
    fn volume_clamping_reaches_the_mixer() {
        let dir = tempfile::tempdir().unwrap();
        let world = test_world(&dir, 4096);

        world.set_sound_volume("beep", 7.5); // clamps to 1.0
        world.play("beep", false);
        let loud = render_block(&world);

        world.set_sound_volume("beep", 0.0);
        let silent = render_block(&world);

        assert!(loud.iter().any(|&s| s != 0.0));
        assert!(silent.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn degenerate_orientation_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let world = test_world(&dir, 64);
        world.set_listener_orientation(Vec3::ZERO);
        world.set_listener_orientation(Vec3::new(f32::NAN, 0.0, 0.0));
        render_block(&world);
        // Listener keeps its default forward.
        let state = world.state.lock().unwrap();
        assert_eq!(state.listener.forward, Vec3::NEG_Z);
    }

    #[test]
    fn positioned_sound_attenuates_with_distance() {
        let dir = tempfile::tempdir().unwrap();
        let world = test_world(&dir, 4096);

        world.play("beep", true);
        let flat = render_block(&world);

        world.set_sound_position("beep", Vec3::new(0.0, 0.0, -21.0));
        render_block(&world);
        let positioned = render_block(&world);

        let peak = |buf: &[f32]| buf.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        // 21 units ahead: inverse model gives 1/21 of the flat gain.
        assert!(peak(&positioned) < peak(&flat) * 0.1);
        assert!(peak(&positioned) > 0.0);
    }
}
