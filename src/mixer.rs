//! Block mixing for the audio thread.
//!
//! Commands from the world are drained at block boundaries, then every
//! playing instance is mixed into the output buffer. The shared state is
//! taken with `try_lock`; a contended block renders silence instead of
//! stalling the device callback.

use crate::playback::{
    LoopMode, MIN_PITCH, PlayState, PlaybackCommand, PlaybackInstance, SoundParams,
};
use crate::spatial::{self, Listener};
use crossbeam_channel::Receiver;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Everything the mixer reads and mutates, shared between the world (for
/// queries) and the audio thread (for rendering).
#[derive(Debug)]
pub struct PlaybackState {
    pub instances: HashMap<Uuid, PlaybackInstance>,
    pub params: HashMap<Uuid, SoundParams>,
    pub listener: Listener,
    pub master_volume: f32,
    pub max_sounds: usize,
}

impl PlaybackState {
    pub fn new(max_sounds: usize) -> Self {
        Self {
            instances: HashMap::new(),
            params: HashMap::new(),
            listener: Listener::default(),
            master_volume: 1.0,
            max_sounds,
        }
    }

    /// Apply one command. Validation (clamping, unknown-id warnings) already
    /// happened on the sending thread; this only mutates state.
    pub fn apply(&mut self, command: PlaybackCommand) {
        match command {
            PlaybackCommand::Register(id) => {
                self.params.entry(id).or_default();
            }
            PlaybackCommand::Play {
                id,
                audio,
                loop_mode,
            } => {
                if !self.instances.contains_key(&id) && self.instances.len() >= self.max_sounds {
                    log::warn!(
                        "Sound limit of {} reached, dropping play request",
                        self.max_sounds
                    );
                    return;
                }
                // Restart from the beginning, replacing any live instance.
                self.instances
                    .insert(id, PlaybackInstance::new(audio, loop_mode));
            }
            PlaybackCommand::Stop(id) => {
                // Stop only affects an audibly playing sound; a paused sound
                // keeps its instance and cursor.
                if self
                    .instances
                    .get(&id)
                    .is_some_and(|i| i.state == PlayState::Playing)
                {
                    self.instances.remove(&id);
                }
            }
            PlaybackCommand::Pause(id) => {
                if let Some(instance) = self.instances.get_mut(&id) {
                    instance.state = PlayState::Paused;
                }
            }
            PlaybackCommand::Resume { id, audio } => {
                if let Some(instance) = self.instances.get_mut(&id) {
                    instance.state = PlayState::Playing;
                } else if self.instances.len() < self.max_sounds {
                    self.instances
                        .insert(id, PlaybackInstance::new(audio, LoopMode::Once));
                }
            }
            PlaybackCommand::Unload(id) => {
                self.instances.remove(&id);
                self.params.remove(&id);
            }
            PlaybackCommand::SetVolume(id, volume) => {
                if let Some(params) = self.params.get_mut(&id) {
                    params.volume = volume;
                }
            }
            PlaybackCommand::SetPan(id, pan) => {
                if let Some(params) = self.params.get_mut(&id) {
                    params.pan = pan;
                }
            }
            PlaybackCommand::SetPitch(id, pitch) => {
                if let Some(params) = self.params.get_mut(&id) {
                    params.pitch = pitch;
                }
            }
            PlaybackCommand::SetPosition(id, position) => {
                if let Some(params) = self.params.get_mut(&id) {
                    params.position = Some(position);
                }
            }
            PlaybackCommand::SetListenerPosition(position) => {
                self.listener.position = position;
            }
            PlaybackCommand::SetListenerOrientation(forward) => {
                self.listener.forward = forward;
            }
            PlaybackCommand::SetMasterVolume(volume) => {
                self.master_volume = volume;
            }
        }
    }
}

/// Result of one mixed block.
pub struct MixResult {
    pub frames_filled: usize,
    pub completed_sounds: Vec<Uuid>,
}

/// Drain pending commands and mix all playing instances into `buffer`.
///
/// Finished one-shot instances are removed afterwards so is-playing queries
/// flip as soon as the block that drained them has rendered.
pub fn mix_playback_instances(
    state: &Arc<Mutex<PlaybackState>>,
    commands: &Receiver<PlaybackCommand>,
    buffer: &mut [f32],
    channels: u16,
    spatialization: bool,
) -> MixResult {
    let Ok(mut state) = state.try_lock() else {
        log::warn!("Playback state contended, rendering silence for one block");
        return MixResult {
            frames_filled: 0,
            completed_sounds: Vec::new(),
        };
    };
    let state = &mut *state;

    for command in commands.try_iter() {
        state.apply(command);
    }

    let mut frames_filled_max = 0;

    for (id, instance) in state.instances.iter_mut() {
        if instance.state != PlayState::Playing {
            continue;
        }

        let params = state.params.get(id).copied().unwrap_or_default();

        let mut gain = params.volume * state.master_volume;
        let mut pan = params.pan;
        if spatialization {
            if let Some(position) = params.position {
                gain *= spatial::distance_gain(&state.listener, position);
                pan = (pan + spatial::direction_pan(&state.listener, position)).clamp(-1.0, 1.0);
            }
        }

        let (left, right) = spatial::balance_gains(pan);
        let frames = instance.mix_into(
            buffer,
            channels,
            gain * left,
            gain * right,
            params.pitch.max(MIN_PITCH),
        );
        frames_filled_max = frames_filled_max.max(frames);
    }

    let mut completed_sounds = Vec::new();
    state.instances.retain(|id, instance| {
        if instance.is_finished() {
            log::debug!("Sound {} finished playback", id);
            completed_sounds.push(*id);
            false
        } else {
            true
        }
    });

    MixResult {
        frames_filled: frames_filled_max,
        completed_sounds,
    }
}
