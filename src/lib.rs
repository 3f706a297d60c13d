//! Sound playback behind a flat C-callable API.
//!
//! Sonora keeps a registry of named, fully decoded sounds and mixes the
//! playing ones into the default output device, with per-sound volume, pan,
//! pitch and optional 3D positioning against a single listener. The exported
//! C surface lives in [`ffi`] (header: `include/sonora.h`); the same
//! functionality is usable from Rust through [`SonoraWorld`] and
//! [`SonoraEngine`].

pub mod audio_data;
pub mod config;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod mixer;
pub mod playback;
pub mod spatial;
pub mod world;

pub use audio_data::SonoraAudioData;
pub use config::SonoraWorldDesc;
pub use engine::{AudioFillCallback, SonoraEngine};
pub use error::SonoraError;
pub use playback::{LoopMode, PlayState, PlaybackCommand, SoundParams};
pub use spatial::Listener;
pub use world::SonoraWorld;
