//! The exported C surface.
//!
//! A single process-wide system (world + engine) lives behind a mutex; every
//! exported function validates its arguments, logs, and forwards to the
//! world. All functions tolerate null pointers and calls made outside the
//! init/shutdown window. The matching header is `include/sonora.h`.

use crate::config::SonoraWorldDesc;
use crate::engine::SonoraEngine;
use crate::world::SonoraWorld;
use glam::Vec3;
use std::ffi::{CStr, c_char};
use std::sync::{Mutex, OnceLock};

struct SonoraSystem {
    world: SonoraWorld,
    engine: SonoraEngine,
}

static SYSTEM: OnceLock<Mutex<Option<SonoraSystem>>> = OnceLock::new();

fn system_cell() -> &'static Mutex<Option<SonoraSystem>> {
    SYSTEM.get_or_init(|| Mutex::new(None))
}

fn with_system<R>(func: &str, f: impl FnOnce(&mut SonoraSystem) -> R) -> Option<R> {
    let mut guard = match system_cell().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    match guard.as_mut() {
        Some(system) => Some(f(system)),
        None => {
            log::error!("{} called before sonora_init", func);
            None
        }
    }
}

/// Borrow a C string argument, rejecting null and non-UTF-8.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string valid for the
/// duration of the call.
unsafe fn cstr_arg<'a>(ptr: *const c_char, what: &str, func: &str) -> Option<&'a str> {
    if ptr.is_null() {
        log::error!("{} received null {}", func, what);
        return None;
    }
    match unsafe { CStr::from_ptr(ptr) }.to_str() {
        Ok(s) => Some(s),
        Err(_) => {
            log::error!("{} received non-UTF-8 {}", func, what);
            None
        }
    }
}

/// Initialize the sound system and open the default output device.
///
/// Returns `false` when no device is available or the stream cannot be
/// started. Calling again while initialized logs a warning and returns
/// `true`.
#[unsafe(no_mangle)]
pub extern "C" fn sonora_init() -> bool {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    let mut guard = match system_cell().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if guard.is_some() {
        log::warn!("sonora_init called while already initialized");
        return true;
    }

    let desc = SonoraWorldDesc::default();
    let world = match SonoraWorld::new(desc.clone()) {
        Ok(world) => world,
        Err(e) => {
            log::error!("Failed to create world: {}", e);
            return false;
        }
    };
    let mut engine = match SonoraEngine::new(desc) {
        Ok(engine) => engine,
        Err(e) => {
            log::error!("Failed to create engine: {}", e);
            return false;
        }
    };

    engine.set_fill_callback(world.make_render_callback());
    if let Err(e) = engine.start() {
        log::error!("Failed to start audio engine: {}", e);
        return false;
    }

    *guard = Some(SonoraSystem { world, engine });
    log::info!("Sound system initialized");
    true
}

/// Stop the stream and drop every loaded sound. Safe to call when not
/// initialized.
#[unsafe(no_mangle)]
pub extern "C" fn sonora_shutdown() {
    let mut guard = match system_cell().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    match guard.take() {
        Some(mut system) => {
            if let Err(e) = system.engine.stop() {
                log::error!("Error while stopping audio engine: {}", e);
            }
            log::info!("Sound system shut down");
        }
        None => log::warn!("sonora_shutdown called while not initialized"),
    }
}

/// Decode an audio file and register it under `sound_id`.
///
/// Returns `true` on success and for duplicate ids (the first load wins),
/// `false` on null arguments or decode failure.
///
/// # Safety
/// `path` and `sound_id` must be null or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sonora_load_sound(path: *const c_char, sound_id: *const c_char) -> bool {
    let Some(path) = (unsafe { cstr_arg(path, "path", "sonora_load_sound") }) else {
        return false;
    };
    let Some(sound_id) = (unsafe { cstr_arg(sound_id, "sound id", "sonora_load_sound") }) else {
        return false;
    };
    with_system("sonora_load_sound", |system| {
        match system.world.load_sound(path, sound_id) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to load sound '{}': {}", path, e);
                false
            }
        }
    })
    .unwrap_or(false)
}

/// Stop and drop a loaded sound.
///
/// # Safety
/// `sound_id` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sonora_unload_sound(sound_id: *const c_char) {
    let Some(sound_id) = (unsafe { cstr_arg(sound_id, "sound id", "sonora_unload_sound") }) else {
        return;
    };
    with_system("sonora_unload_sound", |system| {
        system.world.unload_sound(sound_id);
    });
}

/// Play a loaded sound from the beginning, restarting it if already playing.
///
/// # Safety
/// `sound_id` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sonora_play_sound(sound_id: *const c_char, looping: bool) {
    let Some(sound_id) = (unsafe { cstr_arg(sound_id, "sound id", "sonora_play_sound") }) else {
        return;
    };
    with_system("sonora_play_sound", |system| {
        system.world.play(sound_id, looping);
    });
}

/// Stop a playing sound and reset it to the start.
///
/// # Safety
/// `sound_id` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sonora_stop_sound(sound_id: *const c_char) {
    let Some(sound_id) = (unsafe { cstr_arg(sound_id, "sound id", "sonora_stop_sound") }) else {
        return;
    };
    with_system("sonora_stop_sound", |system| {
        system.world.stop(sound_id);
    });
}

/// Pause a playing sound, keeping its position.
///
/// # Safety
/// `sound_id` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sonora_pause_sound(sound_id: *const c_char) {
    let Some(sound_id) = (unsafe { cstr_arg(sound_id, "sound id", "sonora_pause_sound") }) else {
        return;
    };
    with_system("sonora_pause_sound", |system| {
        system.world.pause(sound_id);
    });
}

/// Resume a paused sound from its position.
///
/// # Safety
/// `sound_id` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sonora_resume_sound(sound_id: *const c_char) {
    let Some(sound_id) = (unsafe { cstr_arg(sound_id, "sound id", "sonora_resume_sound") }) else {
        return;
    };
    with_system("sonora_resume_sound", |system| {
        system.world.resume(sound_id);
    });
}

/// Set the master volume, clamped to [0, 1].
#[unsafe(no_mangle)]
pub extern "C" fn sonora_set_master_volume(volume: f32) {
    with_system("sonora_set_master_volume", |system| {
        system.world.set_master_volume(volume);
    });
}

/// Set a sound's volume, clamped to [0, 1].
///
/// # Safety
/// `sound_id` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sonora_set_sound_volume(sound_id: *const c_char, volume: f32) {
    let Some(sound_id) = (unsafe { cstr_arg(sound_id, "sound id", "sonora_set_sound_volume") })
    else {
        return;
    };
    with_system("sonora_set_sound_volume", |system| {
        system.world.set_sound_volume(sound_id, volume);
    });
}

/// Set a sound's stereo pan, clamped to [-1, 1] (-1 left, +1 right).
///
/// # Safety
/// `sound_id` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sonora_set_sound_pan(sound_id: *const c_char, pan: f32) {
    let Some(sound_id) = (unsafe { cstr_arg(sound_id, "sound id", "sonora_set_sound_pan") }) else {
        return;
    };
    with_system("sonora_set_sound_pan", |system| {
        system.world.set_sound_pan(sound_id, pan);
    });
}

/// Set a sound's playback-rate pitch; 1.0 is normal, values <= 0 are raised
/// to a small positive floor.
///
/// # Safety
/// `sound_id` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sonora_set_sound_pitch(sound_id: *const c_char, pitch: f32) {
    let Some(sound_id) = (unsafe { cstr_arg(sound_id, "sound id", "sonora_set_sound_pitch") })
    else {
        return;
    };
    with_system("sonora_set_sound_pitch", |system| {
        system.world.set_sound_pitch(sound_id, pitch);
    });
}

/// Set a sound's 3D position; the sound is spatialized from then on.
///
/// # Safety
/// `sound_id` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sonora_set_sound_position(
    sound_id: *const c_char,
    x: f32,
    y: f32,
    z: f32,
) {
    let Some(sound_id) = (unsafe { cstr_arg(sound_id, "sound id", "sonora_set_sound_position") })
    else {
        return;
    };
    with_system("sonora_set_sound_position", |system| {
        system.world.set_sound_position(sound_id, Vec3::new(x, y, z));
    });
}

/// Set the listener's 3D position.
#[unsafe(no_mangle)]
pub extern "C" fn sonora_set_listener_position(x: f32, y: f32, z: f32) {
    with_system("sonora_set_listener_position", |system| {
        system.world.set_listener_position(Vec3::new(x, y, z));
    });
}

/// Set the listener's forward vector (up is fixed at +Y).
#[unsafe(no_mangle)]
pub extern "C" fn sonora_set_listener_orientation(forward_x: f32, forward_y: f32, forward_z: f32) {
    with_system("sonora_set_listener_orientation", |system| {
        system
            .world
            .set_listener_orientation(Vec3::new(forward_x, forward_y, forward_z));
    });
}

/// True while the sound is audible. Unknown ids, null pointers and an
/// uninitialized system all return `false`.
///
/// # Safety
/// `sound_id` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sonora_is_sound_playing(sound_id: *const c_char) -> bool {
    if sound_id.is_null() {
        return false;
    }
    let Ok(sound_id) = (unsafe { CStr::from_ptr(sound_id) }).to_str() else {
        return false;
    };
    with_system("sonora_is_sound_playing", |system| {
        system.world.is_playing(sound_id)
    })
    .unwrap_or(false)
}
