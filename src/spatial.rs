//! Listener state and the spatialization math applied per mix block.
//!
//! Positioned sounds get inverse-distance attenuation plus a stereo pan
//! derived from the direction to the source. Up is fixed at +Y; the listener
//! orientation is a forward vector only.

use glam::Vec3;

/// Inside this radius a source plays at full gain.
pub const MIN_DISTANCE: f32 = 1.0;

/// Rolloff factor for the inverse attenuation curve.
pub const ROLLOFF: f32 = 1.0;

/// The single audio listener.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Listener {
    pub position: Vec3,
    pub forward: Vec3,
}

impl Default for Listener {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: Vec3::NEG_Z,
        }
    }
}

impl Listener {
    /// The listener's right axis, from forward and the fixed +Y up. Falls
    /// back to +X when forward is (near) parallel to up.
    pub fn right(&self) -> Vec3 {
        let right = self.forward.cross(Vec3::Y);
        if right.length_squared() < 1e-8 {
            Vec3::X
        } else {
            right.normalize()
        }
    }
}

/// Gain for a source at `source` heard by `listener`, using the inverse
/// attenuation model: unity inside [`MIN_DISTANCE`], falling off as
/// `min / (min + rolloff * (distance - min))` beyond it.
pub fn distance_gain(listener: &Listener, source: Vec3) -> f32 {
    let distance = listener.position.distance(source);
    if distance <= MIN_DISTANCE {
        1.0
    } else {
        MIN_DISTANCE / (MIN_DISTANCE + ROLLOFF * (distance - MIN_DISTANCE))
    }
}

/// Pan contribution in [-1, 1] from the direction to the source: the
/// projection of the normalized direction onto the listener's right axis.
/// A source at (or very near) the listener is centered.
pub fn direction_pan(listener: &Listener, source: Vec3) -> f32 {
    let direction = source - listener.position;
    if direction.length_squared() < 1e-8 {
        return 0.0;
    }
    direction.normalize().dot(listener.right()).clamp(-1.0, 1.0)
}

/// Balance-law stereo gains for a pan in [-1, 1]: center is unity on both
/// channels, positive pan attenuates the left channel, negative the right.
pub fn balance_gains(pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    if pan > 0.0 {
        (1.0 - pan, 1.0)
    } else {
        (1.0, 1.0 + pan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_is_unity_inside_min_distance() {
        let listener = Listener::default();
        assert_eq!(distance_gain(&listener, Vec3::ZERO), 1.0);
        assert_eq!(distance_gain(&listener, Vec3::new(0.5, 0.0, 0.0)), 1.0);
    }

    #[test]
    fn gain_falls_off_with_distance() {
        let listener = Listener::default();
        let near = distance_gain(&listener, Vec3::new(2.0, 0.0, 0.0));
        let far = distance_gain(&listener, Vec3::new(10.0, 0.0, 0.0));
        assert!(near < 1.0);
        assert!(far < near);
        // Inverse model: at distance 2 with min 1 and rolloff 1 the gain is 1/2.
        assert!((near - 0.5).abs() < 1e-6);
    }

    #[test]
    fn pan_follows_direction() {
        let listener = Listener::default(); // facing -Z, right is +X
        assert!(direction_pan(&listener, Vec3::new(5.0, 0.0, 0.0)) > 0.99);
        assert!(direction_pan(&listener, Vec3::new(-5.0, 0.0, 0.0)) < -0.99);
        assert_eq!(direction_pan(&listener, Vec3::new(0.0, 0.0, -5.0)), 0.0);
        assert_eq!(direction_pan(&listener, Vec3::ZERO), 0.0);
    }

    #[test]
    fn pan_flips_when_listener_turns_around() {
        let listener = Listener {
            position: Vec3::ZERO,
            forward: Vec3::Z,
        };
        assert!(direction_pan(&listener, Vec3::new(5.0, 0.0, 0.0)) < -0.99);
    }

    #[test]
    fn degenerate_forward_still_pans() {
        let listener = Listener {
            position: Vec3::ZERO,
            forward: Vec3::Y,
        };
        // Falls back to +X as the right axis.
        assert!(direction_pan(&listener, Vec3::new(3.0, 0.0, 0.0)) > 0.99);
    }

    #[test]
    fn balance_law() {
        assert_eq!(balance_gains(0.0), (1.0, 1.0));
        assert_eq!(balance_gains(1.0), (0.0, 1.0));
        assert_eq!(balance_gains(-1.0), (1.0, 0.0));
        let (l, r) = balance_gains(0.5);
        assert!((l - 0.5).abs() < 1e-6);
        assert_eq!(r, 1.0);
    }
}
