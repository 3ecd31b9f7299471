//! Distance → audio control law

use std::time::Duration;

use crate::geometry::{inverse_lerp, lerp};

/// A hand closer than this has reached the target (strict)
pub const ARRIVAL_DISTANCE: f32 = 0.10;

/// Distance at which feedback saturates at its "near" bounds
pub const NEAR_DISTANCE: f32 = 0.05;

/// Distance at which feedback bottoms out at its "far" bounds
pub const FAR_DISTANCE: f32 = 1.5;

const FAR_INTERVAL_SECS: f32 = 2.0;
const NEAR_INTERVAL_SECS: f32 = 0.1;
const FAR_PITCH: f32 = 0.5;
const NEAR_PITCH: f32 = 2.0;
const FAR_VOLUME: f32 = 0.2;
const NEAR_VOLUME: f32 = 1.0;

/// Beep parameters for one loop iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Feedback {
    /// Normalized closeness in `[0, 1]`; 1 is touching
    pub closeness: f32,
    /// Pause before the next beep
    pub interval: Duration,
    pub pitch: f32,
    pub volume: f32,
}

/// `0` at or beyond `FAR_DISTANCE`, `1` at or inside `NEAR_DISTANCE`
#[must_use]
pub fn closeness(distance: f32) -> f32 {
    inverse_lerp(FAR_DISTANCE, NEAR_DISTANCE, distance)
}

/// All three signals are driven by the same closeness value
#[must_use]
pub fn feedback_for(distance: f32) -> Feedback {
    let c = closeness(distance);
    Feedback {
        closeness: c,
        interval: Duration::from_secs_f32(lerp(FAR_INTERVAL_SECS, NEAR_INTERVAL_SECS, c)),
        pitch: lerp(FAR_PITCH, NEAR_PITCH, c),
        volume: lerp(FAR_VOLUME, NEAR_VOLUME, c),
    }
}

/// Whether a hand at `distance` counts as having reached the target
#[must_use]
pub fn has_arrived(distance: f32) -> bool {
    distance < ARRIVAL_DISTANCE
}
