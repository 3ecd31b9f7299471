//! Hand guidance
//!
//! Drives the user's hand toward a [`WorldTarget`](crate::detection::WorldTarget)
//! with beeps that speed up, rise in pitch and get louder as the nearest
//! hand closes in, plus throttled spoken corrections.

mod controller;
pub mod cue;
pub mod feedback;

pub use controller::{GuidanceController, GuidanceSession, GuidanceState};
pub use cue::{CUE_INTERVAL, Cue, cue_for_offset, directional_cue};
pub use feedback::{ARRIVAL_DISTANCE, Feedback, closeness, feedback_for, has_arrived};
