//! Spoken directional cues

use std::time::Duration;

use crate::geometry::Vec3;
use crate::sensors::HandPositions;

/// Minimum time between two spoken cues
pub const CUE_INTERVAL: Duration = Duration::from_millis(2500);

/// Per-axis offset below which that axis produces no cue
pub const AXIS_DEAD_ZONE: f32 = 0.1;

/// Offset magnitude below which the user is just encouraged
pub const CLOSE_RADIUS: f32 = 0.3;

/// A spoken correction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Forward,
    Backward,
    Right,
    Left,
    Up,
    Down,
    Close,
}

impl Cue {
    #[must_use]
    pub const fn phrase(self) -> &'static str {
        match self {
            Self::Forward => "Move forward",
            Self::Backward => "Move backward",
            Self::Right => "Move right",
            Self::Left => "Move left",
            Self::Up => "Move up",
            Self::Down => "Move down",
            Self::Close => "You're close",
        }
    }
}

impl std::fmt::Display for Cue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.phrase())
    }
}

/// Cue for the offset from the hands' midpoint to `target`
#[must_use]
pub fn directional_cue(target: Vec3, hands: &HandPositions) -> Option<Cue> {
    cue_for_offset(target - hands.midpoint())
}

/// Cue for an offset vector
///
/// Axes are evaluated z, then x, then y; each later axis that is outside
/// the dead zone replaces the earlier result. An offset shorter than
/// `CLOSE_RADIUS` always yields `Cue::Close`.
#[must_use]
pub fn cue_for_offset(offset: Vec3) -> Option<Cue> {
    let mut cue = None;

    if offset.z > AXIS_DEAD_ZONE {
        cue = Some(Cue::Forward);
    } else if offset.z < -AXIS_DEAD_ZONE {
        cue = Some(Cue::Backward);
    }

    if offset.x > AXIS_DEAD_ZONE {
        cue = Some(Cue::Right);
    } else if offset.x < -AXIS_DEAD_ZONE {
        cue = Some(Cue::Left);
    }

    if offset.y > AXIS_DEAD_ZONE {
        cue = Some(Cue::Up);
    } else if offset.y < -AXIS_DEAD_ZONE {
        cue = Some(Cue::Down);
    }

    if offset.length() < CLOSE_RADIUS {
        cue = Some(Cue::Close);
    }

    cue
}
