//! Collaborators that feed the core: hand tracking, camera pose, frames
//! and the debug marker
//!
//! Rendering and tracking live outside this crate. These traits are the
//! seams where a headset runtime plugs in; the simple implementations here
//! back the CLI and tests.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::geometry::{CameraPose, Vec3};
use crate::{Error, Result};

/// Both tracked hands, sampled at the same instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandPositions {
    pub left: Vec3,
    pub right: Vec3,
}

impl HandPositions {
    #[must_use]
    pub const fn new(left: Vec3, right: Vec3) -> Self {
        Self { left, right }
    }

    /// Distance from whichever hand is nearer to `target`
    #[must_use]
    pub fn min_distance(&self, target: Vec3) -> f32 {
        self.left.distance(target).min(self.right.distance(target))
    }

    #[must_use]
    pub fn midpoint(&self) -> Vec3 {
        self.left.midpoint(self.right)
    }
}

/// Source of live hand positions
pub trait HandTracker: Send + Sync {
    /// Latest positions, or `None` while tracking is lost
    fn hand_positions(&self) -> Option<HandPositions>;
}

/// Hands held still at fixed positions
///
/// Stands in for a tracker when running without a headset.
#[derive(Debug, Clone, Copy)]
pub struct StaticHands {
    hands: HandPositions,
}

impl StaticHands {
    #[must_use]
    pub const fn new(hands: HandPositions) -> Self {
        Self { hands }
    }

    /// Both hands at the same point
    #[must_use]
    pub const fn at(position: Vec3) -> Self {
        Self::new(HandPositions::new(position, position))
    }
}

impl HandTracker for StaticHands {
    fn hand_positions(&self) -> Option<HandPositions> {
        Some(self.hands)
    }
}

/// Source of the current camera pose
pub trait CameraRig: Send + Sync {
    fn camera_pose(&self) -> CameraPose;
}

/// A camera that never moves
#[derive(Debug, Clone, Copy)]
pub struct FixedCamera {
    pose: CameraPose,
}

impl FixedCamera {
    #[must_use]
    pub const fn new(pose: CameraPose) -> Self {
        Self { pose }
    }
}

impl CameraRig for FixedCamera {
    fn camera_pose(&self) -> CameraPose {
        self.pose
    }
}

/// Source of encoded camera frames
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// The most recent frame as encoded image bytes (PNG)
    ///
    /// # Errors
    ///
    /// Returns `Error::Precondition` when no frame is available yet
    async fn latest_frame(&self) -> Result<Vec<u8>>;
}

/// Frame source backed by an image file, re-read on every request
#[derive(Debug, Clone)]
pub struct FileFrameSource {
    path: PathBuf,
}

impl FileFrameSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FrameSource for FileFrameSource {
    async fn latest_frame(&self) -> Result<Vec<u8>> {
        let bytes = tokio::fs::read(&self.path).await?;
        if bytes.is_empty() {
            return Err(Error::Precondition(format!(
                "frame file {} is empty",
                self.path.display()
            )));
        }
        Ok(bytes)
    }
}

/// Frame source with no camera attached
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFrames;

#[async_trait]
impl FrameSource for NoFrames {
    async fn latest_frame(&self) -> Result<Vec<u8>> {
        Err(Error::Precondition("no camera frame available".to_string()))
    }
}

/// Debug visualization of the current target
pub trait MarkerDisplay: Send + Sync {
    fn show(&self, position: Vec3);
    fn hide(&self);
}

/// Marker display that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMarker;

impl MarkerDisplay for NoMarker {
    fn show(&self, _position: Vec3) {}
    fn hide(&self) {}
}

/// Marker display that only logs, tracking the last shown position
#[derive(Debug, Default)]
pub struct LogMarker {
    current: Mutex<Option<Vec3>>,
}

impl LogMarker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Position of the visible marker, if any
    #[must_use]
    pub fn current(&self) -> Option<Vec3> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MarkerDisplay for LogMarker {
    fn show(&self, position: Vec3) {
        tracing::debug!(position = %position, "marker shown");
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(position);
    }

    fn hide(&self) {
        if self
            .current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some()
        {
            tracing::debug!("marker hidden");
        }
    }
}
