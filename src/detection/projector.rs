//! 2D detection → 3D world target

use crate::geometry::{CameraPose, Vec3, clamp01, lerp};

use super::Detection;

/// Depth assigned to a tiny (far away) box
pub const NEAR_DEPTH: f32 = 1.5;

/// Depth assigned to a box at least `REFERENCE_BOX_HEIGHT` tall
pub const FAR_DEPTH: f32 = 0.4;

/// Box height in pixels at which an object counts as fully close
pub const REFERENCE_BOX_HEIGHT: f32 = 384.0;

/// Minimum target height (roughly chest height)
pub const CHEST_HEIGHT_FLOOR: f32 = 1.0;

/// Distance ahead of the camera used by fixed-debug targeting
pub const FIXED_TARGET_DISTANCE: f32 = 1.5;

/// How a target was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionSource {
    /// Projected from a detector bounding box
    Detection,
    /// Fixed point ahead of the camera (calibration)
    FixedDebug,
}

/// A guidance target in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldTarget {
    pub position: Vec3,
    /// Distance along the camera ray that produced `position`
    pub depth: f32,
    /// Normalized viewport point the ray passed through
    pub viewport: Option<(f32, f32)>,
    pub source: ProjectionSource,
}

impl WorldTarget {
    /// Target at an explicit world position
    #[must_use]
    pub const fn at(position: Vec3) -> Self {
        Self {
            position,
            depth: 0.0,
            viewport: None,
            source: ProjectionSource::FixedDebug,
        }
    }
}

/// Converts detector output into guidance targets
#[derive(Debug, Clone, Copy)]
pub struct SpatialProjector {
    image_width: f32,
    image_height: f32,
    fixed_debug: bool,
}

impl SpatialProjector {
    /// Projector for frames of `image_width` × `image_height` pixels
    #[must_use]
    pub const fn new(image_width: f32, image_height: f32) -> Self {
        Self {
            image_width,
            image_height,
            fixed_debug: false,
        }
    }

    /// Ignore detections and always target a point ahead of the camera
    #[must_use]
    pub const fn with_fixed_debug(mut self, enabled: bool) -> Self {
        self.fixed_debug = enabled;
        self
    }

    #[must_use]
    pub const fn is_fixed_debug(&self) -> bool {
        self.fixed_debug
    }

    /// Normalized viewport coordinates of the box center
    ///
    /// Image space has its origin at the top-left, the viewport at the
    /// bottom-left, so `ny` is flipped.
    #[must_use]
    pub fn viewport_point(&self, detection: &Detection) -> (f32, f32) {
        let (cx, cy) = detection.center();
        let nx = clamp01(cx / self.image_width);
        let ny = clamp01(1.0 - cy / self.image_height);
        (nx, ny)
    }

    /// Depth heuristic: bigger boxes are closer
    #[must_use]
    pub fn estimate_depth(detection: &Detection) -> f32 {
        lerp(
            NEAR_DEPTH,
            FAR_DEPTH,
            detection.height() / REFERENCE_BOX_HEIGHT,
        )
    }

    /// Project a detection into the world using the given camera pose
    #[must_use]
    pub fn project(&self, detection: &Detection, pose: &CameraPose) -> WorldTarget {
        if self.fixed_debug {
            let target = self.fixed_target(pose);
            tracing::debug!(position = %target.position, "using fixed debug target");
            return target;
        }

        if !detection.is_finite() {
            tracing::warn!(label = %detection.label, "non-finite bounding box, aiming at view center");
        }

        let (nx, ny) = if detection.is_finite() {
            self.viewport_point(detection)
        } else {
            (0.5, 0.5)
        };
        let depth = if detection.is_finite() {
            Self::estimate_depth(detection)
        } else {
            NEAR_DEPTH
        };

        let ray = pose.viewport_point_to_ray(nx, ny);
        let mut position = ray.point_at(depth);
        position.y = position.y.max(CHEST_HEIGHT_FLOOR);

        tracing::debug!(
            label = %detection.label,
            nx,
            ny,
            depth,
            position = %position,
            "projected detection"
        );

        WorldTarget {
            position,
            depth,
            viewport: Some((nx, ny)),
            source: ProjectionSource::Detection,
        }
    }

    /// Point `FIXED_TARGET_DISTANCE` straight ahead of the camera
    #[must_use]
    pub fn fixed_target(&self, pose: &CameraPose) -> WorldTarget {
        WorldTarget {
            position: pose.position + pose.forward.normalized() * FIXED_TARGET_DISTANCE,
            depth: FIXED_TARGET_DISTANCE,
            viewport: Some((0.5, 0.5)),
            source: ProjectionSource::FixedDebug,
        }
    }
}
