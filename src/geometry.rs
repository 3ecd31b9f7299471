//! World-space math shared by the projector and the guidance loop
//!
//! Coordinates follow the headset convention: `y` is up, `z` points forward
//! from the user, `x` points to the user's right. Units are meters.

use std::ops::{Add, Div, Mul, Sub};

use serde::{Deserialize, Serialize};

/// A point or direction in world space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const UP: Self = Self::new(0.0, 1.0, 0.0);
    pub const FORWARD: Self = Self::new(0.0, 0.0, 1.0);

    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x.mul_add(other.x, self.y.mul_add(other.y, self.z * other.z))
    }

    #[must_use]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y.mul_add(other.z, -(self.z * other.y)),
            self.z.mul_add(other.x, -(self.x * other.z)),
            self.x.mul_add(other.y, -(self.y * other.x)),
        )
    }

    /// Unit vector in the same direction, or zero for a zero vector
    #[must_use]
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len <= f32::EPSILON {
            Self::ZERO
        } else {
            self / len
        }
    }

    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        (self + other) / 2.0
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<f32> for Vec3 {
    type Output = Self;

    fn div(self, rhs: f32) -> Self {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

/// A half-line starting at `origin`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit direction
    pub direction: Vec3,
}

impl Ray {
    /// Point at distance `t` along the ray
    #[must_use]
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Snapshot of the rendering camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees
    pub vertical_fov_deg: f32,
    /// Viewport width / height
    pub aspect: f32,
}

impl CameraPose {
    /// Camera at `position` looking straight ahead along +z
    #[must_use]
    pub const fn looking_forward(position: Vec3, vertical_fov_deg: f32, aspect: f32) -> Self {
        Self {
            position,
            forward: Vec3::FORWARD,
            up: Vec3::UP,
            vertical_fov_deg,
            aspect,
        }
    }

    /// Ray from the camera through a normalized viewport point
    ///
    /// `(0, 0)` is the bottom-left corner of the viewport and `(1, 1)` the
    /// top-right, matching a pinhole camera with this pose's field of view.
    #[must_use]
    pub fn viewport_point_to_ray(&self, nx: f32, ny: f32) -> Ray {
        let forward = self.forward.normalized();
        let right = self.up.cross(forward).normalized();
        let up = forward.cross(right);

        let half_height = (self.vertical_fov_deg.to_radians() / 2.0).tan();
        let half_width = half_height * self.aspect;

        let sx = nx.mul_add(2.0, -1.0) * half_width;
        let sy = ny.mul_add(2.0, -1.0) * half_height;

        Ray {
            origin: self.position,
            direction: (forward + right * sx + up * sy).normalized(),
        }
    }
}

/// Linear interpolation from `a` to `b`, with `t` clamped to `[0, 1]`
#[must_use]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    (b - a).mul_add(clamp01(t), a)
}

/// Where `value` sits between `a` and `b`, clamped to `[0, 1]`
///
/// Works for descending ranges too: `inverse_lerp(1.5, 0.05, 0.05) == 1.0`.
#[must_use]
pub fn inverse_lerp(a: f32, b: f32, value: f32) -> f32 {
    if (b - a).abs() <= f32::EPSILON {
        return 0.0;
    }
    clamp01((value - a) / (b - a))
}

/// Clamp to `[0, 1]`; NaN maps to 0
#[must_use]
pub fn clamp01(t: f32) -> f32 {
    if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) }
}
