//! Object detections and the store that caches the latest frame's results
//!
//! The store publishes immutable snapshots: every successful detector
//! response replaces the whole set, and readers clone an `Arc` of whatever
//! was current. A reader never observes a partially written set.

mod projector;

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

pub use projector::{
    CHEST_HEIGHT_FLOOR, FAR_DEPTH, FIXED_TARGET_DISTANCE, NEAR_DEPTH, ProjectionSource,
    REFERENCE_BOX_HEIGHT, SpatialProjector, WorldTarget,
};

/// One labeled bounding box from the detector, in pixel space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Object class, e.g. "tv"
    #[serde(rename = "class")]
    pub label: String,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Detection {
    #[must_use]
    pub fn new(label: impl Into<String>, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            label: label.into(),
            x1,
            y1,
            x2,
            y2,
        }
    }

    /// Box center in pixels, tolerant of inverted corners
    #[must_use]
    pub fn center(&self) -> (f32, f32) {
        (f32::midpoint(self.x1, self.x2), f32::midpoint(self.y1, self.y2))
    }

    /// Box width in pixels; corners may arrive in either order
    #[must_use]
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).abs()
    }

    /// Box height in pixels; corners may arrive in either order
    #[must_use]
    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).abs()
    }

    /// Whether every coordinate is a finite number
    #[must_use]
    pub fn is_finite(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Case-insensitive label comparison
    #[must_use]
    pub fn matches(&self, label: &str) -> bool {
        self.label.trim().eq_ignore_ascii_case(label.trim())
    }
}

/// All detections for a single frame, in detector order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionSet {
    detections: Vec<Detection>,
}

impl DetectionSet {
    #[must_use]
    pub const fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter()
    }

    /// First detection whose label matches, ignoring case
    #[must_use]
    pub fn find(&self, label: &str) -> Option<&Detection> {
        self.detections.iter().find(|d| d.matches(label))
    }

    /// Distinct lowercased labels in first-seen order
    #[must_use]
    pub fn unique_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        for detection in &self.detections {
            let label = detection.label.trim().to_lowercase();
            if !label.is_empty() && !labels.contains(&label) {
                labels.push(label);
            }
        }
        labels
    }

    /// Spoken summary of what is in view
    ///
    /// One object reads "I see a tv in front of you."; several read
    /// "I see tv, bottle and chair in front of you."
    #[must_use]
    pub fn announcement(&self) -> String {
        let labels = self.unique_labels();
        match labels.as_slice() {
            [] => "I don't see any objects in front of you.".to_string(),
            [only] => format!("I see a {only} in front of you."),
            [rest @ .., last] => format!("I see {} and {last} in front of you.", rest.join(", ")),
        }
    }
}

impl From<Vec<Detection>> for DetectionSet {
    fn from(detections: Vec<Detection>) -> Self {
        Self::new(detections)
    }
}

impl<'a> IntoIterator for &'a DetectionSet {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.detections.iter()
    }
}

/// Holds the most recent complete detection set
///
/// Cloning the store yields another handle to the same snapshot slot.
#[derive(Debug, Clone, Default)]
pub struct DetectionStore {
    current: Arc<RwLock<Arc<DetectionSet>>>,
}

impl DetectionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached set with `set`
    pub fn update(&self, set: DetectionSet) {
        let count = set.len();
        let snapshot = Arc::new(set);
        {
            let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
            *current = snapshot;
        }
        tracing::debug!(count, "detection set published");
    }

    /// The current snapshot; stays valid even if a newer set is published
    #[must_use]
    pub fn snapshot(&self) -> Arc<DetectionSet> {
        Arc::clone(&self.current.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// First case-insensitive match in the latest set
    #[must_use]
    pub fn find(&self, label: &str) -> Option<Detection> {
        self.snapshot().find(label).cloned()
    }

    /// Drop all cached detections
    pub fn clear(&self) {
        self.update(DetectionSet::default());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
