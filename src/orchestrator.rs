//! Request orchestration
//!
//! Ties frames, the remote perception services, the detection store, the
//! projector and guidance together. Every remote call is bounded by the
//! configured timeout, and every user-facing result ends up spoken through
//! the one [`Speaker`].
//!
//! Room descriptions prefer the structured describer and fall back once to
//! the plain captioner when the describer cannot be reached:
//!
//! ```text
//! describe_room ──▶ StructuredDescriber ──ok──▶ speak
//!                        │
//!                  transport error
//!                        ▼
//!                   captioner ──ok──▶ speak
//!                        │
//!                      error ──▶ apology
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::detection::{DetectionSet, DetectionStore, SpatialProjector, WorldTarget};
use crate::guidance::GuidanceController;
use crate::sensors::{CameraRig, FrameSource};
use crate::transport::{DetectionTransport, StructuredDescriber, with_timeout};
use crate::voice::Speaker;
use crate::{Error, Result};

const DESCRIBE_APOLOGY: &str = "Sorry, I couldn't describe what's in front of you.";
const DETECT_APOLOGY: &str = "Sorry, I couldn't check what's in front of you.";
const NO_HANDS_APOLOGY: &str = "I can't see your hands.";

/// How a request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The primary path succeeded
    Completed,
    /// The primary path failed and the fallback succeeded
    FellBack,
    /// The same kind of request was already in flight; nothing was done
    Busy,
    /// Every path failed; the user heard an apology
    Failed,
}

/// Held while a request of one kind is in flight
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs user requests against the perception services
pub struct Orchestrator {
    store: DetectionStore,
    projector: SpatialProjector,
    camera: Arc<dyn CameraRig>,
    frames: Arc<dyn FrameSource>,
    detector: Arc<dyn DetectionTransport>,
    describer: Option<Arc<dyn StructuredDescriber>>,
    speaker: Speaker,
    guidance: Arc<GuidanceController>,
    timeout: Duration,
    detecting: AtomicBool,
    describing: AtomicBool,
}

impl Orchestrator {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: DetectionStore,
        projector: SpatialProjector,
        camera: Arc<dyn CameraRig>,
        frames: Arc<dyn FrameSource>,
        detector: Arc<dyn DetectionTransport>,
        speaker: Speaker,
        guidance: Arc<GuidanceController>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            projector,
            camera,
            frames,
            detector,
            describer: None,
            speaker,
            guidance,
            timeout,
            detecting: AtomicBool::new(false),
            describing: AtomicBool::new(false),
        }
    }

    /// Prefer `describer` for room descriptions
    #[must_use]
    pub fn with_describer(mut self, describer: Arc<dyn StructuredDescriber>) -> Self {
        self.describer = Some(describer);
        self
    }

    #[must_use]
    pub const fn store(&self) -> &DetectionStore {
        &self.store
    }

    #[must_use]
    pub fn guidance(&self) -> &GuidanceController {
        &self.guidance
    }

    #[must_use]
    pub fn speaker(&self) -> &Speaker {
        &self.speaker
    }

    /// Caption the current frame and speak it
    pub async fn describe_scene(&self) -> RequestOutcome {
        let Some(_latch) = InFlight::acquire(&self.describing) else {
            tracing::debug!("description already in flight");
            return RequestOutcome::Busy;
        };

        match self.caption().await {
            Ok(text) => {
                self.speaker.say(text);
                RequestOutcome::Completed
            }
            Err(e) => {
                tracing::warn!(error = %e, "scene caption failed");
                self.speaker.say(DESCRIBE_APOLOGY);
                RequestOutcome::Failed
            }
        }
    }

    /// Describe the room with the structured describer, falling back once
    /// to the captioner if the describer is unreachable
    pub async fn describe_room(&self) -> RequestOutcome {
        let Some(_latch) = InFlight::acquire(&self.describing) else {
            tracing::debug!("description already in flight");
            return RequestOutcome::Busy;
        };

        let Some(describer) = self.describer.clone() else {
            tracing::debug!("no structured describer configured, using captioner");
            return match self.caption().await {
                Ok(text) => {
                    self.speaker.say(text);
                    RequestOutcome::Completed
                }
                Err(e) => {
                    tracing::warn!(error = %e, "scene caption failed");
                    self.speaker.say(DESCRIBE_APOLOGY);
                    RequestOutcome::Failed
                }
            };
        };

        let frame = match self.frames.latest_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "no frame to describe");
                self.speaker.say(DESCRIBE_APOLOGY);
                return RequestOutcome::Failed;
            }
        };

        match with_timeout(self.timeout, describer.describe(&frame)).await {
            Ok(text) => {
                self.speaker.say(text);
                RequestOutcome::Completed
            }
            Err(e) if e.is_transport() => {
                tracing::warn!(error = %e, "room describer unreachable, falling back to captioner");
                match with_timeout(self.timeout, self.detector.describe_scene(&frame)).await {
                    Ok(text) => {
                        self.speaker.say(text);
                        RequestOutcome::FellBack
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "captioner fallback failed");
                        self.speaker.say(DESCRIBE_APOLOGY);
                        RequestOutcome::Failed
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "room description unusable");
                self.speaker.say(DESCRIBE_APOLOGY);
                RequestOutcome::Failed
            }
        }
    }

    /// Fetch fresh detections into the store
    ///
    /// With `announce`, the result (or an apology) is spoken. The store is
    /// left untouched when the fetch fails.
    pub async fn refresh_detections(&self, announce: bool) -> RequestOutcome {
        let Some(_latch) = InFlight::acquire(&self.detecting) else {
            tracing::debug!("detection already in flight");
            return RequestOutcome::Busy;
        };

        match self.detect().await {
            Ok(set) => {
                if announce {
                    self.speaker.say(set.announcement());
                }
                self.store.update(set);
                RequestOutcome::Completed
            }
            Err(e) => {
                tracing::warn!(error = %e, "detection refresh failed");
                if announce {
                    self.speaker.say(DETECT_APOLOGY);
                }
                RequestOutcome::Failed
            }
        }
    }

    /// Look `label` up among the latest detections and guide the hand to it
    ///
    /// In fixed debug mode the object must still be detected, but the hand
    /// is guided to the fixed point ahead instead.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` when nothing with that label was detected,
    /// or `Error::Precondition` when guidance cannot start (hands not
    /// tracked). Both are also spoken to the user.
    pub fn find_and_guide(&self, label: &str) -> Result<WorldTarget> {
        let label = label.trim().to_lowercase();
        let pose = self.camera.camera_pose();

        let Some(detection) = self.store.find(&label) else {
            tracing::info!(label = %label, detections = self.store.len(), "object not in view");
            self.speaker.say(format!("I can't find a {label}"));
            return Err(Error::NotFound(label));
        };
        let target = self.projector.project(&detection, &pose);

        if let Err(e) = self.guidance.start(target) {
            tracing::warn!(label = %label, error = %e, "could not start guidance");
            self.speaker.say(NO_HANDS_APOLOGY);
            return Err(e);
        }

        self.speaker.say(format!("Guiding you to the {label}"));
        Ok(target)
    }

    /// Cancel any running guidance
    pub fn stop_guidance(&self) -> bool {
        self.guidance.stop()
    }

    async fn caption(&self) -> Result<String> {
        let frame = self.frames.latest_frame().await?;
        with_timeout(self.timeout, self.detector.describe_scene(&frame)).await
    }

    async fn detect(&self) -> Result<DetectionSet> {
        let frame = self.frames.latest_frame().await?;
        let set = with_timeout(self.timeout, self.detector.detect(&frame)).await?;
        tracing::debug!(count = set.len(), labels = ?set.unique_labels(), "detections received");
        Ok(set)
    }
}
