//! Shared test utilities
//!
//! In-memory stand-ins for the remote services, sensors and audio device.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use guidepost::detection::{Detection, DetectionSet, DetectionStore, SpatialProjector};
use guidepost::geometry::{CameraPose, Vec3};
use guidepost::guidance::GuidanceController;
use guidepost::orchestrator::Orchestrator;
use guidepost::sensors::{FixedCamera, FrameSource, HandPositions, HandTracker, MarkerDisplay};
use guidepost::transport::{DetectionTransport, SpeechTransport, StructuredDescriber};
use guidepost::voice::{AudioClip, AudioSink, PlaybackParams, Speaker, beep, samples_to_wav};
use guidepost::{Error, Result};

pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Let spawned fire-and-forget tasks run to completion
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Camera at standing eye height looking down +z, 2560x1440
#[must_use]
pub fn camera_pose() -> CameraPose {
    CameraPose::looking_forward(Vec3::new(0.0, 1.6, 0.0), 60.0, 2560.0 / 1440.0)
}

/// Speech service that records every sentence and returns a short WAV
#[derive(Default)]
pub struct RecordingSpeech {
    spoken: Mutex<Vec<String>>,
}

impl RecordingSpeech {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn count(&self, text: &str) -> usize {
        self.spoken().iter().filter(|s| *s == text).count()
    }
}

#[async_trait]
impl SpeechTransport for RecordingSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        self.spoken.lock().unwrap().push(text.to_string());
        samples_to_wav(&[0.0; 240], 24_000)
    }
}

/// Detector and captioner with scripted answers
///
/// `None` answers fail with a transport error.
pub struct ScriptedDetector {
    detections: Mutex<Option<Vec<Detection>>>,
    caption: Mutex<Option<String>>,
    delay: Duration,
    detect_calls: AtomicUsize,
    caption_calls: AtomicUsize,
}

impl ScriptedDetector {
    pub fn new(detections: Option<Vec<Detection>>, caption: Option<&str>) -> Self {
        Self {
            detections: Mutex::new(detections),
            caption: Mutex::new(caption.map(ToString::to_string)),
            delay: Duration::ZERO,
            detect_calls: AtomicUsize::new(0),
            caption_calls: AtomicUsize::new(0),
        }
    }

    /// Every call takes `delay` before answering
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_detections(&self, detections: Option<Vec<Detection>>) {
        *self.detections.lock().unwrap() = detections;
    }

    pub fn detect_calls(&self) -> usize {
        self.detect_calls.load(Ordering::SeqCst)
    }

    pub fn caption_calls(&self) -> usize {
        self.caption_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DetectionTransport for ScriptedDetector {
    async fn detect(&self, _image: &[u8]) -> Result<DetectionSet> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.detections
            .lock()
            .unwrap()
            .clone()
            .map(DetectionSet::from)
            .ok_or_else(|| Error::Transport("detector unreachable".to_string()))
    }

    async fn describe_scene(&self, _image: &[u8]) -> Result<String> {
        self.caption_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.caption
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::Transport("captioner unreachable".to_string()))
    }
}

/// Scripted structured describer
pub enum DescriberReply {
    Text(&'static str),
    Unreachable,
    Garbled,
}

pub struct ScriptedDescriber {
    reply: DescriberReply,
    pub calls: AtomicUsize,
}

impl ScriptedDescriber {
    pub const fn new(reply: DescriberReply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl StructuredDescriber for ScriptedDescriber {
    async fn describe(&self, _image: &[u8]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            DescriberReply::Text(text) => Ok(text.to_string()),
            DescriberReply::Unreachable => Err(Error::Transport("connection refused".to_string())),
            DescriberReply::Garbled => Err(Error::Parse("no candidates".to_string())),
        }
    }
}

/// Frame source that always has the same frame
pub struct StaticFrame;

#[async_trait]
impl FrameSource for StaticFrame {
    async fn latest_frame(&self) -> Result<Vec<u8>> {
        Ok(b"\x89PNG test frame".to_vec())
    }
}

/// Hand tracker whose hands tests can move or lose
#[derive(Default)]
pub struct MovableHands {
    hands: Mutex<Option<HandPositions>>,
}

impl MovableHands {
    pub fn at(position: Vec3) -> Self {
        let hands = Self::default();
        hands.move_to(position);
        hands
    }

    /// Move both hands to `position`
    pub fn move_to(&self, position: Vec3) {
        *self.hands.lock().unwrap() = Some(HandPositions::new(position, position));
    }

    pub fn set(&self, hands: HandPositions) {
        *self.hands.lock().unwrap() = Some(hands);
    }

    pub fn lose(&self) {
        *self.hands.lock().unwrap() = None;
    }
}

impl HandTracker for MovableHands {
    fn hand_positions(&self) -> Option<HandPositions> {
        *self.hands.lock().unwrap()
    }
}

/// Audio sink that records what it was asked to play
#[derive(Default)]
pub struct RecordingAudio {
    plays: Mutex<Vec<PlaybackParams>>,
    stops: AtomicUsize,
}

impl RecordingAudio {
    /// Parameters of every spatial clip (beeps), in order
    pub fn beeps(&self) -> Vec<PlaybackParams> {
        self.plays
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.position.is_some())
            .copied()
            .collect()
    }

    pub fn beep_count(&self) -> usize {
        self.beeps().len()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl AudioSink for RecordingAudio {
    fn play(&self, _clip: &AudioClip, params: PlaybackParams) -> Result<()> {
        self.plays.lock().unwrap().push(params);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Marker display that remembers where it is
#[derive(Default)]
pub struct RecordingMarker {
    visible: Mutex<Option<Vec3>>,
    shows: AtomicUsize,
}

impl RecordingMarker {
    pub fn visible_at(&self) -> Option<Vec3> {
        *self.visible.lock().unwrap()
    }

    pub fn shows(&self) -> usize {
        self.shows.load(Ordering::SeqCst)
    }
}

impl MarkerDisplay for RecordingMarker {
    fn show(&self, position: Vec3) {
        self.shows.fetch_add(1, Ordering::SeqCst);
        *self.visible.lock().unwrap() = Some(position);
    }

    fn hide(&self) {
        *self.visible.lock().unwrap() = None;
    }
}

/// A fully mocked pipeline
pub struct Harness {
    pub speech: Arc<RecordingSpeech>,
    pub audio: Arc<RecordingAudio>,
    pub marker: Arc<RecordingMarker>,
    pub hands: Arc<MovableHands>,
    pub detector: Arc<ScriptedDetector>,
    pub guidance: Arc<GuidanceController>,
    pub speaker: Speaker,
}

impl Harness {
    pub fn new(detector: ScriptedDetector) -> Self {
        let speech = Arc::new(RecordingSpeech::default());
        let audio = Arc::new(RecordingAudio::default());
        let marker = Arc::new(RecordingMarker::default());
        let hands = Arc::new(MovableHands::at(Vec3::new(0.0, 1.2, 0.2)));

        let speaker = Speaker::new(speech.clone(), audio.clone(), TIMEOUT);
        let guidance = GuidanceController::new(audio.clone(), speaker.clone(), beep::synthesize_beep())
            .with_hand_tracker(hands.clone())
            .with_marker(marker.clone());

        Self {
            speech,
            audio,
            marker,
            hands,
            detector: Arc::new(detector),
            guidance: Arc::new(guidance),
            speaker,
        }
    }

    pub fn orchestrator(&self, projector: SpatialProjector) -> Orchestrator {
        Orchestrator::new(
            DetectionStore::new(),
            projector,
            Arc::new(FixedCamera::new(camera_pose())),
            Arc::new(StaticFrame),
            self.detector.clone(),
            self.speaker.clone(),
            self.guidance.clone(),
            TIMEOUT,
        )
    }
}

/// The projector for a 2560x1440 camera
pub fn projector() -> SpatialProjector {
    SpatialProjector::new(2560.0, 1440.0)
}
