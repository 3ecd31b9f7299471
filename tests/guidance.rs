//! Guidance loop integration tests
//!
//! Run on a paused clock so beep cadence and cue throttling are exact.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use guidepost::Error;
use guidepost::detection::WorldTarget;
use guidepost::geometry::Vec3;
use guidepost::guidance::{GuidanceController, GuidanceState};
use guidepost::sensors::{HandPositions, HandTracker};
use guidepost::voice::{Speaker, beep};

mod common;

use common::{Harness, RecordingAudio, RecordingSpeech, ScriptedDetector, settle};

fn harness() -> Harness {
    Harness::new(ScriptedDetector::new(Some(Vec::new()), None))
}

/// Tracker that stops its controller on the first read inside the loop,
/// after the loop has already checked for cancellation
#[derive(Default)]
struct StopOnLoopRead {
    controller: OnceLock<Weak<GuidanceController>>,
    reads: AtomicUsize,
}

impl HandTracker for StopOnLoopRead {
    fn hand_positions(&self) -> Option<HandPositions> {
        // Read 1 is the precondition check in start()
        if self.reads.fetch_add(1, Ordering::SeqCst) == 1
            && let Some(controller) = self.controller.get().and_then(Weak::upgrade)
        {
            controller.stop();
        }
        let hand = Vec3::new(0.0, 1.2, 0.2);
        Some(HandPositions::new(hand, hand))
    }
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

#[tokio::test(start_paused = true)]
async fn test_guidance_reaches_target() {
    let h = harness();
    let target = Vec3::new(0.0, 1.2, 0.7);
    h.hands.move_to(Vec3::new(0.0, 1.2, 0.2));

    let session = h.guidance.start(WorldTarget::at(target)).unwrap();
    assert_eq!(h.guidance.state(), GuidanceState::Guiding);
    assert_eq!(h.guidance.session().map(|s| s.id), Some(session.id));
    assert_eq!(h.marker.visible_at(), Some(target));

    settle().await;
    assert_eq!(h.audio.beep_count(), 1);

    h.hands.move_to(Vec3::new(0.0, 1.2, 0.65));
    let mut states = h.guidance.subscribe();
    tokio::time::timeout(Duration::from_secs(5), states.wait_for(|s| *s == GuidanceState::Reached))
        .await
        .expect("guidance never reached the target")
        .unwrap();

    assert!(h.guidance.session().is_none());
    assert!(h.audio.stops() >= 1);
    assert!(h.marker.visible_at().is_none());

    let beeps = h.audio.beep_count();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.audio.beep_count(), beeps);
}

#[tokio::test(start_paused = true)]
async fn test_beeps_are_anchored_at_target() {
    let h = harness();
    let target = Vec3::new(0.3, 1.1, 0.9);

    h.guidance.start(WorldTarget::at(target)).unwrap();
    settle().await;

    let beeps = h.audio.beeps();
    assert_eq!(beeps.len(), 1);
    assert_eq!(beeps[0].position, Some(target));
}

#[tokio::test(start_paused = true)]
async fn test_far_zone_parameters() {
    let h = harness();
    h.hands.move_to(Vec3::new(0.0, 1.0, 0.0));

    // 1.6m away: beyond the far bound
    h.guidance
        .start(WorldTarget::at(Vec3::new(0.0, 1.0, 1.6)))
        .unwrap();
    settle().await;

    let first = h.audio.beeps()[0];
    assert!(approx(first.pitch, 0.5));
    assert!(approx(first.volume, 0.2));

    // Next beep only after the full 2s far interval
    tokio::time::sleep(Duration::from_millis(1900)).await;
    assert_eq!(h.audio.beep_count(), 1);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.audio.beep_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_nearest_hand_drives_feedback() {
    let h = harness();
    let target = Vec3::new(0.0, 1.0, 1.0);
    h.hands.set(HandPositions::new(
        Vec3::new(-1.0, 1.0, 0.0),
        Vec3::new(0.0, 1.0, 0.225),
    ));

    h.guidance.start(WorldTarget::at(target)).unwrap();
    settle().await;

    // Right hand is 0.775 away, halfway through the feedback range
    let first = h.audio.beeps()[0];
    assert!(approx(first.pitch, 1.25));
    assert!(approx(first.volume, 0.6));
}

#[tokio::test(start_paused = true)]
async fn test_cues_are_throttled() {
    let h = harness();
    h.hands.move_to(Vec3::new(0.0, 1.0, 0.0));

    // Straight ahead and far: beeps every 2s
    h.guidance
        .start(WorldTarget::at(Vec3::new(0.0, 1.0, 2.0)))
        .unwrap();

    tokio::time::sleep(Duration::from_secs(9)).await;

    // Beeps at 0, 2, 4, 6, 8; cues once more than 2.5s have passed (4 and 8)
    assert_eq!(h.audio.beep_count(), 5);
    assert_eq!(h.speech.spoken(), vec!["Move forward", "Move forward"]);
}

#[tokio::test(start_paused = true)]
async fn test_no_cue_before_first_interval() {
    let h = harness();
    h.hands.move_to(Vec3::new(0.0, 1.0, 0.0));

    h.guidance
        .start(WorldTarget::at(Vec3::new(0.0, 1.0, 2.0)))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(2400)).await;

    assert!(h.speech.spoken().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_new_session_supersedes_old() {
    let h = harness();
    let first = Vec3::new(-0.5, 1.2, 1.0);
    let second = Vec3::new(0.5, 1.2, 1.0);

    let a = h.guidance.start(WorldTarget::at(first)).unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    let b = h.guidance.start(WorldTarget::at(second)).unwrap();
    assert_ne!(a.id, b.id);
    assert_eq!(h.guidance.session().map(|s| s.id), Some(b.id));
    assert_eq!(h.marker.visible_at(), Some(second));
    assert_eq!(h.marker.shows(), 2);

    let before = h.audio.beep_count();
    tokio::time::sleep(Duration::from_secs(6)).await;

    let beeps = h.audio.beeps();
    assert!(beeps.len() > before);
    assert!(
        beeps[before..].iter().all(|p| p.position == Some(second)),
        "old session kept beeping after being superseded"
    );
    assert_eq!(h.guidance.state(), GuidanceState::Guiding);
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_loop() {
    let h = harness();
    h.guidance
        .start(WorldTarget::at(Vec3::new(0.0, 1.2, 1.0)))
        .unwrap();
    settle().await;

    assert!(h.guidance.stop());
    assert_eq!(h.guidance.state(), GuidanceState::Cancelled);
    assert!(h.marker.visible_at().is_none());
    assert_eq!(h.audio.stops(), 1);

    let beeps = h.audio.beep_count();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.audio.beep_count(), beeps);

    // A second stop has nothing to cancel
    assert!(!h.guidance.stop());
    assert_eq!(h.guidance.state(), GuidanceState::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_lost_tracking_pauses_feedback() {
    let h = harness();
    h.guidance
        .start(WorldTarget::at(Vec3::new(0.0, 1.2, 2.0)))
        .unwrap();
    settle().await;
    assert_eq!(h.audio.beep_count(), 1);

    h.hands.lose();
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(h.audio.beep_count(), 1);
    assert_eq!(h.guidance.state(), GuidanceState::Guiding);

    h.hands.move_to(Vec3::new(0.0, 1.2, 0.2));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.audio.beep_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_start_without_hands_is_refused() {
    let h = harness();
    h.hands.lose();

    let result = h.guidance.start(WorldTarget::at(Vec3::FORWARD));
    assert!(matches!(result, Err(Error::Precondition(_))));
    assert_eq!(h.guidance.state(), GuidanceState::Idle);
    assert!(h.marker.visible_at().is_none());

    settle().await;
    assert_eq!(h.audio.beep_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_start_without_tracker_is_refused() {
    let speech = Arc::new(RecordingSpeech::default());
    let audio = Arc::new(RecordingAudio::default());
    let speaker = Speaker::new(speech, audio.clone(), common::TIMEOUT);
    let controller = GuidanceController::new(audio, speaker, beep::synthesize_beep());

    let result = controller.start(WorldTarget::at(Vec3::FORWARD));
    assert!(matches!(result, Err(Error::Precondition(_))));
    assert!(!controller.is_guiding());
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_iteration_emits_nothing() {
    let speech = Arc::new(RecordingSpeech::default());
    let audio = Arc::new(RecordingAudio::default());
    let tracker = Arc::new(StopOnLoopRead::default());
    let speaker = Speaker::new(speech.clone(), audio.clone(), common::TIMEOUT);
    let controller = Arc::new(
        GuidanceController::new(audio.clone(), speaker, beep::synthesize_beep())
            .with_hand_tracker(tracker.clone()),
    );
    tracker.controller.set(Arc::downgrade(&controller)).unwrap();

    controller
        .start(WorldTarget::at(Vec3::new(0.0, 1.2, 1.0)))
        .unwrap();
    settle().await;

    assert_eq!(tracker.reads.load(Ordering::SeqCst), 2);
    assert_eq!(controller.state(), GuidanceState::Cancelled);
    assert_eq!(audio.stops(), 1);
    assert_eq!(audio.beep_count(), 0);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(audio.beep_count(), 0);
    assert!(speech.spoken().is_empty());
}
