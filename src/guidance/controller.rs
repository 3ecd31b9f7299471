//! The guidance session state machine and its feedback loop

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::cue::{CUE_INTERVAL, directional_cue};
use super::feedback::{feedback_for, has_arrived};
use crate::detection::WorldTarget;
use crate::sensors::{HandTracker, MarkerDisplay, NoMarker};
use crate::voice::{AudioClip, AudioSink, PlaybackParams, Speaker};
use crate::{Error, Result};

/// How long to wait before re-reading hands after tracking was lost
const TRACKING_RETRY: Duration = Duration::from_millis(100);

/// Lifecycle of the current (or most recent) guidance session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuidanceState {
    /// No session has run yet
    Idle,
    /// A session is steering the hand
    Guiding,
    /// The last session ended with a hand on the target
    Reached,
    /// The last session was stopped or superseded
    Cancelled,
}

/// The active session, as seen from outside the loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuidanceSession {
    pub id: u64,
    pub target: WorldTarget,
}

struct ActiveSession {
    session: GuidanceSession,
    cancel: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl ActiveSession {
    fn cancel(mut self) {
        let _ = self.cancel.send(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Collaborators a running loop needs; cloned into each session task
#[derive(Clone)]
struct Outputs {
    audio: Arc<dyn AudioSink>,
    speaker: Speaker,
    marker: Arc<dyn MarkerDisplay>,
    beep: Arc<AudioClip>,
}

/// State shared between the controller and its session task
struct Shared {
    active: Mutex<Option<ActiveSession>>,
    state: watch::Sender<GuidanceState>,
}

impl Shared {
    /// Run `emit` only while session `id` is active
    ///
    /// Holds the session lock across `emit`, so a concurrent `stop()` either
    /// lands first (nothing is emitted) or afterwards (and silences it).
    fn emit_if_active(&self, id: u64, emit: impl FnOnce()) -> bool {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.as_ref().map(|a| a.session.id) != Some(id) {
            return false;
        }
        emit();
        true
    }

    /// End session `id` if it is still the active one
    fn finish(&self, id: u64, outcome: GuidanceState, outputs: &Outputs) -> bool {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.as_ref().map(|a| a.session.id) != Some(id) {
            return false;
        }

        // The loop is ending on its own; dropping the handle detaches it
        active.take();
        outputs.audio.stop();
        outputs.marker.hide();
        self.state.send_replace(outcome);
        true
    }
}

/// Steers the user's hand toward a world target
///
/// At most one session runs at a time. Starting a new one cancels the
/// previous session before the new loop begins.
pub struct GuidanceController {
    outputs: Outputs,
    hands: Option<Arc<dyn HandTracker>>,
    shared: Arc<Shared>,
    next_id: AtomicU64,
}

impl GuidanceController {
    /// Controller with no hand tracker and no marker attached
    #[must_use]
    pub fn new(audio: Arc<dyn AudioSink>, speaker: Speaker, beep: AudioClip) -> Self {
        let (state, _) = watch::channel(GuidanceState::Idle);
        Self {
            outputs: Outputs {
                audio,
                speaker,
                marker: Arc::new(NoMarker),
                beep: Arc::new(beep),
            },
            hands: None,
            shared: Arc::new(Shared {
                active: Mutex::new(None),
                state,
            }),
            next_id: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn with_hand_tracker(mut self, hands: Arc<dyn HandTracker>) -> Self {
        self.hands = Some(hands);
        self
    }

    #[must_use]
    pub fn with_marker(mut self, marker: Arc<dyn MarkerDisplay>) -> Self {
        self.outputs.marker = marker;
        self
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> GuidanceState {
        *self.shared.state.borrow()
    }

    /// Watch state transitions
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<GuidanceState> {
        self.shared.state.subscribe()
    }

    #[must_use]
    pub fn is_guiding(&self) -> bool {
        self.state() == GuidanceState::Guiding
    }

    /// The session currently being guided, if any
    #[must_use]
    pub fn session(&self) -> Option<GuidanceSession> {
        self.shared
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|a| a.session)
    }

    /// Start guiding toward `target`, replacing any running session
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `Error::Precondition` if no hand tracker is attached or it
    /// currently has no positions; nothing is started or cancelled then.
    pub fn start(&self, target: WorldTarget) -> Result<GuidanceSession> {
        let tracker = self
            .hands
            .clone()
            .ok_or_else(|| Error::Precondition("no hand tracker attached".to_string()))?;
        if tracker.hand_positions().is_none() {
            return Err(Error::Precondition(
                "hand positions unavailable".to_string(),
            ));
        }

        let session = GuidanceSession {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            target,
        };

        let mut active = self.shared.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = active.take() {
            tracing::info!(
                previous = previous.session.id,
                next = session.id,
                "superseding guidance session"
            );
            previous.cancel();
            self.outputs.audio.stop();
            self.outputs.marker.hide();
        }

        tracing::info!(id = session.id, target = %target.position, "guiding hand to target");
        self.outputs.marker.show(target.position);
        self.shared.state.send_replace(GuidanceState::Guiding);

        let (cancel, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(run_session(
            session,
            tracker,
            self.outputs.clone(),
            Arc::clone(&self.shared),
            cancel_rx,
        ));

        *active = Some(ActiveSession {
            session,
            cancel,
            task: Some(task),
        });

        Ok(session)
    }

    /// Cancel the running session, silencing audio and hiding the marker
    ///
    /// Returns whether a session was running.
    pub fn stop(&self) -> bool {
        let previous = self
            .shared
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        let Some(previous) = previous else {
            tracing::debug!("stop requested with no active guidance");
            return false;
        };

        tracing::info!(id = previous.session.id, "guidance stopped");
        previous.cancel();
        self.outputs.audio.stop();
        self.outputs.marker.hide();
        self.shared.state.send_replace(GuidanceState::Cancelled);
        true
    }
}

impl Drop for GuidanceController {
    fn drop(&mut self) {
        if let Some(active) = self
            .shared
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            active.cancel();
        }
    }
}

/// One session's feedback loop
async fn run_session(
    session: GuidanceSession,
    tracker: Arc<dyn HandTracker>,
    outputs: Outputs,
    shared: Arc<Shared>,
    mut cancel: watch::Receiver<bool>,
) {
    let target = session.target.position;
    let mut last_cue = Instant::now();
    let mut iteration: u64 = 0;
    let mut tracking_lost = false;

    loop {
        if *cancel.borrow() {
            break;
        }

        let pause = if let Some(hands) = tracker.hand_positions() {
            if tracking_lost {
                tracing::info!(id = session.id, "hand tracking restored");
                tracking_lost = false;
            }

            let distance = hands.min_distance(target);

            if has_arrived(distance) {
                if shared.finish(session.id, GuidanceState::Reached, &outputs) {
                    tracing::info!(id = session.id, distance, iteration, "hand reached the object");
                }
                break;
            }

            let feedback = feedback_for(distance);
            let params = PlaybackParams::spatial(feedback.pitch, feedback.volume, target);
            let beeped = shared.emit_if_active(session.id, || {
                if let Err(e) = outputs.audio.play(&outputs.beep, params) {
                    tracing::warn!(error = %e, "beep playback failed");
                }
            });
            if !beeped {
                break;
            }

            tracing::debug!(
                id = session.id,
                iteration,
                distance,
                interval_s = feedback.interval.as_secs_f32(),
                pitch = feedback.pitch,
                volume = feedback.volume,
                "beep"
            );

            if last_cue.elapsed() > CUE_INTERVAL
                && let Some(cue) = directional_cue(target, &hands)
            {
                let cued = shared.emit_if_active(session.id, || {
                    tracing::info!(id = session.id, cue = %cue, "verbal cue");
                    outputs.speaker.say(cue.phrase());
                });
                if !cued {
                    break;
                }
                last_cue = Instant::now();
            }

            feedback.interval
        } else {
            if !tracking_lost {
                tracing::warn!(id = session.id, "hand tracking lost, waiting");
                tracking_lost = true;
            }
            TRACKING_RETRY
        };

        iteration += 1;

        tokio::select! {
            biased;
            _ = cancel.changed() => break,
            () = tokio::time::sleep(pause) => {}
        }
    }

    tracing::debug!(id = session.id, iteration, "guidance loop exited");
}
