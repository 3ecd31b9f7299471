//! Daemon - the main guidance service
//!
//! Wires the remote services, sensors and audio output together, keeps the
//! detection store fresh in the background and dispatches recognized
//! phrases until shutdown.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};

use crate::commands::CommandDispatcher;
use crate::detection::{DetectionStore, SpatialProjector};
use crate::guidance::GuidanceController;
use crate::orchestrator::Orchestrator;
use crate::sensors::{
    CameraRig, FixedCamera, FrameSource, HandTracker, MarkerDisplay, NoFrames,
};
use crate::transport::{
    DetectionTransport, HttpPerceptionClient, SpeechTransport, StructuredDescriber,
    VisionDescriber,
};
use crate::voice::{AudioPlayback, AudioSink, Speaker, beep};
use crate::{Config, Result};

/// The Guidepost daemon
///
/// Collaborators left unset fall back to the HTTP client, the default
/// audio device, a fixed camera from config and no frames or hands.
pub struct Daemon {
    config: Config,
    camera: Option<Arc<dyn CameraRig>>,
    frames: Option<Arc<dyn FrameSource>>,
    hands: Option<Arc<dyn HandTracker>>,
    marker: Option<Arc<dyn MarkerDisplay>>,
    audio: Option<Arc<dyn AudioSink>>,
    detector: Option<Arc<dyn DetectionTransport>>,
    speech: Option<Arc<dyn SpeechTransport>>,
    describer: Option<Arc<dyn StructuredDescriber>>,
}

impl Daemon {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            camera: None,
            frames: None,
            hands: None,
            marker: None,
            audio: None,
            detector: None,
            speech: None,
            describer: None,
        }
    }

    #[must_use]
    pub fn with_camera(mut self, camera: Arc<dyn CameraRig>) -> Self {
        self.camera = Some(camera);
        self
    }

    #[must_use]
    pub fn with_frame_source(mut self, frames: Arc<dyn FrameSource>) -> Self {
        self.frames = Some(frames);
        self
    }

    #[must_use]
    pub fn with_hand_tracker(mut self, hands: Arc<dyn HandTracker>) -> Self {
        self.hands = Some(hands);
        self
    }

    #[must_use]
    pub fn with_marker(mut self, marker: Arc<dyn MarkerDisplay>) -> Self {
        self.marker = Some(marker);
        self
    }

    #[must_use]
    pub fn with_audio(mut self, audio: Arc<dyn AudioSink>) -> Self {
        self.audio = Some(audio);
        self
    }

    #[must_use]
    pub fn with_detector(mut self, detector: Arc<dyn DetectionTransport>) -> Self {
        self.detector = Some(detector);
        self
    }

    #[must_use]
    pub fn with_speech(mut self, speech: Arc<dyn SpeechTransport>) -> Self {
        self.speech = Some(speech);
        self
    }

    #[must_use]
    pub fn with_describer(mut self, describer: Arc<dyn StructuredDescriber>) -> Self {
        self.describer = Some(describer);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Assemble the orchestrator from config and attached collaborators
    ///
    /// # Errors
    ///
    /// Returns error if the audio device cannot be opened or the vision
    /// describer is misconfigured
    pub fn build_orchestrator(&self) -> Result<Arc<Orchestrator>> {
        let config = &self.config;

        let camera: Arc<dyn CameraRig> = self
            .camera
            .clone()
            .unwrap_or_else(|| Arc::new(FixedCamera::new(config.camera.pose())));

        let http = Arc::new(HttpPerceptionClient::new(
            config.endpoints.server_url.clone(),
            config.endpoints.detector_url.clone(),
        ));
        let detector: Arc<dyn DetectionTransport> = self
            .detector
            .clone()
            .unwrap_or_else(|| Arc::clone(&http) as Arc<dyn DetectionTransport>);
        let speech: Arc<dyn SpeechTransport> = self
            .speech
            .clone()
            .unwrap_or_else(|| http as Arc<dyn SpeechTransport>);

        let audio: Arc<dyn AudioSink> = match &self.audio {
            Some(audio) => Arc::clone(audio),
            None => Arc::new(AudioPlayback::new()?.with_listener(Arc::clone(&camera))),
        };

        let describer: Option<Arc<dyn StructuredDescriber>> = match &self.describer {
            Some(d) => Some(Arc::clone(d)),
            None => match &config.endpoints.gemini_api_key {
                Some(key) => Some(Arc::new(
                    VisionDescriber::new(SecretString::from(key.expose_secret().to_string()))?
                        .with_url(config.endpoints.vision_url.clone()),
                )),
                None => {
                    tracing::info!("no vision API key, room descriptions use the captioner");
                    None
                }
            },
        };

        let speaker = Speaker::new(speech, Arc::clone(&audio), config.timing.request_timeout);
        let beep = beep::beep_or_default(config.audio.beep_path.as_deref());

        let mut guidance = GuidanceController::new(Arc::clone(&audio), speaker.clone(), beep);
        if let Some(hands) = &self.hands {
            guidance = guidance.with_hand_tracker(Arc::clone(hands));
        } else {
            tracing::warn!("no hand tracker attached, guidance requests will be refused");
        }
        if let Some(marker) = &self.marker {
            guidance = guidance.with_marker(Arc::clone(marker));
        }

        let projector = SpatialProjector::new(config.camera.image_width, config.camera.image_height)
            .with_fixed_debug(config.guidance.fixed_debug_target);
        if projector.is_fixed_debug() {
            tracing::info!("fixed debug target enabled, detections are ignored for guidance");
        }

        let frames: Arc<dyn FrameSource> = self
            .frames
            .clone()
            .unwrap_or_else(|| Arc::new(NoFrames));

        let mut orchestrator = Orchestrator::new(
            DetectionStore::new(),
            projector,
            camera,
            frames,
            detector,
            speaker,
            Arc::new(guidance),
            config.timing.request_timeout,
        );
        if let Some(describer) = describer {
            orchestrator = orchestrator.with_describer(describer);
        }

        Ok(Arc::new(orchestrator))
    }

    /// Run until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns error if startup fails
    pub async fn run(self, phrases: mpsc::Receiver<String>) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(()).await;
            }
        });

        self.run_until(phrases, shutdown_rx).await
    }

    /// Run until a shutdown message arrives or every shutdown sender is dropped
    ///
    /// A closed phrase stream does not stop the daemon.
    ///
    /// # Errors
    ///
    /// Returns error if startup fails
    pub async fn run_until(
        self,
        mut phrases: mpsc::Receiver<String>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) -> Result<()> {
        let orchestrator = self.build_orchestrator()?;
        let dispatcher = CommandDispatcher::new(
            Arc::clone(&orchestrator),
            &self.config.guidance.labels,
        );

        let mut refresh = if self.config.timing.detection_interval.is_zero() {
            tracing::info!("background detection refresh disabled");
            None
        } else {
            let mut interval = tokio::time::interval(self.config.timing.detection_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            Some(interval)
        };

        tracing::info!(
            labels = ?self.config.guidance.labels,
            refresh_ms = self.config.timing.detection_interval.as_millis(),
            "guidepost running"
        );

        let mut phrases_open = true;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                phrase = phrases.recv(), if phrases_open => {
                    if let Some(phrase) = phrase {
                        dispatcher.dispatch(&phrase);
                    } else {
                        tracing::info!("phrase input closed");
                        phrases_open = false;
                    }
                }
                () = next_tick(&mut refresh) => {
                    let orchestrator = Arc::clone(&orchestrator);
                    tokio::spawn(async move {
                        orchestrator.refresh_detections(false).await;
                    });
                }
            }
        }

        orchestrator.stop_guidance();
        Ok(())
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
