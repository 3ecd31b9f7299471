//! Guidepost - perception-guided hand navigation
//!
//! This library steers a visually impaired user's hand toward objects seen
//! by a head-mounted camera:
//! - Remote object detection, scene captioning and speech synthesis
//! - Projection of detected boxes into the 3D world
//! - A guidance loop driving spatial beeps and spoken directions
//! - Fallback between the room describer and the captioner
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Inputs                            │
//! │  Phrases  │  Camera frames  │  Hands  │  Pose       │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Guidepost                            │
//! │ Commands │ Orchestrator │ Detection store │ Guidance │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │            Remote services / audio                   │
//! │  Detector  │  Captioner  │  Vision  │  TTS  │ cpal  │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod commands;
pub mod config;
pub mod daemon;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod guidance;
pub mod orchestrator;
pub mod sensors;
pub mod transport;
pub mod voice;

pub use commands::{Command, CommandDispatcher};
pub use config::Config;
pub use daemon::Daemon;
pub use detection::{Detection, DetectionSet, DetectionStore, SpatialProjector, WorldTarget};
pub use error::{Error, Result};
pub use geometry::{CameraPose, Vec3};
pub use guidance::{GuidanceController, GuidanceState};
pub use orchestrator::{Orchestrator, RequestOutcome};
pub use sensors::HandPositions;
