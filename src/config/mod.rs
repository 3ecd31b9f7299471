//! Configuration management for Guidepost
//!
//! Values are layered: built-in defaults, then the TOML file, then
//! environment variables. CLI flags are applied on top by the binary.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::commands::DEFAULT_GUIDE_LABELS;
use crate::geometry::{CameraPose, Vec3};
use crate::transport::DEFAULT_VISION_URL;
use crate::{Error, Result};

use self::file::GuidepostConfigFile;

/// Guidepost configuration
#[derive(Debug)]
pub struct Config {
    /// Remote service locations
    pub endpoints: EndpointsConfig,

    /// Camera intrinsics and placement
    pub camera: CameraConfig,

    /// Guidance behaviour
    pub guidance: GuidanceConfig,

    /// Refresh cadence and deadlines
    pub timing: TimingConfig,

    /// Audio assets
    pub audio: AudioConfig,
}

/// Remote service configuration
#[derive(Debug)]
pub struct EndpointsConfig {
    /// Captioning and text-to-speech server (from `GUIDEPOST_SERVER_URL`)
    pub server_url: Option<String>,

    /// Object detection server (from `GUIDEPOST_DETECTOR_URL`)
    pub detector_url: Option<String>,

    /// Vision model endpoint (from `GUIDEPOST_VISION_URL`)
    pub vision_url: String,

    /// Vision model API key (from `GEMINI_API_KEY`)
    pub gemini_api_key: Option<SecretString>,
}

#[derive(Debug, Clone, Copy)]
pub struct CameraConfig {
    pub image_width: f32,
    pub image_height: f32,
    pub vertical_fov_deg: f32,
    pub eye_height: f32,
}

impl CameraConfig {
    /// Level camera at eye height, looking down +z
    #[must_use]
    pub const fn pose(&self) -> CameraPose {
        CameraPose::looking_forward(
            Vec3::new(0.0, self.eye_height, 0.0),
            self.vertical_fov_deg,
            self.image_width / self.image_height,
        )
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            image_width: 2560.0,
            image_height: 1440.0,
            vertical_fov_deg: 60.0,
            eye_height: 1.6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GuidanceConfig {
    /// Guide to a fixed point ahead (from `GUIDEPOST_FIXED_TARGET`)
    pub fixed_debug_target: bool,

    /// Objects that can be asked for by name
    pub labels: Vec<String>,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            fixed_debug_target: false,
            labels: DEFAULT_GUIDE_LABELS.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TimingConfig {
    /// Background detection refresh period; zero disables it
    pub detection_interval: Duration,

    /// Deadline for every remote call
    pub request_timeout: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            detection_interval: Duration::from_millis(1500),
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AudioConfig {
    /// Beep WAV file (from `GUIDEPOST_BEEP_PATH`); a tone is synthesized
    /// when unset
    pub beep_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the config file and the environment
    ///
    /// # Errors
    ///
    /// Returns error if the resulting values are unusable
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Combine a parsed config file with variables from `env` (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for a zero request timeout or a degenerate
    /// camera
    pub fn resolve(fc: GuidepostConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let endpoints = EndpointsConfig {
            server_url: env("GUIDEPOST_SERVER_URL")
                .or(fc.endpoints.server_url)
                .filter(|s| !s.trim().is_empty()),
            detector_url: env("GUIDEPOST_DETECTOR_URL")
                .or(fc.endpoints.detector_url)
                .filter(|s| !s.trim().is_empty()),
            vision_url: env("GUIDEPOST_VISION_URL")
                .or(fc.endpoints.vision_url)
                .unwrap_or_else(|| DEFAULT_VISION_URL.to_string()),
            gemini_api_key: env("GEMINI_API_KEY")
                .or(fc.endpoints.gemini_api_key)
                .filter(|s| !s.trim().is_empty())
                .map(SecretString::from),
        };

        let defaults = CameraConfig::default();
        let camera = CameraConfig {
            image_width: fc.camera.image_width.unwrap_or(defaults.image_width),
            image_height: fc.camera.image_height.unwrap_or(defaults.image_height),
            vertical_fov_deg: fc
                .camera
                .vertical_fov_deg
                .unwrap_or(defaults.vertical_fov_deg),
            eye_height: fc.camera.eye_height.unwrap_or(defaults.eye_height),
        };
        if camera.image_width <= 0.0 || camera.image_height <= 0.0 {
            return Err(Error::Config(format!(
                "camera image size must be positive, got {}x{}",
                camera.image_width, camera.image_height
            )));
        }
        if !(1.0..180.0).contains(&camera.vertical_fov_deg) {
            return Err(Error::Config(format!(
                "camera vertical_fov_deg out of range: {}",
                camera.vertical_fov_deg
            )));
        }

        let guidance = GuidanceConfig {
            fixed_debug_target: env("GUIDEPOST_FIXED_TARGET")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .or(fc.guidance.fixed_debug_target)
                .unwrap_or(false),
            labels: fc
                .guidance
                .labels
                .unwrap_or_else(|| GuidanceConfig::default().labels),
        };

        let timing_defaults = TimingConfig::default();
        let timing = TimingConfig {
            detection_interval: parse_env(&env, "GUIDEPOST_DETECTION_INTERVAL_MS")
                .or(fc.timing.detection_interval_ms)
                .map_or(timing_defaults.detection_interval, Duration::from_millis),
            request_timeout: parse_env(&env, "GUIDEPOST_REQUEST_TIMEOUT_SECS")
                .or(fc.timing.request_timeout_secs)
                .map_or(timing_defaults.request_timeout, Duration::from_secs),
        };
        if timing.request_timeout.is_zero() {
            return Err(Error::Config("request timeout must be non-zero".to_string()));
        }

        let audio = AudioConfig {
            beep_path: env("GUIDEPOST_BEEP_PATH")
                .or(fc.audio.beep_path)
                .map(PathBuf::from),
        };

        Ok(Self {
            endpoints,
            camera,
            guidance,
            timing,
            audio,
        })
    }
}

fn parse_env(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = env(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "ignoring unparseable environment value");
            None
        }
    }
}
