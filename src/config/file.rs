//! TOML configuration file loading
//!
//! Supports `~/.config/guidepost/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct GuidepostConfigFile {
    /// Remote service locations
    #[serde(default)]
    pub endpoints: EndpointsFileConfig,

    /// Camera intrinsics and placement
    #[serde(default)]
    pub camera: CameraFileConfig,

    /// Guidance behaviour
    #[serde(default)]
    pub guidance: GuidanceFileConfig,

    /// Refresh cadence and deadlines
    #[serde(default)]
    pub timing: TimingFileConfig,

    /// Audio assets
    #[serde(default)]
    pub audio: AudioFileConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct EndpointsFileConfig {
    /// Captioning and text-to-speech server
    pub server_url: Option<String>,

    /// Object detection server
    pub detector_url: Option<String>,

    /// Vision model `generateContent` endpoint
    pub vision_url: Option<String>,

    /// Vision model API key
    pub gemini_api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CameraFileConfig {
    pub image_width: Option<f32>,
    pub image_height: Option<f32>,
    pub vertical_fov_deg: Option<f32>,
    /// Camera height above the floor in meters
    pub eye_height: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GuidanceFileConfig {
    /// Guide to a point straight ahead instead of a detected object
    pub fixed_debug_target: Option<bool>,

    /// Objects that can be asked for by name
    pub labels: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TimingFileConfig {
    /// Background detection refresh period; 0 disables
    pub detection_interval_ms: Option<u64>,

    /// Deadline for every remote call
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// WAV file used for the guidance beep
    pub beep_path: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `GuidepostConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> GuidepostConfigFile {
    let Some(path) = config_file_path() else {
        return GuidepostConfigFile::default();
    };

    load_config_file_from(&path)
}

/// Load a TOML config file from an explicit path
///
/// Same fallback rules as [`load_config_file`].
pub fn load_config_file_from(path: &Path) -> GuidepostConfigFile {
    if !path.exists() {
        return GuidepostConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                GuidepostConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            GuidepostConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/guidepost/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("guidepost").join("config.toml"))
}
