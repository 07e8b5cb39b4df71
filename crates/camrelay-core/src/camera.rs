//! Camera and overlay definitions
//!
//! These are the fully-formed per-camera settings the jobs are built from.
//! They are read from a JSON document:
//!
//! ```json
//! {
//!   "webcams": [
//!     {
//!       "name": "alpha",
//!       "file_name_on_server": "alpha.jpg",
//!       "overlays": [
//!         { "type": "logo", "place": [0, 619], "size": [299, 68] },
//!         [
//!           { "type": "logo", "place": [0, 0], "size": [120, 40], "subname": "temp" },
//!           { "type": "temperature" }
//!         ]
//!       ]
//!     }
//!   ],
//!   "videos": [
//!     { "name": "allsky", "file_name_on_server": "allsky.mp4", "logo_place": [0, 619] }
//!   ]
//! }
//! ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_LOGO_IMAGE: &str = "overlays/logo-shaded.png";
pub const DEFAULT_VIDEO_LOGO_IMAGE: &str = "overlays/logo-shaded-video.png";
pub const DEFAULT_LABEL_FONT: &str = "fonts/OpenSans-Bold.ttf";
pub const DEFAULT_TEMPERATURE_FONT: &str = "fonts/SourceSansVariable-Bold.ttf";
pub const DEFAULT_TEMPERATURE_ENDPOINT: &str = "https://glacier.org/scripts/post_temp.cgi";

/// Top-level camera document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamerasFile {
    #[serde(default)]
    pub webcams: Vec<WebcamSpec>,
    #[serde(default, alias = "allsky_videos")]
    pub videos: Vec<VideoSpec>,
}

/// One still-image camera
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebcamSpec {
    pub name: String,
    pub file_name_on_server: String,
    #[serde(default, alias = "logo_placements")]
    pub overlays: Vec<OverlayEntry>,
}

/// A configured overlay: either a single overlay or a group that is applied as
/// one composite.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OverlayEntry {
    Single(OverlaySpec),
    Group(Vec<OverlaySpec>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OverlaySpec {
    Logo(LogoSpec),
    Temperature(TemperatureSpec),
}

impl OverlaySpec {
    pub fn subname(&self) -> Option<&str> {
        match self {
            OverlaySpec::Logo(spec) => spec.subname.as_deref(),
            OverlaySpec::Temperature(spec) => spec.subname.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoSpec {
    pub place: (i64, i64),
    pub size: (u32, u32),
    #[serde(default = "default_logo_image")]
    pub img: PathBuf,
    #[serde(default)]
    pub subname: Option<String>,
    #[serde(default)]
    pub cover_date: bool,
    #[serde(default = "default_label_font")]
    pub label_font: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureSpec {
    /// Top-left corner of the badge; anchored to the top-right corner of the
    /// image when absent.
    #[serde(default)]
    pub place: Option<(i64, i64)>,
    #[serde(default = "default_temperature_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub subname: Option<String>,
    #[serde(default = "default_temperature_font")]
    pub font_path: PathBuf,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    #[serde(default = "default_bg_color")]
    pub bg_color: [u8; 4],
    #[serde(default = "default_bg_size")]
    pub bg_size: (u32, u32),
    #[serde(default = "default_text_color")]
    pub text_color: [u8; 3],
}

impl Default for TemperatureSpec {
    fn default() -> Self {
        Self {
            place: None,
            endpoint: default_temperature_endpoint(),
            subname: None,
            font_path: default_temperature_font(),
            font_size: default_font_size(),
            bg_color: default_bg_color(),
            bg_size: default_bg_size(),
            text_color: default_text_color(),
        }
    }
}

/// The nightly timelapse video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSpec {
    pub name: String,
    pub file_name_on_server: String,
    pub logo_place: (i64, i64),
    #[serde(default = "default_video_logo_image")]
    pub logo_img: PathBuf,
}

fn default_logo_image() -> PathBuf {
    PathBuf::from(DEFAULT_LOGO_IMAGE)
}

fn default_video_logo_image() -> PathBuf {
    PathBuf::from(DEFAULT_VIDEO_LOGO_IMAGE)
}

fn default_label_font() -> PathBuf {
    PathBuf::from(DEFAULT_LABEL_FONT)
}

fn default_temperature_font() -> PathBuf {
    PathBuf::from(DEFAULT_TEMPERATURE_FONT)
}

fn default_temperature_endpoint() -> String {
    DEFAULT_TEMPERATURE_ENDPOINT.to_string()
}

fn default_font_size() -> f32 {
    38.0
}

fn default_bg_color() -> [u8; 4] {
    [0, 0, 0, 64]
}

fn default_bg_size() -> (u32, u32) {
    (175, 44)
}

fn default_text_color() -> [u8; 3] {
    [255, 255, 255]
}

/// Read camera definitions from a JSON file.
pub fn load_cameras(path: &Path) -> anyhow::Result<CamerasFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read camera file {}", path.display()))?;
    let cameras: CamerasFile = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse camera file {}", path.display()))?;

    for webcam in &cameras.webcams {
        if webcam.name.trim().is_empty() {
            anyhow::bail!("Camera with source {} has no name", webcam.file_name_on_server);
        }
        if webcam.overlays.iter().any(|e| matches!(e, OverlayEntry::Group(g) if g.is_empty())) {
            anyhow::bail!("Camera {} has an empty overlay group", webcam.name);
        }
    }

    tracing::info!(
        path = %path.display(),
        webcams = cameras.webcams.len(),
        videos = cameras.videos.len(),
        "Loaded camera definitions"
    );

    Ok(cameras)
}
