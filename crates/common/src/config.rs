//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global StoryKit configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryConfig {
    /// Output canvas geometry.
    pub canvas: CanvasConfig,

    /// Image and video export parameters.
    pub export: ExportDefaults,

    /// Media loading policy.
    pub media: MediaConfig,

    /// Font selection.
    pub fonts: FontConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Output canvas size and safe-zone margins, in output pixels.
///
/// These numbers are a public contract: design previews rely on them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    pub safe_top: f32,
    pub safe_bottom: f32,
    pub safe_side: f32,
}

/// Default export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// JPEG quality in `(0.0, 1.0]`.
    pub jpeg_quality: f32,

    /// Output video frame rate.
    pub fps: u32,

    /// How long to wait for a decoded source frame before failing the export.
    pub frame_timeout_ms: u64,

    /// Target video bitrate.
    pub video_bitrate_kbps: u32,

    /// Refuse to produce WebM output (for hosts sharing to Apple mobile devices).
    pub reject_webm_output: bool,

    /// ffmpeg executable.
    pub ffmpeg: PathBuf,

    /// ffprobe executable.
    pub ffprobe: PathBuf,
}

/// What to do with WebM input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebmPolicy {
    /// Load it, but surface an advisory.
    Warn,
    /// Refuse to load it.
    Block,
}

/// Media loading configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub webm_policy: WebmPolicy,

    /// Upper bound of the default trim range, in seconds.
    pub default_trim_secs: f64,
}

/// Font configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    /// Bold sans-serif font file. System locations are searched when unset.
    pub path: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "storykit_render=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            safe_top: 250.0,
            safe_bottom: 420.0,
            safe_side: 90.0,
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            jpeg_quality: 0.92,
            fps: 30,
            frame_timeout_ms: 5_000,
            video_bitrate_kbps: 8_000,
            reject_webm_output: false,
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            webm_policy: WebmPolicy::Warn,
            default_trim_secs: 60.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl StoryConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str::<StoryConfig>(&content) {
                    Ok(config) => return config.sanitized(),
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Pull out-of-range values back to something usable.
    pub fn sanitized(mut self) -> Self {
        if !(self.export.jpeg_quality > 0.0 && self.export.jpeg_quality <= 1.0) {
            tracing::warn!(
                jpeg_quality = self.export.jpeg_quality,
                "JPEG quality out of range, using default"
            );
            self.export.jpeg_quality = ExportDefaults::default().jpeg_quality;
        }
        self.export.fps = self.export.fps.clamp(1, 120);
        self.export.frame_timeout_ms = self.export.frame_timeout_ms.max(100);
        if !(self.media.default_trim_secs > 0.0) {
            self.media.default_trim_secs = MediaConfig::default().default_trim_secs;
        }
        if self.canvas.width == 0 || self.canvas.height == 0 {
            self.canvas = CanvasConfig::default();
        }
        self
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("storykit").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_canvas_contract() {
        let canvas = CanvasConfig::default();
        assert_eq!((canvas.width, canvas.height), (1080, 1920));
        assert_eq!(canvas.safe_top, 250.0);
        assert_eq!(canvas.safe_bottom, 420.0);
        assert_eq!(canvas.safe_side, 90.0);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: StoryConfig =
            serde_json::from_str(r#"{"export": {"fps": 24}, "media": {"webm_policy": "block"}}"#)
                .unwrap();
        assert_eq!(config.export.fps, 24);
        assert_eq!(config.export.jpeg_quality, 0.92);
        assert_eq!(config.media.webm_policy, WebmPolicy::Block);
        assert_eq!(config.canvas, CanvasConfig::default());
    }

    #[test]
    fn test_sanitize_repairs_bad_values() {
        let mut config = StoryConfig::default();
        config.export.jpeg_quality = 7.0;
        config.export.fps = 0;
        config.media.default_trim_secs = -1.0;
        let config = config.sanitized();
        assert_eq!(config.export.jpeg_quality, 0.92);
        assert_eq!(config.export.fps, 1);
        assert_eq!(config.media.default_trim_secs, 60.0);
    }
}
