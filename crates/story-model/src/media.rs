//! Media file classification.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use storykit_common::error::{StoryError, StoryResult};

/// What a background file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// A user-supplied file: a path plus the MIME type the host reported, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    pub path: PathBuf,
    pub mime: Option<String>,
}

/// Non-fatal warning attached to a successful classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaAdvisory {
    /// WebM video; Apple mobile browsers commonly fail to play it.
    WebmPlayback,
}

impl MediaAdvisory {
    pub fn message(self) -> &'static str {
        match self {
            MediaAdvisory::WebmPlayback => {
                "Vídeos WEBM podem não funcionar no iPhone. Prefira MP4 ou MOV."
            }
        }
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm"];

impl MediaFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mime: None,
        }
    }

    pub fn with_mime(path: impl Into<PathBuf>, mime: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mime: Some(mime.into()),
        }
    }

    /// File name for messages and logs.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn extension(&self) -> Option<String> {
        extension_of(&self.path)
    }

    fn mime_lower(&self) -> Option<String> {
        self.mime
            .as_deref()
            .map(|m| m.trim().to_ascii_lowercase())
            .filter(|m| !m.is_empty())
    }

    /// Determine the media kind: MIME type first, then extension.
    pub fn classify(&self) -> StoryResult<MediaKind> {
        let from_mime = self.mime_lower().and_then(|mime| {
            if mime.starts_with("image/") {
                Some(MediaKind::Image)
            } else if mime.starts_with("video/") {
                Some(MediaKind::Video)
            } else {
                None
            }
        });
        if let Some(kind) = from_mime {
            return Ok(kind);
        }

        match self.extension() {
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => Ok(MediaKind::Image),
            Some(ext) if VIDEO_EXTENSIONS.contains(&ext.as_str()) => Ok(MediaKind::Video),
            _ => Err(StoryError::unsupported_media(format!(
                "cannot determine media kind of {}",
                self.display_name()
            ))),
        }
    }

    /// WebM by MIME type or extension.
    pub fn is_webm(&self) -> bool {
        self.mime_lower().is_some_and(|m| m.starts_with("video/webm"))
            || self.extension().as_deref() == Some("webm")
    }

    /// Advisory for this file, if any.
    pub fn advisory(&self) -> Option<MediaAdvisory> {
        self.is_webm().then_some(MediaAdvisory::WebmPlayback)
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}
