//! Error types shared across StoryKit crates.
//!
//! None of these are fatal to a host application: each one maps to a short
//! user-facing message and leaves the composition in a safe idle state.

use std::path::PathBuf;

/// Top-level error type for StoryKit operations.
#[derive(Debug, thiserror::Error)]
pub enum StoryError {
    /// The file kind could not be determined from MIME type or extension.
    #[error("Unsupported media: {message}")]
    UnsupportedMedia { message: String },

    /// A format that is known to misbehave on some playback targets.
    #[error("Risky media format: {message}")]
    RiskyFormat { message: String },

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Export error: {message}")]
    Export { message: String },

    /// The user backed out of an export or share interaction.
    #[error("Cancelled by user")]
    Cancelled,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using StoryError.
pub type StoryResult<T> = Result<T, StoryError>;

impl StoryError {
    pub fn unsupported_media(msg: impl Into<String>) -> Self {
        Self::UnsupportedMedia {
            message: msg.into(),
        }
    }

    pub fn risky_format(msg: impl Into<String>) -> Self {
        Self::RiskyFormat {
            message: msg.into(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// True when the error only records that the user walked away.
    /// Hosts should swallow these instead of showing an error.
    pub fn is_user_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Short message suitable for showing to the person composing the story.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::UnsupportedMedia { .. } => {
                "Formato não suportado. Use uma foto (JPG/PNG) ou vídeo (MP4/MOV)."
            }
            Self::RiskyFormat { .. } => {
                "Vídeos WEBM podem não funcionar no iPhone. Prefira MP4 ou MOV."
            }
            Self::Decode { .. } | Self::FileNotFound { .. } => "Não foi possível carregar a mídia.",
            Self::Export { .. } => "Não foi possível gerar o story. Tente novamente.",
            Self::Cancelled => "",
            Self::Config { .. } => "Configuração inválida.",
            Self::Io(_) | Self::Json(_) | Self::Other(_) => "Algo deu errado. Tente novamente.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_is_not_an_error_for_users() {
        assert!(StoryError::Cancelled.is_user_cancellation());
        assert!(StoryError::Cancelled.user_message().is_empty());
        assert!(!StoryError::export("boom").is_user_cancellation());
    }

    #[test]
    fn test_decode_and_missing_file_share_message() {
        let missing = StoryError::FileNotFound {
            path: PathBuf::from("/nope.jpg"),
        };
        assert_eq!(
            missing.user_message(),
            StoryError::decode("bad header").user_message()
        );
    }

    #[test]
    fn test_display_includes_detail() {
        let err = StoryError::unsupported_media("notes.txt");
        assert_eq!(err.to_string(), "Unsupported media: notes.txt");
    }
}
