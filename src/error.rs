//! Error types for reelbot

use thiserror::Error;

/// Main error type for reelbot operations
#[derive(Debug, Error)]
pub enum ReelError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Platform protects its content: {0}")]
    PlatformProtected(String),

    #[error("Metadata unavailable for {0}")]
    MetadataUnavailable(String),

    #[error("Collection has no usable entries: {0}")]
    EmptyCollection(String),

    #[error("Download failed: {cause}")]
    DownloadFailed { cause: String },

    #[error("File too large: {size} bytes exceeds limit of {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Engine error: {0}")]
    EngineFailure(String),

    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Download quota exceeded for user {0}")]
    QuotaExceeded(String),

    #[error("Session expired or unknown: {0}")]
    SessionExpired(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credential error: {0}")]
    Credentials(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),
}

impl ReelError {
    /// Check if error ends the current request without any retry
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReelError::InvalidUrl(_)
                | ReelError::UnsupportedPlatform(_)
                | ReelError::PlatformProtected(_)
                | ReelError::FileTooLarge { .. }
        )
    }

    /// Message shown to the end user. Never carries the internal cause.
    pub fn user_message(&self) -> String {
        match self {
            ReelError::InvalidUrl(_) => {
                "❌ Please send a valid video URL (it must start with http:// or https://).".to_string()
            }
            ReelError::UnsupportedPlatform(_) => {
                "❌ This platform is not supported. Try a link from YouTube, TikTok, Instagram, Facebook or Twitter/X.".to_string()
            }
            ReelError::PlatformProtected(_) => concat!(
                "👻 Snapchat link detected!\n\n",
                "🔒 Snapchat protects Spotlight clips and stories, so they cannot be downloaded.\n",
                "💡 Save the clip from the Snapchat app, or share it from another platform."
            )
            .to_string(),
            ReelError::MetadataUnavailable(_) => {
                "❌ Could not get video information. Check that the link is public and try again.".to_string()
            }
            ReelError::EmptyCollection(_) => {
                "📋 This playlist is empty. Try another playlist that contains videos.".to_string()
            }
            ReelError::FileTooLarge { size, max } => format!(
                "❌ The file is too large!\n📦 Size: {}\n📏 Limit: {}\n\n💡 Choose a lower quality or download the audio instead.",
                crate::core::progress::format_bytes(*size),
                crate::core::progress::format_bytes(*max)
            ),
            ReelError::QuotaExceeded(_) => {
                "⏳ You have reached the hourly download limit. Please try again later.".to_string()
            }
            ReelError::SessionExpired(_) => {
                "⌛ This selection has expired. Please send the link again.".to_string()
            }
            ReelError::Cancelled(_) => "🚫 Cancelled.".to_string(),
            _ => "❌ Download failed. Please try again or use a different link.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_errors() {
        assert!(ReelError::InvalidUrl("x".to_string()).is_terminal());
        assert!(ReelError::FileTooLarge { size: 2, max: 1 }.is_terminal());
        assert!(!ReelError::EngineFailure("x".to_string()).is_terminal());
    }

    #[test]
    fn test_user_message_hides_cause() {
        let error = ReelError::DownloadFailed {
            cause: "ERROR: secret stderr line".to_string(),
        };
        assert!(!error.user_message().contains("secret"));

        let error = ReelError::EngineFailure("cookie jar path /tmp/x".to_string());
        assert!(!error.user_message().contains("/tmp/x"));
    }

    #[test]
    fn test_file_too_large_message_names_sizes() {
        let error = ReelError::FileTooLarge {
            size: 600 * 1024 * 1024,
            max: 500 * 1024 * 1024,
        };
        let message = error.user_message();
        assert!(message.contains("600.0 MB"));
        assert!(message.contains("500.0 MB"));
    }
}
