//! Failure taxonomy of the walkthrough runtime.
//!
//! None of these ever escape a tick: the frame loop logs them and degrades
//! the affected asset or media instead.
use thiserror::Error;

/// Fetch or decode failure for a single asset (LoadFailure).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AssetError {
    #[error("failed to fetch {locator}: {reason}")]
    Fetch { locator: String, reason: String },

    #[error("failed to decode {locator}: {reason}")]
    Decode { locator: String, reason: String },

    #[error("{kind} assets are not supported on this platform ({locator})")]
    Unsupported { locator: String, kind: &'static str },
}

impl AssetError {
    pub fn locator(&self) -> &str {
        match self {
            AssetError::Fetch { locator, .. }
            | AssetError::Decode { locator, .. }
            | AssetError::Unsupported { locator, .. } => locator,
        }
    }
}

/// A `play()` request rejected by the host (PlaybackBlocked).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlaybackError {
    #[error("playback of {media} blocked: {reason}")]
    Blocked { media: String, reason: String },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("surface error: {0}")]
    Surface(String),

    #[error("surface lost")]
    Lost,

    #[error("out of GPU memory")]
    OutOfMemory,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse scene config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read scene config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid color {0:?}, expected \"#rrggbb\"")]
    InvalidColor(String),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

/// Reasons a video surface mapping cannot be computed yet (or at all).
#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum UvMappingError {
    #[error("video dimensions are not known until the first decoded frame")]
    UnknownDimensions,

    #[error("video reported invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("zoom and surface aspect must be finite and positive")]
    InvalidZoom,
}
