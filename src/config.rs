//! Application settings, loadable from a JSON file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000/process-image/";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Limits for the on-screen copy of the image.
///
/// The display box is `min(viewport * fraction, max)` on each axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayBounds {
    pub max_width: f32,
    pub max_height: f32,
    pub viewport_width_fraction: f32,
    pub viewport_height_fraction: f32,
}

impl Default for DisplayBounds {
    fn default() -> Self {
        Self {
            max_width: 800.0,
            max_height: 700.0,
            viewport_width_fraction: 0.9,
            viewport_height_fraction: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Endpoint receiving the multipart submission
    pub backend_url: String,

    pub display: DisplayBounds,

    /// Side of the square corner markers, in display pixels
    pub marker_size: f32,

    /// Upper bound on the wait for the first layout pass after a resize
    pub settle_timeout_ms: u64,

    pub request_timeout_secs: u64,

    /// RGBA of the fog drawn outside the selection
    pub fog_color: [u8; 4],
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            display: DisplayBounds::default(),
            marker_size: 16.0,
            settle_timeout_ms: 50,
            request_timeout_secs: 60,
            fog_color: [0, 0, 0, 140],
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }

    pub fn with_marker_size(mut self, size: f32) -> Self {
        self.marker_size = size;
        self
    }

    pub fn with_display_bounds(mut self, bounds: DisplayBounds) -> Self {
        self.display = bounds;
        self
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
