use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{CutinError, Result};

/// Lowest target frame rate the player accepts.
pub const MIN_FPS: f64 = 1.0;
/// Highest target frame rate the player accepts.
pub const MAX_FPS: f64 = 240.0;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub playback: PlaybackConfig,
    pub surface: SurfaceConfig,
    pub assets: AssetConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing sections fall back to their
    /// defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let config: Self = serde_json::from_slice(&bytes)?;
        config.playback.validate()?;
        Ok(config)
    }
}

/// Knobs of the render loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub target_fps: f64,
    /// Clear the surface after this many drawn frames. Zero disables
    /// periodic clearing.
    pub clear_after_frames: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            clear_after_frames: 0,
        }
    }
}

impl PlaybackConfig {
    /// Returns a copy with the frame rate clamped into `[MIN_FPS, MAX_FPS]`.
    pub fn clamped(self) -> Self {
        let target_fps = if self.target_fps.is_nan() {
            MIN_FPS
        } else {
            self.target_fps.clamp(MIN_FPS, MAX_FPS)
        };
        Self { target_fps, ..self }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.target_fps.is_finite() || self.target_fps <= 0.0 {
            return Err(CutinError::InvalidConfig(format!(
                "target fps must be positive, got {}",
                self.target_fps
            )));
        }
        Ok(())
    }
}

/// Size of the output surface and presentation options applied around it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub width: u32,
    pub height: u32,
    pub mirror: bool,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: 1060,
            height: 600,
            mirror: false,
        }
    }
}

/// Where dataset folders live on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub root: PathBuf,
    pub metadata_file: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            metadata_file: "data.json".to_string(),
        }
    }
}
