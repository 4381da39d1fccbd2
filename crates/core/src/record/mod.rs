use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{render::Canvas, Result};

/// Configuration options for the recording subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSettings {
    pub output_dir: PathBuf,
    /// Stop writing after this many snapshots.
    pub max_frames: Option<usize>,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("frames"),
            max_frames: None,
        }
    }
}

/// Writes canvas snapshots as a numbered PNG sequence (`0.png`, `1.png`, ...).
#[derive(Debug, Default)]
pub struct Recorder {
    settings: RecordingSettings,
    is_recording: bool,
    written: usize,
}

impl Recorder {
    pub fn new(settings: RecordingSettings) -> Self {
        Self {
            settings,
            is_recording: false,
            written: 0,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.settings.output_dir)?;
        self.is_recording = true;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.is_recording = false;
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Saves the canvas as the next snapshot. Returns the written path, or
    /// `None` when not recording or the frame limit was reached.
    pub fn capture(&mut self, canvas: &Canvas) -> Result<Option<PathBuf>> {
        if !self.is_recording {
            return Ok(None);
        }
        if self
            .settings
            .max_frames
            .is_some_and(|max| self.written >= max)
        {
            return Ok(None);
        }

        let path = self
            .settings
            .output_dir
            .join(format!("{}.png", self.written));
        canvas.image().save(&path)?;
        self.written += 1;
        Ok(Some(path))
    }
}
