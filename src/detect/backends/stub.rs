use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;

/// Scripted detector for tests and dry runs.
///
/// Returns the same detections (or the same failure) for every frame and
/// counts how many frames it has seen.
pub struct StubBackend {
    outcome: std::result::Result<Vec<Detection>, String>,
    calls: u64,
}

impl StubBackend {
    pub fn returning(detections: Vec<Detection>) -> Self {
        Self {
            outcome: Ok(detections),
            calls: 0,
        }
    }

    pub fn failing(msg: impl Into<String>) -> Self {
        Self {
            outcome: Err(msg.into()),
            calls: 0,
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::returning(Vec::new())
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _image: &RgbImage) -> Result<Vec<Detection>> {
        self.calls += 1;
        match &self.outcome {
            Ok(detections) => Ok(detections.clone()),
            Err(msg) => Err(anyhow!("{}", msg)),
        }
    }
}
