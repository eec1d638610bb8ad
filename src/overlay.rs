//! Optional object-detector overlay.
//!
//! Fires when an external detector reports something worth a closer look,
//! independently of the histogram evidence.

use std::collections::HashMap;

use anyhow::Result;

use crate::detect::{Detection, SharedDetector};
use crate::frame::Frame;
use crate::pipeline::EvidenceSource;

/// Label to minimum confidence.
pub type LabelFilter = HashMap<String, f64>;

pub struct MlOverlay {
    detector: Option<SharedDetector>,
    labels: Option<LabelFilter>,
}

impl MlOverlay {
    pub fn new(detector: Option<SharedDetector>, labels: Option<LabelFilter>) -> Self {
        Self { detector, labels }
    }

    pub fn is_enabled(&self) -> bool {
        self.detector.is_some()
    }

    /// Whether any of `detections` passes the label filter.
    ///
    /// Without a filter every detection counts.
    pub fn accepts(&self, detections: &[Detection]) -> bool {
        match &self.labels {
            None => !detections.is_empty(),
            Some(labels) => detections.iter().any(|d| {
                labels
                    .get(&d.label)
                    .is_some_and(|&min_score| d.score >= min_score)
            }),
        }
    }

    fn detect(&self, frame: &Frame) -> Vec<Detection> {
        let Some(detector) = &self.detector else {
            return Vec::new();
        };
        let mut guard = match detector.lock() {
            Ok(guard) => guard,
            Err(_) => {
                log::warn!("detector lock poisoned; treating frame as empty");
                return Vec::new();
            }
        };
        match guard.detect(frame.image()) {
            Ok(detections) => detections,
            Err(err) => {
                log::warn!(
                    "detector {} failed on frame {}: {err:#}",
                    guard.name(),
                    frame.sequence()
                );
                Vec::new()
            }
        }
    }
}

impl EvidenceSource for MlOverlay {
    fn name(&self) -> &'static str {
        "ml-overlay"
    }

    fn evaluate(&mut self, frame: &Frame) -> Result<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }
        let detections = self.detect(frame);
        Ok(self.accepts(&detections))
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::StubBackend;
    use image::RgbImage;
    use std::sync::{Arc, Mutex};

    fn frame() -> Frame {
        Frame::new(RgbImage::new(8, 8), 1)
    }

    fn shared(backend: StubBackend) -> SharedDetector {
        Arc::new(Mutex::new(backend))
    }

    fn filter(pairs: &[(&str, f64)]) -> LabelFilter {
        pairs.iter().map(|(l, s)| (l.to_string(), *s)).collect()
    }

    #[test]
    fn no_detector_never_fires() {
        let mut overlay = MlOverlay::new(None, None);
        assert!(!overlay.evaluate(&frame()).unwrap());
    }

    #[test]
    fn any_detection_fires_without_filter() {
        let detector = shared(StubBackend::returning(vec![Detection::new("kelp", 0.1)]));
        let mut overlay = MlOverlay::new(Some(detector), None);
        assert!(overlay.evaluate(&frame()).unwrap());

        let empty = shared(StubBackend::returning(vec![]));
        let mut overlay = MlOverlay::new(Some(empty), None);
        assert!(!overlay.evaluate(&frame()).unwrap());
    }

    #[test]
    fn filter_requires_label_and_minimum_score() {
        let overlay = MlOverlay::new(None, Some(filter(&[("boat", 0.6)])));
        assert!(!overlay.accepts(&[Detection::new("boat", 0.59)]));
        assert!(overlay.accepts(&[Detection::new("boat", 0.6)]));
        assert!(!overlay.accepts(&[Detection::new("whale", 0.99)]));
        assert!(overlay.accepts(&[
            Detection::new("whale", 0.99),
            Detection::new("boat", 0.8)
        ]));
    }

    #[test]
    fn detector_failure_counts_as_no_detections() {
        let stub = Arc::new(Mutex::new(StubBackend::failing("model offline")));
        let detector: SharedDetector = stub.clone();
        let mut overlay = MlOverlay::new(Some(detector), None);
        assert!(!overlay.evaluate(&frame()).unwrap());
        assert!(!overlay.evaluate(&frame()).unwrap());
        assert_eq!(stub.lock().unwrap().calls(), 2);
    }
}
