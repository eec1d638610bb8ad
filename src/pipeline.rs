//! Per-frame decision pipeline.
//!
//! Evidence sources vote on each frame; their votes (plus the optional
//! motion fallback) are OR'd and debounced by the trigger machine.

use anyhow::Result;

use crate::change::ChangeDetector;
use crate::config::RunConfig;
use crate::error::PrefilterError;
use crate::frame::{Frame, Rect};
use crate::histogram::{tile_histograms, HistogramMode};
use crate::horizon::crop_line;
use crate::overlay::MlOverlay;
use crate::partition::{partition, TileSize};
use crate::trigger::TriggerMachine;

/// Something that can vote "interesting" for a frame.
pub trait EvidenceSource: Send {
    fn name(&self) -> &'static str;

    /// Vote on `frame`. `Geometry` and `Comparability` errors mark the cycle
    /// inconclusive for this source; other errors stop the loop.
    fn evaluate(&mut self, frame: &Frame) -> Result<bool>;

    /// Drop any state carried between frames.
    fn reset(&mut self);
}

/// Horizon crop, tiling, histograms and KS comparison against the previous frame.
pub struct HistogramEvidence {
    excluded: Option<Rect>,
    tile: TileSize,
    mode: HistogramMode,
    detector: ChangeDetector,
    debug: bool,
}

impl HistogramEvidence {
    pub fn new(threshold: f64, excluded: Option<Rect>, tile: TileSize, mode: HistogramMode) -> Self {
        Self {
            excluded,
            tile,
            mode,
            detector: ChangeDetector::new(threshold),
            debug: false,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn has_baseline(&self) -> bool {
        self.detector.has_baseline()
    }
}

impl EvidenceSource for HistogramEvidence {
    fn name(&self) -> &'static str {
        "histogram"
    }

    fn evaluate(&mut self, frame: &Frame) -> Result<bool> {
        let crop_y = crop_line(frame.image())?;
        let tiles = partition(frame.image(), self.excluded, crop_y, self.tile)?;
        let histograms = tiles
            .iter()
            .flat_map(|tile| tile_histograms(&tile.image, self.mode))
            .collect();
        let report = self.detector.compare(histograms)?;
        if self.debug {
            log::debug!(
                "frame {} ({}ms old): horizon y={} tiles={} changed={:?} max_ks={:.3} threshold={}",
                frame.sequence(),
                frame.age_ms(),
                crop_y,
                tiles.len(),
                report.changed,
                report.max_score(),
                self.detector.threshold()
            );
        }
        Ok(report.triggered())
    }

    fn reset(&mut self) {
        self.detector.reset();
    }
}

/// What one cycle decided.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Some source voted yes.
    pub evidence: bool,
    /// An inconclusive cycle fired the motion fallback.
    pub fallback: bool,
    /// Debounced trigger state after this cycle.
    pub active: bool,
}

pub struct Pipeline {
    sources: Vec<Box<dyn EvidenceSource>>,
    machine: TriggerMachine,
    motion_fallback: bool,
    debug: bool,
}

impl Pipeline {
    pub fn new(sources: Vec<Box<dyn EvidenceSource>>, motion_fallback: bool) -> Self {
        Self {
            sources,
            machine: TriggerMachine::new(),
            motion_fallback,
            debug: false,
        }
    }

    /// Histogram evidence, then the ML overlay when a detector is configured.
    pub fn from_config(config: &RunConfig) -> Self {
        let mut sources: Vec<Box<dyn EvidenceSource>> = vec![Box::new(
            HistogramEvidence::new(
                config.threshold,
                config.excluded,
                config.tile,
                config.histogram_mode,
            )
            .with_debug(config.debug),
        )];
        if config.detector.is_some() {
            sources.push(Box::new(MlOverlay::new(
                config.detector.clone(),
                config.chosen_labels.clone(),
            )));
        }
        let mut pipeline = Self::new(sources, config.trigger_on_motion);
        pipeline.debug = config.debug;
        pipeline
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub fn run_cycle(&mut self, frame: &Frame) -> Result<CycleOutcome> {
        let mut outcome = CycleOutcome::default();
        for source in self.sources.iter_mut() {
            match source.evaluate(frame) {
                Ok(vote) => outcome.evidence |= vote,
                Err(err) => {
                    let transient = PrefilterError::classify(&err).is_some_and(|e| e.is_transient());
                    if !transient {
                        return Err(err.context(format!("{} evidence failed", source.name())));
                    }
                    log::info!("resetting {} baseline: {err:#}", source.name());
                    source.reset();
                    if self.motion_fallback {
                        outcome.fallback = true;
                    }
                }
            }
        }

        outcome.active = self.machine.step(outcome.evidence || outcome.fallback);
        if self.debug && outcome.active {
            log::debug!("frame {}: TRIGGER is true", frame.sequence());
        }
        Ok(outcome)
    }
}
