//! Ocean Prefilter
//!
//! Cheap change detection for marine camera streams. A background loop pulls
//! frames at a bounded rate and decides whether anything is happening on the
//! water, so an expensive downstream detector only runs on flagged frames.
//!
//! # Pipeline
//!
//! 1. **Horizon**: Otsu split of the blurred frame; everything below the
//!    lower edge estimate is water.
//! 2. **Tiles**: the water region is cut into fixed-size tiles, skipping an
//!    optional excluded zone (e.g. the boat's own deck).
//! 3. **Histograms**: one 32-bucket intensity histogram per tile (or per
//!    channel in colour mode).
//! 4. **Change**: KS statistic between each tile's ECDF and the same tile in
//!    the previous frame; any tile at or above the threshold is evidence.
//! 5. **Trigger**: histogram evidence, an optional object-detector overlay
//!    and the optional motion fallback are OR'd, then held for four cycles.
//!
//! # Module Structure
//!
//! - `horizon`, `partition`, `histogram`, `change`: frame analysis
//! - `overlay`, `pipeline`, `trigger`: evidence and debounce
//! - `runner`, `cancel`: background loop and cancellation
//! - `service`: the `Prefilter` facade queried by clients
//! - `config`, `ingest`, `detect`: configuration and pluggable resources

pub mod cancel;
pub mod change;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod histogram;
pub mod horizon;
pub mod ingest;
pub mod overlay;
pub mod partition;
pub mod pipeline;
pub mod runner;
pub mod service;
pub mod trigger;

pub use config::{DaemonConfig, PrefilterAttributes, Resources, RunConfig};
pub use detect::{Detection, DetectorBackend, DetectorRegistry, StubBackend};
pub use error::PrefilterError;
pub use frame::{Frame, LatestFrame, Point, Rect};
pub use histogram::{Histogram, HistogramMode};
pub use ingest::{Camera, CameraConfig, CameraRegistry, FrameStream};
pub use pipeline::{CycleOutcome, EvidenceSource, HistogramEvidence, Pipeline};
pub use service::{CaptureOptions, Classification, Prefilter, Properties, VisCapture};
pub use trigger::{TriggerFlag, TriggerMachine, TRIGGER_COUNTDOWN, TRIGGER_LABEL};
