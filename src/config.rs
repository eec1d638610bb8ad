//! Configuration.
//!
//! - `PrefilterAttributes`: the service attributes, deserialized from JSON/TOML.
//! - `RunConfig`: validated, resolved settings for one polling loop.
//! - `DaemonConfig`: file + environment configuration for `prefilterd`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::detect::{DetectorRegistry, SharedDetector};
use crate::error::config;
use crate::frame::Rect;
use crate::histogram::HistogramMode;
use crate::ingest::{camera_from_url, Camera, CameraConfig, CameraRegistry};
use crate::overlay::LabelFilter;
use crate::partition::{TileSize, DEFAULT_TILE_HEIGHT, DEFAULT_TILE_WIDTH, MAX_TILE_DIM};

pub const DEFAULT_MAX_FREQUENCY_HZ: f64 = 10.0;
pub const DEFAULT_THRESHOLD: f64 = 0.25;

const DEFAULT_CAMERA_NAME: &str = "camera";
const DEFAULT_CAMERA_URL: &str = "stub://camera";

/// Service attributes.
///
/// Zero for `max_frequency_hz` or `threshold` selects the default.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PrefilterAttributes {
    pub camera_name: String,
    pub detector_name: Option<String>,
    /// Label to minimum confidence for the ML overlay. Absent means any
    /// detection counts.
    pub chosen_labels: Option<HashMap<String, f64>>,
    pub max_frequency_hz: f64,
    pub threshold: f64,
    pub debug: bool,
    /// `[min_x, min_y, max_x, max_y]` in full-frame pixels, or empty.
    pub excluded_region: Vec<i32>,
    pub trigger_on_motion: bool,
    pub tile_width: Option<u32>,
    pub tile_height: Option<u32>,
    pub histogram_mode: HistogramMode,
}

impl PrefilterAttributes {
    pub fn for_camera(camera_name: impl Into<String>) -> Self {
        Self {
            camera_name: camera_name.into(),
            ..Self::default()
        }
    }

    /// Check required attributes and return the resource names this service
    /// depends on: the camera, then the detector if one is configured.
    pub fn validate(&self, path: &str) -> Result<Vec<String>> {
        if self.camera_name.is_empty() {
            return Err(config(format!(
                "expected \"camera_name\" attribute for object tracker {:?}",
                path
            )));
        }
        let mut deps = vec![self.camera_name.clone()];
        if let Some(detector) = self.detector_name.as_deref().filter(|d| !d.is_empty()) {
            deps.push(detector.to_string());
        }
        Ok(deps)
    }

    /// Polling frequency, with zero mapped to the default.
    pub fn resolved_frequency(&self) -> Result<f64> {
        if !self.max_frequency_hz.is_finite() || self.max_frequency_hz < 0.0 {
            return Err(config("max_frequency_hz must be a non-negative number"));
        }
        let frequency = if self.max_frequency_hz == 0.0 {
            DEFAULT_MAX_FREQUENCY_HZ
        } else {
            self.max_frequency_hz
        };
        if Duration::try_from_secs_f64(1.0 / frequency).is_err() {
            return Err(config(format!(
                "max_frequency_hz {} is too small to schedule",
                self.max_frequency_hz
            )));
        }
        Ok(frequency)
    }

    pub fn resolved_threshold(&self) -> Result<f64> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(config("threshold must be a number between 0 and 1"));
        }
        Ok(if self.threshold == 0.0 {
            DEFAULT_THRESHOLD
        } else {
            self.threshold
        })
    }

    pub fn excluded_zone(&self) -> Result<Option<Rect>> {
        match self.excluded_region.as_slice() {
            [] => Ok(None),
            &[min_x, min_y, max_x, max_y] => {
                if min_x < 0 || min_y < 0 || max_x < 0 || max_y < 0 {
                    return Err(config(format!(
                        "excluded_region corners must be non-negative pixel coordinates, got \
                         ({}, {}) and ({}, {})",
                        min_x, min_y, max_x, max_y
                    )));
                }
                if min_x > max_x || min_y > max_y {
                    return Err(config(format!(
                        "excluded_region upper left corner ({}, {}) must not be below or right of \
                         lower right corner ({}, {})",
                        min_x, min_y, max_x, max_y
                    )));
                }
                Ok(Some(Rect::new(min_x, min_y, max_x, max_y)))
            }
            other => Err(config(format!(
                "excluded_region must have four numbers that represent upper left and lower \
                 right corner of the excluded region in pixels. Instead got a list of {} elements",
                other.len()
            ))),
        }
    }

    pub fn tile_size(&self) -> Result<TileSize> {
        let tile = TileSize::new(
            self.tile_width.unwrap_or(DEFAULT_TILE_WIDTH),
            self.tile_height.unwrap_or(DEFAULT_TILE_HEIGHT),
        );
        if !(1..=MAX_TILE_DIM).contains(&tile.width) || !(1..=MAX_TILE_DIM).contains(&tile.height) {
            return Err(config(format!(
                "tile_width and tile_height must be between 1 and {}, got {}x{}",
                MAX_TILE_DIM, tile.width, tile.height
            )));
        }
        Ok(tile)
    }
}

/// Named resources a prefilter can be wired to.
#[derive(Clone, Default)]
pub struct Resources {
    pub cameras: CameraRegistry,
    pub detectors: DetectorRegistry,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Everything one polling loop needs, resolved and validated.
#[derive(Clone)]
pub struct RunConfig {
    pub camera_name: String,
    pub camera: Arc<dyn Camera>,
    pub detector: Option<SharedDetector>,
    pub chosen_labels: Option<LabelFilter>,
    pub frequency_hz: f64,
    period: Duration,
    pub threshold: f64,
    pub excluded: Option<Rect>,
    pub trigger_on_motion: bool,
    pub debug: bool,
    pub tile: TileSize,
    pub histogram_mode: HistogramMode,
}

impl RunConfig {
    pub fn build(attrs: &PrefilterAttributes, resources: &Resources) -> Result<Self> {
        attrs.validate("prefilter")?;
        let frequency_hz = attrs.resolved_frequency()?;
        let threshold = attrs.resolved_threshold()?;
        let excluded = attrs.excluded_zone()?;
        let tile = attrs.tile_size()?;

        let camera = resources.cameras.get(&attrs.camera_name).ok_or_else(|| {
            config(format!(
                "unable to get camera {} for ocean prefilter",
                attrs.camera_name
            ))
        })?;

        let detector = match attrs.detector_name.as_deref().filter(|d| !d.is_empty()) {
            None => None,
            Some(name) => {
                let detector = resources
                    .detectors
                    .get(name)
                    .ok_or_else(|| config(format!("unable to get detector {} for ocean prefilter", name)))?;
                if let Ok(mut guard) = detector.lock() {
                    guard.warm_up()?;
                }
                Some(detector)
            }
        };

        Ok(Self {
            camera_name: attrs.camera_name.clone(),
            camera,
            detector,
            chosen_labels: attrs.chosen_labels.clone(),
            frequency_hz,
            period: Duration::from_secs_f64(1.0 / frequency_hz),
            threshold,
            excluded,
            trigger_on_motion: attrs.trigger_on_motion,
            debug: attrs.debug,
            tile,
            histogram_mode: attrs.histogram_mode,
        })
    }

    /// Minimum time between the starts of two cycles.
    pub fn period(&self) -> Duration {
        self.period
    }
}

// ----------------------------------------------------------------------------
// Daemon configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
struct DaemonConfigFile {
    cameras: Option<Vec<CameraConfig>>,
    prefilter: Option<PrefilterAttributes>,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub cameras: Vec<CameraConfig>,
    pub attributes: PrefilterAttributes,
}

impl DaemonConfig {
    /// Load from the file named by `PREFILTER_CONFIG` (if set), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PREFILTER_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Like `load`, but with an explicit config file path.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: DaemonConfigFile) -> Self {
        let mut attributes = file.prefilter.unwrap_or_default();
        if attributes.camera_name.is_empty() {
            attributes.camera_name = DEFAULT_CAMERA_NAME.to_string();
        }
        let cameras = file.cameras.unwrap_or_else(|| {
            vec![CameraConfig::new(
                attributes.camera_name.clone(),
                DEFAULT_CAMERA_URL,
            )]
        });
        Self {
            cameras,
            attributes,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("PREFILTER_CAMERA_URL") {
            if !url.trim().is_empty() {
                let name = self.attributes.camera_name.clone();
                match self.cameras.iter_mut().find(|c| c.name == name) {
                    Some(camera) => camera.url = url,
                    None => self.cameras.push(CameraConfig::new(name, url)),
                }
            }
        }
        if let Ok(value) = std::env::var("PREFILTER_MAX_FREQUENCY_HZ") {
            self.attributes.max_frequency_hz = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("PREFILTER_MAX_FREQUENCY_HZ must be a number"))?;
        }
        if let Ok(value) = std::env::var("PREFILTER_THRESHOLD") {
            self.attributes.threshold = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("PREFILTER_THRESHOLD must be a number"))?;
        }
        if let Ok(value) = std::env::var("PREFILTER_DEBUG") {
            self.attributes.debug = parse_flag("PREFILTER_DEBUG", &value)?;
        }
        if let Ok(value) = std::env::var("PREFILTER_TRIGGER_ON_MOTION") {
            self.attributes.trigger_on_motion = parse_flag("PREFILTER_TRIGGER_ON_MOTION", &value)?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.attributes.validate("prefilterd")?;
        if let Some(detector) = self.attributes.detector_name.as_deref().filter(|d| !d.is_empty()) {
            return Err(config(format!(
                "detector_name {} cannot be used with prefilterd: detectors are registered \
                 through the library Resources API only",
                detector
            )));
        }
        self.attributes.resolved_frequency()?;
        self.attributes.resolved_threshold()?;
        self.attributes.excluded_zone()?;
        self.attributes.tile_size()?;
        if !self
            .cameras
            .iter()
            .any(|camera| camera.name == self.attributes.camera_name)
        {
            return Err(config(format!(
                "camera_name {} does not match any configured camera",
                self.attributes.camera_name
            )));
        }
        Ok(())
    }

    /// Build the camera registry from the configured camera URLs.
    pub fn resources(&self) -> Result<Resources> {
        let mut resources = Resources::new();
        for camera in &self.cameras {
            resources.cameras.register(camera_from_url(camera)?);
        }
        Ok(resources)
    }
}

fn read_config_file(path: &Path) -> Result<DaemonConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("{} must be a boolean (true/false)", key)),
    }
}
