//! Frame ingestion sources.
//!
//! A `Camera` is a named resource that can open a `FrameStream`. The polling
//! loop owns the stream for its lifetime, pulls frames one at a time and
//! hands each frame back through `release` when the cycle is done.
//!
//! Sources shipped here:
//! - `stub://` synthetic sky/water scene (tests, demos)
//! - crossbeam channel fed by the embedding application
//! - directory of still images decoded with `image`
//!
//! Camera drivers (RTSP, V4L2) live outside this crate; anything that can
//! produce `RgbImage`s plugs in through `ChannelCamera` or its own `Camera` impl.

pub mod channel;
pub mod file;
pub mod synthetic;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::cancel::CancelToken;
use crate::frame::Frame;

pub use channel::ChannelCamera;
pub use file::{list_images, ImageDirCamera};
pub use synthetic::SyntheticCamera;

/// Live sequence of frames from one camera.
pub trait FrameStream: Send {
    /// Block until the next frame is available.
    ///
    /// Returns `Ok(None)` when `cancel` fires first. Source failures are
    /// `Stream` errors.
    fn next_frame(&mut self, cancel: &CancelToken) -> Result<Option<Frame>>;

    /// Hand a processed frame back to the source.
    fn release(&mut self, frame: Frame) {
        drop(frame);
    }
}

/// Named frame source.
pub trait Camera: Send + Sync {
    fn name(&self) -> &str;

    fn open_stream(&self) -> Result<Box<dyn FrameStream>>;
}

/// Camera entry in the daemon configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct CameraConfig {
    pub name: String,
    /// `stub://<label>` for the synthetic scene, or a local directory of stills.
    pub url: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Restart a still-image directory from the top instead of failing at the end.
    #[serde(default)]
    pub looping: bool,
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

impl CameraConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            width: default_width(),
            height: default_height(),
            looping: false,
        }
    }
}

/// Build a camera from its URL.
pub fn camera_from_url(config: &CameraConfig) -> Result<Arc<dyn Camera>> {
    if config.url.starts_with("stub://") {
        return Ok(Arc::new(SyntheticCamera::new(
            config.name.clone(),
            config.width,
            config.height,
        )));
    }
    if config.url.contains("://") {
        return Err(anyhow!(
            "camera '{}': unsupported url '{}' (expected stub:// or a local directory)",
            config.name,
            config.url
        ));
    }
    let dir = Path::new(&config.url);
    if !dir.is_dir() {
        return Err(anyhow!(
            "camera '{}': {} is not a directory",
            config.name,
            dir.display()
        ));
    }
    Ok(Arc::new(
        ImageDirCamera::new(config.name.clone(), dir).looping(config.looping),
    ))
}

/// Cameras available for lookup by name.
#[derive(Clone, Default)]
pub struct CameraRegistry {
    cameras: HashMap<String, Arc<dyn Camera>>,
}

impl CameraRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the camera's own name, replacing any previous entry.
    pub fn register(&mut self, camera: Arc<dyn Camera>) {
        self.cameras.insert(camera.name().to_string(), camera);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Camera>> {
        self.cameras.get(name).cloned()
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.cameras.keys().cloned().collect();
        names.sort();
        names
    }
}
