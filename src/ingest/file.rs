//! Directory-of-stills camera.
//!
//! Images are read in file-name order and decoded with `image`. Only local
//! paths are accepted. Running off the end of the directory is a `Stream`
//! error unless the camera loops.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::{Camera, FrameStream};
use crate::cancel::CancelToken;
use crate::error::stream;
use crate::frame::Frame;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Image files in `dir`, sorted by file name.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read image directory {}", dir.display()))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if path.is_file() && is_image {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

pub struct ImageDirCamera {
    name: String,
    dir: PathBuf,
    looping: bool,
}

impl ImageDirCamera {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            looping: false,
        }
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }
}

impl Camera for ImageDirCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn open_stream(&self) -> Result<Box<dyn FrameStream>> {
        let paths = list_images(&self.dir).map_err(|err| stream(format!("{err:#}")))?;
        if paths.is_empty() {
            return Err(stream(format!(
                "camera {}: no images in {}",
                self.name,
                self.dir.display()
            )));
        }
        log::info!(
            "camera {}: streaming {} images from {}",
            self.name,
            paths.len(),
            self.dir.display()
        );
        Ok(Box::new(ImageDirStream {
            camera: self.name.clone(),
            paths,
            next: 0,
            looping: self.looping,
            sequence: 0,
        }))
    }
}

struct ImageDirStream {
    camera: String,
    paths: Vec<PathBuf>,
    next: usize,
    looping: bool,
    sequence: u64,
}

impl FrameStream for ImageDirStream {
    fn next_frame(&mut self, cancel: &CancelToken) -> Result<Option<Frame>> {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        if self.next >= self.paths.len() {
            if !self.looping {
                return Err(stream(format!(
                    "camera {}: reached end of image directory",
                    self.camera
                )));
            }
            self.next = 0;
        }
        let path = &self.paths[self.next];
        self.next += 1;
        let image = image::open(path)
            .map_err(|err| stream(format!("failed to decode {}: {}", path.display(), err)))?
            .to_rgb8();
        self.sequence += 1;
        Ok(Some(Frame::new(image, self.sequence)))
    }
}
