//! `Prefilter` service facade.
//!
//! Owns the shared trigger flag and at most one supervised polling loop.
//! Queries read the flag without touching the pipeline.

use std::sync::{Arc, Mutex, RwLock};

use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::cancel::CancelToken;
use crate::config::{PrefilterAttributes, Resources, RunConfig};
use crate::frame::LatestFrame;
use crate::runner::LoopHandle;
use crate::trigger::{TriggerFlag, TRIGGER_LABEL};

/// One class label with its confidence.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    pub label: String,
    pub confidence: f64,
}

/// What `capture_all_from_camera` should return.
#[derive(Clone, Copy, Debug, Default)]
pub struct CaptureOptions {
    pub return_image: bool,
    pub return_classifications: bool,
}

#[derive(Clone, Debug, Default)]
pub struct VisCapture {
    pub image: Option<Arc<RgbImage>>,
    pub classifications: Option<Vec<Classification>>,
}

/// Capabilities reported to clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Properties {
    pub classifications_supported: bool,
    pub detections_supported: bool,
    pub object_point_clouds_supported: bool,
}

struct LoopState {
    camera_name: String,
    cancel: CancelToken,
}

pub struct Prefilter {
    trigger: TriggerFlag,
    latest: LatestFrame,
    state: RwLock<LoopState>,
    worker: Mutex<Option<LoopHandle>>,
}

impl Prefilter {
    /// Build and start a prefilter.
    pub fn new(attrs: &PrefilterAttributes, resources: &Resources) -> Result<Self> {
        let prefilter = Self {
            trigger: TriggerFlag::new(),
            latest: LatestFrame::new(),
            state: RwLock::new(LoopState {
                camera_name: String::new(),
                cancel: CancelToken::cancelled(),
            }),
            worker: Mutex::new(None),
        };
        prefilter.reconfigure(attrs, resources)?;
        Ok(prefilter)
    }

    /// Stop the running loop (waiting for it to exit), reset the trigger,
    /// then start a loop with the new settings.
    ///
    /// On a configuration error no loop is left running and queries fail
    /// until the next successful reconfigure.
    pub fn reconfigure(&self, attrs: &PrefilterAttributes, resources: &Resources) -> Result<()> {
        let mut worker = self
            .worker
            .lock()
            .map_err(|_| anyhow!("prefilter worker lock poisoned"))?;
        if let Some(handle) = worker.take() {
            handle.stop()?;
        }
        self.trigger.set(false);
        self.latest.clear();

        let config = RunConfig::build(attrs, resources)?;
        let camera_name = config.camera_name.clone();
        let handle = LoopHandle::spawn(config, self.trigger.clone(), self.latest.clone())?;
        {
            let mut state = self
                .state
                .write()
                .map_err(|_| anyhow!("prefilter state lock poisoned"))?;
            state.camera_name = camera_name.clone();
            state.cancel = handle.token();
        }
        *worker = Some(handle);
        log::info!("prefilter configured for camera {}", camera_name);
        Ok(())
    }

    /// `TRIGGER` with confidence 1.0 while the trigger is active, otherwise empty.
    pub fn classifications(&self) -> Result<Vec<Classification>> {
        self.ensure_running()?;
        Ok(self.current_classifications())
    }

    pub fn classifications_from_camera(&self, camera_name: &str) -> Result<Vec<Classification>> {
        self.check_camera(camera_name)?;
        self.classifications()
    }

    /// Latest processed frame and/or classifications for `camera_name`.
    pub fn capture_all_from_camera(
        &self,
        camera_name: &str,
        options: CaptureOptions,
    ) -> Result<VisCapture> {
        self.check_camera(camera_name)?;
        self.ensure_running()?;
        let mut capture = VisCapture::default();
        if options.return_image {
            capture.image = self.latest.get();
        }
        if options.return_classifications {
            capture.classifications = Some(self.current_classifications());
        }
        Ok(capture)
    }

    pub fn properties(&self) -> Properties {
        Properties {
            classifications_supported: true,
            detections_supported: false,
            object_point_clouds_supported: false,
        }
    }

    pub fn camera_name(&self) -> String {
        self.state
            .read()
            .map(|state| state.camera_name.clone())
            .unwrap_or_default()
    }

    /// Raw trigger state, for callers that poll without the classification wrapper.
    pub fn is_triggered(&self) -> bool {
        self.trigger.is_active()
    }

    /// Stop the loop and wait for it. Later queries fail.
    pub fn close(&self) -> Result<()> {
        let mut worker = self
            .worker
            .lock()
            .map_err(|_| anyhow!("prefilter worker lock poisoned"))?;
        if let Some(handle) = worker.take() {
            handle.stop()?;
        }
        self.trigger.set(false);
        Ok(())
    }

    fn current_classifications(&self) -> Vec<Classification> {
        if self.trigger.is_active() {
            vec![Classification {
                label: TRIGGER_LABEL.to_string(),
                confidence: 1.0,
            }]
        } else {
            Vec::new()
        }
    }

    fn ensure_running(&self) -> Result<()> {
        let state = self
            .state
            .read()
            .map_err(|_| anyhow!("prefilter state lock poisoned"))?;
        if state.cancel.is_cancelled() {
            return Err(anyhow!(
                "lost connection with background camera stream loop"
            ));
        }
        Ok(())
    }

    fn check_camera(&self, camera_name: &str) -> Result<()> {
        let configured = self.camera_name();
        if camera_name != configured {
            return Err(anyhow!(
                "camera name given to method, {} is not the same as configured camera {}",
                camera_name,
                configured
            ));
        }
        Ok(())
    }
}

impl Drop for Prefilter {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("prefilter close on drop failed: {err:#}");
        }
    }
}
