use anyhow::Result;
use image::RgbImage;

use crate::detect::result::Detection;

/// External object detector consulted by the ML overlay.
///
/// The prefilter never looks inside the model; it only reads the labels and
/// scores of whatever the backend reports for a frame.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, called once when a run configuration is built.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
