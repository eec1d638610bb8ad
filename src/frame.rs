//! Frames and integer geometry.
//!
//! - `Frame`: immutable RGB image handed from a stream to the polling loop.
//! - `Point` / `Rect`: half-open integer rectangles for tiles and the excluded zone.
//! - `LatestFrame`: single-slot holder for the last processed frame (capture queries).

use image::RgbImage;
use std::sync::{Arc, Mutex};
use std::time::Instant;

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One captured frame.
///
/// Pixels sit behind an `Arc` so the capture slot can keep the last frame
/// without copying it; the frame itself is never mutated after capture.
#[derive(Clone, Debug)]
pub struct Frame {
    image: Arc<RgbImage>,
    sequence: u64,
    captured_at: Instant,
}

impl Frame {
    pub fn new(image: RgbImage, sequence: u64) -> Self {
        Self {
            image: Arc::new(image),
            sequence,
            captured_at: Instant::now(),
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn shared_image(&self) -> Arc<RgbImage> {
        Arc::clone(&self.image)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Position of this frame in its stream (starts at 1).
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn age_ms(&self) -> u128 {
        self.captured_at.elapsed().as_millis()
    }
}

// ----------------------------------------------------------------------------
// Geometry
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle covering `[min.x, max.x) x [min.y, max.y)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub const fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self {
            min: Point::new(min_x, min_y),
            max: Point::new(max_x, max_y),
        }
    }

    pub fn width(&self) -> i32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> i32 {
        self.max.y - self.min.y
    }

    /// A rectangle with no area contains no points.
    pub fn is_empty(&self) -> bool {
        self.min.x >= self.max.x || self.min.y >= self.max.y
    }

    /// True when the two rectangles share at least one pixel.
    pub fn overlaps(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.min.x.saturating_add(dx),
            self.min.y.saturating_add(dy),
            self.max.x.saturating_add(dx),
            self.max.y.saturating_add(dy),
        )
    }

    /// Clip to `[0, width) x [0, height)`.
    pub fn clamp_to(&self, width: u32, height: u32) -> Rect {
        let w = width as i32;
        let h = height as i32;
        Rect::new(
            self.min.x.clamp(0, w),
            self.min.y.clamp(0, h),
            self.max.x.clamp(0, w),
            self.max.y.clamp(0, h),
        )
    }
}

// ----------------------------------------------------------------------------
// LatestFrame: last processed frame for capture queries
// ----------------------------------------------------------------------------

/// Holds the image of the most recently processed frame.
///
/// Written once per cycle by the polling loop, read by capture queries.
#[derive(Clone, Default)]
pub struct LatestFrame {
    slot: Arc<Mutex<Option<Arc<RgbImage>>>>,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, frame: &Frame) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(frame.shared_image());
        }
    }

    pub fn get(&self) -> Option<Arc<RgbImage>> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_open_rects_touching_do_not_overlap() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(10, 0, 20, 10);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&Rect::new(9, 9, 11, 11)));
    }

    #[test]
    fn empty_rect_overlaps_nothing() {
        let empty = Rect::new(5, 5, 5, 20);
        assert!(empty.is_empty());
        assert!(!empty.overlaps(&Rect::new(0, 0, 100, 100)));
        assert!(!Rect::new(0, 0, 100, 100).overlaps(&empty));
    }

    #[test]
    fn translate_and_clamp() {
        let zone = Rect::new(250, 350, 580, 480).translate(0, -300);
        assert_eq!(zone, Rect::new(250, 50, 580, 180));
        assert_eq!(zone.clamp_to(640, 100), Rect::new(250, 50, 580, 100));
        let far = Rect::new(0, i32::MIN, 10, 10).translate(0, -200);
        assert_eq!(far, Rect::new(0, i32::MIN, 10, -190));
    }

    #[test]
    fn latest_frame_keeps_most_recent_image() {
        let latest = LatestFrame::new();
        assert!(latest.get().is_none());

        latest.store(&Frame::new(RgbImage::new(4, 2), 1));
        latest.store(&Frame::new(RgbImage::new(8, 2), 2));
        assert_eq!(latest.get().map(|img| img.width()), Some(8));

        latest.clear();
        assert!(latest.get().is_none());
    }
}
