//! Horizon detection.
//!
//! The sky (or land) above the water is brighter than the sea in almost every
//! marine frame, so an Otsu split of the blurred grayscale image separates
//! the two. After closing small holes in the mask, the lowest foreground row
//! at each vertical edge marks the horizon on that side.

use anyhow::Result;
use image::{imageops, GrayImage, RgbImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::close;

use crate::error::geometry;
use crate::frame::Point;

/// Sigma OpenCV derives for a 3x3 Gaussian kernel.
const BLUR_SIGMA: f32 = 0.8;

/// L-infinity radius of the closing element (a 9x9 square).
const CLOSE_RADIUS: u8 = 4;

const FOREGROUND: u8 = 255;

/// Locate the horizon at the left and right image edges.
///
/// Returns `(0, y_left)` and `(width - 1, y_right)`. The two rows may differ
/// when the camera is rolled.
pub fn find_horizon(image: &RgbImage) -> Result<(Point, Point)> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(geometry(format!(
            "cannot find a horizon in an empty {}x{} image",
            width, height
        )));
    }

    let mask = horizon_mask(image);
    let right = width - 1;
    let mut y_left = 0u32;
    let mut y_right = 0u32;
    for y in 0..height {
        if mask.get_pixel(0, y)[0] == FOREGROUND {
            y_left = y;
        }
        if mask.get_pixel(right, y)[0] == FOREGROUND {
            y_right = y;
        }
    }

    Ok((
        Point::new(0, y_left as i32),
        Point::new(right as i32, y_right as i32),
    ))
}

/// Row below which the frame is treated as water.
///
/// Takes the lower of the two edge estimates and rejects lines hugging the
/// top or bottom of the image.
pub fn crop_line(image: &RgbImage) -> Result<u32> {
    let (left, right) = find_horizon(image)?;
    let crop_y = left.y.max(right.y);
    let height = image.height() as i32;
    if crop_y >= height - 1 || crop_y <= 1 {
        return Err(geometry(format!(
            "could not find horizon in image, got a horizon value of y = {}",
            crop_y
        )));
    }
    Ok(crop_y as u32)
}

/// Binary sky/water mask: 255 above the horizon, 0 below.
pub fn horizon_mask(image: &RgbImage) -> GrayImage {
    let gray = imageops::grayscale(image);
    let blurred = gaussian_blur_f32(&gray, BLUR_SIGMA);
    let level = otsu_level(&blurred);
    let binary = threshold(&blurred, level, ThresholdType::Binary);
    close(&binary, Norm::LInf, CLOSE_RADIUS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn sky_and_sea(width: u32, height: u32, horizon_left: u32, horizon_right: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let t = x as f32 / (width - 1) as f32;
            let horizon = horizon_left as f32 + t * (horizon_right as f32 - horizon_left as f32);
            if (y as f32) < horizon {
                Rgb([210, 220, 235])
            } else {
                Rgb([20, 45, 70])
            }
        })
    }

    #[test]
    fn level_horizon_is_found_near_the_boundary() {
        let image = sky_and_sea(320, 240, 100, 100);
        let (left, right) = find_horizon(&image).unwrap();
        assert_eq!(left.x, 0);
        assert_eq!(right.x, 319);
        assert!((left.y - 99).abs() <= 2, "left horizon at {}", left.y);
        assert!((right.y - 99).abs() <= 2, "right horizon at {}", right.y);
    }

    #[test]
    fn tilted_horizon_uses_lower_edge_for_crop() {
        let image = sky_and_sea(320, 240, 60, 140);
        let (left, right) = find_horizon(&image).unwrap();
        assert!(left.y < right.y);
        let crop = crop_line(&image).unwrap() as i32;
        assert_eq!(crop, right.y);
    }

    #[test]
    fn dark_notch_above_horizon_is_closed() {
        let mut image = sky_and_sea(200, 200, 120, 120);
        // dark hull just above the waterline at the left edge
        for y in 116..120 {
            for x in 0..3 {
                image.put_pixel(x, y, Rgb([15, 15, 15]));
            }
        }
        let (left, _) = find_horizon(&image).unwrap();
        assert!((left.y - 119).abs() <= 2, "left horizon at {}", left.y);
    }

    #[test]
    fn all_water_frame_has_no_usable_crop_line() {
        let image = RgbImage::from_pixel(64, 48, Rgb([30, 60, 90]));
        let err = crop_line(&image).unwrap_err();
        assert!(err.to_string().contains("horizon"));
    }

    #[test]
    fn empty_image_is_a_geometry_error() {
        let err = find_horizon(&RgbImage::new(0, 0)).unwrap_err();
        let kind = crate::error::PrefilterError::classify(&err).unwrap();
        assert_eq!(kind.code(), "GEOMETRY");
    }
}
