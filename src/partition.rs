//! Spatial partitioning of the water region into fixed-size tiles.
//!
//! Tiles are produced row-major from the crop line down. Their order and
//! count depend only on the frame size, crop line and excluded zone, so tile
//! `i` of one frame lines up with tile `i` of the next.

use anyhow::Result;
use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::error::geometry;
use crate::frame::Rect;

pub const DEFAULT_TILE_WIDTH: u32 = 200;
pub const DEFAULT_TILE_HEIGHT: u32 = 80;
/// Largest accepted tile width or height.
pub const MAX_TILE_DIM: u32 = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileSize {
    pub width: u32,
    pub height: u32,
}

impl TileSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for TileSize {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_WIDTH, DEFAULT_TILE_HEIGHT)
    }
}

/// One tile of the cropped frame.
#[derive(Clone, Debug)]
pub struct Tile {
    /// Nominal bounds in cropped-frame coordinates (before edge clamping).
    pub bounds: Rect,
    /// Pixels, always exactly `TileSize` in dimension.
    pub image: RgbImage,
    /// True when the tile was clamped at the frame edge and resampled.
    pub resampled: bool,
}

/// Split the region below `crop_y` into tiles, skipping the excluded zone.
///
/// `excluded` is given in full-frame coordinates; it is shifted by `-crop_y`
/// before the overlap test. Tiles are tested against the zone using their
/// nominal bounds, so a clamped edge tile is dropped exactly when its full
/// footprint would have touched the zone.
pub fn partition(
    frame: &RgbImage,
    excluded: Option<Rect>,
    crop_y: u32,
    tile: TileSize,
) -> Result<Vec<Tile>> {
    if !(1..=MAX_TILE_DIM).contains(&tile.width) || !(1..=MAX_TILE_DIM).contains(&tile.height) {
        return Err(geometry(format!(
            "tile size must be between 1 and {}, got {}x{}",
            MAX_TILE_DIM, tile.width, tile.height
        )));
    }
    let (width, height) = frame.dimensions();
    if width == 0 {
        return Err(geometry("cannot partition a frame with zero width"));
    }
    if crop_y >= height {
        return Err(geometry(format!(
            "crop line y = {} leaves no rows in a frame of height {}",
            crop_y, height
        )));
    }

    let cropped_height = height - crop_y;
    let excluded = excluded.map(|zone| zone.translate(0, -(crop_y as i32)));

    let rows = cropped_height.div_ceil(tile.height);
    let cols = width.div_ceil(tile.width);
    let mut tiles = Vec::with_capacity((rows * cols) as usize);

    for row in 0..rows {
        for col in 0..cols {
            let bounds = tile_bounds(col, row, tile)?;
            if excluded.is_some_and(|zone| bounds.overlaps(&zone)) {
                continue;
            }

            let clamped = bounds.clamp_to(width, cropped_height);
            let view = imageops::crop_imm(
                frame,
                clamped.min.x as u32,
                crop_y + clamped.min.y as u32,
                clamped.width() as u32,
                clamped.height() as u32,
            );
            let resampled = clamped != bounds;
            let image = if resampled {
                imageops::resize(&*view, tile.width, tile.height, FilterType::Lanczos3)
            } else {
                view.to_image()
            };
            tiles.push(Tile {
                bounds,
                image,
                resampled,
            });
        }
    }

    Ok(tiles)
}

/// Nominal bounds of the tile at `(col, row)`, failing instead of overflowing.
fn tile_bounds(col: u32, row: u32, tile: TileSize) -> Result<Rect> {
    let span = |index: u32, size: u32| -> Option<(i32, i32)> {
        let start = index.checked_mul(size)?;
        let end = start.checked_add(size)?;
        Some((i32::try_from(start).ok()?, i32::try_from(end).ok()?))
    };
    match (span(col, tile.width), span(row, tile.height)) {
        (Some((x0, x1)), Some((y0, y1))) => Ok(Rect::new(x0, y0, x1, y1)),
        _ => Err(geometry(format!(
            "tile ({}, {}) of size {}x{} is outside the addressable frame",
            col, row, tile.width, tile.height
        ))),
    }
}
