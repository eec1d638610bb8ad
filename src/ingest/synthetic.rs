//! Synthetic marine scene (`stub://`) for tests and demos.
//!
//! Bright sky over dark, slightly noisy water. Every 50 frames the scene
//! toggles a light hull that drifts across the water, so a running loop sees
//! quiet stretches and change events.

use anyhow::Result;
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Camera, FrameStream};
use crate::cancel::CancelToken;
use crate::frame::Frame;

const SCENE_PERIOD: u64 = 50;
const NOISE_SEED: u64 = 0x5EA5_1DE0;

pub struct SyntheticCamera {
    name: String,
    width: u32,
    height: u32,
}

impl SyntheticCamera {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
        }
    }
}

impl Camera for SyntheticCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn open_stream(&self) -> Result<Box<dyn FrameStream>> {
        log::info!("camera {}: synthetic stream opened", self.name);
        Ok(Box::new(SyntheticStream {
            width: self.width,
            height: self.height,
            frame_count: 0,
            scene_state: 0,
            rng: StdRng::seed_from_u64(NOISE_SEED),
        }))
    }
}

struct SyntheticStream {
    width: u32,
    height: u32,
    frame_count: u64,
    scene_state: u8,
    rng: StdRng,
}

impl SyntheticStream {
    fn render(&mut self) -> RgbImage {
        let (width, height) = (self.width, self.height);
        let horizon = height * 2 / 5;
        let mut image = RgbImage::new(width, height);
        if width == 0 || height == 0 {
            return image;
        }
        for (_, y, pixel) in image.enumerate_pixels_mut() {
            *pixel = if y < horizon {
                let lift = (y * 20 / horizon.max(1)) as u8;
                Rgb([200 + lift, 210 + lift, 225 + lift / 2])
            } else {
                let noise: i16 = self.rng.gen_range(-3..=3);
                Rgb([
                    (20 + noise) as u8,
                    (48 + noise) as u8,
                    (72 + noise) as u8,
                ])
            };
        }

        if self.scene_state % 2 == 1 {
            let hull_w = (width / 12).max(1);
            let hull_h = ((height - horizon) / 10).max(1);
            let x0 = ((self.frame_count * 7) % u64::from(width)) as u32;
            let y0 = horizon + (height - horizon) / 2;
            for y in y0..(y0 + hull_h).min(height) {
                for x in x0..(x0 + hull_w).min(width) {
                    image.put_pixel(x, y, Rgb([235, 235, 230]));
                }
            }
        }
        image
    }
}

impl FrameStream for SyntheticStream {
    fn next_frame(&mut self, cancel: &CancelToken) -> Result<Option<Frame>> {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        self.frame_count += 1;
        if self.frame_count % SCENE_PERIOD == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let image = self.render();
        Ok(Some(Frame::new(image, self.frame_count)))
    }
}
