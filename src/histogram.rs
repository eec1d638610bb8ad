//! Fixed-bin intensity histograms.

use image::{imageops, RgbImage};
use serde::Deserialize;

/// Buckets per tile histogram: 8 intensity levels per bucket.
pub const TILE_BUCKETS: usize = 32;

/// Which histograms are built for each tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistogramMode {
    /// One luma histogram per tile.
    #[default]
    Gray,
    /// One histogram per R, G and B channel.
    Color,
}

impl HistogramMode {
    pub fn per_tile(&self) -> usize {
        match self {
            HistogramMode::Gray => 1,
            HistogramMode::Color => 3,
        }
    }
}

/// Equal-width buckets over `[min, max)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
    buckets: Vec<u64>,
    count: u64,
    min: f64,
    max: f64,
}

impl Histogram {
    /// Bucket `values` into `buckets` equal bins over `[min, max)`.
    ///
    /// Values outside the range are dropped and do not contribute to `count`.
    pub fn from_values<I>(buckets: usize, min: f64, max: f64, values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut hist = Self {
            buckets: vec![0; buckets],
            count: 0,
            min,
            max,
        };
        if buckets == 0 || max <= min {
            return hist;
        }
        let spacing = (max - min) / buckets as f64;
        for value in values {
            if !(min..max).contains(&value) {
                continue;
            }
            let index = (((value - min) / spacing) as usize).min(buckets - 1);
            hist.buckets[index] += 1;
            hist.count += 1;
        }
        hist
    }

    /// 32-bucket histogram over 8-bit samples.
    pub fn from_samples<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = u8>,
    {
        Self::from_values(
            TILE_BUCKETS,
            0.0,
            256.0,
            samples.into_iter().map(f64::from),
        )
    }

    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of samples that landed in a bucket.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn range(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// Empirical CDF at each bucket's upper edge.
    ///
    /// An empty histogram yields all zeros.
    pub fn ecdf(&self) -> Vec<f64> {
        if self.count == 0 {
            return vec![0.0; self.buckets.len()];
        }
        let total = self.count as f64;
        let mut cumulative = 0u64;
        self.buckets
            .iter()
            .map(|&bucket| {
                cumulative += bucket;
                cumulative as f64 / total
            })
            .collect()
    }
}

/// Histograms for one tile, in a fixed order (luma, or R/G/B).
pub fn tile_histograms(tile: &RgbImage, mode: HistogramMode) -> Vec<Histogram> {
    match mode {
        HistogramMode::Gray => {
            let gray = imageops::grayscale(tile);
            vec![Histogram::from_samples(gray.pixels().map(|p| p[0]))]
        }
        HistogramMode::Color => (0..3)
            .map(|channel| Histogram::from_samples(tile.pixels().map(|p| p[channel])))
            .collect(),
    }
}
