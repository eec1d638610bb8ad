//! prefilter_scan - offline change scan over a directory of stills
//!
//! Runs the histogram evidence over the images in file-name order and prints
//! one line per image: whether it changed relative to the previous image.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use ocean_prefilter::error::PrefilterError;
use ocean_prefilter::ingest::list_images;
use ocean_prefilter::{EvidenceSource, Frame, HistogramEvidence, HistogramMode, PrefilterAttributes};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory of JPEG/PNG frames.
    dir: PathBuf,
    /// KS threshold in [0, 1].
    #[arg(long, default_value_t = 0.25)]
    threshold: f64,
    /// Excluded region as min_x,min_y,max_x,max_y.
    #[arg(long, value_delimiter = ',', num_args = 4)]
    exclude: Vec<i32>,
    #[arg(long, default_value_t = 200)]
    tile_width: u32,
    #[arg(long, default_value_t = 80)]
    tile_height: u32,
    /// Per-channel histograms instead of grayscale.
    #[arg(long)]
    color: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let attrs = PrefilterAttributes {
        camera_name: "scan".to_string(),
        threshold: args.threshold,
        excluded_region: args.exclude.clone(),
        tile_width: Some(args.tile_width),
        tile_height: Some(args.tile_height),
        histogram_mode: if args.color {
            HistogramMode::Color
        } else {
            HistogramMode::Gray
        },
        ..PrefilterAttributes::default()
    };
    let excluded = attrs.excluded_zone()?;
    let threshold = attrs.resolved_threshold()?;
    let tile = attrs.tile_size()?;

    let mut evidence = HistogramEvidence::new(threshold, excluded, tile, attrs.histogram_mode);
    println!("{}", args.dir.display());
    for (index, path) in list_images(&args.dir)?.into_iter().enumerate() {
        let image = match image::open(&path) {
            Ok(image) => image.to_rgb8(),
            Err(err) => {
                println!("{}: decode error: {}", path.display(), err);
                continue;
            }
        };
        let frame = Frame::new(image, index as u64 + 1);
        match evidence.evaluate(&frame) {
            Ok(changed) => println!("{}: changed={}", path.display(), changed),
            Err(err) => {
                let code = PrefilterError::classify(&err).map_or("ERROR", |e| e.code());
                println!("{}: {} {:#}, resetting baseline", path.display(), code, err);
                evidence.reset();
            }
        }
    }
    Ok(())
}
