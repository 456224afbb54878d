//! Segment a city street network and optionally attach point features.
//!
//! ```text
//! cargo run --release --example segment_city -- <network.geojson> <output-dir> \
//!     [--points points.json] [--config config.json]
//! ```
//!
//! Set `RUST_LOG=info` to follow progress.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::error;
use street_segmenter::{attach_point_features, io, segment_network, Result, SegmentationConfig};

#[derive(Parser)]
#[command(name = "segment_city", about = "Split a street network into intersections and segments")]
struct Cli {
    /// WGS84 GeoJSON with road lines and junction points
    network: PathBuf,
    /// Directory the GeoJSON outputs are written to
    output_dir: PathBuf,
    /// JSON array of point features to snap onto the result
    #[arg(long)]
    points: Option<PathBuf>,
    /// JSON segmentation config; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => SegmentationConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => SegmentationConfig::default(),
    };

    let network = io::read_network(&cli.network)?;
    let mut segmentation = segment_network(&network, &config)?;

    let snapped = match &cli.points {
        Some(path) => {
            let points = io::read_point_features(path)?;
            Some(attach_point_features(&mut segmentation, points, &config)?)
        }
        None => None,
    };

    io::write_segments(&cli.output_dir, &segmentation)?;
    if let Some(snapped) = snapped {
        io::write_snapped_points(cli.output_dir.join("snapped_points.json"), &snapped)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    pretty_env_logger::init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
