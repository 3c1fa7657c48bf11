use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use phantom_cine_rs::cine_pipeline::{
    CineToDocumentPipeline, ConversionConfig, FrameLayout, TiffCompression,
};
use phantom_cine_rs::logger;

use tracing::{info, warn};

/// Convert a Phantom .cine recording into a hierarchical document.
#[derive(Parser, Debug)]
#[command(name = "cine-convert")]
#[command(version)]
struct Args {
    /// Input .cine file
    input: PathBuf,

    /// Output directory (defaults to the input path with a .cinedoc extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Frame offsets point straight at pixel data (no annotation blocks)
    #[arg(long)]
    bare_frames: bool,

    /// Offset-table index of the first frame to convert
    #[arg(long)]
    first: Option<usize>,

    /// Number of frames to convert
    #[arg(long)]
    count: Option<usize>,

    /// Compression for the image stack
    #[arg(long, value_enum, default_value_t = TiffCompression::None)]
    compression: TiffCompression,

    /// Use horizontal differencing before compression
    #[arg(long)]
    predictor: bool,

    /// Log progress every N frames (0 disables)
    #[arg(long, default_value_t = 500)]
    progress_interval: usize,
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("cinedoc"));

    let frame_range = match (args.first, args.count) {
        (None, None) => None,
        (first, count) => Some((first.unwrap_or(0), count.unwrap_or(usize::MAX))),
    };

    let config = ConversionConfig::builder()
        .frame_layout(if args.bare_frames {
            FrameLayout::Bare
        } else {
            FrameLayout::Annotated
        })
        .frame_range(frame_range)
        .compression(args.compression)
        .predictor(args.predictor.then_some(2))
        .progress_interval(args.progress_interval)
        .build();
    let pipeline = CineToDocumentPipeline::new(config);

    info!("Compression: {:?}", pipeline.config().compression);
    info!("Frame layout: {:?}", pipeline.config().frame_layout);

    let report = pipeline
        .convert_file(&args.input, &output)
        .with_context(|| format!("converting {}", args.input.display()))?;

    if report.is_partial() {
        warn!("Conversion finished with skipped data:\n{}", report);
    } else {
        info!("Conversion successful: {}", report);
    }
    info!(output = %output.display(), "Done");

    Ok(())
}
