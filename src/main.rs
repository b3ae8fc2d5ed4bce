use std::{path::PathBuf, time::Instant};

use anyhow::Context;
use clap::Parser;
use meterocr::{visualize, DetectorThresholds, MeterReaderBuilder, ReaderOptions, ReadingError};
use serde::Serialize;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

/// Read the value shown on a segmented meter display.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Photo of the meter
    image: PathBuf,
    #[arg(long, default_value = "models/display_detection.onnx")]
    display_model: PathBuf,
    #[arg(long, default_value = "models/digit_recognition.onnx")]
    glyph_model: PathBuf,
    /// Glyph class names, one per line
    #[arg(long)]
    labels: Option<PathBuf>,
    #[arg(long, default_value_t = 4)]
    threads: usize,
    #[arg(long, default_value_t = 640)]
    input_size: u32,
    /// Minimum horizontal distance between two glyph centers
    #[arg(long, default_value_t = meterocr::DEFAULT_MIN_SEPARATION)]
    min_separation: f32,
    #[arg(long, default_value_t = 0.3)]
    glyph_confidence: f32,
    #[arg(long, default_value_t = 0.3)]
    glyph_overlap: f32,
    #[arg(long, default_value_t = 0.25)]
    display_confidence: f32,
    #[arg(long, default_value_t = 0.5)]
    display_overlap: f32,
    /// Crops with a smaller width/height ratio are read rotated both ways
    #[arg(long, default_value_t = 0.85)]
    portrait_max_ratio: f32,
    /// Crops with a larger width/height ratio are stretched to the warp size
    #[arg(long, default_value_t = 1.3)]
    landscape_min_ratio: f32,
    #[arg(long, default_value_t = 400)]
    warp_width: u32,
    #[arg(long, default_value_t = 150)]
    warp_height: u32,
    /// Write annotated debug images into this directory
    #[arg(long)]
    debug_dir: Option<PathBuf>,
}

impl Args {
    fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            min_separation: self.min_separation,
            portrait_max_ratio: self.portrait_max_ratio,
            landscape_min_ratio: self.landscape_min_ratio,
            warp_width: self.warp_width,
            warp_height: self.warp_height,
            display: DetectorThresholds {
                confidence: self.display_confidence,
                overlap: self.display_overlap,
            },
            glyphs: DetectorThresholds {
                confidence: self.glyph_confidence,
                overlap: self.glyph_overlap,
            },
        }
    }
}

#[derive(Serialize, Debug)]
struct Report {
    success: bool,
    reading: String,
    glyph_count: usize,
    mean_confidence: f32,
    candidate: Option<&'static str>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let options = args.reader_options();

    let mut builder = MeterReaderBuilder::new()
        .display_model(&args.display_model)
        .glyph_model(&args.glyph_model)
        .threads(args.threads)
        .input_size(args.input_size)
        .options(options);
    if let Some(labels) = &args.labels {
        builder = builder.glyph_labels(labels);
    }
    let reader = builder.build().context("Failed to load detection models")?;

    let photo = image::open(&args.image)
        .with_context(|| format!("Failed to open {}", args.image.display()))?;
    let start = Instant::now();
    let result = reader.read(&photo);
    log::debug!("{:?}", start.elapsed());

    let report = match result {
        Ok(reading) => {
            if let Some(dir) = &args.debug_dir {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
                visualize::draw_display(&photo, &reading.display)
                    .save(dir.join("debug_original.png"))?;
                let selection = &reading.selection;
                visualize::draw_glyphs(
                    &selection.candidate.image,
                    &selection.reading.annotated_detections,
                )
                .save(dir.join("debug_warp.png"))?;
            }
            let selection = reading.selection;
            Report {
                success: true,
                reading: if selection.reading.is_illegible() {
                    "illegible".to_string()
                } else {
                    selection.reading.text.clone()
                },
                glyph_count: selection.reading.glyph_count,
                mean_confidence: selection.reading.mean_confidence,
                candidate: Some(selection.candidate.transform.name()),
            }
        }
        Err(ReadingError::NoDisplayDetected | ReadingError::EmptyCrop) => Report {
            success: false,
            reading: "not detected".to_string(),
            glyph_count: 0,
            mean_confidence: 0.0,
            candidate: None,
        },
        Err(err) => return Err(err).context("Reading failed"),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
