use std::{
    cmp::Reverse,
    path::{Path, PathBuf},
};

use float_ord::FloatOrd;
use image::DynamicImage;
use tracing::instrument;

mod assemble;
mod dedupe;
mod error;
mod glyph;
pub mod orientation;
mod result;
pub mod util;
pub mod visualize;
pub mod yolo;

pub use assemble::{assemble, read_glyphs};
pub use dedupe::{dedupe, DEFAULT_MIN_SEPARATION};
pub use error::{ReadingError, Result};
pub use glyph::{classify, resolve_separators};
pub use orientation::select_best_reading;
pub use result::*;
pub use util::crop_display;
use yolo::YoloNet;

pub use ort as runtime;

/// Anything that can locate glyphs (or displays) in an image.
///
/// `thresholds` are handed through untouched, their meaning belongs to the
/// detector.
pub trait DetectionSource {
    fn detect(&self, image: &DynamicImage, thresholds: DetectorThresholds)
        -> Result<Vec<Detection>>;
}

impl<F> DetectionSource for F
where
    F: Fn(&DynamicImage, DetectorThresholds) -> Result<Vec<Detection>>,
{
    fn detect(
        &self,
        image: &DynamicImage,
        thresholds: DetectorThresholds,
    ) -> Result<Vec<Detection>> {
        self(image, thresholds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorThresholds {
    pub confidence: f32,
    /// IoU above which the detector suppresses its own overlapping boxes.
    pub overlap: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReaderOptions {
    pub min_separation: f32,
    /// Crops narrower than this width/height ratio are treated as sideways.
    pub portrait_max_ratio: f32,
    /// Crops wider than this ratio are stretched to the warp size.
    pub landscape_min_ratio: f32,
    pub warp_width: u32,
    pub warp_height: u32,
    pub display: DetectorThresholds,
    pub glyphs: DetectorThresholds,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            min_separation: DEFAULT_MIN_SEPARATION,
            portrait_max_ratio: 0.85,
            landscape_min_ratio: 1.3,
            warp_width: 400,
            warp_height: 150,
            display: DetectorThresholds {
                confidence: 0.25,
                overlap: 0.5,
            },
            // A strict overlap works best together with `dedupe` on tightly
            // packed digits.
            glyphs: DetectorThresholds {
                confidence: 0.3,
                overlap: 0.3,
            },
        }
    }
}

pub struct MeterReaderBuilder {
    threads: usize,
    display_path: Option<PathBuf>,
    glyph_path: Option<PathBuf>,
    labels_path: Option<PathBuf>,
    input_size: u32,
    cache_path: Option<PathBuf>,
    execution_providers: Vec<ExecutionProvider>,
    options: ReaderOptions,
}

impl MeterReaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn display_model(mut self, path: impl Into<PathBuf>) -> Self {
        self.display_path = Some(path.into());
        self
    }

    pub fn glyph_model(mut self, path: impl Into<PathBuf>) -> Self {
        self.glyph_path = Some(path.into());
        self
    }

    /// Class names of the glyph model, one per line. Without it classes are
    /// named by their index.
    pub fn glyph_labels(mut self, path: impl Into<PathBuf>) -> Self {
        self.labels_path = Some(path.into());
        self
    }

    pub fn input_size(mut self, input_size: u32) -> Self {
        self.input_size = input_size;
        self
    }

    pub fn options(mut self, options: ReaderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_engine_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    pub fn with_execution_providers(
        mut self,
        providers: impl IntoIterator<Item = ExecutionProvider>,
    ) -> Self {
        self.execution_providers = providers.into_iter().collect();
        self
    }

    #[instrument(skip(self), level = "debug")]
    fn init_models(&mut self) -> Result<(YoloNet, YoloNet)> {
        let display_path = self
            .display_path
            .take()
            .unwrap_or_else(|| "models/display_detection.onnx".into());
        let glyph_path = self
            .glyph_path
            .take()
            .unwrap_or_else(|| "models/digit_recognition.onnx".into());
        let labels = self
            .labels_path
            .take()
            .map(|path| read_labels(&path))
            .transpose()?
            .unwrap_or_default();
        Ok((
            YoloNet::init(
                display_path,
                self.threads,
                self.input_size,
                &self.execution_providers,
                self.cache_path.clone(),
                Vec::new(),
            )?,
            YoloNet::init(
                glyph_path,
                self.threads,
                self.input_size,
                &self.execution_providers,
                self.cache_path.clone(),
                labels,
            )?,
        ))
    }

    #[instrument(skip(self))]
    pub fn build(mut self) -> Result<MeterReader> {
        let (display_model, glyph_model) = self.init_models()?;
        Ok(MeterReader::new(display_model, glyph_model, self.options))
    }
}

impl Default for MeterReaderBuilder {
    fn default() -> Self {
        Self {
            threads: 4,
            display_path: None,
            glyph_path: None,
            labels_path: None,
            input_size: 640,
            cache_path: None,
            execution_providers: DEFAULT_PROVIDERS.to_vec(),
            options: ReaderOptions::default(),
        }
    }
}

fn read_labels(path: &Path) -> Result<Vec<String>> {
    let labels = std::fs::read_to_string(path).map_err(|source| ReadingError::Labels {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(labels
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Reads meter displays with a display detector `D` and a glyph detector `G`.
pub struct MeterReader<D = YoloNet, G = YoloNet> {
    display_model: D,
    glyph_model: G,
    options: ReaderOptions,
}

impl<D: DetectionSource, G: DetectionSource> MeterReader<D, G> {
    pub fn new(display_model: D, glyph_model: G, options: ReaderOptions) -> Self {
        Self {
            display_model,
            glyph_model,
            options,
        }
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Most confident display region in the photo, if any.
    #[instrument(skip(self, photo))]
    pub fn locate_display(&self, photo: &DynamicImage) -> Result<Option<Detection>> {
        let displays = self.display_model.detect(photo, self.options.display)?;
        log::debug!("Display detector returned {} regions", displays.len());
        Ok(displays
            .into_iter()
            .min_by_key(|it| Reverse(FloatOrd(it.confidence))))
    }

    /// Reads an already cropped display.
    pub fn read_crop(&self, crop: &DynamicImage) -> Result<Selection> {
        select_best_reading(crop, &self.glyph_model, &self.options)
    }

    #[instrument(skip(self, photo))]
    pub fn read(&self, photo: &DynamicImage) -> Result<MeterReading> {
        let display = self
            .locate_display(photo)?
            .ok_or(ReadingError::NoDisplayDetected)?;
        let crop = crop_display(photo, &display)?;
        let selection = self.read_crop(&crop)?;
        Ok(MeterReading { display, selection })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionProvider {
    Default,
    #[cfg(feature = "tensorrt")]
    TensorRT,
    #[cfg(feature = "coreml")]
    CoreML,
    #[cfg(feature = "cuda")]
    Cuda,
    #[cfg(feature = "directml")]
    DirectML,
}

const DEFAULT_PROVIDERS: &[ExecutionProvider] = &[
    #[cfg(feature = "tensorrt")]
    ExecutionProvider::TensorRT,
    #[cfg(feature = "coreml")]
    ExecutionProvider::CoreML,
    #[cfg(feature = "directml")]
    ExecutionProvider::DirectML,
    #[cfg(feature = "cuda")]
    ExecutionProvider::Cuda,
    ExecutionProvider::Default,
];
