use std::path::PathBuf;

use float_ord::FloatOrd;
use image::DynamicImage;
use ndarray::{Axis, Ix2};
use ort::{inputs, ExecutionProviderDispatch, GraphOptimizationLevel, Session};
use tracing::instrument;

use crate::{
    error::Result,
    util::{letterbox, non_max_suppression, to_input_tensor},
    Detection, DetectionSource, DetectorThresholds, ExecutionProvider, ReadingError,
};

/// Number of box coordinates preceding the class scores in each prediction.
const BOX_VALUES: usize = 4;

/// YOLO style single-stage detector exported to ONNX.
pub struct YoloNet {
    session: Session,
    input_size: u32,
    labels: Vec<String>,
}

#[cfg(feature = "tensorrt")]
fn setup_tensorrt(cache_path: PathBuf, input_size: u32) -> ExecutionProviderDispatch {
    use ort::TensorRTExecutionProvider;

    let shape = format!("images:1x3x{input_size}x{input_size}");
    TensorRTExecutionProvider::default()
        .with_profile_min_shapes(shape.clone())
        .with_profile_max_shapes(shape.clone())
        .with_profile_opt_shapes(shape)
        .with_engine_cache(true)
        .with_engine_cache_path(cache_path.to_string_lossy())
        .with_timing_cache(true)
        .with_builder_optimization_level(5)
        .build()
}

#[cfg(feature = "cuda")]
fn setup_cuda() -> ExecutionProviderDispatch {
    use ort::CUDAExecutionProvider;

    CUDAExecutionProvider::default().build()
}

#[cfg(feature = "directml")]
fn setup_directml() -> ExecutionProviderDispatch {
    use ort::DirectMLExecutionProvider;

    DirectMLExecutionProvider::default().build()
}

#[cfg(feature = "coreml")]
fn setup_coreml() -> ExecutionProviderDispatch {
    use ort::CoreMLExecutionProvider;

    CoreMLExecutionProvider::default().build()
}

impl YoloNet {
    #[instrument(level = "debug", skip(labels))]
    pub fn init(
        path: PathBuf,
        num_threads: usize,
        input_size: u32,
        execution_providers: &[ExecutionProvider],
        cache_path: Option<PathBuf>,
        labels: Vec<String>,
    ) -> Result<Self> {
        #[cfg(feature = "directml")]
        let parallel = !execution_providers.contains(&ExecutionProvider::DirectML);
        #[cfg(not(feature = "directml"))]
        let parallel = true;

        #[cfg(feature = "tensorrt")]
        let cache_path = cache_path.unwrap_or_else(|| {
            path.parent()
                .map(|parent| parent.join(".cache"))
                .unwrap_or_else(|| PathBuf::from(".cache"))
        });
        #[cfg(not(feature = "tensorrt"))]
        let _ = cache_path;

        let execution_providers = execution_providers.iter().filter_map(
            |provider| -> Option<ExecutionProviderDispatch> {
                match provider {
                    ExecutionProvider::Default => None,
                    #[cfg(feature = "tensorrt")]
                    ExecutionProvider::TensorRT => {
                        Some(setup_tensorrt(cache_path.clone(), input_size))
                    }
                    #[cfg(feature = "coreml")]
                    ExecutionProvider::CoreML => Some(setup_coreml()),
                    #[cfg(feature = "cuda")]
                    ExecutionProvider::Cuda => Some(setup_cuda()),
                    #[cfg(feature = "directml")]
                    ExecutionProvider::DirectML => Some(setup_directml()),
                }
            },
        );

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_memory_pattern(parallel)?
            .with_parallel_execution(parallel)?
            .with_inter_threads(num_threads)?
            .with_intra_threads(num_threads)?
            .with_execution_providers(execution_providers)?
            .commit_from_file(path)?;

        log::debug!("YOLO session inputs: {:?}", session.inputs);
        log::debug!("YOLO session outputs: {:?}", session.outputs);

        Ok(Self {
            session,
            input_size,
            labels,
        })
    }

    fn label(&self, class: usize) -> String {
        self.labels
            .get(class)
            .cloned()
            .unwrap_or_else(|| class.to_string())
    }

    /// Runs the detector, returning boxes in `image` coordinates ordered by
    /// confidence, highest first.
    #[instrument(level = "debug", skip(self, image))]
    pub fn detect(
        &self,
        image: &DynamicImage,
        thresholds: DetectorThresholds,
    ) -> Result<Vec<Detection>> {
        let (letterboxed, mapping) = letterbox(image, self.input_size);
        let input_values = to_input_tensor(&letterboxed);
        let outputs = self.session.run(inputs!["images" => input_values]?)?;
        let output = outputs
            .first_key_value()
            .ok_or(ReadingError::MissingOutput)?
            .1
            .try_extract_tensor::<f32>()?;

        // [1, 4 + classes, anchors]
        let predictions = output.index_axis(Axis(0), 0).into_dimensionality::<Ix2>()?;
        let classes = predictions.len_of(Axis(0)).saturating_sub(BOX_VALUES);
        log::trace!("Output tensor size: {:?}", output.dim());

        let candidates = predictions
            .axis_iter(Axis(1))
            .filter_map(|prediction| {
                let (class, score) = (0..classes)
                    .map(|class| (class, prediction[BOX_VALUES + class]))
                    .max_by_key(|(_, score)| FloatOrd(*score))?;
                if score < thresholds.confidence {
                    return None;
                }
                let (cx, cy) = (prediction[0], prediction[1]);
                let (w, h) = (prediction[2], prediction[3]);
                if w <= 0.0 || h <= 0.0 {
                    return None;
                }
                Some(mapping.unproject(
                    Detection::from_corners(
                        cx - w / 2.0,
                        cy - h / 2.0,
                        cx + w / 2.0,
                        cy + h / 2.0,
                        self.label(class),
                        score,
                    ),
                ))
            })
            .collect::<Vec<_>>();

        let detections = non_max_suppression(candidates, thresholds.overlap);
        log::debug!("Detected {} boxes", detections.len());
        Ok(detections)
    }
}

impl DetectionSource for YoloNet {
    fn detect(&self, image: &DynamicImage, thresholds: DetectorThresholds) -> Result<Vec<Detection>> {
        YoloNet::detect(self, image, thresholds)
    }
}
