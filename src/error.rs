use std::path::PathBuf;

/// Errors returned while reading a meter display.
///
/// Only the model/runtime variants are fatal to a read. `UnrecognizedLabel`
/// is reported by label normalization and dropped by [`crate::classify`].
#[derive(thiserror::Error, Debug)]
pub enum ReadingError {
    #[error("no display detected")]
    NoDisplayDetected,
    #[error("display crop has zero area")]
    EmptyCrop,
    #[error("unrecognized glyph label {label:?}")]
    UnrecognizedLabel { label: String },
    #[error("failed to read labels from {path:?}")]
    Labels {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model produced no output tensor")]
    MissingOutput,
    #[error("unexpected model output shape")]
    OutputShape(#[from] ndarray::ShapeError),
    #[error(transparent)]
    Runtime(#[from] ort::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

pub type Result<T, E = ReadingError> = std::result::Result<T, E>;
