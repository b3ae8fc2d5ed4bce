use std::cmp::Reverse;

use float_ord::FloatOrd;
use image::{imageops, imageops::FilterType, DynamicImage, Pixel, Rgb, RgbImage};
use ndarray::Array4;
use tracing::instrument;

use crate::{error::Result, Detection, ReadingError};

/// Converts an image to a `1x3xHxW` tensor with channels scaled to `[0, 1]`.
#[instrument(level = "debug", skip(image))]
pub(crate) fn to_input_tensor(image: &DynamicImage) -> Array4<f32> {
    let image = image.to_rgb32f();
    Array4::<f32>::from_shape_fn(
        (1, 3, image.height() as usize, image.width() as usize),
        |(_, ch, y, x)| image.get_pixel(x as u32, y as u32).channels()[ch],
    )
}

const LETTERBOX_FILL: Rgb<u8> = Rgb([114, 114, 114]);

/// Mapping between an image and its letterboxed model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    /// Maps a box from model input coordinates back onto the source image.
    pub fn unproject(&self, detection: Detection) -> Detection {
        let min = detection.bounds.min();
        let max = detection.bounds.max();
        Detection::from_corners(
            (min.x - self.pad_x) / self.scale,
            (min.y - self.pad_y) / self.scale,
            (max.x - self.pad_x) / self.scale,
            (max.y - self.pad_y) / self.scale,
            detection.label,
            detection.confidence,
        )
    }
}

/// Fits `image` into a `size`x`size` square without changing its aspect
/// ratio, centering it on a grey background.
#[instrument(level = "debug", skip(image))]
pub(crate) fn letterbox(image: &DynamicImage, size: u32) -> (DynamicImage, Letterbox) {
    let scale = (size as f32 / image.width() as f32).min(size as f32 / image.height() as f32);
    let width = ((image.width() as f32 * scale).round() as u32).clamp(1, size);
    let height = ((image.height() as f32 * scale).round() as u32).clamp(1, size);
    let pad_x = (size - width) / 2;
    let pad_y = (size - height) / 2;

    let resized = image.resize_exact(width, height, FilterType::Triangle).to_rgb8();
    let mut canvas = RgbImage::from_pixel(size, size, LETTERBOX_FILL);
    imageops::overlay(&mut canvas, &resized, pad_x as i64, pad_y as i64);
    log::trace!(
        "Letterboxed {}x{} to {width}x{height} at ({pad_x}, {pad_y})",
        image.width(),
        image.height()
    );
    (
        DynamicImage::ImageRgb8(canvas),
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        },
    )
}

/// Greedy class-aware suppression of overlapping boxes.
///
/// A box is dropped when it overlaps an already kept box of the same label by
/// more than `overlap_threshold`. Returns the kept boxes by confidence,
/// highest first.
pub(crate) fn non_max_suppression(
    mut detections: Vec<Detection>,
    overlap_threshold: f32,
) -> Vec<Detection> {
    detections.sort_by_key(|it| Reverse(FloatOrd(it.confidence)));
    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for detection in detections {
        let overlaps = kept
            .iter()
            .any(|it| it.label == detection.label && it.iou(&detection) > overlap_threshold);
        if !overlaps {
            kept.push(detection);
        }
    }
    kept
}

/// Cuts the display region out of the photo, clamped to the image bounds.
pub fn crop_display(image: &DynamicImage, display: &Detection) -> Result<DynamicImage> {
    let min = display.bounds.min();
    let max = display.bounds.max();
    let x1 = (min.x.max(0.0) as u32).min(image.width());
    let y1 = (min.y.max(0.0) as u32).min(image.height());
    let x2 = (max.x.max(0.0) as u32).min(image.width());
    let y2 = (max.y.max(0.0) as u32).min(image.height());
    if x2 <= x1 || y2 <= y1 {
        return Err(ReadingError::EmptyCrop);
    }
    log::trace!("Cropping display to ({x1}, {y1}) - ({x2}, {y2})");
    Ok(image.crop_imm(x1, y1, x2 - x1, y2 - y1))
}
