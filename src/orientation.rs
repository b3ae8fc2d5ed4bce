use image::{imageops::FilterType, DynamicImage, GenericImageView};
use tracing::instrument;

use crate::{
    error::Result, read_glyphs, Candidate, CandidateScore, DetectionSource, ReaderOptions,
    ReadingError, Selection, Transform,
};

/// Builds the candidate images worth trying for a display crop.
///
/// Portrait crops are displays photographed sideways, both rotations are
/// tried. Near-square crops are only scaled, stretching them to the wide
/// detector shape distorts the digits. Landscape crops are stretched to the
/// shape the glyph detector was tuned on.
pub fn candidates(crop: &DynamicImage, options: &ReaderOptions) -> Result<Vec<Candidate>> {
    let (width, height) = crop.dimensions();
    if width == 0 || height == 0 {
        return Err(ReadingError::EmptyCrop);
    }
    let ratio = width as f32 / height as f32;
    let (warp_width, warp_height) = (options.warp_width, options.warp_height);

    let candidates = if ratio < options.portrait_max_ratio {
        vec![
            Candidate {
                transform: Transform::RotateCcw90,
                image: crop
                    .rotate270()
                    .resize_exact(warp_width, warp_height, FilterType::Triangle),
            },
            Candidate {
                transform: Transform::RotateCw90,
                image: crop
                    .rotate90()
                    .resize_exact(warp_width, warp_height, FilterType::Triangle),
            },
        ]
    } else if ratio <= options.landscape_min_ratio {
        let scaled_height = ((warp_width as f32 / ratio).round() as u32).max(1);
        vec![Candidate {
            transform: Transform::UniformScale,
            image: crop.resize_exact(warp_width, scaled_height, FilterType::Triangle),
        }]
    } else if (width, height) == (warp_width, warp_height) {
        vec![Candidate {
            transform: Transform::Identity,
            image: crop.clone(),
        }]
    } else {
        vec![Candidate {
            transform: Transform::StretchToStandard,
            image: crop.resize_exact(warp_width, warp_height, FilterType::Triangle),
        }]
    };
    log::debug!(
        "Crop {width}x{height} (ratio {ratio:.2}) gives candidates {:?}",
        candidates.iter().map(|it| it.transform.name()).collect::<Vec<_>>()
    );
    Ok(candidates)
}

/// Reads the crop under every candidate orientation and keeps the best one.
///
/// Candidates are scored by [`crate::ReadingResult::score`]; a later
/// candidate only replaces the current best when it scores strictly higher,
/// so ties go to the counter-clockwise rotation.
#[instrument(skip(crop, source, options), fields(width = crop.width(), height = crop.height()))]
pub fn select_best_reading<S: DetectionSource + ?Sized>(
    crop: &DynamicImage,
    source: &S,
    options: &ReaderOptions,
) -> Result<Selection> {
    let mut best: Option<(Candidate, crate::ReadingResult)> = None;
    let mut scores = Vec::new();

    for candidate in candidates(crop, options)? {
        let detections = source.detect(&candidate.image, options.glyphs)?;
        let reading = read_glyphs(detections, options.min_separation);
        let score = reading.score();
        log::debug!(
            "Candidate {} read {:?} with score {score}",
            candidate.transform.name(),
            reading.text
        );
        scores.push(CandidateScore {
            transform: candidate.transform,
            score,
        });
        match &best {
            Some((_, current)) if score <= current.score() => {}
            _ => best = Some((candidate, reading)),
        }
    }

    let (candidate, reading) = best.ok_or(ReadingError::EmptyCrop)?;
    Ok(Selection {
        candidate,
        reading,
        scores,
    })
}
