use tracing::instrument;

use crate::{classify, dedupe, resolve_separators, Detection, GlyphItem, ReadingResult};

/// Renders glyphs that are already in reading order.
pub fn assemble(items: Vec<GlyphItem>) -> ReadingResult {
    let text = items.iter().map(|it| it.kind.as_char()).collect::<String>();
    let glyph_count = items.len();
    let mean_confidence = if items.is_empty() {
        0.0
    } else {
        items.iter().map(|it| it.detection.confidence).sum::<f32>() / glyph_count as f32
    };
    ReadingResult {
        text,
        glyph_count,
        mean_confidence,
        annotated_detections: items,
    }
}

/// Turns the raw detections of one candidate image into a reading.
///
/// Separators skip deduplication so the only decimal mark can't be
/// suppressed by a neighbouring digit.
#[instrument(level = "debug", skip(detections), fields(count = detections.len()))]
pub fn read_glyphs(detections: Vec<Detection>, min_separation: f32) -> ReadingResult {
    let (values, separators) = classify(detections);
    let values = dedupe(values, min_separation);
    let reading = assemble(resolve_separators(values, separators));
    log::debug!(
        "Assembled {:?} from {} glyphs (mean confidence {:.3})",
        reading.text,
        reading.glyph_count,
        reading.mean_confidence
    );
    reading
}
