use float_ord::FloatOrd;
use tracing::instrument;

use crate::{error::Result, Detection, GlyphItem, GlyphKind, Positioned, ReadingError};

/// Every spelling the glyph detectors have used for the decimal mark.
const SEPARATOR_LABELS: &[&str] = &["10", "dot", "point", "."];

impl GlyphKind {
    /// Maps raw detector vocabulary onto a glyph category.
    pub fn from_label(label: &str) -> Result<Self> {
        if SEPARATOR_LABELS.contains(&label) {
            return Ok(GlyphKind::Separator);
        }
        let mut chars = label.chars();
        match (chars.next(), chars.next()) {
            (Some(digit), None) if digit.is_ascii_digit() => Ok(GlyphKind::Digit(digit)),
            _ => Err(ReadingError::UnrecognizedLabel {
                label: label.to_string(),
            }),
        }
    }
}

impl GlyphItem {
    /// Classifies the `index`-th detection of a detector run.
    pub fn new(index: usize, detection: Detection) -> Result<Self> {
        let kind = GlyphKind::from_label(&detection.label)?;
        Ok(GlyphItem {
            detection,
            kind,
            index,
        })
    }
}

/// Splits detections into value glyphs and separators.
///
/// Detections with an unknown label are dropped, a single spurious class
/// shouldn't cost the whole reading.
#[instrument(level = "trace", skip(detections))]
pub fn classify(
    detections: impl IntoIterator<Item = Detection>,
) -> (Vec<GlyphItem>, Vec<GlyphItem>) {
    let mut values = Vec::new();
    let mut separators = Vec::new();
    for (index, detection) in detections.into_iter().enumerate() {
        match GlyphItem::new(index, detection) {
            Ok(item) if item.is_separator() => separators.push(item),
            Ok(item) => values.push(item),
            Err(err) => log::warn!("Dropping detection: {err}"),
        }
    }
    (values, separators)
}

/// Merges values and separators into reading order, keeping at most one
/// separator. Glyphs sharing a center stay in detector order.
///
/// When several separators survive only the rightmost is kept: spurious
/// decimal marks tend to show up left of the real one.
pub fn resolve_separators(values: Vec<GlyphItem>, separators: Vec<GlyphItem>) -> Vec<GlyphItem> {
    let mut merged = values;
    merged.extend(separators);
    merged.sort_by_key(|item| (FloatOrd(item.center_x()), item.index));

    let Some(keep) = merged.iter().rposition(GlyphItem::is_separator) else {
        return merged;
    };
    let dropped = merged.iter().filter(|it| it.is_separator()).count() - 1;
    if dropped > 0 {
        log::debug!(
            "Dropping {dropped} separator(s) left of x = {}",
            merged[keep].center_x()
        );
    }
    merged
        .into_iter()
        .enumerate()
        .filter(|(i, item)| !item.is_separator() || *i == keep)
        .map(|(_, item)| item)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyph(center_x: f32, label: &str) -> Detection {
        Detection::from_corners(center_x - 5.0, 0.0, center_x + 5.0, 20.0, label, 0.8)
    }

    #[test]
    fn separator_spellings_are_equivalent() {
        for label in ["10", "dot", "point", "."] {
            assert_eq!(GlyphKind::from_label(label).unwrap(), GlyphKind::Separator);
        }
        assert_eq!(GlyphKind::from_label("7").unwrap(), GlyphKind::Digit('7'));
    }

    #[test]
    fn unknown_labels_are_rejected() {
        for label in ["11", "", "a", "comma", "07"] {
            assert!(matches!(
                GlyphKind::from_label(label),
                Err(ReadingError::UnrecognizedLabel { .. })
            ));
        }
    }

    #[test]
    fn classify_drops_unknown_labels() {
        let (values, separators) = classify([
            glyph(10.0, "1"),
            glyph(30.0, "minus"),
            glyph(50.0, "dot"),
            glyph(70.0, "4"),
        ]);
        assert_eq!(values.len(), 2);
        assert_eq!(separators.len(), 1);
        assert!(separators[0].is_separator());
    }

    #[test]
    fn rightmost_separator_wins() {
        let (values, separators) = classify([
            glyph(10.0, "1"),
            glyph(50.0, "dot"),
            glyph(100.0, "2"),
            glyph(200.0, "point"),
            glyph(300.0, "3"),
        ]);
        let merged = resolve_separators(values, separators);
        let positions = merged.iter().map(|it| it.center_x()).collect::<Vec<_>>();
        assert_eq!(positions, vec![10.0, 100.0, 200.0, 300.0]);
        assert!(merged[2].is_separator());
    }

    #[test]
    fn equal_centers_keep_detector_order() {
        let (values, separators) = classify([glyph(100.0, "dot"), glyph(100.0, "5")]);
        let merged = resolve_separators(values, separators);
        let kinds = merged.iter().map(|it| it.kind).collect::<Vec<_>>();
        assert_eq!(kinds, vec![GlyphKind::Separator, GlyphKind::Digit('5')]);
        assert_eq!(merged[0].index, 0);
    }

    #[test]
    fn single_separator_is_untouched() {
        let (values, separators) =
            classify([glyph(300.0, "5"), glyph(150.0, "."), glyph(20.0, "9")]);
        let merged = resolve_separators(values, separators);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[1].kind, GlyphKind::Separator);
    }
}
