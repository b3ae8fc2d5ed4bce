use std::cmp::Reverse;

use float_ord::FloatOrd;
use tracing::instrument;

use crate::Positioned;

/// Minimum glyph spacing on the 400 px wide normalized display.
pub const DEFAULT_MIN_SEPARATION: f32 = 20.0;

/// Suppresses detections whose centers sit closer than `min_separation` to a
/// more confident detection.
///
/// Segmented displays produce ghost glyphs inside real ones (a faint `7`
/// inside a `0`), those share the horizontal position but rarely the
/// confidence. No two returned items are closer than `min_separation`. The
/// output is in acceptance order, callers sort by position themselves.
#[instrument(level = "trace", skip(items))]
pub fn dedupe<T: Positioned>(mut items: Vec<T>, min_separation: f32) -> Vec<T> {
    items.sort_by_key(|it| Reverse(FloatOrd(it.confidence())));

    let mut accepted: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        let nearest = accepted
            .iter()
            .map(|other| (item.center_x() - other.center_x()).abs())
            .min_by_key(|distance| FloatOrd(*distance));
        match nearest {
            Some(distance) if distance < min_separation => {
                log::trace!(
                    "Suppressing glyph at x = {} ({distance} from an accepted glyph)",
                    item.center_x()
                );
            }
            _ => accepted.push(item),
        }
    }
    accepted
}
