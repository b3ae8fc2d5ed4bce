//! Debug overlays. Drawing works on copies and never feeds back into a
//! reading.

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::{Detection, GlyphItem};

const DISPLAY_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const DIGIT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const SEPARATOR_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

fn draw_box(image: &mut RgbImage, detection: &Detection, color: Rgb<u8>, thickness: u32) {
    let min = detection.bounds.min();
    let max = detection.bounds.max();
    for inset in 0..thickness {
        let width = (max.x - min.x) as i64 - 2 * inset as i64;
        let height = (max.y - min.y) as i64 - 2 * inset as i64;
        if width <= 0 || height <= 0 {
            break;
        }
        let rect = Rect::at(min.x as i32 + inset as i32, min.y as i32 + inset as i32)
            .of_size(width as u32, height as u32);
        draw_hollow_rect_mut(image, rect, color);
    }
}

/// Marks the located display on a copy of the photo.
pub fn draw_display(photo: &DynamicImage, display: &Detection) -> RgbImage {
    let mut canvas = photo.to_rgb8();
    draw_box(&mut canvas, display, DISPLAY_COLOR, 3);
    canvas
}

/// Marks the glyphs that made it into a reading on a copy of the candidate
/// image.
pub fn draw_glyphs(candidate: &DynamicImage, glyphs: &[GlyphItem]) -> RgbImage {
    let mut canvas = candidate.to_rgb8();
    for glyph in glyphs {
        let color = if glyph.is_separator() {
            SEPARATOR_COLOR
        } else {
            DIGIT_COLOR
        };
        draw_box(&mut canvas, &glyph.detection, color, 2);
    }
    canvas
}
