use geo::{coord, Area, Rect};
use image::DynamicImage;

/// A single raw detector output.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bounds: Rect<f32>,
    pub label: String,
    pub confidence: f32,
}

impl Detection {
    pub fn new(bounds: Rect<f32>, label: impl Into<String>, confidence: f32) -> Self {
        Self {
            bounds,
            label: label.into(),
            confidence,
        }
    }

    pub fn from_corners(
        min_x: f32,
        min_y: f32,
        max_x: f32,
        max_y: f32,
        label: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self::new(
            Rect::new(coord! { x: min_x, y: min_y }, coord! { x: max_x, y: max_y }),
            label,
            confidence,
        )
    }

    pub fn center_x(&self) -> f32 {
        self.bounds.center().x
    }

    /// Intersection over union of the two boxes, 0 when disjoint.
    pub fn iou(&self, other: &Detection) -> f32 {
        let min = self.bounds.min();
        let max = self.bounds.max();
        let other_min = other.bounds.min();
        let other_max = other.bounds.max();

        let width = max.x.min(other_max.x) - min.x.max(other_min.x);
        let height = max.y.min(other_max.y) - min.y.max(other_min.y);
        if width <= 0.0 || height <= 0.0 {
            return 0.0;
        }
        let intersection = width * height;
        let union =
            self.bounds.unsigned_area() + other.bounds.unsigned_area() - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// Normalized glyph category, independent of the detector's label spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlyphKind {
    Digit(char),
    Separator,
}

impl GlyphKind {
    pub fn as_char(self) -> char {
        match self {
            GlyphKind::Digit(digit) => digit,
            GlyphKind::Separator => '.',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlyphItem {
    pub detection: Detection,
    pub kind: GlyphKind,
    /// Position in the detector output, breaks ties between equal centers.
    pub index: usize,
}

impl GlyphItem {
    pub fn is_separator(&self) -> bool {
        self.kind == GlyphKind::Separator
    }
}

/// Anything with a horizontal position and a confidence.
pub trait Positioned {
    fn center_x(&self) -> f32;
    fn confidence(&self) -> f32;
}

impl Positioned for Detection {
    fn center_x(&self) -> f32 {
        Detection::center_x(self)
    }

    fn confidence(&self) -> f32 {
        self.confidence
    }
}

impl Positioned for GlyphItem {
    fn center_x(&self) -> f32 {
        self.detection.center_x()
    }

    fn confidence(&self) -> f32 {
        self.detection.confidence
    }
}

/// Reading assembled from the glyphs of one candidate image.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadingResult {
    pub text: String,
    pub glyph_count: usize,
    pub mean_confidence: f32,
    /// Glyphs in reading order.
    pub annotated_detections: Vec<GlyphItem>,
}

impl ReadingResult {
    /// Orientation score. The glyph count dominates, confidence only breaks
    /// ties between candidates that recovered the same number of glyphs.
    pub fn score(&self) -> f32 {
        self.glyph_count as f32 * 10.0 + self.mean_confidence
    }

    pub fn is_illegible(&self) -> bool {
        self.text.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Identity,
    RotateCcw90,
    RotateCw90,
    UniformScale,
    StretchToStandard,
}

impl Transform {
    pub fn name(self) -> &'static str {
        match self {
            Transform::Identity => "identity",
            Transform::RotateCcw90 => "rotate_ccw_90",
            Transform::RotateCw90 => "rotate_cw_90",
            Transform::UniformScale => "uniform_scale",
            Transform::StretchToStandard => "stretch_to_standard",
        }
    }
}

/// One geometric hypothesis for presenting the display crop to the detector.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub transform: Transform,
    pub image: DynamicImage,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateScore {
    pub transform: Transform,
    pub score: f32,
}

/// Winning candidate of an orientation search.
#[derive(Debug, Clone)]
pub struct Selection {
    pub candidate: Candidate,
    pub reading: ReadingResult,
    /// Every candidate that was evaluated, in evaluation order.
    pub scores: Vec<CandidateScore>,
}

#[derive(Debug, Clone)]
pub struct MeterReading {
    pub display: Detection,
    pub selection: Selection,
}
