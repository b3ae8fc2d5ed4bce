use std::cell::RefCell;

use image::{DynamicImage, GenericImageView, RgbImage};
use meterocr::{
    classify, read_glyphs, resolve_separators, Detection, DetectorThresholds, MeterReader,
    ReaderOptions, ReadingError, Result, Transform,
};

fn glyph(center_x: f32, label: &str, confidence: f32) -> Detection {
    Detection::from_corners(center_x - 10.0, 20.0, center_x + 10.0, 130.0, label, confidence)
}

fn photo(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
}

fn no_detections(_: &DynamicImage, _: DetectorThresholds) -> Result<Vec<Detection>> {
    Ok(Vec::new())
}

#[test]
fn separator_precedence() {
    let (values, separators) = classify([
        glyph(10.0, "1", 0.9),
        glyph(50.0, "dot", 0.8),
        glyph(100.0, "2", 0.9),
        glyph(200.0, "dot", 0.7),
        glyph(300.0, "3", 0.9),
    ]);
    let merged = resolve_separators(values, separators);
    let separators = merged
        .iter()
        .filter(|it| it.is_separator())
        .map(|it| it.detection.center_x())
        .collect::<Vec<_>>();
    assert_eq!(separators, vec![200.0]);
    assert_eq!(meterocr::assemble(merged).text, "12.3");
}

#[test]
fn input_order_does_not_matter() {
    let detections = vec![
        glyph(10.0, "1", 0.91),
        glyph(120.0, "2", 0.82),
        glyph(230.0, "point", 0.73),
        glyph(340.0, "8", 0.64),
        glyph(345.0, "3", 0.2),
    ];
    let expected = read_glyphs(detections.clone(), 20.0);
    assert_eq!(expected.text, "12.8");

    let mut rotated = detections.clone();
    for _ in 0..detections.len() {
        rotated.rotate_left(1);
        assert_eq!(read_glyphs(rotated.clone(), 20.0).text, expected.text);
        let mut reversed = rotated.clone();
        reversed.reverse();
        assert_eq!(read_glyphs(reversed, 20.0).text, expected.text);
    }
}

#[test]
fn reading_is_deterministic() {
    let source = |image: &DynamicImage, _: DetectorThresholds| -> Result<Vec<Detection>> {
        let step = image.width() as f32 / 5.0;
        Ok(vec![
            glyph(step, "5", 0.8),
            glyph(step * 2.0, "0", 0.7),
            glyph(step * 2.5, ".", 0.6),
            glyph(step * 3.0, "1", 0.9),
        ])
    };
    let crop = photo(320, 90);
    let options = ReaderOptions::default();
    let first = meterocr::select_best_reading(&crop, &source, &options).unwrap();
    let second = meterocr::select_best_reading(&crop, &source, &options).unwrap();
    assert_eq!(first.reading, second.reading);
    assert_eq!(first.reading.text, "50.1");
    assert_eq!(first.candidate.transform, Transform::StretchToStandard);
    assert_eq!(first.candidate.image.dimensions(), (400, 150));
}

#[test]
fn more_glyphs_beat_higher_confidence() {
    let calls = RefCell::new(0);
    let source = |_: &DynamicImage, _: DetectorThresholds| -> Result<Vec<Detection>> {
        let call = {
            let mut calls = calls.borrow_mut();
            *calls += 1;
            *calls
        };
        // Counter-clockwise candidate is tried first.
        Ok(if call == 1 {
            vec![glyph(50.0, "7", 0.99), glyph(150.0, "7", 0.99)]
        } else {
            vec![
                glyph(50.0, "1", 0.4),
                glyph(150.0, "2", 0.4),
                glyph(250.0, "3", 0.4),
            ]
        })
    };
    let selection =
        meterocr::select_best_reading(&photo(60, 200), &source, &ReaderOptions::default())
            .unwrap();
    assert_eq!(selection.candidate.transform, Transform::RotateCw90);
    assert_eq!(selection.reading.text, "123");
    assert_eq!(selection.scores[0].transform, Transform::RotateCcw90);
}

#[test]
fn thresholds_are_passed_through() {
    let seen = RefCell::new(Vec::new());
    let source = |_: &DynamicImage, thresholds: DetectorThresholds| -> Result<Vec<Detection>> {
        seen.borrow_mut().push(thresholds);
        Ok(Vec::new())
    };
    let options = ReaderOptions {
        glyphs: DetectorThresholds {
            confidence: 0.45,
            overlap: 0.2,
        },
        ..ReaderOptions::default()
    };
    let selection = meterocr::select_best_reading(&photo(100, 100), &source, &options).unwrap();
    assert!(selection.reading.is_illegible());
    assert_eq!(*seen.borrow(), vec![options.glyphs]);
}

#[test]
fn reader_crops_most_confident_display() {
    let display = |_: &DynamicImage, _: DetectorThresholds| -> Result<Vec<Detection>> {
        Ok(vec![
            Detection::from_corners(0.0, 0.0, 50.0, 50.0, "display", 0.3),
            Detection::from_corners(100.0, 200.0, 400.0, 300.0, "display", 0.9),
        ])
    };
    let glyphs = |image: &DynamicImage, _: DetectorThresholds| -> Result<Vec<Detection>> {
        assert_eq!(image.dimensions(), (400, 150));
        Ok(vec![
            glyph(60.0, "4", 0.9),
            glyph(160.0, "2", 0.9),
            glyph(200.0, "10", 0.5),
            glyph(260.0, "0", 0.9),
        ])
    };
    let reader = MeterReader::new(display, glyphs, ReaderOptions::default());
    let reading = reader.read(&photo(640, 480)).unwrap();
    assert_eq!(reading.display.confidence, 0.9);
    assert_eq!(reading.selection.reading.text, "42.0");
    assert_eq!(reading.selection.reading.glyph_count, 4);
}

#[test]
fn missing_display_is_reported() {
    let reader = MeterReader::new(no_detections, no_detections, ReaderOptions::default());
    let err = reader.read(&photo(640, 480)).unwrap_err();
    assert!(matches!(err, ReadingError::NoDisplayDetected));
}

#[test]
fn display_outside_photo_is_an_empty_crop() {
    let display = |_: &DynamicImage, _: DetectorThresholds| -> Result<Vec<Detection>> {
        Ok(vec![Detection::from_corners(700.0, 10.0, 900.0, 90.0, "display", 0.8)])
    };
    let reader = MeterReader::new(display, no_detections, ReaderOptions::default());
    let err = reader.read(&photo(640, 480)).unwrap_err();
    assert!(matches!(err, ReadingError::EmptyCrop));
}

#[test]
fn detector_errors_propagate() {
    let failing = |_: &DynamicImage, _: DetectorThresholds| -> Result<Vec<Detection>> {
        Err(ReadingError::MissingOutput)
    };
    let err = meterocr::select_best_reading(&photo(300, 100), &failing, &ReaderOptions::default())
        .unwrap_err();
    assert!(matches!(err, ReadingError::MissingOutput));
}
