use std::{path::PathBuf, time::Instant};

use meterocr::MeterReaderBuilder;

// Needs the exported detectors and a labelled photo in tests/data, which
// aren't checked in.
#[test]
#[ignore]
fn reads_meter_photo() {
    let _ = env_logger::builder().is_test(true).try_init();

    let image = image::open("tests/data/meter.jpg").expect("Failed to load test image");
    let cache = std::env!("CARGO_TARGET_TMPDIR");
    let cache = PathBuf::from(cache).join(".engine_cache");
    std::fs::create_dir_all(&cache).expect("Failed to create temp dir");
    let reader = MeterReaderBuilder::new()
        .display_model("tests/data/models/display_detection.onnx")
        .glyph_model("tests/data/models/digit_recognition.onnx")
        .with_engine_cache_path(cache)
        .build()
        .expect("Failed to build engine");
    let start = Instant::now();
    let reading = reader.read(&image).expect("Failed reading");
    let end = start.elapsed();
    log::debug!("{end:?}");
    let expected = std::fs::read_to_string("tests/data/meter.txt").expect("Missing expected value");
    assert_eq!(reading.selection.reading.text, expected.trim());
}
