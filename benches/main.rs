use criterion::{black_box, criterion_group, criterion_main, Criterion};
use microtouch::common::Grid;
use microtouch::detect::{CurvatureDetector, PeakDetector, PeakList, SpanDetector};
use microtouch::keymap::KeyMapper;
use microtouch::{DetectorKind, TouchTracker, TrackerConfig, OUTPUT_COLUMNS};

fn blob_frame(width: usize, height: usize, blobs: &[(f32, f32, f32)]) -> Vec<f32> {
    let mut frame = vec![0.0; width * height];
    for y in 0..height {
        for x in 0..width {
            for &(bx, by, amplitude) in blobs {
                let (dx, dy) = (x as f32 - bx, y as f32 - by);
                frame[y * width + x] += amplitude * (-(dx * dx + dy * dy) / 2.88).exp();
            }
        }
    }
    frame
}

fn blobs(count: usize) -> Vec<(f32, f32, f32)> {
    (0..count)
        .map(|i| (6.0 + 7.0 * i as f32, 2.0 + (i % 4) as f32, 0.1 + 0.05 * i as f32))
        .collect()
}

fn run_tracker_benchmark(id: &str, c: &mut Criterion, detector: DetectorKind, touch_count: usize) {
    let config = TrackerConfig {
        detector,
        max_touches: 8,
        ..TrackerConfig::default()
    };
    let mut tracker = TouchTracker::new(config).unwrap();
    let mut state = tracker.new_state();
    let mut output = vec![0.0; config.max_touches * OUTPUT_COLUMNS];
    tracker.bind_output(output.len()).unwrap();
    let frame = blob_frame(config.width, config.height, &blobs(touch_count));

    c.bench_function(id, |b| {
        b.iter(|| {
            tracker.process(&mut state, black_box(&frame[..]), &mut output);
        })
    });
}

fn tracker_benchmarks(c: &mut Criterion) {
    run_tracker_benchmark("Tracker, curvature, 0 touches", c, DetectorKind::Curvature, 0);
    run_tracker_benchmark("Tracker, curvature, 1 touch", c, DetectorKind::Curvature, 1);
    run_tracker_benchmark("Tracker, curvature, 8 touches", c, DetectorKind::Curvature, 8);

    run_tracker_benchmark("Tracker, span, 1 touch", c, DetectorKind::Span, 1);
    run_tracker_benchmark("Tracker, span, 8 touches", c, DetectorKind::Span, 8);
}

fn run_detector_benchmark(id: &str, c: &mut Criterion, detector: &mut dyn PeakDetector, touch_count: usize) {
    let field = Grid::from_slice(64, 8, &blob_frame(64, 8, &blobs(touch_count)));
    let mut peaks = PeakList::new(16);

    c.bench_function(id, |b| {
        b.iter(|| {
            detector.detect(black_box(&field), &mut peaks);
        })
    });
}

fn detector_benchmarks(c: &mut Criterion) {
    let mut curvature = CurvatureDetector::new(64, 8, 0.0005);
    run_detector_benchmark("Curvature detector, 1 touch", c, &mut curvature, 1);
    run_detector_benchmark("Curvature detector, 8 touches", c, &mut curvature, 8);

    let mut span = SpanDetector::new(64, 8, KeyMapper::soundplane_a(), 0.03, 0.0005);
    run_detector_benchmark("Span detector, 1 touch", c, &mut span, 1);
    run_detector_benchmark("Span detector, 8 touches", c, &mut span, 8);
}

criterion_group!(benches, tracker_benchmarks, detector_benchmarks);
criterion_main!(benches);
