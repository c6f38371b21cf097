use cascadet::lowlevel::{resize_bilinear, Integrals};
use cascadet::{DetectConfig, Detector, ImageView, InitConfig, OwnedImage, PixelFormat, Size, Tag};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn make_image(width: usize, height: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let value = ((x * 13) ^ (y * 7) ^ (x * y)) & 0xFF;
            data.push(value as u8);
        }
    }
    data
}

fn cascade_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn bench_primitives(c: &mut Criterion) {
    let (width, height) = (640, 480);
    let image = make_image(width, height);
    let view = ImageView::from_slice(&image, width, height).unwrap();

    let mut ints = Integrals::new(Size::new(width, height), true, true).unwrap();
    c.bench_function("integral_sum_sqsum_tilted_640x480", |b| {
        b.iter(|| ints.compute(black_box(view)).unwrap());
    });

    let mut half = OwnedImage::filled(Size::new(width / 2, height / 2), 0).unwrap();
    c.bench_function("resize_bilinear_640x480_to_320x240", |b| {
        b.iter(|| resize_bilinear(black_box(view), &mut half));
    });
}

fn bench_detect(c: &mut Criterion) {
    let (width, height) = (320, 240);
    let image = make_image(width, height);
    let view = ImageView::from_slice(&image, width, height).unwrap();
    let config = DetectConfig::default();

    for (name, cascade, threads) in [
        ("detect_lbp_sync", "lbp_center.json", 1),
        ("detect_lbp_threads", "lbp_center.json", 0),
        ("detect_haar_tilted_sync", "haar_tilted.json", 1),
        ("detect_haar_tilted_threads", "haar_tilted.json", 0),
    ] {
        let mut detector = Detector::new();
        detector.load(cascade_path(cascade), Tag(0)).unwrap();
        let init = InitConfig {
            scale_factor: 1.2,
            thread_count: threads,
            ..InitConfig::default()
        };
        detector.init(view.size(), &init, None).unwrap();
        c.bench_function(name, |b| {
            b.iter(|| {
                black_box(
                    detector
                        .detect(black_box(view), PixelFormat::Gray8, &config)
                        .unwrap(),
                )
            });
        });
    }
}

criterion_group!(benches, bench_primitives, bench_detect);
criterion_main!(benches);
