use cascadet::{
    DetectConfig, DetectionError, Detector, InitConfig, OwnedImage, PixelFormat, Rect, Size, Tag,
};

fn fixture(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn lbp_detector() -> Detector {
    let mut detector = Detector::new();
    detector.load(fixture("lbp_center.json"), Tag(0)).unwrap();
    detector
}

#[test]
fn inverted_size_limits_produce_no_levels() {
    let mut detector = lbp_detector();
    let config = InitConfig {
        size_min: Size::new(60, 60),
        size_max: Size::new(30, 30),
        ..InitConfig::default()
    };
    assert!(matches!(
        detector.init(Size::new(128, 128), &config, None),
        Err(DetectionError::NoLevels)
    ));
    assert!(!detector.is_initialized());
}

#[test]
fn scales_start_at_one_and_increase() {
    let mut detector = lbp_detector();
    detector
        .init(Size::new(120, 90), &InitConfig::default(), None)
        .unwrap();
    let scales = detector.level_scales();
    assert_eq!(scales[0], 1.0);
    assert!(scales.windows(2).all(|w| w[1] > w[0]));
    let last = *scales.last().unwrap();
    assert!((24.0 * last).round() <= 90.0);
    assert!((24.0 * last * 1.1).round() > 90.0);
}

#[test]
fn reinit_with_new_size_replaces_pyramid() {
    let mut detector = lbp_detector();
    let config = InitConfig {
        thread_count: 2,
        ..InitConfig::default()
    };
    detector.init(Size::new(64, 64), &config, None).unwrap();
    let small_levels = detector.level_scales().len();
    detector.init(Size::new(160, 120), &config, None).unwrap();
    assert!(detector.level_scales().len() > small_levels);
    assert_eq!(
        detector.pyramid().unwrap().image_size(),
        Size::new(160, 120)
    );

    let old = OwnedImage::filled(Size::new(64, 64), 0).unwrap();
    assert!(matches!(
        detector.detect(old.view(), PixelFormat::Gray8, &DetectConfig::default()),
        Err(DetectionError::SizeMismatch { .. })
    ));
    let new = OwnedImage::filled(Size::new(160, 120), 0).unwrap();
    assert!(detector
        .detect(new.view(), PixelFormat::Gray8, &DetectConfig::default())
        .is_ok());
}

#[test]
fn roi_sets_level_search_rects() {
    let mut detector = lbp_detector();
    let mut roi = OwnedImage::filled(Size::new(96, 96), 0).unwrap();
    roi.fill_rect(Rect::new(0, 0, 48, 96), 1);
    let config = InitConfig {
        scale_factor: 2.0,
        ..InitConfig::default()
    };
    detector
        .init(Size::new(96, 96), &config, Some(roi.view()))
        .unwrap();
    let pyramid = detector.pyramid().unwrap();
    let rects: Vec<Rect> = pyramid.levels().iter().map(|l| l.rect()).collect();
    assert_eq!(rects[0], Rect::new(0, 0, 48, 96));
    assert_eq!(rects[1].left, 0);
    assert!(rects[1].right >= 23 && rects[1].right <= 25);
}

#[test]
fn mismatched_roi_is_rejected() {
    let mut detector = lbp_detector();
    let roi = OwnedImage::filled(Size::new(50, 50), 255).unwrap();
    assert!(matches!(
        detector.init(Size::new(96, 96), &InitConfig::default(), Some(roi.view())),
        Err(DetectionError::InvalidInput(_))
    ));
}
