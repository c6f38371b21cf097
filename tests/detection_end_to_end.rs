use cascadet::{
    DetectConfig, Detector, ImageView, InitConfig, Object, OwnedImage, PixelFormat, Rect, Size,
    Tag,
};

fn fixture(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

/// Black 96x96 image with a bright 8x8 square at (40, 40).
fn bright_square() -> OwnedImage {
    let mut image = OwnedImage::filled(Size::new(96, 96), 0).unwrap();
    image.fill_rect(Rect::new(40, 40, 48, 48), 255);
    image
}

/// 96x96 image, bright left of x = 48 and dark right of it.
fn vertical_edge() -> OwnedImage {
    let mut image = OwnedImage::filled(Size::new(96, 96), 30).unwrap();
    image.fill_rect(Rect::new(0, 0, 48, 96), 200);
    image
}

fn detect_lbp(
    image: &OwnedImage,
    init: &InitConfig,
    roi: Option<ImageView<'_, u8>>,
    config: &DetectConfig,
) -> Vec<Object> {
    let mut detector = Detector::new();
    detector.load(fixture("lbp_center.json"), Tag(3)).unwrap();
    detector.init(image.size(), init, roi).unwrap();
    detector
        .detect(image.view(), PixelFormat::Gray8, config)
        .unwrap()
}

fn single_thread() -> InitConfig {
    InitConfig {
        thread_count: 1,
        ..InitConfig::default()
    }
}

#[test]
fn lbp_cascade_finds_bright_square() {
    let image = bright_square();
    let objects = detect_lbp(&image, &single_thread(), None, &DetectConfig::default());
    assert!(!objects.is_empty());
    for object in &objects {
        assert_eq!(object.tag, Tag(3));
        assert!(object.weight >= 3);
        assert!(
            object.rect.contains_point(44, 44),
            "{:?} misses the square centre",
            object.rect
        );
    }
}

#[test]
fn int16_and_float_lbp_agree() {
    let image = bright_square();
    let int16 = detect_lbp(&image, &single_thread(), None, &DetectConfig::default());
    let float = detect_lbp(
        &image,
        &InitConfig {
            prefer_int16: false,
            ..single_thread()
        },
        None,
        &DetectConfig::default(),
    );
    assert_eq!(int16, float);
}

#[test]
fn haar_cascade_straddles_vertical_edge() {
    let image = vertical_edge();
    let mut detector = Detector::new();
    detector.load(fixture("haar_edge.json"), Tag(8)).unwrap();
    let init = InitConfig {
        size_max: Size::new(30, 30),
        ..single_thread()
    };
    detector.init(image.size(), &init, None).unwrap();
    assert!(detector.pyramid().unwrap().need_normalization());

    let objects = detector
        .detect(image.view(), PixelFormat::Gray8, &DetectConfig::default())
        .unwrap();
    assert!(!objects.is_empty());
    for object in &objects {
        assert_eq!(object.tag, Tag(8));
        assert!(object.rect.left < 50 && object.rect.right > 46, "{:?}", object.rect);
    }

    // A mirrored edge (dark on the left) is never accepted.
    let mut mirrored = OwnedImage::filled(Size::new(96, 96), 200).unwrap();
    mirrored.fill_rect(Rect::new(0, 0, 48, 96), 30);
    let objects = detector
        .detect(mirrored.view(), PixelFormat::Gray8, &DetectConfig::default())
        .unwrap();
    assert!(objects.is_empty());
}

#[test]
fn roi_suppresses_detections_outside_it() {
    let image = bright_square();
    let mut right_half = OwnedImage::filled(image.size(), 0).unwrap();
    right_half.fill_rect(Rect::new(64, 0, 96, 96), 255);
    let objects = detect_lbp(
        &image,
        &single_thread(),
        Some(right_half.view()),
        &DetectConfig::default(),
    );
    assert!(objects.is_empty());

    let mut left_half = OwnedImage::filled(image.size(), 0).unwrap();
    left_half.fill_rect(Rect::new(0, 0, 64, 96), 255);
    let objects = detect_lbp(
        &image,
        &single_thread(),
        Some(left_half.view()),
        &DetectConfig::default(),
    );
    assert!(!objects.is_empty());
}

#[test]
fn motion_regions_restrict_window_centres() {
    let image = bright_square();
    let far = DetectConfig {
        motion_regions: Some(vec![Rect::new(70, 70, 90, 90)]),
        ..DetectConfig::default()
    };
    assert!(detect_lbp(&image, &single_thread(), None, &far).is_empty());

    let none = DetectConfig {
        motion_regions: Some(Vec::new()),
        ..DetectConfig::default()
    };
    assert!(detect_lbp(&image, &single_thread(), None, &none).is_empty());

    let around = DetectConfig {
        motion_regions: Some(vec![Rect::new(30, 30, 60, 60)]),
        ..DetectConfig::default()
    };
    let objects = detect_lbp(&image, &single_thread(), None, &around);
    assert!(!objects.is_empty());
    assert!(objects.iter().all(|o| o.rect.contains_point(44, 44)));
}

#[test]
fn repeated_detect_is_deterministic() {
    let image = bright_square();
    let mut detector = Detector::new();
    detector.load(fixture("lbp_center.json"), Tag(0)).unwrap();
    detector
        .init(image.size(), &InitConfig::default(), None)
        .unwrap();
    let config = DetectConfig::default();
    let first = detector
        .detect(image.view(), PixelFormat::Gray8, &config)
        .unwrap();
    for _ in 0..3 {
        let again = detector
            .detect(image.view(), PixelFormat::Gray8, &config)
            .unwrap();
        assert_eq!(first, again);
    }
}

#[test]
fn color_input_matches_gray_input() {
    let gray = bright_square();
    let bgra: Vec<u8> = gray
        .data()
        .iter()
        .flat_map(|&v| [v, v, v, 255])
        .collect();
    let view = ImageView::from_slice(&bgra, 96 * 4, 96).unwrap();

    let mut detector = Detector::new();
    detector.load(fixture("lbp_center.json"), Tag(0)).unwrap();
    detector
        .init(gray.size(), &single_thread(), None)
        .unwrap();
    let config = DetectConfig::default();
    let from_gray = detector
        .detect(gray.view(), PixelFormat::Gray8, &config)
        .unwrap();
    let from_color = detector.detect(view, PixelFormat::Bgra32, &config).unwrap();
    assert_eq!(from_gray, from_color);
}

#[test]
fn models_keep_their_tags() {
    let mut image = bright_square();
    image.fill_rect(Rect::new(0, 0, 16, 96), 200);
    let mut detector = Detector::new();
    detector.load(fixture("haar_edge.json"), Tag(9)).unwrap();
    detector.load(fixture("lbp_center.json"), Tag(2)).unwrap();
    detector
        .init(
            image.size(),
            &InitConfig {
                size_max: Size::new(30, 30),
                ..single_thread()
            },
            None,
        )
        .unwrap();
    let objects = detector
        .detect(image.view(), PixelFormat::Gray8, &DetectConfig::default())
        .unwrap();
    let tags: Vec<Tag> = objects.iter().map(|o| o.tag).collect();
    let mut sorted = tags.clone();
    sorted.sort();
    assert_eq!(tags, sorted);
    assert!(tags.contains(&Tag(2)));
    assert!(tags.contains(&Tag(9)));
}
