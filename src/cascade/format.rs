//! JSON serialization of boosted cascades.
//!
//! The layout mirrors OpenCV's "new" cascade format with stump weak
//! classifiers:
//!
//! ```json
//! {
//!   "stage_type": "BOOST",
//!   "feature_type": "LBP",
//!   "width": 24, "height": 24,
//!   "stages": [{ "threshold": -0.5, "weak_classifiers": [
//!       { "internal_nodes": [0, -1, 0, 1, 0, 0, 0, 0, 0, 0, 0], "leaf_values": [1.0, -1.0] }
//!   ]}],
//!   "features": [{ "rect": [0, 0, 8, 8] }]
//! }
//! ```
//!
//! Haar nodes are `[left, right, feature, threshold]`, LBP nodes are
//! `[left, right, feature, subset0..subset7]`. Haar features are
//! `{ "rects": [[x, y, w, h, weight], ...], "tilted": bool }`.

use crate::cascade::{
    Cascade, Features, HaarFeature, HaarRect, LbpFeature, Split, Stage, Stump,
};
use crate::geom::Size;
use crate::util::{DetectionError, DetectionResult};
use serde::Deserialize;

const HAAR_NODE_LEN: usize = 4;
const LBP_NODE_LEN: usize = 3 + 8;

#[derive(Debug, Deserialize)]
struct RawCascade {
    stage_type: Option<String>,
    feature_type: Option<String>,
    width: usize,
    height: usize,
    stages: Vec<RawStage>,
    features: Vec<RawFeature>,
}

#[derive(Debug, Deserialize)]
struct RawStage {
    threshold: f32,
    weak_classifiers: Vec<RawWeak>,
}

#[derive(Debug, Deserialize)]
struct RawWeak {
    internal_nodes: Vec<f64>,
    leaf_values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default)]
    rects: Vec<(i64, i64, i64, i64, f32)>,
    rect: Option<(i64, i64, i64, i64)>,
    #[serde(default)]
    tilted: bool,
}

fn unsupported(reason: impl Into<String>) -> DetectionError {
    DetectionError::UnsupportedCascade {
        reason: reason.into(),
    }
}

fn malformed(reason: impl Into<String>) -> DetectionError {
    DetectionError::Parse {
        reason: reason.into(),
    }
}

pub(super) fn parse(text: &str) -> DetectionResult<Cascade> {
    let raw: RawCascade = serde_json::from_str(text).map_err(|err| malformed(err.to_string()))?;

    match raw.stage_type.as_deref() {
        None => return Err(unsupported("legacy cascade without stage_type")),
        Some("BOOST") => {}
        Some(other) => return Err(unsupported(format!("stage type {other}"))),
    }
    let is_haar = match raw.feature_type.as_deref() {
        Some("HAAR") => true,
        Some("LBP") => false,
        Some(other) => return Err(unsupported(format!("feature type {other}"))),
        None => return Err(unsupported("missing feature_type")),
    };

    let window = Size::new(raw.width, raw.height);
    let min_side = if is_haar { 3 } else { 1 };
    if raw.width < min_side || raw.height < min_side {
        return Err(malformed("window is too small"));
    }
    if raw.stages.is_empty() {
        return Err(malformed("cascade has no stages"));
    }

    let features = if is_haar {
        Features::Haar(
            raw.features
                .iter()
                .map(|f| haar_feature(f, window))
                .collect::<DetectionResult<_>>()?,
        )
    } else {
        Features::Lbp(
            raw.features
                .iter()
                .map(|f| lbp_feature(f, window))
                .collect::<DetectionResult<_>>()?,
        )
    };
    let num_features = raw.features.len();

    let mut stages = Vec::with_capacity(raw.stages.len());
    for raw_stage in &raw.stages {
        if raw_stage.weak_classifiers.is_empty() {
            return Err(malformed("stage has no weak classifiers"));
        }
        let stumps = raw_stage
            .weak_classifiers
            .iter()
            .map(|weak| stump(weak, is_haar, num_features))
            .collect::<DetectionResult<Vec<_>>>()?;
        stages.push(Stage {
            threshold: raw_stage.threshold,
            stumps,
        });
    }

    Ok(Cascade::from_parts(stages, features, window))
}

fn stump(weak: &RawWeak, is_haar: bool, num_features: usize) -> DetectionResult<Stump> {
    let node_len = if is_haar { HAAR_NODE_LEN } else { LBP_NODE_LEN };
    let nodes = &weak.internal_nodes;
    if nodes.is_empty() || nodes.len() % node_len != 0 {
        return Err(malformed("internal_nodes length does not match the feature type"));
    }
    if nodes.len() > node_len || weak.leaf_values.len() > 2 {
        return Err(unsupported("tree-based weak classifiers"));
    }
    if weak.leaf_values.len() != 2 {
        return Err(malformed("stump needs two leaf values"));
    }
    // Both children of a stump are leaves (indices <= 0).
    if nodes[0] > 0.0 || nodes[1] > 0.0 {
        return Err(unsupported("tree-based weak classifiers"));
    }

    let feature = nodes[2];
    if feature < 0.0 || feature.fract() != 0.0 || feature as usize >= num_features {
        return Err(malformed("weak classifier references a missing feature"));
    }
    let split = if is_haar {
        Split::Threshold(nodes[3] as f32)
    } else {
        let mut subset = [0u32; 8];
        for (word, &value) in subset.iter_mut().zip(&nodes[3..]) {
            // Subset words are stored as signed 32-bit integers.
            *word = value as i64 as i32 as u32;
        }
        Split::Subset(subset)
    };

    Ok(Stump {
        feature: feature as usize,
        split,
        left: weak.leaf_values[0],
        right: weak.leaf_values[1],
    })
}

fn haar_feature(raw: &RawFeature, window: Size) -> DetectionResult<HaarFeature> {
    if raw.rects.is_empty() || raw.rects.len() > 3 {
        return Err(malformed("haar feature needs one to three rects"));
    }
    let (win_w, win_h) = (window.width as i64, window.height as i64);
    let mut rects = Vec::with_capacity(raw.rects.len());
    for &(x, y, w, h, weight) in &raw.rects {
        let inside = if raw.tilted {
            x - h >= 0 && y >= 0 && x + w <= win_w && y + w + h <= win_h
        } else {
            x >= 0 && y >= 0 && x + w <= win_w && y + h <= win_h
        };
        if w <= 0 || h <= 0 || !inside {
            return Err(malformed("haar rect lies outside the window"));
        }
        rects.push(HaarRect {
            x: x as usize,
            y: y as usize,
            width: w as usize,
            height: h as usize,
            weight,
        });
    }
    Ok(HaarFeature {
        rects,
        tilted: raw.tilted,
    })
}

fn lbp_feature(raw: &RawFeature, window: Size) -> DetectionResult<LbpFeature> {
    let (x, y, w, h) = raw.rect.ok_or_else(|| malformed("lbp feature needs a rect"))?;
    let inside = x >= 0
        && y >= 0
        && w > 0
        && h > 0
        && x + 3 * w <= window.width as i64
        && y + 3 * h <= window.height as i64;
    if !inside {
        return Err(malformed("lbp grid lies outside the window"));
    }
    Ok(LbpFeature {
        x: x as usize,
        y: y as usize,
        width: w as usize,
        height: h as usize,
    })
}

#[cfg(test)]
mod tests {
    use super::parse;
    use crate::cascade::{FeatureKind, Features, Split};
    use crate::geom::Size;
    use crate::util::DetectionError;

    const LBP: &str = r#"{
        "stage_type": "BOOST", "feature_type": "LBP", "width": 24, "height": 24,
        "stages": [{ "threshold": 0.0, "weak_classifiers": [
            { "internal_nodes": [0, -1, 0, -1, 0, 0, 0, 0, 0, 0, 1], "leaf_values": [1.0, -1.0] }
        ]}],
        "features": [{ "rect": [0, 0, 8, 8] }]
    }"#;

    #[test]
    fn parses_lbp_stump() {
        let cascade = parse(LBP).unwrap();
        let info = cascade.info();
        assert_eq!(info.window, Size::new(24, 24));
        assert_eq!(info.feature_kind, FeatureKind::Lbp);
        assert!(info.can_int16);
        assert!(!info.has_tilted);
        let stump = cascade.stages[0].stumps[0];
        match stump.split {
            Split::Subset(bits) => {
                assert_eq!(bits[0], u32::MAX);
                assert_eq!(bits[7], 1);
            }
            Split::Threshold(_) => panic!("expected subset split"),
        }
        assert!(matches!(cascade.features, Features::Lbp(ref f) if f.len() == 1));
    }

    #[test]
    fn large_lbp_cells_are_not_int16_eligible() {
        let text = LBP
            .replace("\"width\": 24, \"height\": 24", "\"width\": 36, \"height\": 36")
            .replace("[0, 0, 8, 8]", "[0, 0, 12, 12]");
        let cascade = parse(&text).unwrap();
        assert!(!cascade.can_int16());
    }

    #[test]
    fn rejects_legacy_and_tree_cascades() {
        let legacy = LBP.replace("\"stage_type\": \"BOOST\",", "");
        assert!(matches!(
            parse(&legacy),
            Err(DetectionError::UnsupportedCascade { .. })
        ));

        let tree = LBP.replace("[0, -1, 0, -1", "[1, -1, 0, -1");
        assert!(matches!(
            parse(&tree),
            Err(DetectionError::UnsupportedCascade { .. })
        ));
    }

    #[test]
    fn rejects_features_outside_window() {
        let text = LBP.replace("[0, 0, 8, 8]", "[1, 0, 8, 8]");
        assert!(matches!(parse(&text), Err(DetectionError::Parse { .. })));
    }

    #[test]
    fn parses_tilted_haar() {
        let text = r#"{
            "stage_type": "BOOST", "feature_type": "HAAR", "width": 20, "height": 20,
            "stages": [{ "threshold": -1.0, "weak_classifiers": [
                { "internal_nodes": [0, -1, 0, 0.01], "leaf_values": [-0.5, 0.5] }
            ]}],
            "features": [{ "rects": [[10, 2, 6, 4, -1.0], [10, 4, 3, 2, 2.0]], "tilted": true }]
        }"#;
        let cascade = parse(text).unwrap();
        assert!(cascade.is_haar());
        assert!(cascade.has_tilted());
        assert!(!cascade.can_int16());
    }
}
