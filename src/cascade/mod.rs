//! Boosted cascade models (Haar-like and LBP features).
//!
//! A cascade is a sequence of stages; each stage sums the leaf values of its
//! stump weak classifiers and rejects the window when the sum falls below the
//! stage threshold. Models are parsed from the JSON serialization described
//! in [`format`] and carry the metadata the pyramid needs: window size,
//! feature kind and capability flags.

mod format;

use crate::geom::Size;
use crate::util::{DetectionError, DetectionResult};
use std::path::Path;

/// Feature family evaluated by a cascade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    /// Haar-like weighted rectangle sums with variance normalization.
    Haar,
    /// Local binary patterns over a 3x3 grid of cells.
    Lbp,
}

/// Metadata describing a loaded cascade.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CascadeInfo {
    /// Detection window size at scale 1.0.
    pub window: Size,
    pub feature_kind: FeatureKind,
    /// At least one feature uses the 45° rotated integral table.
    pub has_tilted: bool,
    /// Every cell sum fits into 16 bits, so the int16 routine is exact.
    pub can_int16: bool,
}

/// One rectangle of a Haar-like feature in window coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct HaarRect {
    pub(crate) x: usize,
    pub(crate) y: usize,
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) weight: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct HaarFeature {
    pub(crate) rects: Vec<HaarRect>,
    pub(crate) tilted: bool,
}

/// Top-left cell of a 3x3 LBP grid; every cell is `width x height`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct LbpFeature {
    pub(crate) x: usize,
    pub(crate) y: usize,
    pub(crate) width: usize,
    pub(crate) height: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Features {
    Haar(Vec<HaarFeature>),
    Lbp(Vec<LbpFeature>),
}

/// Branch test of a stump weak classifier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Split {
    /// Haar: go left when `value < threshold * norm`.
    Threshold(f32),
    /// LBP: go left when the pattern code is a member of the 256-bit set.
    Subset([u32; 8]),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Stump {
    pub(crate) feature: usize,
    pub(crate) split: Split,
    pub(crate) left: f32,
    pub(crate) right: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Stage {
    pub(crate) threshold: f32,
    pub(crate) stumps: Vec<Stump>,
}

/// Parsed cascade classifier.
#[derive(Clone, Debug, PartialEq)]
pub struct Cascade {
    info: CascadeInfo,
    pub(crate) stages: Vec<Stage>,
    pub(crate) features: Features,
}

impl Cascade {
    /// Parses a cascade from its JSON serialization.
    pub fn from_json_str(text: &str) -> DetectionResult<Self> {
        format::parse(text)
    }

    /// Reads and parses a cascade file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> DetectionResult<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|err| DetectionError::Io {
            reason: format!("{}: {err}", path.as_ref().display()),
        })?;
        Self::from_json_str(&text)
    }

    pub(crate) fn from_parts(stages: Vec<Stage>, features: Features, window: Size) -> Self {
        let (feature_kind, has_tilted, can_int16) = match &features {
            Features::Haar(haar) => (FeatureKind::Haar, haar.iter().any(|f| f.tilted), false),
            Features::Lbp(lbp) => {
                let limit = i16::MAX as usize / 255;
                let fits = lbp.iter().all(|f| f.width * f.height <= limit);
                (FeatureKind::Lbp, false, fits)
            }
        };
        Self {
            info: CascadeInfo {
                window,
                feature_kind,
                has_tilted,
                can_int16,
            },
            stages,
            features,
        }
    }

    /// Returns window size and capability flags.
    pub fn info(&self) -> CascadeInfo {
        self.info
    }

    /// Detection window size at scale 1.0.
    pub fn window(&self) -> Size {
        self.info.window
    }

    pub fn feature_kind(&self) -> FeatureKind {
        self.info.feature_kind
    }

    pub fn is_haar(&self) -> bool {
        self.info.feature_kind == FeatureKind::Haar
    }

    pub fn has_tilted(&self) -> bool {
        self.info.has_tilted
    }

    pub fn can_int16(&self) -> bool {
        self.info.can_int16
    }

    /// Number of boosting stages.
    pub fn num_stages(&self) -> usize {
        self.stages.len()
    }
}
