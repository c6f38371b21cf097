//! Haar-like cascade evaluation with variance normalization.

use crate::cascade::{HaarFeature, Split, Stage};
use crate::geom::Size;
use crate::image::integral::{box_sum, box_sum_sq, Integrals};

#[derive(Debug)]
struct CompiledFeature {
    rects: Vec<([usize; 4], f32)>,
    tilted: bool,
}

#[derive(Debug)]
struct CompiledStump {
    feature: usize,
    threshold: f32,
    left: f32,
    right: f32,
}

#[derive(Debug)]
struct CompiledStage {
    threshold: f32,
    stumps: Vec<CompiledStump>,
}

/// Haar cascade with feature corners resolved against one integral stride.
#[derive(Debug)]
pub(crate) struct HaarProgram {
    norm: [usize; 4],
    norm_area: f64,
    features: Vec<CompiledFeature>,
    stages: Vec<CompiledStage>,
}

fn straight_corners(x: usize, y: usize, w: usize, h: usize, stride: usize) -> [usize; 4] {
    [
        y * stride + x,
        y * stride + x + w,
        (y + h) * stride + x,
        (y + h) * stride + x + w,
    ]
}

// Corner order matches `box_sum`: p0 - p1 - p2 + p3.
fn tilted_corners(x: usize, y: usize, w: usize, h: usize, stride: usize) -> [usize; 4] {
    [
        y * stride + x,
        (y + h) * stride + x - h,
        (y + w) * stride + x + w,
        (y + w + h) * stride + x + w - h,
    ]
}

impl HaarProgram {
    pub(crate) fn compile(
        features: &[HaarFeature],
        stages: &[Stage],
        window: Size,
        stride: usize,
    ) -> Self {
        let norm = straight_corners(1, 1, window.width - 2, window.height - 2, stride);
        let norm_area = ((window.width - 2) * (window.height - 2)) as f64;

        let features = features
            .iter()
            .map(|feature| {
                // Rotated rects cover twice the area of their side lengths.
                let factor = if feature.tilted { 0.5 } else { 1.0 };
                let rects = feature
                    .rects
                    .iter()
                    .map(|r| {
                        let corners = if feature.tilted {
                            tilted_corners(r.x, r.y, r.width, r.height, stride)
                        } else {
                            straight_corners(r.x, r.y, r.width, r.height, stride)
                        };
                        (corners, r.weight * factor)
                    })
                    .collect();
                CompiledFeature {
                    rects,
                    tilted: feature.tilted,
                }
            })
            .collect();

        let stages = stages
            .iter()
            .map(|stage| CompiledStage {
                threshold: stage.threshold,
                stumps: stage
                    .stumps
                    .iter()
                    .map(|stump| CompiledStump {
                        feature: stump.feature,
                        threshold: match stump.split {
                            Split::Threshold(t) => t,
                            Split::Subset(_) => 0.0,
                        },
                        left: stump.left,
                        right: stump.right,
                    })
                    .collect(),
            })
            .collect();

        Self {
            norm,
            norm_area,
            features,
            stages,
        }
    }

    /// Evaluates the window whose top-left integral index is `base`.
    pub(crate) fn accepts(&self, ints: &Integrals, base: usize) -> bool {
        let (Some(sqsum), sum) = (ints.sqsum(), ints.sum()) else {
            return false;
        };
        let tilted = ints.tilted();

        let s = box_sum(sum, base, &self.norm) as f64;
        let sq = box_sum_sq(sqsum, base, &self.norm) as f64;
        let variance = self.norm_area * sq - s * s;
        let norm = if variance > 0.0 {
            variance.sqrt() as f32
        } else {
            1.0
        };

        for stage in &self.stages {
            let mut acc = 0.0f32;
            for stump in &stage.stumps {
                let feature = &self.features[stump.feature];
                let table = if feature.tilted {
                    match tilted {
                        Some(t) => t,
                        None => return false,
                    }
                } else {
                    sum
                };
                let mut value = 0.0f32;
                for (corners, weight) in &feature.rects {
                    value += weight * box_sum(table, base, corners) as f32;
                }
                acc += if value < stump.threshold * norm {
                    stump.left
                } else {
                    stump.right
                };
            }
            if acc < stage.threshold {
                return false;
            }
        }
        true
    }
}
