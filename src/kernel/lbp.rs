//! LBP cascade evaluation in 32-bit and 16-bit integral arithmetic.
//!
//! A feature is a 3x3 grid of equal cells. Its code sets one bit per
//! neighbour cell whose sum is `>=` the centre sum, clockwise from the
//! top-left cell (bit 7) to the middle-left cell (bit 0).

use crate::cascade::{LbpFeature, Split, Stage};
use crate::image::integral::Integrals;

#[derive(Debug)]
struct CompiledStump {
    feature: usize,
    subset: [u32; 8],
    left: f32,
    right: f32,
}

#[derive(Debug)]
struct CompiledStage {
    threshold: f32,
    stumps: Vec<CompiledStump>,
}

/// LBP cascade with the 4x4 grid corners resolved against one stride.
#[derive(Debug)]
pub(crate) struct LbpProgram {
    grids: Vec<[usize; 16]>,
    stages: Vec<CompiledStage>,
}

/// Neighbour cells `(row, col)` in bit order 7..0.
const NEIGHBOURS: [(usize, usize); 8] = [
    (0, 0),
    (0, 1),
    (0, 2),
    (1, 2),
    (2, 2),
    (2, 1),
    (2, 0),
    (1, 0),
];

#[inline]
fn code<T: Copy + PartialOrd>(cell: impl Fn(usize, usize) -> T) -> u8 {
    let centre = cell(1, 1);
    NEIGHBOURS
        .iter()
        .fold(0u8, |acc, &(r, c)| (acc << 1) | u8::from(cell(r, c) >= centre))
}

impl LbpProgram {
    pub(crate) fn compile(features: &[LbpFeature], stages: &[Stage], stride: usize) -> Self {
        let grids = features
            .iter()
            .map(|f| {
                let mut grid = [0usize; 16];
                for (i, corner) in grid.iter_mut().enumerate() {
                    let (r, c) = (i / 4, i % 4);
                    *corner = (f.y + r * f.height) * stride + f.x + c * f.width;
                }
                grid
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
                        subset: match stump.split {
                            Split::Subset(bits) => bits,
                            Split::Threshold(_) => [0; 8],
                        },
                        left: stump.left,
                        right: stump.right,
                    })
                    .collect(),
            })
            .collect();

        Self { grids, stages }
    }

    fn run(&self, code_at: impl Fn(&[usize; 16]) -> u8) -> bool {
        for stage in &self.stages {
            let mut acc = 0.0f32;
            for stump in &stage.stumps {
                let c = code_at(&self.grids[stump.feature]) as usize;
                let member = (stump.subset[c >> 5] >> (c & 31)) & 1 != 0;
                acc += if member { stump.left } else { stump.right };
            }
            if acc < stage.threshold {
                return false;
            }
        }
        true
    }

    /// Evaluates with 32-bit cell sums.
    pub(crate) fn accepts_32(&self, ints: &Integrals, base: usize) -> bool {
        let sum = ints.sum();
        self.run(|grid| {
            code(|r, c| {
                let i = r * 4 + c;
                sum[base + grid[i]]
                    .wrapping_sub(sum[base + grid[i + 1]])
                    .wrapping_sub(sum[base + grid[i + 4]])
                    .wrapping_add(sum[base + grid[i + 5]])
            })
        })
    }

    /// Evaluates with 16-bit wrapped cell sums; exact when every cell sum
    /// stays below 2^15.
    pub(crate) fn accepts_16(&self, ints: &Integrals, base: usize) -> bool {
        let sum = ints.sum();
        self.run(|grid| {
            code(|r, c| {
                let i = r * 4 + c;
                let at = |k: usize| sum[base + grid[k]] as u16;
                at(i).wrapping_sub(at(i + 1))
                    .wrapping_sub(at(i + 4))
                    .wrapping_add(at(i + 5)) as i16
            })
        })
    }
}
