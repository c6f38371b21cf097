//! Integral images (summed-area tables) for constant-time box sums.
//!
//! For a `w x h` source every table is `(w + 1) x (h + 1)` with a zero first
//! row and column:
//!
//! - `sum(X, Y)` is the sum of pixels with `x < X, y < Y`;
//! - `sqsum(X, Y)` is the same for squared pixels;
//! - `tilted(X, Y)` is the sum of pixels with `y < Y` and
//!   `|x - X + 1| <= Y - 1 - y` (the 45° rotated table).
//!
//! The sum and tilted tables use wrapping 32-bit arithmetic: box sums are
//! differences of four corners, which stay exact modulo 2^32 as long as the
//! box itself fits.

use crate::geom::Size;
use crate::image::ImageView;
use crate::util::{DetectionError, DetectionResult};

/// Integral tables for one pyramid level.
#[derive(Clone, Debug)]
pub struct Integrals {
    width: usize,
    height: usize,
    sum: Vec<u32>,
    sqsum: Option<Vec<u64>>,
    tilted: Option<Vec<u32>>,
}

impl Integrals {
    /// Allocates zeroed tables for a source of `size`.
    pub fn new(size: Size, with_sqsum: bool, with_tilted: bool) -> DetectionResult<Self> {
        let width = size.width + 1;
        let height = size.height + 1;
        let len = width
            .checked_mul(height)
            .ok_or(DetectionError::InvalidDimensions {
                width: size.width,
                height: size.height,
            })?;
        Ok(Self {
            width,
            height,
            sum: vec![0; len],
            sqsum: with_sqsum.then(|| vec![0; len]),
            tilted: with_tilted.then(|| vec![0; len]),
        })
    }

    /// Table width (`source width + 1`), which is also the row stride.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Table height (`source height + 1`).
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn sum(&self) -> &[u32] {
        &self.sum
    }

    pub fn sqsum(&self) -> Option<&[u64]> {
        self.sqsum.as_deref()
    }

    pub fn tilted(&self) -> Option<&[u32]> {
        self.tilted.as_deref()
    }

    /// Recomputes every allocated table from `src`.
    pub fn compute(&mut self, src: ImageView<'_, u8>) -> DetectionResult<()> {
        if src.width() + 1 != self.width || src.height() + 1 != self.height {
            return Err(DetectionError::InvalidInput(
                "integral tables do not match the source size",
            ));
        }
        self.compute_sums(src);
        if self.tilted.is_some() {
            self.compute_tilted(src);
        }
        Ok(())
    }

    fn compute_sums(&mut self, src: ImageView<'_, u8>) {
        let stride = self.width;
        let data = src.as_slice();
        for y in 0..src.height() {
            let row = &data[y * src.stride()..y * src.stride() + src.width()];
            let above = y * stride;
            let here = above + stride;
            let mut run = 0u32;
            let mut run_sq = 0u64;
            for (x, &v) in row.iter().enumerate() {
                run = run.wrapping_add(v as u32);
                self.sum[here + x + 1] = self.sum[above + x + 1].wrapping_add(run);
                if let Some(sqsum) = self.sqsum.as_mut() {
                    run_sq += (v as u64) * (v as u64);
                    sqsum[here + x + 1] = sqsum[above + x + 1] + run_sq;
                }
            }
        }
    }

    /// Fills the tilted table with the recurrence
    /// `T(X, Y) = T(X-1, Y-1) + T(X+1, Y-1) - T(X, Y-2) + I(X-1, Y-1) + I(X-1, Y-2)`.
    ///
    /// Triangles near the right and left edges need `T` outside `[0, w]`, so
    /// rows are computed over a band widened by the remaining row count and
    /// only the visible part is stored.
    fn compute_tilted(&mut self, src: ImageView<'_, u8>) {
        let Some(tilted) = self.tilted.as_mut() else {
            return;
        };
        let w = src.width() as isize;
        let h = src.height() as isize;
        let pad = h + 1;
        let band = (w + 1 + 2 * pad) as usize;
        let pixel = |x: isize, y: isize| -> u32 {
            if x < 0 || x >= w || y < 0 || y >= h {
                0
            } else {
                src.get(x as usize, y as usize).copied().unwrap_or(0) as u32
            }
        };

        // Rolling rows Y-2, Y-1 and Y, indexed by X + pad.
        let mut prev2 = vec![0u32; band];
        let mut prev1 = vec![0u32; band];
        let mut cur = vec![0u32; band];
        let stride = self.width;

        for y in 1..=h {
            for i in 0..band {
                let x = i as isize - pad;
                let left = if i > 0 { prev1[i - 1] } else { 0 };
                let right = if i + 1 < band { prev1[i + 1] } else { 0 };
                cur[i] = left
                    .wrapping_add(right)
                    .wrapping_sub(prev2[i])
                    .wrapping_add(pixel(x - 1, y - 1))
                    .wrapping_add(pixel(x - 1, y - 2));
            }
            let row = y as usize * stride;
            for x in 0..=w {
                tilted[row + x as usize] = cur[(x + pad) as usize];
            }
            std::mem::swap(&mut prev2, &mut prev1);
            std::mem::swap(&mut prev1, &mut cur);
        }
    }
}

/// Sum of the box with corner offsets `(top-left, top-right, bottom-left,
/// bottom-right)` relative to `base`.
#[inline]
pub(crate) fn box_sum(table: &[u32], base: usize, corners: &[usize; 4]) -> u32 {
    table[base + corners[0]]
        .wrapping_sub(table[base + corners[1]])
        .wrapping_sub(table[base + corners[2]])
        .wrapping_add(table[base + corners[3]])
}

/// Squared-sum counterpart of [`box_sum`].
#[inline]
pub(crate) fn box_sum_sq(table: &[u64], base: usize, corners: &[usize; 4]) -> u64 {
    (table[base + corners[0]] + table[base + corners[3]])
        - (table[base + corners[1]] + table[base + corners[2]])
}

#[cfg(test)]
mod tests {
    use super::{box_sum, Integrals};
    use crate::geom::Size;
    use crate::image::ImageView;

    fn brute_tilted(data: &[u8], w: usize, h: usize, cx: isize, cy: isize) -> u32 {
        let mut total = 0u32;
        for y in 0..h as isize {
            if y >= cy {
                continue;
            }
            for x in 0..w as isize {
                if (x - cx + 1).abs() <= cy - 1 - y {
                    total += data[y as usize * w + x as usize] as u32;
                }
            }
        }
        total
    }

    #[test]
    fn sums_match_brute_force() {
        let w = 5;
        let h = 4;
        let data: Vec<u8> = (0..(w * h) as u32).map(|v| (v * 37 % 251) as u8).collect();
        let view = ImageView::from_slice(&data, w, h).unwrap();
        let mut ints = Integrals::new(Size::new(w, h), true, false).unwrap();
        ints.compute(view).unwrap();

        let stride = ints.width();
        let mut expected = 0u32;
        let mut expected_sq = 0u64;
        for y in 0..3 {
            for x in 0..4 {
                let v = data[y * w + x];
                expected += v as u32;
                expected_sq += (v as u64) * (v as u64);
            }
        }
        assert_eq!(ints.sum()[3 * stride + 4], expected);
        assert_eq!(ints.sqsum().unwrap()[3 * stride + 4], expected_sq);

        // Box [1,3) x [1,4) via four corners.
        let corners = [stride + 1, stride + 3, 4 * stride + 1, 4 * stride + 3];
        let mut boxed = 0u32;
        for y in 1..4 {
            for x in 1..3 {
                boxed += data[y * w + x] as u32;
            }
        }
        assert_eq!(box_sum(ints.sum(), 0, &corners), boxed);
        assert!(ints.tilted().is_none());
    }

    #[test]
    fn tilted_matches_definition() {
        let w = 7;
        let h = 6;
        let data: Vec<u8> = (0..(w * h) as u32).map(|v| (v * 53 % 199) as u8).collect();
        let view = ImageView::from_slice(&data, w, h).unwrap();
        let mut ints = Integrals::new(Size::new(w, h), false, true).unwrap();
        ints.compute(view).unwrap();

        let tilted = ints.tilted().unwrap();
        let stride = ints.width();
        for y in 0..=h {
            for x in 0..=w {
                assert_eq!(
                    tilted[y * stride + x],
                    brute_tilted(&data, w, h, x as isize, y as isize),
                    "mismatch at ({x}, {y})"
                );
            }
        }
    }

    #[test]
    fn compute_rejects_wrong_source_size() {
        let data = [0u8; 6];
        let view = ImageView::from_slice(&data, 3, 2).unwrap();
        let mut ints = Integrals::new(Size::new(2, 2), false, false).unwrap();
        assert!(ints.compute(view).is_err());
    }
}
