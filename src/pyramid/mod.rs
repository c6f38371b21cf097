//! Multiscale pyramid of detection levels.
//!
//! The pyramid is built once per image size. Every level owns its scaled
//! source, masks, integral tables, hit bitmap and the evaluators of the
//! models whose scaled window qualified at that scale. Detection refreshes
//! the sources and integrals in place and then runs each evaluator over the
//! level's search rectangle.

use crate::geom::{Rect, Size};
use crate::image::integral::Integrals;
use crate::image::ops::{and_masks, binarize, normalize_histogram, resize_bilinear, shrink_region};
use crate::image::{ImageView, OwnedImage};
use crate::kernel::{Evaluator, LevelGeometry, ScanPattern};
use crate::pool::WorkerPool;
use crate::registry::ClassifierModel;
use crate::trace::trace_warn;
use crate::util::math::{scale_len, shrink_len};
use crate::util::{DetectionError, DetectionResult};
use std::sync::{mpsc, Arc};

/// Levels at or below this scale use the every-second-position scan.
pub const THROUGH_COLUMN_MAX_SCALE: f64 = 2.0;

/// Upper bound on the scales visited while building a pyramid.
pub const MAX_SCALES: usize = 1000;

/// Parameters of pyramid construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InitConfig {
    /// Ratio between consecutive level scales; must exceed 1.0 and reach
    /// the largest window within [`MAX_SCALES`] steps.
    pub scale_factor: f64,
    /// Smallest accepted scaled window.
    pub size_min: Size,
    /// Largest accepted scaled window.
    pub size_max: Size,
    /// Worker threads; 0 selects hardware concurrency, 1 disables workers.
    pub thread_count: usize,
    /// Use 16-bit LBP evaluation for eligible cascades.
    pub prefer_int16: bool,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            size_min: Size::new(0, 0),
            size_max: Size::MAX,
            thread_count: 0,
            prefer_int16: true,
        }
    }
}

impl InitConfig {
    fn validate(&self) -> DetectionResult<()> {
        if !self.scale_factor.is_finite() || self.scale_factor <= 1.0 {
            return Err(DetectionError::InvalidInput(
                "scale_factor must be finite and greater than 1",
            ));
        }
        Ok(())
    }
}

/// One scale of the pyramid.
pub struct Level {
    index: usize,
    scale: f64,
    through_column: bool,
    src: OwnedImage,
    roi: Arc<OwnedImage>,
    motion: Arc<OwnedImage>,
    rect: Rect,
    integrals: Arc<Integrals>,
    hits: OwnedImage,
    evaluators: Vec<Evaluator>,
}

impl Level {
    fn new(
        index: usize,
        scale: f64,
        size: Size,
        models: &[&Arc<ClassifierModel>],
        prefer_int16: bool,
        roi: Option<ImageView<'_, u8>>,
    ) -> DetectionResult<Self> {
        let through_column = scale <= THROUGH_COLUMN_MAX_SCALE;
        let geometry = LevelGeometry {
            size,
            has_sqsum: models.iter().any(|m| m.cascade().is_haar()),
            has_tilted: models.iter().any(|m| m.cascade().has_tilted()),
        };

        let evaluators = models
            .iter()
            .map(|model| {
                let use_int16 = prefer_int16 && model.cascade().can_int16();
                Evaluator::bind(Arc::clone(model), index, &geometry, through_column, use_int16)
            })
            .collect::<DetectionResult<Vec<_>>>()?;

        let (roi_mask, rect) = match roi {
            None => (OwnedImage::filled(size, 255)?, Rect::from_size(size)),
            Some(view) => {
                let mut mask = OwnedImage::filled(size, 0)?;
                resize_bilinear(view, &mut mask);
                binarize(&mut mask, 0, 255, 0);
                let rect = shrink_region(mask.view(), 255, Rect::from_size(size));
                (mask, rect)
            }
        };

        Ok(Self {
            index,
            scale,
            through_column,
            src: OwnedImage::filled(size, 0)?,
            motion: Arc::new(OwnedImage::filled(size, 0)?),
            roi: Arc::new(roi_mask),
            rect,
            integrals: Arc::new(Integrals::new(size, geometry.has_sqsum, geometry.has_tilted)?),
            hits: OwnedImage::filled(size, 0)?,
            evaluators,
        })
    }

    /// Ratio between image and level coordinates.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn through_column(&self) -> bool {
        self.through_column
    }

    pub fn size(&self) -> Size {
        self.src.size()
    }

    /// Search rectangle of window centres derived from the ROI.
    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn evaluators(&self) -> &[Evaluator] {
        &self.evaluators
    }

    /// Scan stride used for this level's positions.
    pub fn step(&self) -> usize {
        if self.through_column {
            ScanPattern::ThroughColumn.step()
        } else {
            ScanPattern::Rows.step()
        }
    }

    pub fn hits(&self) -> &OwnedImage {
        &self.hits
    }

    pub fn src(&self) -> &OwnedImage {
        &self.src
    }

    fn compute_integrals(&mut self) -> DetectionResult<()> {
        Arc::make_mut(&mut self.integrals).compute(self.src.view())
    }

    /// Rebuilds the motion mask from image-space regions and returns the
    /// restricted search rectangle.
    pub(crate) fn fill_motion_mask(&mut self, regions: &[Rect]) -> DetectionResult<Rect> {
        let motion = Arc::make_mut(&mut self.motion);
        motion.fill(0);
        let mut rect = Rect::default();
        for region in regions {
            let scaled = region.scaled(1.0 / self.scale);
            rect = rect.union(&scaled);
            motion.fill_rect(scaled, 255);
        }
        and_masks(motion, &self.roi)?;
        Ok(rect.intersection(&self.rect))
    }

    /// Runs evaluator `index` over the search rectangle `rect`, leaving its
    /// accepted window origins in the hit bitmap.
    ///
    /// Returns the rectangle of window origins that was evaluated. With a
    /// non-empty pool the rows are split into one strip per worker; a strip
    /// that never comes back fails the level.
    pub(crate) fn run_evaluator(
        &mut self,
        index: usize,
        rect: Rect,
        use_motion: bool,
        pool: &WorkerPool,
    ) -> DetectionResult<Rect> {
        let evaluator = &self.evaluators[index];
        let size = self.src.size();
        let valid = evaluator.valid_rect(rect, size);
        self.hits.fill(0);
        if valid.is_empty() {
            return Ok(valid);
        }

        let mask = if use_motion {
            Arc::clone(&self.motion)
        } else {
            Arc::clone(&self.roi)
        };
        let prepared = evaluator.prepare(Arc::clone(&self.integrals), mask);
        let stride = self.hits.width();

        if pool.is_empty() {
            prepared.detect_rows(valid, self.hits.data_mut(), stride, 0);
            return Ok(valid);
        }

        let mut step = valid.height() as usize / pool.len() + 1;
        if self.through_column {
            step += step & 1;
        }
        let (sender, receiver) = mpsc::channel();
        for (i, worker) in pool.workers().iter().enumerate() {
            let top = valid.top + (i * step) as isize;
            let bottom = (top + step as isize).min(valid.bottom);
            if top >= bottom {
                break;
            }
            let strip = Rect::new(valid.left, top, valid.right, bottom);
            let prepared = prepared.clone();
            let sender = sender.clone();
            worker.add(move || {
                let mut rows = vec![0u8; (bottom - top) as usize * stride];
                prepared.detect_rows(strip, &mut rows, stride, top);
                let _ = sender.send((top as usize, rows));
            });
        }
        drop(sender);
        pool.wait();

        let expected = (valid.height() as usize).div_ceil(step);
        merge_strips(&mut self.hits, receiver.try_iter(), expected).map_err(|got| {
            trace_warn!(
                "strips_missing",
                level_index = self.index,
                expected = expected,
                got = got
            );
            DetectionError::StripsMissing {
                level: self.index,
                expected,
                got,
            }
        })?;
        Ok(valid)
    }
}

/// Copies `(first row, rows)` strips into `hits`; on a count other than
/// `expected` returns the number of strips received.
fn merge_strips<I>(hits: &mut OwnedImage, strips: I, expected: usize) -> Result<(), usize>
where
    I: IntoIterator<Item = (usize, Vec<u8>)>,
{
    let stride = hits.width();
    let data = hits.data_mut();
    let mut got = 0;
    for (top, rows) in strips {
        let start = top * stride;
        data[start..start + rows.len()].copy_from_slice(&rows);
        got += 1;
    }
    if got == expected {
        Ok(())
    } else {
        Err(got)
    }
}

/// The ordered set of levels built for one image size.
pub struct Pyramid {
    image_size: Size,
    need_normalization: bool,
    levels: Vec<Level>,
}

impl Pyramid {
    /// Builds the levels for `image_size` from the registered `models`.
    ///
    /// Scales start at 1.0 and grow by `scale_factor` while any model's
    /// rounded scaled window still fits `size_max` and the image. A level is
    /// emitted for every scale at which some model's window is also at least
    /// `size_min`, and binds only those models.
    pub fn build(
        models: &[Arc<ClassifierModel>],
        image_size: Size,
        config: &InitConfig,
        roi: Option<ImageView<'_, u8>>,
    ) -> DetectionResult<Self> {
        if models.is_empty() {
            return Err(DetectionError::NoModels);
        }
        config.validate()?;
        if image_size.is_empty() {
            return Err(DetectionError::InvalidDimensions {
                width: image_size.width,
                height: image_size.height,
            });
        }
        if let Some(view) = roi {
            if view.size() != image_size {
                return Err(DetectionError::InvalidInput("roi size differs from image size"));
            }
        }

        // Scales are planned before any level buffer is allocated.
        let mut plan = Vec::new();
        let mut scale = 1.0f64;
        for visited in 0.. {
            let level_size = Size::new(
                shrink_len(image_size.width, scale),
                shrink_len(image_size.height, scale),
            );
            let mut proceed = false;
            let inserted: Vec<&Arc<ClassifierModel>> = models
                .iter()
                .filter(|model| {
                    let base = model.window();
                    let window = Size::new(
                        scale_len(base.width, scale),
                        scale_len(base.height, scale),
                    );
                    if !window.fits_in(config.size_max) || !window.fits_in(image_size) {
                        return false;
                    }
                    proceed = true;
                    window.covers(config.size_min) && base.fits_in(level_size)
                })
                .collect();
            if !proceed {
                break;
            }
            if visited == MAX_SCALES {
                return Err(DetectionError::InvalidInput(
                    "scale_factor yields too many pyramid scales",
                ));
            }
            if !inserted.is_empty() {
                plan.push((scale, level_size, inserted));
            }
            scale *= config.scale_factor;
        }

        let need_normalization = plan
            .iter()
            .any(|(_, _, bound)| bound.iter().any(|m| m.cascade().is_haar()));
        let levels = plan
            .into_iter()
            .enumerate()
            .map(|(index, (scale, level_size, bound))| {
                Level::new(index, scale, level_size, &bound, config.prefer_int16, roi)
            })
            .collect::<DetectionResult<Vec<_>>>()?;

        if levels.is_empty() {
            return Err(DetectionError::NoLevels);
        }
        Ok(Self {
            image_size,
            need_normalization,
            levels,
        })
    }

    pub fn image_size(&self) -> Size {
        self.image_size
    }

    /// True when a Haar model is bound and the first level is
    /// histogram-normalized before integration.
    pub fn need_normalization(&self) -> bool {
        self.need_normalization
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub(crate) fn levels_mut(&mut self) -> &mut [Level] {
        &mut self.levels
    }

    /// Level scales in ascending order.
    pub fn scales(&self) -> Vec<f64> {
        self.levels.iter().map(|l| l.scale).collect()
    }

    /// Resamples a gray image of the pyramid's image size into every level
    /// and recomputes the integral tables.
    ///
    /// Each level after the first is resampled from the previous one.
    pub fn refresh(&mut self, gray: ImageView<'_, u8>) -> DetectionResult<()> {
        if gray.size() != self.image_size {
            return Err(DetectionError::SizeMismatch {
                expected_width: self.image_size.width,
                expected_height: self.image_size.height,
                got_width: gray.width(),
                got_height: gray.height(),
            });
        }
        let (first, rest) = self
            .levels
            .split_first_mut()
            .ok_or(DetectionError::NoLevels)?;
        resize_bilinear(gray, &mut first.src);
        if self.need_normalization {
            normalize_histogram(&mut first.src);
        }
        first.compute_integrals()?;

        let mut prev: &Level = first;
        for level in rest {
            resize_bilinear(prev.src.view(), &mut level.src);
            level.compute_integrals()?;
            prev = level;
        }
        Ok(())
    }
}
