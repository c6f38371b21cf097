//! Load, init and detect lifecycle of the multiscale detector.

use crate::candidate::aggregate::add_objects;
use crate::candidate::group::group_by_tag;
use crate::candidate::Object;
use crate::cascade::Cascade;
use crate::geom::{Rect, Size};
use crate::image::ops::to_gray;
use crate::image::{ImageView, PixelFormat};
use crate::pool::WorkerPool;
use crate::pyramid::{InitConfig, Pyramid};
use crate::registry::{ModelRegistry, Tag};
use crate::trace::{trace_event, trace_span};
use crate::util::{DetectionError, DetectionResult};
use std::collections::BTreeMap;
use std::path::Path;

/// Parameters of a single detection pass.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectConfig {
    /// Minimum number of candidates a detection must merge.
    pub group_size_min: usize,
    /// Relative edge tolerance used for clustering and suppression.
    pub size_difference_max: f64,
    /// Image-space regions the window centres are restricted to, in
    /// addition to the ROI.
    pub motion_regions: Option<Vec<Rect>>,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            group_size_min: 3,
            size_difference_max: 0.2,
            motion_regions: None,
        }
    }
}

/// Multiscale cascade detector.
///
/// Models are loaded first; [`Detector::init`] then builds the pyramid and
/// the worker pool for one image size, after which [`Detector::detect`] can
/// be called any number of times with images of that size.
#[derive(Default)]
pub struct Detector {
    registry: ModelRegistry,
    pyramid: Option<Pyramid>,
    pool: WorkerPool,
}

impl Detector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a cascade file. Nothing is stored on error.
    pub fn load<P: AsRef<Path>>(&mut self, path: P, tag: Tag) -> DetectionResult<()> {
        self.registry.load(path, tag)
    }

    /// Loads a cascade from its JSON text.
    pub fn load_str(&mut self, text: &str, tag: Tag) -> DetectionResult<()> {
        self.registry.load_str(text, tag)
    }

    /// Registers an already parsed cascade.
    pub fn register(&mut self, cascade: Cascade, tag: Tag) {
        self.registry.register(cascade, tag);
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Builds the pyramid for `image_size`.
    ///
    /// Any previous pyramid and worker pool are released first; on error the
    /// detector stays uninitialized. `roi`, when given, must have the image
    /// size; its nonzero pixels mark allowed window centres.
    pub fn init(
        &mut self,
        image_size: Size,
        config: &InitConfig,
        roi: Option<ImageView<'_, u8>>,
    ) -> DetectionResult<()> {
        let _span = trace_span!(
            "init",
            width = image_size.width,
            height = image_size.height
        )
        .entered();

        self.pyramid = None;
        self.pool = WorkerPool::default();
        if self.registry.is_empty() {
            return Err(DetectionError::NoModels);
        }

        let pyramid = Pyramid::build(self.registry.models(), image_size, config, roi)?;
        self.pool = WorkerPool::new(config.thread_count)?;
        trace_event!(
            "pyramid_built",
            levels = pyramid.levels().len(),
            workers = self.pool.len()
        );
        self.pyramid = Some(pyramid);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.pyramid.is_some()
    }

    pub fn pyramid(&self) -> Option<&Pyramid> {
        self.pyramid.as_ref()
    }

    /// Scales of the current levels; empty before `init`.
    pub fn level_scales(&self) -> Vec<f64> {
        self.pyramid.as_ref().map(Pyramid::scales).unwrap_or_default()
    }

    /// Number of worker threads; 0 when detection runs on the caller thread.
    pub fn num_workers(&self) -> usize {
        self.pool.len()
    }

    /// Detects objects in `src`, which must have the size passed to `init`.
    ///
    /// `src` is interpreted according to `format`; its width counts bytes,
    /// so a color view is `channels` times wider than the image.
    pub fn detect(
        &mut self,
        src: ImageView<'_, u8>,
        format: PixelFormat,
        config: &DetectConfig,
    ) -> DetectionResult<Vec<Object>> {
        let pyramid = self.pyramid.as_mut().ok_or(DetectionError::NotInitialized)?;
        let expected = pyramid.image_size();
        let got = Size::new(src.width() / format.channels(), src.height());
        if got != expected || src.width() % format.channels() != 0 {
            return Err(DetectionError::SizeMismatch {
                expected_width: expected.width,
                expected_height: expected.height,
                got_width: got.width,
                got_height: got.height,
            });
        }

        let _span = trace_span!("detect", width = got.width, height = got.height).entered();

        if format == PixelFormat::Gray8 {
            pyramid.refresh(src)?;
        } else {
            let gray = to_gray(src, format)?;
            pyramid.refresh(gray.view())?;
        }

        let mut candidates: BTreeMap<Tag, Vec<Object>> = BTreeMap::new();
        for level in pyramid.levels_mut() {
            let _level_span = trace_span!("detect_level", scale = level.scale()).entered();
            let (rect, use_motion) = match &config.motion_regions {
                Some(regions) => (level.fill_motion_mask(regions)?, true),
                None => (level.rect(), false),
            };
            if rect.is_empty() {
                continue;
            }
            for index in 0..level.evaluators().len() {
                let valid = level.run_evaluator(index, rect, use_motion, &self.pool)?;
                let model = level.evaluators()[index].model();
                add_objects(
                    candidates.entry(model.tag()).or_default(),
                    level.hits(),
                    valid,
                    model.window(),
                    level.scale(),
                    level.step(),
                    model.tag(),
                );
            }
        }

        let total: usize = candidates.values().map(Vec::len).sum();
        let objects = group_by_tag(candidates, config.group_size_min, config.size_difference_max);
        trace_event!("objects_grouped", candidates = total, objects = objects.len());
        Ok(objects)
    }
}
