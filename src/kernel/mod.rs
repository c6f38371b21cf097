//! Per-level cascade evaluators and detection routines.
//!
//! An [`Evaluator`] binds one model to one pyramid level: feature corners
//! are resolved against the level's integral stride once, at `init`. Before
//! each detection the evaluator is prepared against the refreshed integral
//! tables and the active mask, producing a [`PreparedEvaluator`] that can be
//! cloned into worker tasks and run over disjoint row ranges.
//!
//! The routine is chosen once at bind time from feature kind, bit width and
//! scan pattern; the six combinations are dispatched by `match`.

mod haar;
mod lbp;

use crate::cascade::{FeatureKind, Features};
use crate::geom::{Rect, Size};
use crate::image::integral::Integrals;
use crate::image::OwnedImage;
use crate::registry::ClassifierModel;
use crate::util::{DetectionError, DetectionResult};
use haar::HaarProgram;
use lbp::LbpProgram;
use std::sync::Arc;

/// Window classifier arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Evaluation {
    Haar32f,
    Lbp32f,
    Lbp16i,
}

/// Order and density of evaluated window positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScanPattern {
    /// Every position in the search rectangle.
    Rows,
    /// Every second row and column, starting at the rectangle origin.
    ThroughColumn,
}

impl ScanPattern {
    /// Distance between evaluated positions on both axes.
    pub fn step(self) -> usize {
        match self {
            ScanPattern::Rows => 1,
            ScanPattern::ThroughColumn => 2,
        }
    }
}

/// One of the six detection routines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Routine {
    pub evaluation: Evaluation,
    pub scan: ScanPattern,
}

impl Routine {
    /// Picks the routine for a feature kind, bit width and scan pattern.
    ///
    /// Haar cascades always use 32-bit float evaluation.
    pub fn select(kind: FeatureKind, use_int16: bool, through_column: bool) -> Self {
        let evaluation = match (kind, use_int16) {
            (FeatureKind::Haar, _) => Evaluation::Haar32f,
            (FeatureKind::Lbp, true) => Evaluation::Lbp16i,
            (FeatureKind::Lbp, false) => Evaluation::Lbp32f,
        };
        let scan = if through_column {
            ScanPattern::ThroughColumn
        } else {
            ScanPattern::Rows
        };
        Self { evaluation, scan }
    }

    pub fn name(&self) -> &'static str {
        match (self.evaluation, self.scan) {
            (Evaluation::Haar32f, ScanPattern::Rows) => "haar_32f_rows",
            (Evaluation::Haar32f, ScanPattern::ThroughColumn) => "haar_32f_columns",
            (Evaluation::Lbp32f, ScanPattern::Rows) => "lbp_32f_rows",
            (Evaluation::Lbp32f, ScanPattern::ThroughColumn) => "lbp_32f_columns",
            (Evaluation::Lbp16i, ScanPattern::Rows) => "lbp_16i_rows",
            (Evaluation::Lbp16i, ScanPattern::ThroughColumn) => "lbp_16i_columns",
        }
    }
}

/// Integral buffers a level provides, used to validate a bind.
#[derive(Clone, Copy, Debug)]
pub struct LevelGeometry {
    /// Source size of the level (integral tables are one larger).
    pub size: Size,
    pub has_sqsum: bool,
    pub has_tilted: bool,
}

#[derive(Debug)]
enum Program {
    Haar(HaarProgram),
    Lbp(LbpProgram),
}

/// A cascade model bound to one pyramid level.
#[derive(Debug)]
pub struct Evaluator {
    model: Arc<ClassifierModel>,
    program: Arc<Program>,
    routine: Routine,
}

impl Evaluator {
    /// Binds `model` to a level with the given integral geometry.
    pub fn bind(
        model: Arc<ClassifierModel>,
        level: usize,
        geometry: &LevelGeometry,
        through_column: bool,
        use_int16: bool,
    ) -> DetectionResult<Self> {
        let bind_err = |reason| DetectionError::Bind { level, reason };
        let cascade = model.cascade();
        let window = cascade.window();
        if !window.fits_in(geometry.size) {
            return Err(bind_err("window is larger than the level"));
        }
        if cascade.is_haar() && !geometry.has_sqsum {
            return Err(bind_err("haar cascade needs squared sums"));
        }
        if cascade.has_tilted() && !geometry.has_tilted {
            return Err(bind_err("tilted features need a tilted integral"));
        }
        if use_int16 && !cascade.can_int16() {
            return Err(bind_err("cascade is not int16 eligible"));
        }

        let stride = geometry.size.width + 1;
        let program = match &cascade.features {
            Features::Haar(features) => Program::Haar(HaarProgram::compile(
                features,
                &cascade.stages,
                window,
                stride,
            )),
            Features::Lbp(features) => {
                Program::Lbp(LbpProgram::compile(features, &cascade.stages, stride))
            }
        };
        let routine = Routine::select(cascade.feature_kind(), use_int16, through_column);

        Ok(Self {
            model,
            program: Arc::new(program),
            routine,
        })
    }

    pub fn model(&self) -> &Arc<ClassifierModel> {
        &self.model
    }

    pub fn routine(&self) -> Routine {
        self.routine
    }

    pub fn window(&self) -> Size {
        self.model.window()
    }

    /// Valid window origins for a centre-space search rectangle: the
    /// rectangle is shifted by minus half the window and clipped to
    /// `[0, level - window)`.
    pub fn valid_rect(&self, search: Rect, level: Size) -> Rect {
        let window = self.window();
        let span = Rect::new(
            0,
            0,
            level.width as isize - window.width as isize,
            level.height as isize - window.height as isize,
        );
        if span.is_empty() {
            return Rect::default();
        }
        search
            .shifted(-(window.width as isize / 2), -(window.height as isize / 2))
            .intersection(&span)
    }

    /// Snapshots the state a detection pass reads.
    pub fn prepare(&self, integrals: Arc<Integrals>, mask: Arc<OwnedImage>) -> PreparedEvaluator {
        let window = self.window();
        PreparedEvaluator {
            program: Arc::clone(&self.program),
            routine: self.routine,
            integrals,
            mask,
            mask_offset: (window.width / 2, window.height / 2),
        }
    }
}

/// Evaluator state shared with worker tasks for one detection pass.
#[derive(Clone)]
pub struct PreparedEvaluator {
    program: Arc<Program>,
    routine: Routine,
    integrals: Arc<Integrals>,
    mask: Arc<OwnedImage>,
    mask_offset: (usize, usize),
}

impl PreparedEvaluator {
    pub fn routine(&self) -> Routine {
        self.routine
    }

    /// Marks accepted window origins of `rect` with 1 in `out`.
    ///
    /// `out` holds rows `first_row..` of the hit bitmap with the given
    /// stride. A position is evaluated only when the mask is nonzero at the
    /// window centre. `rect` must lie inside the valid origin range.
    pub fn detect_rows(&self, rect: Rect, out: &mut [u8], stride: usize, first_row: isize) {
        let ints = &*self.integrals;
        match (self.routine.evaluation, &*self.program) {
            (Evaluation::Haar32f, Program::Haar(p)) => {
                self.scan(rect, out, stride, first_row, |base| p.accepts(ints, base))
            }
            (Evaluation::Lbp32f, Program::Lbp(p)) => {
                self.scan(rect, out, stride, first_row, |base| p.accepts_32(ints, base))
            }
            (Evaluation::Lbp16i, Program::Lbp(p)) => {
                self.scan(rect, out, stride, first_row, |base| p.accepts_16(ints, base))
            }
            // `bind` never pairs a routine with the other feature family.
            _ => {}
        }
    }

    fn scan(
        &self,
        rect: Rect,
        out: &mut [u8],
        stride: usize,
        first_row: isize,
        accepts: impl Fn(usize) -> bool,
    ) {
        if rect.is_empty() || rect.left < 0 || rect.top < first_row {
            return;
        }
        let step = self.routine.scan.step();
        let ints_stride = self.integrals.width();
        let (mask_dx, mask_dy) = self.mask_offset;

        for row in (rect.top as usize..rect.bottom as usize).step_by(step) {
            let mask_row = self.mask.row(row + mask_dy);
            let start = (row - first_row as usize) * stride;
            let Some(out_row) = out.get_mut(start..start + stride) else {
                break;
            };
            for col in (rect.left as usize..rect.right as usize).step_by(step) {
                if mask_row[col + mask_dx] != 0 && accepts(row * ints_stride + col) {
                    out_row[col] = 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Evaluation, Evaluator, LevelGeometry, Routine, ScanPattern};
    use crate::cascade::{Cascade, FeatureKind};
    use crate::geom::{Rect, Size};
    use crate::image::integral::Integrals;
    use crate::image::OwnedImage;
    use crate::registry::{ClassifierModel, Tag};
    use crate::util::DetectionError;
    use std::sync::Arc;

    const ACCEPT_ALL_LBP: &str = r#"{
        "stage_type": "BOOST", "feature_type": "LBP", "width": 6, "height": 6,
        "stages": [{ "threshold": -10.0, "weak_classifiers": [
            { "internal_nodes": [0, -1, 0, 0, 0, 0, 0, 0, 0, 0, 0], "leaf_values": [1.0, -1.0] }
        ]}],
        "features": [{ "rect": [0, 0, 2, 2] }]
    }"#;

    fn lbp_model() -> Arc<ClassifierModel> {
        let cascade = Cascade::from_json_str(ACCEPT_ALL_LBP).unwrap();
        Arc::new(ClassifierModel::new(cascade, Tag(0)))
    }

    #[test]
    fn routine_selection_covers_six_variants() {
        let r = Routine::select(FeatureKind::Haar, true, true);
        assert_eq!(r.evaluation, Evaluation::Haar32f);
        assert_eq!(r.scan, ScanPattern::ThroughColumn);
        assert_eq!(Routine::select(FeatureKind::Lbp, true, false).name(), "lbp_16i_rows");
        assert_eq!(Routine::select(FeatureKind::Lbp, false, true).name(), "lbp_32f_columns");
    }

    #[test]
    fn bind_rejects_missing_buffers_and_small_levels() {
        let haar = Cascade::from_json_str(
            r#"{
            "stage_type": "BOOST", "feature_type": "HAAR", "width": 6, "height": 6,
            "stages": [{ "threshold": 0.0, "weak_classifiers": [
                { "internal_nodes": [0, -1, 0, 0.1], "leaf_values": [-1.0, 1.0] }
            ]}],
            "features": [{ "rects": [[0, 0, 6, 6, -1.0], [0, 0, 3, 6, 2.0]] }]
        }"#,
        )
        .unwrap();
        let model = Arc::new(ClassifierModel::new(haar, Tag(1)));
        let geometry = LevelGeometry {
            size: Size::new(10, 10),
            has_sqsum: false,
            has_tilted: false,
        };
        let err = Evaluator::bind(model, 2, &geometry, true, false).unwrap_err();
        assert!(matches!(err, DetectionError::Bind { level: 2, .. }));

        let small = LevelGeometry {
            size: Size::new(5, 10),
            has_sqsum: true,
            has_tilted: false,
        };
        assert!(Evaluator::bind(lbp_model(), 0, &small, true, false).is_err());
    }

    #[test]
    fn column_scan_marks_every_second_position() {
        let level = Size::new(16, 14);
        let geometry = LevelGeometry {
            size: level,
            has_sqsum: false,
            has_tilted: false,
        };
        let evaluator = Evaluator::bind(lbp_model(), 0, &geometry, true, true).unwrap();
        let valid = evaluator.valid_rect(Rect::from_size(level), level);
        assert_eq!(valid, Rect::new(0, 0, 10, 8));

        let ints = Integrals::new(level, false, false).unwrap();
        let mask = OwnedImage::filled(level, 255).unwrap();
        let prepared = evaluator.prepare(Arc::new(ints), Arc::new(mask));
        let mut out = vec![0u8; level.width * level.height];
        prepared.detect_rows(valid, &mut out, level.width, 0);

        let hits: usize = out.iter().map(|&v| v as usize).sum();
        assert_eq!(hits, 5 * 4);
        assert_eq!(out[0], 1);
        assert_eq!(out[1], 0);
        assert_eq!(out[level.width], 0);
        assert_eq!(out[2 * level.width + 2], 1);
    }

    #[test]
    fn zero_mask_suppresses_evaluation() {
        let level = Size::new(12, 12);
        let geometry = LevelGeometry {
            size: level,
            has_sqsum: false,
            has_tilted: false,
        };
        let evaluator = Evaluator::bind(lbp_model(), 0, &geometry, false, false).unwrap();
        let mut mask = OwnedImage::filled(level, 0).unwrap();
        // Only the window centred at (5, 5) is enabled: origin (2, 2).
        mask.fill_rect(Rect::new(5, 5, 6, 6), 255);
        let prepared = evaluator.prepare(
            Arc::new(Integrals::new(level, false, false).unwrap()),
            Arc::new(mask),
        );
        let valid = evaluator.valid_rect(Rect::from_size(level), level);
        let mut out = vec![0u8; level.width * level.height];
        prepared.detect_rows(valid, &mut out, level.width, 0);
        let hits: Vec<usize> = out
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(hits, vec![2 * level.width + 2]);
    }
}
