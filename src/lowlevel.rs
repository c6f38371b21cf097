//! Low-level building blocks for custom detection pipelines.
//!
//! These re-exports expose the pixel primitives, per-level evaluators and
//! clustering helpers used by [`Detector`](crate::Detector). Most users
//! should prefer the top-level `Detector` API.

pub use crate::candidate::aggregate::add_objects;
pub use crate::candidate::group::{group_by_tag, group_objects, partition, similar};
pub use crate::image::integral::Integrals;
pub use crate::image::ops::{
    and_masks, binarize, normalize_histogram, resize_bilinear, shrink_region, to_gray,
};
pub use crate::kernel::{
    Evaluation, Evaluator, LevelGeometry, PreparedEvaluator, Routine, ScanPattern,
};
pub use crate::pool::{resolve_thread_count, Worker, WorkerPool};
pub use crate::pyramid::{Level, Pyramid};
