//! Candidate collection and clustering.
//!
//! Hit bitmaps are turned into image-space candidates by [`aggregate`];
//! candidates of one tag are clustered into detections by [`group`].

pub mod aggregate;
pub mod group;

use crate::geom::Rect;
use crate::registry::Tag;

/// A detected object in image coordinates.
///
/// Raw candidates carry weight 1; clustered detections carry the number of
/// merged candidates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Object {
    pub rect: Rect,
    pub weight: usize,
    pub tag: Tag,
}

impl Object {
    pub fn new(rect: Rect, weight: usize, tag: Tag) -> Self {
        Self { rect, weight, tag }
    }
}
