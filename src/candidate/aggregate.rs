//! Conversion of per-level hit bitmaps into image-space candidates.

use crate::candidate::Object;
use crate::geom::{Rect, Size};
use crate::image::OwnedImage;
use crate::registry::Tag;

/// Appends one candidate per nonzero hit inside `valid`.
///
/// `valid` is the rectangle of window origins that was evaluated, `step` the
/// scan stride used for it. Each hit at `(col, row)` becomes the window
/// rectangle scaled back to image coordinates.
pub fn add_objects(
    out: &mut Vec<Object>,
    hits: &OwnedImage,
    valid: Rect,
    window: Size,
    scale: f64,
    step: usize,
    tag: Tag,
) {
    let bounds = valid.intersection(&Rect::from_size(hits.size()));
    if bounds.is_empty() {
        return;
    }
    let (w, h) = (window.width as isize, window.height as isize);
    for row in (bounds.top..bounds.bottom).step_by(step.max(1)) {
        let line = hits.row(row as usize);
        for col in (bounds.left..bounds.right).step_by(step.max(1)) {
            if line[col as usize] != 0 {
                let rect = Rect::new(col, row, col + w, row + h).scaled(scale);
                out.push(Object::new(rect, 1, tag));
            }
        }
    }
}
