//! Rounding helpers shared by the geometry and pyramid code.

/// Rounds to the nearest integer, halves away from zero.
#[inline]
pub(crate) fn round_isize(value: f64) -> isize {
    value.round() as isize
}

/// Scales a positive length and rounds to nearest.
#[inline]
pub(crate) fn scale_len(len: usize, scale: f64) -> usize {
    (len as f64 * scale).round().max(0.0) as usize
}

/// Divides a length by a scale, truncating toward zero.
#[inline]
pub(crate) fn shrink_len(len: usize, scale: f64) -> usize {
    (len as f64 / scale) as usize
}
