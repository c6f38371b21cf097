//! Integer sizes and half-open rectangles.

use crate::util::math::round_isize;

/// Width and height in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Size {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
}

impl Size {
    /// Unbounded size used as the default upper detection limit.
    pub const MAX: Size = Size {
        width: usize::MAX,
        height: usize::MAX,
    };

    /// Creates a size.
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Returns true when either side is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns true when both sides are `<=` the other size.
    pub fn fits_in(&self, other: Size) -> bool {
        self.width <= other.width && self.height <= other.height
    }

    /// Returns true when both sides are `>=` the other size.
    pub fn covers(&self, other: Size) -> bool {
        self.width >= other.width && self.height >= other.height
    }
}

/// Axis-aligned rectangle with half-open bounds `[left, right) x [top, bottom)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub left: isize,
    pub top: isize,
    pub right: isize,
    pub bottom: isize,
}

impl Rect {
    /// Creates a rectangle from its four edges.
    pub const fn new(left: isize, top: isize, right: isize, bottom: isize) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle covering `[0, width) x [0, height)`.
    pub fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width as isize, size.height as isize)
    }

    pub fn width(&self) -> isize {
        self.right - self.left
    }

    pub fn height(&self) -> isize {
        self.bottom - self.top
    }

    /// Returns true when the rectangle covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    /// Translates the rectangle.
    pub fn shifted(&self, dx: isize, dy: isize) -> Self {
        Self::new(self.left + dx, self.top + dy, self.right + dx, self.bottom + dy)
    }

    /// Intersection; empty inputs yield an empty result.
    pub fn intersection(&self, other: &Rect) -> Self {
        let r = Self::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        if r.is_empty() {
            Rect::default()
        } else {
            r
        }
    }

    /// Smallest rectangle containing both; an empty side is ignored.
    pub fn union(&self, other: &Rect) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Self::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    /// Multiplies every coordinate by `factor`, rounding to nearest.
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(
            round_isize(self.left as f64 * factor),
            round_isize(self.top as f64 * factor),
            round_isize(self.right as f64 * factor),
            round_isize(self.bottom as f64 * factor),
        )
    }

    /// Returns true when the point lies inside the half-open bounds.
    pub fn contains_point(&self, x: isize, y: isize) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }
}
