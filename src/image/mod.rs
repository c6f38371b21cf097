//! Image views, owned buffers and the pixel primitives used by the pyramid.
//!
//! `ImageView` is a borrowed 2D view into a 1D buffer with an explicit stride.
//! The stride counts elements between the starts of consecutive rows, so a
//! stride larger than the width represents padded rows. Interleaved color
//! images use a view whose width counts elements (`pixels * channels`).

use crate::geom::{Rect, Size};
use crate::util::{DetectionError, DetectionResult};

pub mod integral;
#[cfg(feature = "image-io")]
pub mod io;
pub mod ops;

/// Memory layout of the pixels behind an `ImageView<u8>`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PixelFormat {
    /// Single-channel 8-bit intensity.
    #[default]
    Gray8,
    Rgb24,
    Bgr24,
    Rgba32,
    Bgra32,
}

impl PixelFormat {
    /// Number of interleaved channels per pixel.
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => 3,
            PixelFormat::Rgba32 | PixelFormat::Bgra32 => 4,
        }
    }
}

/// Borrowed 2D image view with an explicit stride.
#[derive(Copy, Clone)]
pub struct ImageView<'a, T> {
    data: &'a [T],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a, T> ImageView<'a, T> {
    /// Creates a contiguous view with `stride == width`.
    pub fn from_slice(data: &'a [T], width: usize, height: usize) -> DetectionResult<Self> {
        Self::new(data, width, height, width)
    }

    /// Creates a view with an explicit stride.
    pub fn new(data: &'a [T], width: usize, height: usize, stride: usize) -> DetectionResult<Self> {
        let needed = required_len(width, height, stride)?;
        if data.len() < needed {
            return Err(DetectionError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    /// Returns the image width in elements.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the stride in elements between row starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns width and height as a `Size`.
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Returns the backing slice including any row padding.
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Returns the element at `(x, y)` if it is within bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<&'a T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y.checked_mul(self.stride)?.checked_add(x)?;
        self.data.get(idx)
    }

    /// Returns a contiguous slice for row `y` with length `width`.
    pub fn row(&self, y: usize) -> Option<&'a [T]> {
        if y >= self.height {
            return None;
        }
        let start = y.checked_mul(self.stride)?;
        let end = start.checked_add(self.width)?;
        self.data.get(start..end)
    }
}

fn required_len(width: usize, height: usize, stride: usize) -> DetectionResult<usize> {
    if width == 0 || height == 0 {
        return Err(DetectionError::InvalidDimensions { width, height });
    }
    if stride < width {
        return Err(DetectionError::InvalidStride { width, stride });
    }
    let needed = (height - 1)
        .checked_mul(stride)
        .and_then(|v| v.checked_add(width))
        .ok_or(DetectionError::InvalidDimensions { width, height })?;
    Ok(needed)
}

/// Owned contiguous grayscale image buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct OwnedImage {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl OwnedImage {
    /// Wraps a contiguous buffer of exactly `width * height` bytes.
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> DetectionResult<Self> {
        if width == 0 || height == 0 {
            return Err(DetectionError::InvalidDimensions { width, height });
        }
        let needed = width
            .checked_mul(height)
            .ok_or(DetectionError::InvalidDimensions { width, height })?;
        if data.len() < needed {
            return Err(DetectionError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        if data.len() > needed {
            return Err(DetectionError::InvalidDimensions { width, height });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Allocates an image with every pixel set to `value`.
    pub fn filled(size: Size, value: u8) -> DetectionResult<Self> {
        let needed = size
            .width
            .checked_mul(size.height)
            .ok_or(DetectionError::InvalidDimensions {
                width: size.width,
                height: size.height,
            })?;
        Self::new(vec![value; needed], size.width, size.height)
    }

    /// Copies a (possibly strided) view into a contiguous buffer.
    pub fn from_view(view: ImageView<'_, u8>) -> DetectionResult<Self> {
        let mut out = Self::filled(view.size(), 0)?;
        for y in 0..view.height() {
            let row = view.row(y).ok_or(DetectionError::BufferTooSmall {
                needed: y * view.stride() + view.width(),
                got: view.as_slice().len(),
            })?;
            out.row_mut(y).copy_from_slice(row);
        }
        Ok(out)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Returns the pixel buffer in row-major order.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Returns row `y`; panics when out of range.
    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * self.width;
        &self.data[start..start + self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.width;
        &mut self.data[start..start + self.width]
    }

    /// Returns a borrowed view of the image.
    pub fn view(&self) -> ImageView<'_, u8> {
        ImageView {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.width,
        }
    }

    /// Sets every pixel to `value`.
    pub fn fill(&mut self, value: u8) {
        self.data.fill(value);
    }

    /// Sets the pixels of `rect` (clipped to the image) to `value`.
    pub fn fill_rect(&mut self, rect: Rect, value: u8) {
        let clipped = rect.intersection(&Rect::from_size(self.size()));
        if clipped.is_empty() {
            return;
        }
        let (x0, x1) = (clipped.left as usize, clipped.right as usize);
        for y in clipped.top as usize..clipped.bottom as usize {
            self.row_mut(y)[x0..x1].fill(value);
        }
    }
}
