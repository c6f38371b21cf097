//! Scalar reference implementations of the per-pixel primitives.
//!
//! These are the building blocks the pyramid refresh and the ROI handling
//! are composed from: bilinear resize, histogram normalization,
//! binarization, region shrinking, mask combination and gray conversion.

use crate::geom::Rect;
use crate::image::{ImageView, OwnedImage, PixelFormat};
use crate::util::{DetectionError, DetectionResult};

/// Resizes `src` into `dst` using center-aligned bilinear sampling.
///
/// Destination pixel `(x, y)` samples the source at
/// `((x + 0.5) * sx - 0.5, (y + 0.5) * sy - 0.5)` with `sx = src_w / dst_w`,
/// clamped to the valid source range. Output values are rounded to nearest.
pub fn resize_bilinear(src: ImageView<'_, u8>, dst: &mut OwnedImage) {
    let (src_w, src_h) = (src.width(), src.height());
    let (dst_w, dst_h) = (dst.width(), dst.height());
    let sx = src_w as f32 / dst_w as f32;
    let sy = src_h as f32 / dst_h as f32;
    let max_x = (src_w - 1) as f32;
    let max_y = (src_h - 1) as f32;

    // Column taps are shared by every row.
    let taps: Vec<(usize, usize, f32)> = (0..dst_w)
        .map(|x| {
            let fx = ((x as f32 + 0.5) * sx - 0.5).clamp(0.0, max_x);
            let x0 = fx.floor() as usize;
            let x1 = (x0 + 1).min(src_w - 1);
            (x0, x1, fx - x0 as f32)
        })
        .collect();

    let src_data = src.as_slice();
    let stride = src.stride();
    for y in 0..dst_h {
        let fy = ((y as f32 + 0.5) * sy - 0.5).clamp(0.0, max_y);
        let y0 = fy.floor() as usize;
        let y1 = (y0 + 1).min(src_h - 1);
        let wy = fy - y0 as f32;
        let row0 = &src_data[y0 * stride..y0 * stride + src_w];
        let row1 = &src_data[y1 * stride..y1 * stride + src_w];

        for (out, &(x0, x1, wx)) in dst.row_mut(y).iter_mut().zip(taps.iter()) {
            let top = row0[x0] as f32 * (1.0 - wx) + row0[x1] as f32 * wx;
            let bottom = row1[x0] as f32 * (1.0 - wx) + row1[x1] as f32 * wx;
            let value = top * (1.0 - wy) + bottom * wy;
            *out = value.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Stretches the cumulative histogram of `img` over `[0, 255]` in place.
///
/// The darkest occupied bin maps to 0; every other bin maps to
/// `round((cdf(v) - count(min)) * 255 / (total - count(min)))`.
pub fn normalize_histogram(img: &mut OwnedImage) {
    let mut histogram = [0u32; 256];
    for &v in img.data() {
        histogram[v as usize] += 1;
    }

    let mut cumulative = [0u32; 256];
    let mut total = 0u32;
    let mut min_count = 0u32;
    let mut min_color = 0usize;
    for (value, &count) in histogram.iter().enumerate() {
        if total == 0 && count != 0 {
            min_count = count;
            min_color = value;
        }
        total += count;
        cumulative[value] = total;
    }
    if total == min_count {
        // Flat image: nothing to stretch.
        return;
    }

    let coefficient = 255.0f32 / (total - min_count) as f32;
    let mut colors = [0u8; 256];
    for value in min_color..256 {
        let stretched = (cumulative[value] - min_count) as f32 * coefficient;
        colors[value] = stretched.round().clamp(0.0, 255.0) as u8;
    }
    for v in img.data_mut() {
        *v = colors[*v as usize];
    }
}

/// Maps each pixel to `positive` when it is greater than `threshold`, else
/// to `negative`.
pub fn binarize(img: &mut OwnedImage, threshold: u8, positive: u8, negative: u8) {
    for v in img.data_mut() {
        *v = if *v > threshold { positive } else { negative };
    }
}

/// Shrinks `rect` to the bounding box of the pixels equal to `index`.
///
/// Returns an empty rectangle when no pixel inside `rect` matches.
pub fn shrink_region(mask: ImageView<'_, u8>, index: u8, rect: Rect) -> Rect {
    let bounds = rect.intersection(&Rect::from_size(mask.size()));
    if bounds.is_empty() {
        return Rect::default();
    }

    let mut found = Rect::new(isize::MAX, isize::MAX, isize::MIN, isize::MIN);
    for y in bounds.top..bounds.bottom {
        let Some(row) = mask.row(y as usize) else {
            break;
        };
        for x in bounds.left..bounds.right {
            if row[x as usize] == index {
                found.left = found.left.min(x);
                found.right = found.right.max(x + 1);
                found.top = found.top.min(y);
                found.bottom = found.bottom.max(y + 1);
            }
        }
    }

    if found.is_empty() {
        Rect::default()
    } else {
        found
    }
}

/// Combines `dst` with `other` using bitwise AND.
pub fn and_masks(dst: &mut OwnedImage, other: &OwnedImage) -> DetectionResult<()> {
    if dst.size() != other.size() {
        return Err(DetectionError::InvalidInput("mask sizes differ"));
    }
    for (d, &o) in dst.data_mut().iter_mut().zip(other.data()) {
        *d &= o;
    }
    Ok(())
}

/// Converts an interleaved color view to 8-bit intensity.
///
/// The view width counts elements, so it must be a multiple of the channel
/// count. Uses BT.601 weights in 8-bit fixed point.
pub fn to_gray(src: ImageView<'_, u8>, format: PixelFormat) -> DetectionResult<OwnedImage> {
    let channels = format.channels();
    if src.width() % channels != 0 {
        return Err(DetectionError::InvalidInput(
            "view width is not a multiple of the channel count",
        ));
    }
    if channels == 1 {
        return OwnedImage::from_view(src);
    }

    let width = src.width() / channels;
    let height = src.height();
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        let row = src.row(y).ok_or(DetectionError::BufferTooSmall {
            needed: y * src.stride() + src.width(),
            got: src.as_slice().len(),
        })?;
        for px in row.chunks_exact(channels) {
            let (r, g, b) = match format {
                PixelFormat::Rgb24 | PixelFormat::Rgba32 => (px[0], px[1], px[2]),
                _ => (px[2], px[1], px[0]),
            };
            let luma = (77 * r as u32 + 150 * g as u32 + 29 * b as u32 + 128) >> 8;
            data.push(luma as u8);
        }
    }
    OwnedImage::new(data, width, height)
}
