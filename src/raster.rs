use image::{GenericImageView, Rgba, RgbaImage};

use crate::error::{Error, Result};

/// Sum of R, G and B below which a pixel prints dark.
///
/// Equivalent to a mean luminance threshold of 128.
const DARK_SUM_THRESHOLD: u32 = 128 * 3;

/// 1bpp raster in the printer's payload layout.
///
/// Rows top to bottom, each `bytes_per_row` long. Within a byte the leftmost
/// pixel is the most significant bit; a set bit burns a dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedBitmap {
    pub width: u32,
    pub height: u32,
    pub bytes_per_row: usize,
    pub data: Vec<u8>,
}

impl PackedBitmap {
    /// Bytes of rows `start..start + lines`, cut short at the last row.
    ///
    /// Empty when `start` is past the last row.
    pub fn rows(&self, start: usize, lines: usize) -> &[u8] {
        let len = self.data.len();
        let begin = usize::min(start.saturating_mul(self.bytes_per_row), len);
        let end = usize::min(
            begin.saturating_add(lines.saturating_mul(self.bytes_per_row)),
            len,
        );
        &self.data[begin..end]
    }
}

/// Number of bytes one raster row occupies.
pub fn bytes_per_row(width: u32) -> usize {
    (width as usize).div_ceil(8)
}

fn is_dark(px: Rgba<u8>) -> bool {
    let [r, g, b, _] = px.0;
    (r as u32 + g as u32 + b as u32) < DARK_SUM_THRESHOLD
}

/// Packs an RGBA raster into 1bpp printer bytes.
///
/// - `raster`: any image whose pixels read as RGBA, already in feed orientation
///
/// Alpha is ignored. A width that is not a multiple of 8 is padded with white.
pub fn pack<I>(raster: &I) -> Result<PackedBitmap>
where
    I: GenericImageView<Pixel = Rgba<u8>>,
{
    let (width, height) = raster.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::InvalidRaster(format!(
            "width/height must be > 0, got {width}x{height}"
        )));
    }
    let stride = bytes_per_row(width);
    let mut data = Vec::with_capacity(stride * height as usize);
    for y in 0..height {
        for group in 0..stride as u32 {
            let mut b: u8 = 0;
            let base = group * 8;
            let end = u32::min(base + 8, width);
            for (bit, x) in (base..end).enumerate() {
                if is_dark(raster.get_pixel(x, y)) {
                    b |= 0x80 >> bit;
                }
            }
            data.push(b);
        }
    }
    Ok(PackedBitmap {
        width,
        height,
        bytes_per_row: stride,
        data,
    })
}

/// Rotates a preview-oriented label 90° clockwise into feed orientation.
///
/// The print head burns lines across the label's short edge, so the image a
/// user sees on screen has to be turned before packing.
pub fn rotate_for_feed<I>(preview: &I) -> RgbaImage
where
    I: GenericImageView<Pixel = Rgba<u8>>,
{
    image::imageops::rotate90(preview)
}

/// Feed-oriented canvas size in pixels for a label of the given physical size.
///
/// Returns `(width, height)`: the label height becomes the raster width,
/// rounded up to whole bytes, and the label width becomes the raster height.
pub fn canvas_size(width_mm: f32, height_mm: f32, pixels_per_mm: f32) -> (u32, u32) {
    let w = (height_mm * pixels_per_mm).round().max(1.0) as u32;
    let h = (width_mm * pixels_per_mm).round().max(1.0) as u32;
    (w.div_ceil(8) * 8, h)
}
