// THEORY:
// `PixelBuffer` is the "dumb" data container of the engine: a rectangular grid
// of RGBA bytes, row-major, four bytes per pixel. It validates its own shape on
// construction and offers a handful of whole-image transforms (mirror, square
// fit) plus pixel picking. It performs no color math.
//
// Ownership: a buffer is never shared mutably. The batch owns the base image;
// every variant works on its own clone.

use crate::core_modules::color_space::color_space::{Rgb, TargetColor};
use crate::error::{Result, VariantError};
use image::RgbaImage;

pub const CHANNELS: usize = 4;

/// An owned RGBA image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wraps raw RGBA bytes, checking that they describe a `width`x`height` image.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(VariantError::InvalidDimensions { width, height });
        }
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            return Err(VariantError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A buffer where every pixel is `rgba`.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let pixels = width as usize * height as usize;
        Self::new(width, height, rgba.repeat(pixels))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// RGBA of the pixel at flat index `index` (row-major).
    pub fn pixel(&self, index: usize) -> [u8; 4] {
        let start = index * CHANNELS;
        [
            self.data[start],
            self.data[start + 1],
            self.data[start + 2],
            self.data[start + 3],
        ]
    }

    /// RGBA at (x, y), or `None` outside the image.
    pub fn pixel_at(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixel(flat_index(x, y, self.width)))
    }

    /// Overwrites the RGB channels of one pixel, leaving alpha alone.
    pub fn set_rgb(&mut self, index: usize, rgb: Rgb) {
        let start = index * CHANNELS;
        self.data[start] = rgb.red;
        self.data[start + 1] = rgb.green;
        self.data[start + 2] = rgb.blue;
    }

    /// Picks the color under (x, y) as a replacement target.
    pub fn pick_target(&self, x: u32, y: u32) -> Result<TargetColor> {
        let [r, g, b, a] = self.pixel_at(x, y).ok_or(VariantError::PixelOutOfBounds {
            x,
            y,
            width: self.width,
            height: self.height,
        })?;
        Ok(TargetColor::with_alpha(Rgb::new(r, g, b), a))
    }

    /// Reflects the image across its vertical centerline: column x moves to width-1-x.
    pub fn mirrored_horizontally(&self) -> Self {
        let row_bytes = self.width as usize * CHANNELS;
        let mut data = Vec::with_capacity(self.data.len());
        for row in self.data.chunks_exact(row_bytes) {
            for pixel in row.chunks_exact(CHANNELS).rev() {
                data.extend_from_slice(pixel);
            }
        }
        Self {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// Centers the image on a transparent square canvas of side max(width, height).
    pub fn fit_square(&self) -> Self {
        let size = self.width.max(self.height);
        if size == self.width && size == self.height {
            return self.clone();
        }
        let offset_x = ((size - self.width) / 2) as usize;
        let offset_y = ((size - self.height) / 2) as usize;
        let side = size as usize;
        let row_bytes = self.width as usize * CHANNELS;
        let mut data = vec![0u8; side * side * CHANNELS];
        for (y, row) in self.data.chunks_exact(row_bytes).enumerate() {
            let start = ((y + offset_y) * side + offset_x) * CHANNELS;
            data[start..start + row_bytes].copy_from_slice(row);
        }
        Self {
            width: size,
            height: size,
            data,
        }
    }
}

/// Row-major index of (x, y), computed in `usize` so large images cannot wrap.
fn flat_index(x: u32, y: u32, width: u32) -> usize {
    y as usize * width as usize + x as usize
}

impl TryFrom<RgbaImage> for PixelBuffer {
    type Error = VariantError;

    fn try_from(image: RgbaImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::new(width, height, image.into_raw())
    }
}

impl From<PixelBuffer> for RgbaImage {
    fn from(buffer: PixelBuffer) -> Self {
        // Shape was validated when the buffer was built.
        RgbaImage::from_raw(buffer.width, buffer.height, buffer.data)
            .unwrap_or_else(|| RgbaImage::new(0, 0))
    }
}
