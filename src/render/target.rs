//! Pixel-backed raster targets and layout conversion.

use crate::foundation::error::{KinoraError, KinoraResult};

/// Byte layout of a 32-bit pixel buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    /// Non-premultiplied RGBA. The canonical layout frames are encoded from.
    Rgba8,
    /// Premultiplied RGBA.
    Rgba8Premul,
    /// Premultiplied BGRA.
    Bgra8Premul,
}

impl PixelLayout {
    /// `true` for the layout the frame encoder accepts directly.
    pub fn is_canonical(self) -> bool {
        self == Self::Rgba8
    }
}

/// A CPU surface one engine instance renders into.
///
/// Each render worker owns exactly one target, sized to the animation
/// canvas, cleared and reused for every assigned frame.
pub struct RasterTarget {
    width: u32,
    height: u32,
    layout: PixelLayout,
    pixels: Vec<u8>,
}

impl RasterTarget {
    /// Allocate a transparent target. Fails on a zero-sized canvas.
    pub fn new(width: u32, height: u32) -> KinoraResult<Self> {
        if width == 0 || height == 0 {
            return Err(KinoraError::render(format!(
                "cannot allocate a {width}x{height} raster target"
            )));
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(4))
            .ok_or_else(|| {
                KinoraError::render(format!("raster target {width}x{height} is too large"))
            })?;
        Ok(Self {
            width,
            height,
            layout: PixelLayout::Rgba8,
            pixels: vec![0u8; len],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// Declare the layout the engine actually writes. Engines that produce
    /// premultiplied or BGRA output flag it here so snapshots convert.
    pub fn set_layout(&mut self, layout: PixelLayout) {
        self.layout = layout;
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Reset every pixel to transparent.
    pub fn clear_transparent(&mut self) {
        self.pixels.fill(0);
    }

    /// Copy the current contents out as an immutable frame image.
    pub fn snapshot(&self) -> FrameImage {
        FrameImage {
            width: self.width,
            height: self.height,
            layout: self.layout,
            pixels: self.pixels.clone(),
        }
    }
}

/// An immutable snapshot of rendered pixels.
#[derive(Clone, Debug)]
pub struct FrameImage {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub pixels: Vec<u8>,
}

/// Reusable conversion surface for normalizing snapshots to the canonical
/// layout. One per worker; the buffer is recycled across frames.
#[derive(Default)]
pub struct ScratchSurface {
    pixels: Vec<u8>,
}

impl ScratchSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert `image` to non-premultiplied RGBA, returning the converted
    /// pixel bytes. Canonical input is passed through without copying.
    pub fn to_canonical<'a>(&'a mut self, image: &'a FrameImage) -> KinoraResult<&'a [u8]> {
        let expected = (image.width as usize) * (image.height as usize) * 4;
        if image.pixels.len() != expected {
            return Err(KinoraError::render(
                "snapshot pixel buffer does not match its dimensions",
            ));
        }

        match image.layout {
            PixelLayout::Rgba8 => Ok(&image.pixels),
            PixelLayout::Rgba8Premul => {
                self.pixels.resize(expected, 0);
                for (dst, src) in self
                    .pixels
                    .chunks_exact_mut(4)
                    .zip(image.pixels.chunks_exact(4))
                {
                    let a = src[3];
                    dst[0] = unpremul(src[0], a);
                    dst[1] = unpremul(src[1], a);
                    dst[2] = unpremul(src[2], a);
                    dst[3] = a;
                }
                Ok(&self.pixels)
            }
            PixelLayout::Bgra8Premul => {
                self.pixels.resize(expected, 0);
                for (dst, src) in self
                    .pixels
                    .chunks_exact_mut(4)
                    .zip(image.pixels.chunks_exact(4))
                {
                    let a = src[3];
                    dst[0] = unpremul(src[2], a);
                    dst[1] = unpremul(src[1], a);
                    dst[2] = unpremul(src[0], a);
                    dst[3] = a;
                }
                Ok(&self.pixels)
            }
        }
    }
}

/// Undo alpha premultiplication for one channel, rounding to nearest.
fn unpremul(c: u8, a: u8) -> u8 {
    if a == 0 {
        return 0;
    }
    let c = u32::from(c);
    let a = u32::from(a);
    ((c * 255 + a / 2) / a).min(255) as u8
}
