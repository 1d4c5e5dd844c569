//! Frame encoding to PNG and per-frame file output.

use std::io::Cursor;
use std::path::Path;

use anyhow::Context as _;
use image::ImageEncoder as _;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};

use crate::foundation::core::FrameIndex;
use crate::foundation::error::{KinoraError, KinoraResult};

/// Compression-speed trade-off for the PNG encoder.
///
/// Frames usually feed a downstream video encoder, so speed wins by default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PngCompression {
    #[default]
    Fast,
    Balanced,
    Best,
}

impl From<PngCompression> for CompressionType {
    fn from(value: PngCompression) -> Self {
        match value {
            PngCompression::Fast => CompressionType::Fast,
            PngCompression::Balanced => CompressionType::Default,
            PngCompression::Best => CompressionType::Best,
        }
    }
}

/// Encode a canonical RGBA8 pixel buffer into a standalone PNG.
pub fn encode_png(
    width: u32,
    height: u32,
    rgba: &[u8],
    compression: PngCompression,
) -> KinoraResult<Vec<u8>> {
    let expected = (width as usize) * (height as usize) * 4;
    if rgba.len() != expected {
        return Err(KinoraError::render(format!(
            "pixel buffer length {} does not match {width}x{height} rgba frame",
            rgba.len()
        )));
    }

    let mut out = Vec::new();
    let encoder = PngEncoder::new_with_quality(
        Cursor::new(&mut out),
        compression.into(),
        FilterType::Adaptive,
    );
    encoder
        .write_image(rgba, width, height, image::ExtendedColorType::Rgba8)
        .map_err(|e| KinoraError::render(format!("png encode failed: {e}")))?;
    Ok(out)
}

/// File name for a frame; the zero-padded index makes lexical order equal
/// frame order.
pub fn frame_file_name(index: FrameIndex) -> String {
    format!("frame_{:05}.png", index.0)
}

/// Write one encoded frame into `dir`.
pub fn write_frame_file(dir: &Path, index: FrameIndex, bytes: &[u8]) -> KinoraResult<()> {
    let path = dir.join(frame_file_name(index));
    std::fs::write(&path, bytes)
        .with_context(|| format!("failed to write frame file '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_a_png_signature() {
        let rgba = vec![255u8; 2 * 2 * 4];
        let png = encode_png(2, 2, &rgba, PngCompression::Fast).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn rejects_mismatched_buffers() {
        assert!(encode_png(2, 2, &[0u8; 4], PngCompression::Fast).is_err());
    }

    #[test]
    fn frame_names_sort_in_frame_order() {
        let a = frame_file_name(FrameIndex(9));
        let b = frame_file_name(FrameIndex(10));
        assert_eq!(a, "frame_00009.png");
        assert!(a < b);
    }
}
