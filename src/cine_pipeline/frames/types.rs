//! Frame data types

use crate::cine_pipeline::common::{ConversionError, Result};
use crate::cine_pipeline::headers::PACKED_12_BIT;

/// Where pixel data starts relative to a frame's offset-table entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrameLayout {
    /// The offset points at an annotation block (`AnnotationSize` u32, text,
    /// `ImageSize` u32); pixels follow it. This is what Phantom software
    /// writes.
    #[default]
    Annotated,
    /// The offset points straight at the packed pixels.
    Bare,
}

/// Validated raster description for 12-bit packed monochrome frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: usize,
    pub height: usize,
    pub bit_depth: u16,
}

impl FrameGeometry {
    pub fn new(width: i64, height: i64, bit_depth: u16) -> Result<Self> {
        if bit_depth != PACKED_12_BIT {
            return Err(ConversionError::UnsupportedBitDepth(bit_depth));
        }
        let unsupported = || ConversionError::UnsupportedGeometry { width, height };
        if width <= 0 || height <= 0 {
            return Err(unsupported());
        }
        let pixels = width.checked_mul(height).ok_or_else(unsupported)?;
        // Two pixels share three bytes, so a frame must hold whole pairs.
        if pixels % 2 != 0 {
            return Err(unsupported());
        }
        // Frame sizes must be addressable in bytes.
        (pixels as u64)
            .checked_mul(bit_depth as u64)
            .filter(|&bits| usize::try_from(bits).is_ok())
            .ok_or_else(unsupported)?;
        Ok(Self {
            width: width as usize,
            height: height as usize,
            bit_depth,
        })
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Bytes occupied by one packed frame: `ceil(pixels * 12 / 8)`.
    pub fn packed_len(&self) -> u64 {
        (self.pixel_count() as u64)
            .saturating_mul(self.bit_depth as u64)
            .div_ceil(8)
    }
}

/// One decoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Position in the offset table (capture order).
    pub index: usize,
    pub width: usize,
    pub height: usize,
    /// Raw 12-bit sensor codes widened to u16, row-major.
    pub pixels: Vec<u16>,
}

impl Frame {
    pub fn get(&self, row: usize, col: usize) -> Option<u16> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.pixels.get(row * self.width + col).copied()
    }

    pub fn row(&self, row: usize) -> Option<&[u16]> {
        let start = row.checked_mul(self.width)?;
        let end = start.checked_add(self.width)?;
        self.pixels.get(start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_len() {
        let geometry = FrameGeometry::new(4, 2, 12).unwrap();
        assert_eq!(geometry.pixel_count(), 8);
        assert_eq!(geometry.packed_len(), 12);
    }

    #[test]
    fn test_rejects_degenerate_geometry() {
        assert!(matches!(
            FrameGeometry::new(0, 10, 12),
            Err(ConversionError::UnsupportedGeometry { .. })
        ));
        assert!(matches!(
            FrameGeometry::new(5, -2, 12),
            Err(ConversionError::UnsupportedGeometry { .. })
        ));
        assert!(matches!(
            FrameGeometry::new(5, 3, 12),
            Err(ConversionError::UnsupportedGeometry { width: 5, height: 3 })
        ));
        assert!(matches!(
            FrameGeometry::new(i32::MAX as i64 - 1, i32::MAX as i64, 12),
            Err(ConversionError::UnsupportedGeometry { .. })
        ));
        assert!(matches!(
            FrameGeometry::new(4, 2, 8),
            Err(ConversionError::UnsupportedBitDepth(8))
        ));
    }

    #[test]
    fn test_frame_indexing() {
        let frame = Frame {
            index: 0,
            width: 2,
            height: 2,
            pixels: vec![1, 2, 3, 4],
        };
        assert_eq!(frame.get(1, 0), Some(3));
        assert_eq!(frame.get(0, 2), None);
        assert_eq!(frame.row(1), Some(&[3u16, 4][..]));
        assert_eq!(frame.row(2), None);
        assert_eq!(frame.row(usize::MAX / 2), None);
    }
}
