//! 12-bit packed pixel unpacking.
//!
//! Two 12-bit samples share three bytes:
//!
//! ```text
//! byte 0: p0[7:0]
//! byte 1: p1[3:0] p0[11:8]
//! byte 2: p1[11:4]
//! ```

use tracing::{debug, trace};

use crate::cine_pipeline::common::{ByteCursor, ConversionError, Result};
use crate::cine_pipeline::frames::types::{Frame, FrameGeometry, FrameLayout};

/// Annotation header and trailer: `AnnotationSize` plus `ImageSize`.
const MIN_ANNOTATION_SIZE: u64 = 8;

pub fn unpack_pair(bytes: [u8; 3]) -> (u16, u16) {
    let p0 = (bytes[0] as u16) | (((bytes[1] as u16) & 0x0F) << 8);
    let p1 = ((bytes[1] as u16) >> 4) | ((bytes[2] as u16) << 4);
    (p0, p1)
}

/// Inverse of [`unpack_pair`]; bits above the twelfth are dropped.
pub fn pack_pair(p0: u16, p1: u16) -> [u8; 3] {
    [
        (p0 & 0xFF) as u8,
        (((p0 >> 8) & 0x0F) | ((p1 & 0x0F) << 4)) as u8,
        ((p1 >> 4) & 0xFF) as u8,
    ]
}

/// Unpacks a whole packed buffer. A trailing partial group is ignored.
pub fn unpack_12bit(packed: &[u8]) -> Vec<u16> {
    let mut pixels = Vec::with_capacity(packed.len() / 3 * 2);
    for group in packed.chunks_exact(3) {
        let (p0, p1) = unpack_pair([group[0], group[1], group[2]]);
        pixels.push(p0);
        pixels.push(p1);
    }
    pixels
}

/// Packs pixels pairwise; an odd trailing pixel is paired with zero.
pub fn pack_12bit(pixels: &[u16]) -> Vec<u8> {
    let mut packed = Vec::with_capacity(pixels.len().div_ceil(2) * 3);
    for pair in pixels.chunks(2) {
        let p1 = pair.get(1).copied().unwrap_or(0);
        packed.extend_from_slice(&pack_pair(pair[0], p1));
    }
    packed
}

/// Builds the frame sequence for `offsets`.
///
/// Validation happens here, before any frame is touched: an unsupported bit
/// depth or an odd pixel count fails the whole sequence.
pub fn unpack_frames<'a>(
    bytes: &'a [u8],
    offsets: &'a [u64],
    width: i64,
    height: i64,
    bit_depth: u16,
) -> Result<FrameSequence<'a>> {
    let geometry = FrameGeometry::new(width, height, bit_depth)?;
    Ok(FrameSequence::new(bytes, offsets, geometry))
}

/// Finite, restartable sequence of frames, decoded on demand.
///
/// Holds only borrowed input; every call to [`FrameSequence::iter`] starts a
/// fresh pass and each step materializes exactly one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameSequence<'a> {
    cursor: ByteCursor<'a>,
    offsets: &'a [u64],
    geometry: FrameGeometry,
    layout: FrameLayout,
    first_index: usize,
}

impl<'a> FrameSequence<'a> {
    pub fn new(bytes: &'a [u8], offsets: &'a [u64], geometry: FrameGeometry) -> Self {
        Self {
            cursor: ByteCursor::new(bytes),
            offsets,
            geometry,
            layout: FrameLayout::Bare,
            first_index: 0,
        }
    }

    pub fn with_layout(mut self, layout: FrameLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Labels frames as if `offsets` started at this offset-table index.
    pub fn starting_at(mut self, first_index: usize) -> Self {
        self.first_index = first_index;
        self
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn iter(&self) -> Frames<'a> {
        Frames {
            sequence: *self,
            next: 0,
            finished: false,
        }
    }

    /// Decodes the `position`-th frame of this sequence.
    pub(crate) fn frame(&self, position: usize) -> Result<Frame> {
        let index = self.first_index + position;
        let offset = self.offsets[position];
        let needed = self.geometry.packed_len();
        let truncated = |offset: u64, needed: u64| ConversionError::TruncatedFrame {
            frame: index,
            offset,
            needed,
            available: self.cursor.len(),
        };

        let pixel_start = match self.layout {
            FrameLayout::Bare => offset,
            FrameLayout::Annotated => {
                let annotation_size = self
                    .cursor
                    .read::<u32>(offset)
                    .map_err(|_| truncated(offset, MIN_ANNOTATION_SIZE))?
                    as u64;
                if annotation_size < MIN_ANNOTATION_SIZE {
                    return Err(truncated(offset, MIN_ANNOTATION_SIZE));
                }
                let image_size = self
                    .cursor
                    .read::<u32>(offset + annotation_size - 4)
                    .map_err(|_| truncated(offset, annotation_size))?;
                if image_size as u64 != needed {
                    debug!(
                        frame = index,
                        image_size, needed, "Annotation image size differs from geometry"
                    );
                }
                offset + annotation_size
            }
        };

        let packed = self
            .cursor
            .span(pixel_start, needed)
            .map_err(|_| truncated(pixel_start, needed))?;
        trace!(frame = index, offset = pixel_start, "Unpacking frame");

        let mut pixels = unpack_12bit(packed);
        pixels.truncate(self.geometry.pixel_count());

        Ok(Frame {
            index,
            width: self.geometry.width,
            height: self.geometry.height,
            pixels,
        })
    }
}

impl<'a> IntoIterator for &FrameSequence<'a> {
    type Item = Result<Frame>;
    type IntoIter = Frames<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One pass over a [`FrameSequence`]. Ends after the first truncated frame.
#[derive(Debug, Clone)]
pub struct Frames<'a> {
    sequence: FrameSequence<'a>,
    next: usize,
    finished: bool,
}

impl Iterator for Frames<'_> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.next >= self.sequence.len() {
            return None;
        }
        let result = self.sequence.frame(self.next);
        self.next += 1;
        if result.is_err() {
            self.finished = true;
        }
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished {
            return (0, Some(0));
        }
        (0, Some(self.sequence.len() - self.next))
    }
}

impl std::iter::FusedIterator for Frames<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_recording(frames: &[Vec<u16>]) -> (Vec<u8>, Vec<u64>) {
        let mut bytes = Vec::new();
        let mut offsets = Vec::new();
        for pixels in frames {
            offsets.push(bytes.len() as u64);
            bytes.extend(pack_12bit(pixels));
        }
        (bytes, offsets)
    }

    #[test]
    fn test_pair_round_trip() {
        let packed = pack_pair(0x0ABC, 0x0DEF);
        assert_eq!(packed, [0xBC, 0xFA, 0xDE]);
        assert_eq!(unpack_pair(packed), (0x0ABC, 0x0DEF));
    }

    #[test]
    fn test_unpack_extremes() {
        assert_eq!(unpack_pair([0x00, 0x00, 0x00]), (0, 0));
        assert_eq!(unpack_pair([0xFF, 0xFF, 0xFF]), (0x0FFF, 0x0FFF));
        assert_eq!(unpack_pair([0xFF, 0x0F, 0x00]), (0x0FFF, 0));
        assert_eq!(unpack_pair([0x00, 0xF0, 0xFF]), (0, 0x0FFF));
    }

    #[test]
    fn test_sequence_yields_frames_in_offset_order() {
        let frames = vec![vec![1, 2, 3, 4, 5, 6, 7, 8], vec![4095, 0, 17, 2048, 9, 10, 11, 12]];
        let (bytes, offsets) = bare_recording(&frames);
        let sequence = unpack_frames(&bytes, &offsets, 4, 2, 12).unwrap();

        let decoded: Vec<Frame> = sequence.iter().collect::<Result<_>>().unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].pixels, frames[0]);
        assert_eq!(decoded[1].pixels, frames[1]);
        assert_eq!(decoded[1].index, 1);
        assert_eq!(decoded[1].get(0, 0), Some(4095));
    }

    #[test]
    fn test_sequence_is_restartable() {
        let frames = vec![vec![7u16; 8]; 3];
        let (bytes, offsets) = bare_recording(&frames);
        let sequence = unpack_frames(&bytes, &offsets, 4, 2, 12).unwrap();

        let first: Vec<_> = sequence.iter().map(|f| f.unwrap().pixels).collect();
        let second: Vec<_> = (&sequence).into_iter().map(|f| f.unwrap().pixels).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_truncated_frame_stops_sequence() {
        let frames = vec![vec![1u16; 8], vec![2u16; 8]];
        let (mut bytes, offsets) = bare_recording(&frames);
        bytes.pop();
        let sequence = unpack_frames(&bytes, &offsets, 4, 2, 12).unwrap();

        let mut iter = sequence.iter();
        assert_eq!(iter.next().unwrap().unwrap().pixels, vec![1u16; 8]);
        match iter.next() {
            Some(Err(ConversionError::TruncatedFrame { frame, needed, .. })) => {
                assert_eq!(frame, 1);
                assert_eq!(needed, 12);
            }
            other => panic!("expected TruncatedFrame, got {other:?}"),
        }
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_odd_pixel_count_is_fatal() {
        let bytes = vec![0u8; 64];
        let offsets = [0u64];
        assert!(matches!(
            unpack_frames(&bytes, &offsets, 3, 3, 12),
            Err(ConversionError::UnsupportedGeometry { .. })
        ));
    }

    #[test]
    fn test_annotated_layout_skips_annotation() {
        let pixels: Vec<u16> = (0..8).map(|v| v * 100).collect();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&12u32.to_le_bytes());
        bytes.extend_from_slice(b"note");
        bytes.extend_from_slice(&12u32.to_le_bytes());
        bytes.extend(pack_12bit(&pixels));
        let offsets = [0u64];

        let sequence = unpack_frames(&bytes, &offsets, 4, 2, 12)
            .unwrap()
            .with_layout(FrameLayout::Annotated);
        let frame = sequence.iter().next().unwrap().unwrap();
        assert_eq!(frame.pixels, pixels);
    }

    #[test]
    fn test_annotation_past_end_is_truncation() {
        let bytes = vec![0xFFu8; 6];
        let offsets = [2u64];
        let sequence = unpack_frames(&bytes, &offsets, 4, 2, 12)
            .unwrap()
            .with_layout(FrameLayout::Annotated);
        assert!(matches!(
            sequence.iter().next(),
            Some(Err(ConversionError::TruncatedFrame { frame: 0, .. }))
        ));
    }

    #[test]
    fn test_starting_at_relabels_frames() {
        let frames = vec![vec![3u16; 8]];
        let (bytes, offsets) = bare_recording(&frames);
        let sequence = unpack_frames(&bytes, &offsets, 4, 2, 12)
            .unwrap()
            .starting_at(5);
        assert_eq!(sequence.iter().next().unwrap().unwrap().index, 5);
    }
}
