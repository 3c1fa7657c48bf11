//! Synthetic cine recordings for tests and benchmarks.
//!
//! [`CineFixture`] lays a file out the way Phantom software does: file header,
//! bitmap header, Setup, tagged blocks, offset table, then one annotated
//! frame after another. Every knob the decoders validate can be bent.
//!
//! Compiled for unit tests, and for benches or downstream tests through the
//! `fixture` feature.

use crate::cine_pipeline::frames::{FrameLayout, pack_12bit};
use crate::cine_pipeline::headers::setup;
use crate::cine_pipeline::headers::{
    BITMAP_INFO_HEADER_SIZE, FILE_HEADER_SIZE, SETUP_MIN_SIZE, SETUP_NOMINAL_SIZE, Time64,
};

/// Annotation written before each frame: `AnnotationSize` then `ImageSize`.
const ANNOTATION_SIZE: u32 = 8;

/// Encodes one tagged block: header plus payload.
pub fn tagged_block(type_code: u16, payload: &[u8]) -> Vec<u8> {
    let size = 8 + payload.len() as u32;
    let mut block = Vec::with_capacity(size as usize);
    block.extend_from_slice(&size.to_le_bytes());
    block.extend_from_slice(&type_code.to_le_bytes());
    block.extend_from_slice(&1u16.to_le_bytes());
    block.extend_from_slice(payload);
    block
}

/// TIME64 closest to `secs` seconds since the epoch.
pub fn time_at(secs: f64) -> Time64 {
    let seconds = secs.floor();
    let fraction = ((secs - seconds) * 4_294_967_296.0).round() as u32;
    Time64::new(seconds as u32, fraction)
}

#[derive(Debug, Clone)]
pub struct CineFixture {
    width: usize,
    height: usize,
    frames: usize,
    bit_count: u16,
    bitmap_size: u32,
    size_image: Option<u32>,
    setup_length: u16,
    total_image_count: Option<u32>,
    trigger: Time64,
    times: Option<Vec<Time64>>,
    exposures: Option<Vec<u32>>,
    extra_blocks: Vec<(u16, Vec<u8>)>,
    tagged_region: Option<Vec<u8>>,
    layout: FrameLayout,
    pixels: Option<Vec<Vec<u16>>>,
    truncate: usize,
}

impl CineFixture {
    /// Two frames at 100 fps starting at t = 1000 s, 1 ms exposure.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            frames: 2,
            bit_count: 12,
            bitmap_size: BITMAP_INFO_HEADER_SIZE as u32,
            size_image: None,
            setup_length: SETUP_NOMINAL_SIZE as u16,
            total_image_count: None,
            trigger: Time64::new(1000, 0),
            times: Some(Vec::new()),
            exposures: Some(Vec::new()),
            extra_blocks: Vec::new(),
            tagged_region: None,
            layout: FrameLayout::Annotated,
            pixels: None,
            truncate: 0,
        }
    }

    pub fn frames(mut self, frames: usize) -> Self {
        self.frames = frames;
        self
    }

    pub fn bit_count(mut self, bit_count: u16) -> Self {
        self.bit_count = bit_count;
        self
    }

    pub fn bitmap_size(mut self, size: u32) -> Self {
        self.bitmap_size = size;
        self
    }

    pub fn size_image(mut self, size: u32) -> Self {
        self.size_image = Some(size);
        self
    }

    pub fn setup_length(mut self, length: u16) -> Self {
        self.setup_length = length;
        self
    }

    pub fn total_image_count(mut self, count: u32) -> Self {
        self.total_image_count = Some(count);
        self
    }

    pub fn trigger(mut self, trigger: Time64) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn times(mut self, times: Vec<Time64>) -> Self {
        self.times = Some(times);
        self
    }

    pub fn without_time(mut self) -> Self {
        self.times = None;
        self
    }

    pub fn exposures(mut self, exposures: Vec<u32>) -> Self {
        self.exposures = Some(exposures);
        self
    }

    pub fn without_exposure(mut self) -> Self {
        self.exposures = None;
        self
    }

    pub fn extra_block(mut self, type_code: u16, payload: Vec<u8>) -> Self {
        self.extra_blocks.push((type_code, payload));
        self
    }

    /// Replaces the generated tagged blocks with raw bytes.
    pub fn tagged_region(mut self, region: Vec<u8>) -> Self {
        self.tagged_region = Some(region);
        self
    }

    pub fn layout(mut self, layout: FrameLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn frame_pixels(mut self, pixels: Vec<Vec<u16>>) -> Self {
        self.frames = pixels.len();
        self.pixels = Some(pixels);
        self
    }

    /// Drops `bytes` from the end of the file.
    pub fn truncate(mut self, bytes: usize) -> Self {
        self.truncate = bytes;
        self
    }

    /// Pixel values frame `frame` will hold.
    pub fn pixels(&self, frame: usize) -> Vec<u16> {
        if let Some(pixels) = self.pixels.as_ref().and_then(|p| p.get(frame)) {
            return pixels.clone();
        }
        (0..self.width * self.height)
            .map(|i| ((frame * 257 + i * 31) % 4096) as u16)
            .collect()
    }

    /// Capture times the Time block will hold.
    pub fn frame_times(&self) -> Vec<Time64> {
        match &self.times {
            Some(times) if !times.is_empty() => times.clone(),
            _ => (0..self.frames)
                .map(|i| time_at(1000.0 + i as f64 * 0.01))
                .collect(),
        }
    }

    pub fn packed_len(&self) -> usize {
        (self.width * self.height * 12).div_ceil(8)
    }

    pub fn build(&self) -> Vec<u8> {
        let setup_base = FILE_HEADER_SIZE as usize + BITMAP_INFO_HEADER_SIZE as usize;
        let setup_physical = (self.setup_length as usize).max(SETUP_MIN_SIZE as usize);
        let region = self.tagged_bytes();
        let table_start = setup_base + setup_physical + region.len();
        let data_start = table_start + 8 * self.frames;
        let packed_len = self.packed_len();
        let annotation = match self.layout {
            FrameLayout::Annotated => ANNOTATION_SIZE as usize,
            FrameLayout::Bare => 0,
        };

        let mut bytes = Vec::with_capacity(data_start + self.frames * (annotation + packed_len));

        // CineFileHeader
        bytes.extend_from_slice(b"CI");
        bytes.extend_from_slice(&(FILE_HEADER_SIZE as u16).to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&0i32.to_le_bytes());
        let total = self.total_image_count.unwrap_or(self.frames as u32);
        bytes.extend_from_slice(&total.to_le_bytes());
        bytes.extend_from_slice(&0i32.to_le_bytes());
        bytes.extend_from_slice(&(self.frames as u32).to_le_bytes());
        bytes.extend_from_slice(&(FILE_HEADER_SIZE as u32).to_le_bytes());
        bytes.extend_from_slice(&(setup_base as u32).to_le_bytes());
        bytes.extend_from_slice(&(table_start as u32).to_le_bytes());
        bytes.extend_from_slice(&self.trigger.fraction.to_le_bytes());
        bytes.extend_from_slice(&self.trigger.seconds.to_le_bytes());

        // BitmapInfoHeader
        bytes.extend_from_slice(&self.bitmap_size.to_le_bytes());
        bytes.extend_from_slice(&(self.width as i32).to_le_bytes());
        bytes.extend_from_slice(&(self.height as i32).to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&self.bit_count.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        let size_image = self.size_image.unwrap_or(packed_len as u32);
        bytes.extend_from_slice(&size_image.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 16]);

        // Setup
        let mut setup_block = vec![0u8; setup_physical];
        let mut put = |offset: u64, value: &[u8]| {
            let offset = offset as usize;
            setup_block[offset..offset + value.len()].copy_from_slice(value);
        };
        put(setup::TRIG_FRAME, &[1]);
        put(setup::MARK, b"ST");
        put(setup::LENGTH, &self.setup_length.to_le_bytes());
        put(setup::IM_WIDTH, &(self.width as u16).to_le_bytes());
        put(setup::IM_HEIGHT, &(self.height as u16).to_le_bytes());
        put(setup::SERIAL, &12_345u32.to_le_bytes());
        put(setup::FRAME_RATE, &100u32.to_le_bytes());
        put(setup::SHUTTER, &1_000u32.to_le_bytes());
        put(setup::REAL_BPP, &12u32.to_le_bytes());
        put(setup::SHUTTER_NS, &1_000_000u32.to_le_bytes());
        put(setup::DESCRIPTION, b"synthetic recording");
        bytes.extend(setup_block);

        bytes.extend(region);

        // Offset table, then frames
        let frame_len = annotation + packed_len;
        for frame in 0..self.frames {
            let offset = (data_start + frame * frame_len) as u64;
            bytes.extend_from_slice(&offset.to_le_bytes());
        }
        for frame in 0..self.frames {
            if self.layout == FrameLayout::Annotated {
                bytes.extend_from_slice(&ANNOTATION_SIZE.to_le_bytes());
                bytes.extend_from_slice(&(packed_len as u32).to_le_bytes());
            }
            let mut packed = pack_12bit(&self.pixels(frame));
            packed.resize(packed_len, 0);
            bytes.extend(packed);
        }

        let keep = bytes.len().saturating_sub(self.truncate);
        bytes.truncate(keep);
        bytes
    }

    fn tagged_bytes(&self) -> Vec<u8> {
        if let Some(region) = &self.tagged_region {
            return region.clone();
        }

        let mut region = Vec::new();
        if self.times.is_some() {
            let payload: Vec<u8> = self
                .frame_times()
                .iter()
                .flat_map(|t| {
                    let mut pair = t.fraction.to_le_bytes().to_vec();
                    pair.extend_from_slice(&t.seconds.to_le_bytes());
                    pair
                })
                .collect();
            region.extend(tagged_block(1002, &payload));
        }
        if let Some(exposures) = &self.exposures {
            let values = if exposures.is_empty() {
                vec![4_294_967u32; self.frames]
            } else {
                exposures.clone()
            };
            let payload: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
            region.extend(tagged_block(1003, &payload));
        }
        for (code, payload) in &self.extra_blocks {
            region.extend(tagged_block(*code, payload));
        }
        region
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_at_round_trips() {
        let t = time_at(1000.01);
        assert_eq!(t.seconds, 1000);
        assert!((t.as_secs_f64() - 1000.01).abs() < 1e-9);
    }

    #[test]
    fn test_truncate_shortens_file() {
        let fixture = CineFixture::new(4, 2);
        let full = fixture.build();
        let short = fixture.clone().truncate(1).build();
        assert_eq!(full.len(), short.len() + 1);
    }
}
