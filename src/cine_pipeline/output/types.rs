//! Conversion configuration types

use crate::cine_pipeline::frames::FrameLayout;

/// TIFF compression methods for the image stack
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TiffCompression {
    /// No compression (fastest, largest file)
    #[default]
    None,
    /// LZW compression (slow, good compression)
    Lzw,
    /// Deflate compression - fast level (good speed/size balance)
    DeflateFast,
    /// Deflate compression - balanced
    DeflateBalanced,
    /// Deflate compression - best compression (slower)
    DeflateBest,
}

/// Configuration for cine to document conversion
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// How frame offsets relate to pixel data
    pub frame_layout: FrameLayout,
    /// `(first, count)` slice of the offset table to convert; `None` converts
    /// every frame
    pub frame_range: Option<(usize, usize)>,
    /// Log progress every this many frames (0 disables progress logging)
    pub progress_interval: usize,
    /// Compression method for `images.tiff`
    pub compression: TiffCompression,
    /// Predictor value for compression (typically 2 for horizontal differencing)
    /// Note: Predictor adds processing time, set to None for maximum speed
    pub predictor: Option<u16>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            frame_layout: FrameLayout::Annotated,
            frame_range: None,
            progress_interval: 500,
            compression: TiffCompression::None,
            predictor: None,
        }
    }
}

impl ConversionConfig {
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder::default()
    }

    /// Resolves `frame_range` against a table of `total` frames, returning
    /// the half-open index range to convert.
    pub fn frame_window(&self, total: usize) -> (usize, usize) {
        match self.frame_range {
            None => (0, total),
            Some((first, count)) => {
                let start = first.min(total);
                (start, start.saturating_add(count).min(total))
            }
        }
    }
}

/// Builder for ConversionConfig
#[derive(Default)]
pub struct ConversionConfigBuilder {
    frame_layout: Option<FrameLayout>,
    frame_range: Option<Option<(usize, usize)>>,
    progress_interval: Option<usize>,
    compression: Option<TiffCompression>,
    predictor: Option<Option<u16>>,
}

impl ConversionConfigBuilder {
    pub fn frame_layout(mut self, layout: FrameLayout) -> Self {
        self.frame_layout = Some(layout);
        self
    }

    pub fn frame_range(mut self, range: Option<(usize, usize)>) -> Self {
        self.frame_range = Some(range);
        self
    }

    pub fn progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = Some(interval);
        self
    }

    pub fn compression(mut self, compression: TiffCompression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn predictor(mut self, predictor: Option<u16>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn build(self) -> ConversionConfig {
        let default = ConversionConfig::default();
        ConversionConfig {
            frame_layout: self.frame_layout.unwrap_or(default.frame_layout),
            frame_range: self.frame_range.unwrap_or(default.frame_range),
            progress_interval: self.progress_interval.unwrap_or(default.progress_interval),
            compression: self.compression.unwrap_or(default.compression),
            predictor: self.predictor.unwrap_or(default.predictor),
        }
    }
}
