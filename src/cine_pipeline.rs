//! Cine conversion pipeline module
//!
//! Decodes Phantom `.cine` recordings (headers, tagged blocks, packed 12-bit
//! frames) and converts them into a hierarchical document.

pub mod common;
pub mod conversions;
pub mod document;
#[cfg(any(test, feature = "fixture"))]
pub mod fixture;
pub mod frames;
pub mod headers;
pub mod output;
pub mod source;
pub mod tagged;

pub use common::{ByteCursor, ConversionError, Result};

pub use headers::{BitmapInfoHeader, CineFileHeader, CineHeaders, Setup, Time64, decode_headers};

pub use tagged::{TaggedBlock, TaggedBlockSet, decode_tagged_blocks};

pub use frames::{Frame, FrameLayout, FrameSequence, unpack_frames};

pub use document::{Dataset, Document, DocumentBuilder, ImageStack, Node};

pub use output::{
    ConversionConfig, ConversionConfigBuilder, DocumentWriter, StandardDocumentWriter,
    TiffCompression,
};

pub use source::CineSource;

pub use conversions::{CineToDocumentPipeline, ConversionReport};
