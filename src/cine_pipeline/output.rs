//! Output module
//!
//! Conversion configuration and the storage backend that persists a
//! converted recording.

mod standard_writer;
pub mod types;
mod writer;

pub use standard_writer::{DOCUMENT_FILE, IMAGES_FILE, StandardDocumentWriter, TiffPageSink};
pub use types::{ConversionConfig, ConversionConfigBuilder, TiffCompression};
pub use writer::DocumentWriter;
