//! Pipeline conversions module
//!
//! Orchestrates header decoding, concurrent tagged-block and frame decoding,
//! document assembly and output.

mod cine_to_document;
mod report;

pub use cine_to_document::CineToDocumentPipeline;
pub use report::ConversionReport;
