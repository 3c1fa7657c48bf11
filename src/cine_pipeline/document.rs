//! Document assembly module
//!
//! Builds the hierarchical output document: header metadata under `Meta`,
//! decoded tagged blocks under `TaggedBlocks`, the image stack and the
//! `time_float` alias at the root.

mod builder;
pub mod types;

pub use builder::{DocumentBuilder, FrameReport, FrameSink, TIME_FLOAT_TARGET};
pub use types::{AttrValue, Dataset, Document, Group, ImageStack, Node};
