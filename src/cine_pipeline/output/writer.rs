use std::path::Path;

use crate::cine_pipeline::common::error::Result;
use crate::cine_pipeline::document::{Document, FrameSink};
use crate::cine_pipeline::frames::FrameGeometry;
use crate::cine_pipeline::output::types::ConversionConfig;

/// Storage backend for a converted recording.
///
/// Frames are streamed into the sink returned by `begin` while the rest of
/// the document is still being decoded; `finish` then persists the document.
pub trait DocumentWriter {
    type Sink: FrameSink + Send;

    fn begin(
        &self,
        output: &Path,
        geometry: FrameGeometry,
        config: &ConversionConfig,
    ) -> Result<Self::Sink>;

    /// Persists the document. An error here leaves no partial output behind.
    fn finish(&self, sink: Self::Sink, document: &Document, output: &Path) -> Result<()>;

    /// Removes whatever `begin` created. Called when the conversion fails.
    fn discard(&self, sink: Self::Sink, output: &Path);
}
