use std::fmt;

use crate::cine_pipeline::common::error::ConversionError;
use crate::cine_pipeline::document::FrameReport;
use crate::cine_pipeline::tagged::TaggedBlockSet;

/// What a conversion produced and what it had to leave out.
#[derive(Debug, Default)]
pub struct ConversionReport {
    pub width: usize,
    pub height: usize,
    /// Offset-table index of the first converted frame.
    pub first_frame: usize,
    pub frames_requested: usize,
    pub frames_decoded: usize,
    /// Names of the tagged blocks that made it into the document.
    pub tagged_blocks: Vec<String>,
    /// Recoverable errors: a truncated frame and any malformed tagged blocks.
    pub skipped: Vec<ConversionError>,
    pub warnings: Vec<String>,
}

impl ConversionReport {
    pub fn new(
        width: usize,
        height: usize,
        first_frame: usize,
        frames: FrameReport,
        tagged: &TaggedBlockSet,
    ) -> Self {
        let mut skipped: Vec<ConversionError> =
            tagged.gaps().iter().map(|gap| gap.to_error()).collect();
        let frames_requested = frames.requested;
        let frames_decoded = frames.decoded;
        if let Some(error) = frames.truncated {
            skipped.push(error);
        }

        let mut warnings = Vec::new();
        if tagged.times().is_none() {
            warnings.push("no usable Time block; time_float is empty".to_string());
        }

        Self {
            width,
            height,
            first_frame,
            frames_requested,
            frames_decoded,
            tagged_blocks: tagged.iter().map(|(name, _)| name.to_string()).collect(),
            skipped,
            warnings,
        }
    }

    pub fn frames_skipped(&self) -> usize {
        self.frames_requested - self.frames_decoded
    }

    /// True when anything was skipped or a warning was raised.
    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty() || !self.warnings.is_empty()
    }
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} frames ({}x{}) from index {}; tagged blocks: [{}]",
            self.frames_decoded,
            self.frames_requested,
            self.width,
            self.height,
            self.first_frame,
            self.tagged_blocks.join(", ")
        )?;
        for error in &self.skipped {
            write!(f, "\n  skipped: {error}")?;
        }
        for warning in &self.warnings {
            write!(f, "\n  warning: {warning}")?;
        }
        Ok(())
    }
}
