use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Not a cine file: {0}")]
    NotACineFile(String),

    #[error("Unsupported {structure} version: declared size {declared} bytes, need at least {minimum}")]
    UnsupportedHeaderVersion {
        structure: &'static str,
        declared: u64,
        minimum: u64,
    },

    #[error("Inconsistent header: {0}")]
    HeaderInconsistency(String),

    #[error("Read of {len} bytes at offset {offset} exceeds file length {available}")]
    OutOfBounds { offset: u64, len: u64, available: u64 },

    #[error("Unsupported frame geometry: width={width}, height={height}")]
    UnsupportedGeometry { width: i64, height: i64 },

    #[error("Unsupported bit depth: {0} (only 12-bit packed monochrome is supported)")]
    UnsupportedBitDepth(u16),

    #[error("Frame {frame} truncated: needs {needed} bytes at offset {offset}, file has {available}")]
    TruncatedFrame {
        frame: usize,
        offset: u64,
        needed: u64,
        available: u64,
    },

    #[error("Malformed tagged block at offset {offset}: {reason}")]
    MalformedTaggedBlock { offset: u64, reason: String },

    #[error("Recording contains no decodable frames")]
    EmptyRecording,

    #[error("Failed to read input file: {0}")]
    InputReadError(String),

    #[error("Failed to write output: {0}")]
    OutputWriteError(String),

    #[error("Failed to encode image stack: {0}")]
    EncodeError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ConversionError {
    /// Per-frame errors that skip one entry instead of aborting the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConversionError::TruncatedFrame { .. } | ConversionError::MalformedTaggedBlock { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ConversionError>;
