//! Tagged block types

use std::collections::BTreeMap;

use crate::cine_pipeline::common::ConversionError;
use crate::cine_pipeline::headers::Time64;

/// `BlockSize` (u32), `Type` (u16), `Reserved` (u16).
pub const BLOCK_HEADER_SIZE: u64 = 8;

/// Block type codes this crate decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum BlockType {
    /// One TIME64 per frame.
    TimeOnly = 1002,
    /// One 0.32 fixed-point exposure per frame.
    ExposureOnly = 1003,
    /// Anything else; kept as raw bytes.
    Other(u16),
}

impl From<u16> for BlockType {
    fn from(code: u16) -> Self {
        match code {
            1002 => BlockType::TimeOnly,
            1003 => BlockType::ExposureOnly,
            other => BlockType::Other(other),
        }
    }
}

impl BlockType {
    pub fn code(&self) -> u16 {
        match self {
            BlockType::TimeOnly => 1002,
            BlockType::ExposureOnly => 1003,
            BlockType::Other(code) => *code,
        }
    }

    /// Phantom's name for block kinds kept as raw bytes.
    pub fn known_name(&self) -> Option<&'static str> {
        match self.code() {
            1004 => Some("RangeData"),
            1005 => Some("BinSig"),
            1006 => Some("AnaSig"),
            _ => None,
        }
    }

    /// Bytes per value for per-frame kinds.
    pub fn value_size(&self) -> Option<u64> {
        match self {
            BlockType::TimeOnly => Some(8),
            BlockType::ExposureOnly => Some(4),
            BlockType::Other(_) => None,
        }
    }
}

/// A decoded tagged block.
#[derive(Debug, Clone, PartialEq)]
pub enum TaggedBlock {
    Time(Vec<Time64>),
    /// Exposure per frame as a fraction of a second scaled by 2^32.
    Exposure(Vec<u32>),
    Opaque { type_code: u16, payload: Vec<u8> },
}

impl TaggedBlock {
    /// Key used in the [`TaggedBlockSet`] and the document.
    pub fn name(&self) -> String {
        match self {
            TaggedBlock::Time(_) => "Time".to_string(),
            TaggedBlock::Exposure(_) => "Exposure".to_string(),
            TaggedBlock::Opaque { type_code, .. } => BlockType::Other(*type_code)
                .known_name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Block{type_code}")),
        }
    }

    pub fn block_type(&self) -> BlockType {
        match self {
            TaggedBlock::Time(_) => BlockType::TimeOnly,
            TaggedBlock::Exposure(_) => BlockType::ExposureOnly,
            TaggedBlock::Opaque { type_code, .. } => BlockType::Other(*type_code),
        }
    }

    /// Keeps frames `[start, end)` of per-frame blocks; opaque blocks are
    /// returned unchanged.
    fn select_frames(&self, start: usize, end: usize) -> TaggedBlock {
        let clamp = |len: usize| (start.min(len), end.min(len));
        match self {
            TaggedBlock::Time(values) => {
                let (s, e) = clamp(values.len());
                TaggedBlock::Time(values[s..e].to_vec())
            }
            TaggedBlock::Exposure(values) => {
                let (s, e) = clamp(values.len());
                TaggedBlock::Exposure(values[s..e].to_vec())
            }
            opaque @ TaggedBlock::Opaque { .. } => opaque.clone(),
        }
    }
}

/// A tagged block that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockGap {
    pub offset: u64,
    pub reason: String,
}

impl BlockGap {
    pub fn to_error(&self) -> ConversionError {
        ConversionError::MalformedTaggedBlock {
            offset: self.offset,
            reason: self.reason.clone(),
        }
    }
}

/// Decoded tagged blocks by name, plus the blocks that had to be skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaggedBlockSet {
    blocks: BTreeMap<String, TaggedBlock>,
    gaps: Vec<BlockGap>,
}

impl TaggedBlockSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a block, returning the one it replaced if the file repeats a type.
    pub fn insert(&mut self, block: TaggedBlock) -> Option<TaggedBlock> {
        self.blocks.insert(block.name(), block)
    }

    pub fn record_gap(&mut self, offset: u64, reason: impl Into<String>) {
        self.gaps.push(BlockGap {
            offset,
            reason: reason.into(),
        });
    }

    pub fn get(&self, name: &str) -> Option<&TaggedBlock> {
        self.blocks.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TaggedBlock)> {
        self.blocks.iter().map(|(name, block)| (name.as_str(), block))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn gaps(&self) -> &[BlockGap] {
        &self.gaps
    }

    pub fn times(&self) -> Option<&[Time64]> {
        match self.blocks.get("Time") {
            Some(TaggedBlock::Time(values)) => Some(values),
            _ => None,
        }
    }

    pub fn exposures(&self) -> Option<&[u32]> {
        match self.blocks.get("Exposure") {
            Some(TaggedBlock::Exposure(values)) => Some(values),
            _ => None,
        }
    }

    /// Absolute capture time of each frame in seconds since the epoch.
    pub fn time_float(&self) -> Option<Vec<f64>> {
        self.times()
            .map(|times| times.iter().map(Time64::as_secs_f64).collect())
    }

    /// Capture time of each frame relative to the trigger.
    pub fn time_from_trigger(&self, trigger: Time64) -> Option<Vec<f64>> {
        self.times()
            .map(|times| times.iter().map(|t| t.secs_since(trigger)).collect())
    }

    /// Exposure of each frame in seconds.
    pub fn exposure_float(&self) -> Option<Vec<f64>> {
        self.exposures().map(|values| {
            values
                .iter()
                .map(|&fraction| fraction as f64 / 4_294_967_296.0)
                .collect()
        })
    }

    /// Restricts per-frame blocks to frames `[start, end)`.
    pub fn select_frames(&self, start: usize, end: usize) -> TaggedBlockSet {
        TaggedBlockSet {
            blocks: self
                .blocks
                .iter()
                .map(|(name, block)| (name.clone(), block.select_frames(start, end)))
                .collect(),
            gaps: self.gaps.clone(),
        }
    }
}
