//! Tagged block decoding module
//!
//! Tagged blocks carry per-frame auxiliary data (capture time, exposure) as
//! self-describing `(size, type, payload)` records.

mod decoder;
pub mod types;

pub use decoder::decode_tagged_blocks;
pub use types::{BlockGap, BlockType, TaggedBlock, TaggedBlockSet, BLOCK_HEADER_SIZE};
