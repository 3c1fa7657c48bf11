use tracing::{debug, instrument, warn};

use crate::cine_pipeline::common::{ByteCursor, Result};
use crate::cine_pipeline::headers::{CineHeaders, Time64};
use crate::cine_pipeline::tagged::types::{
    BLOCK_HEADER_SIZE, BlockType, TaggedBlock, TaggedBlockSet,
};

/// Walks the tagged-block region between the Setup and the offset table.
///
/// Problems with individual blocks never fail the call. A block whose header
/// is unusable ends the walk, since the next block cannot be located; a block
/// with a bad payload is skipped. Both are recorded as gaps in the returned
/// set.
#[instrument(skip_all, fields(frames = headers.frame_count()))]
pub fn decode_tagged_blocks(bytes: &[u8], headers: &CineHeaders) -> Result<TaggedBlockSet> {
    let cursor = ByteCursor::new(bytes);
    let (start, end) = headers.tagged_block_region();
    let expected = headers.frame_count() as u64;
    let mut set = TaggedBlockSet::new();
    let mut position = start;

    while position < end {
        let remaining = end - position;
        if remaining < BLOCK_HEADER_SIZE {
            warn!(offset = position, remaining, "Trailing bytes after last tagged block");
            set.record_gap(
                position,
                format!("{remaining} trailing bytes are too short for a block header"),
            );
            break;
        }

        let block_size = cursor.read::<u32>(position)? as u64;
        let block_type = BlockType::from(cursor.read::<u16>(position + 4)?);
        if block_size < BLOCK_HEADER_SIZE || block_size > remaining {
            warn!(
                offset = position,
                block_size, remaining, "Tagged block size does not fit the region"
            );
            set.record_gap(
                position,
                format!(
                    "block size {block_size} does not fit the {remaining} bytes left in the region"
                ),
            );
            break;
        }

        let payload = cursor.span(position + BLOCK_HEADER_SIZE, block_size - BLOCK_HEADER_SIZE)?;
        debug!(
            offset = position,
            code = block_type.code(),
            size = block_size,
            "Read tagged block"
        );

        match decode_block(block_type, payload, expected) {
            Ok(block) => {
                if let Some(previous) = set.insert(block) {
                    warn!(name = %previous.name(), "Duplicate tagged block; keeping the later one");
                }
            }
            Err(reason) => {
                warn!(offset = position, code = block_type.code(), %reason, "Skipping tagged block");
                set.record_gap(position, reason);
            }
        }

        position += block_size;
    }

    Ok(set)
}

fn decode_block(
    block_type: BlockType,
    payload: &[u8],
    expected: u64,
) -> std::result::Result<TaggedBlock, String> {
    let Some(value_size) = block_type.value_size() else {
        return Ok(TaggedBlock::Opaque {
            type_code: block_type.code(),
            payload: payload.to_vec(),
        });
    };

    let payload_len = payload.len() as u64;
    if payload_len % value_size != 0 {
        return Err(format!(
            "{payload_len}-byte payload is not a multiple of {value_size}-byte values"
        ));
    }
    let count = payload_len / value_size;
    if count != expected {
        return Err(format!("{count} values for {expected} frames"));
    }

    let cursor = ByteCursor::new(payload);
    let count = count as usize;
    let block = match block_type {
        BlockType::TimeOnly => {
            let words = cursor.read_array::<u32>(0, count * 2).map_err(|e| e.to_string())?;
            TaggedBlock::Time(
                words
                    .chunks_exact(2)
                    .map(|pair| Time64 {
                        fraction: pair[0],
                        seconds: pair[1],
                    })
                    .collect(),
            )
        }
        BlockType::ExposureOnly => {
            TaggedBlock::Exposure(cursor.read_array::<u32>(0, count).map_err(|e| e.to_string())?)
        }
        BlockType::Other(_) => unreachable!("opaque blocks return early"),
    };
    Ok(block)
}
