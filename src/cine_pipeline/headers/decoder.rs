use tracing::{debug, instrument, warn};

use crate::cine_pipeline::common::{ByteCursor, ConversionError, Result};
use crate::cine_pipeline::frames::FrameGeometry;
use crate::cine_pipeline::headers::setup::{self, decode_setup};
use crate::cine_pipeline::headers::types::{
    BITMAP_INFO_HEADER_SIZE, BitmapInfoHeader, CINE_MAGIC, CineFileHeader, CineHeaders,
    FILE_HEADER_SIZE, SETUP_MIN_SIZE, Time64,
};

const SETUP_MARK: &str = "ST";

/// Parses the CineFileHeader, BitmapInfoHeader, Setup and image offset table.
///
/// Every failure here is fatal: later stages only ever see headers that are
/// in bounds, in structural order and describe a supported geometry.
#[instrument(skip(bytes), fields(file_len = bytes.len()))]
pub fn decode_headers(bytes: &[u8]) -> Result<CineHeaders> {
    let cursor = ByteCursor::new(bytes);

    if bytes.len() < CINE_MAGIC.len() || bytes[..2] != CINE_MAGIC {
        return Err(ConversionError::NotACineFile(format!(
            "expected signature {:?}, found {:?}",
            String::from_utf8_lossy(&CINE_MAGIC),
            String::from_utf8_lossy(&bytes[..bytes.len().min(2)])
        )));
    }

    let file = read_file_header(cursor)?;
    debug!(
        version = file.version,
        image_count = file.image_count,
        off_setup = file.off_setup,
        "Read CineFileHeader"
    );

    let bitmap = read_bitmap_header(cursor, &file)?;
    debug!(
        width = bitmap.width,
        height = bitmap.height,
        bit_count = bitmap.bit_count,
        "Read BitmapInfoHeader"
    );

    let setup_base = file.off_setup as u64;
    if setup_base < file.off_image_header as u64 + bitmap.size as u64 {
        return Err(ConversionError::HeaderInconsistency(format!(
            "Setup at {} overlaps the BitmapInfoHeader at {}",
            setup_base, file.off_image_header
        )));
    }
    let setup_len = cursor.read::<u16>(setup_base + setup::LENGTH)? as u64;
    if setup_len < SETUP_MIN_SIZE {
        return Err(ConversionError::UnsupportedHeaderVersion {
            structure: "Setup",
            declared: setup_len,
            minimum: SETUP_MIN_SIZE,
        });
    }
    cursor.span(setup_base, setup_len)?;
    let setup = decode_setup(cursor, setup_base)?;
    if setup.mark != SETUP_MARK {
        warn!(mark = %setup.mark, "Setup marker is not \"ST\"; layout may differ");
    }

    let table_start = file.off_image_offsets as u64;
    if table_start < setup_base + setup_len {
        return Err(ConversionError::HeaderInconsistency(format!(
            "image offset table at {} starts inside the Setup ending at {}",
            table_start,
            setup_base + setup_len
        )));
    }
    if file.image_count > file.total_image_count {
        return Err(ConversionError::HeaderInconsistency(format!(
            "{} images in file but only {} recorded",
            file.image_count, file.total_image_count
        )));
    }

    let image_offsets = cursor.read_array::<u64>(table_start, file.image_count as usize)?;
    let table_end = table_start + 8 * image_offsets.len() as u64;
    if let Some((frame, &offset)) = image_offsets
        .iter()
        .enumerate()
        .find(|&(_, &offset)| offset < table_end)
    {
        return Err(ConversionError::HeaderInconsistency(format!(
            "frame {} offset {} points before the end of the offset table ({})",
            frame, offset, table_end
        )));
    }

    let geometry =
        FrameGeometry::new(bitmap.width as i64, bitmap.height as i64, bitmap.bit_count)?;
    if bitmap.size_image != 0 && bitmap.size_image as u64 != geometry.packed_len() {
        return Err(ConversionError::HeaderInconsistency(format!(
            "biSizeImage is {} but a {}x{} 12-bit frame packs into {} bytes",
            bitmap.size_image,
            geometry.width,
            geometry.height,
            geometry.packed_len()
        )));
    }
    if setup.im_width as i32 != bitmap.width || setup.im_height as i32 != bitmap.height {
        warn!(
            setup_width = setup.im_width,
            setup_height = setup.im_height,
            "Setup image size differs from BitmapInfoHeader; using BitmapInfoHeader"
        );
    }

    debug!(frames = image_offsets.len(), "Read image offset table");

    Ok(CineHeaders {
        file,
        bitmap,
        setup,
        image_offsets,
    })
}

fn read_file_header(cursor: ByteCursor<'_>) -> Result<CineFileHeader> {
    let header = CineFileHeader {
        file_type: cursor.read_bytes::<2>(0)?,
        header_size: cursor.read(2)?,
        compression: cursor.read(4)?,
        version: cursor.read(6)?,
        first_movie_image: cursor.read(8)?,
        total_image_count: cursor.read(12)?,
        first_image_no: cursor.read(16)?,
        image_count: cursor.read(20)?,
        off_image_header: cursor.read(24)?,
        off_setup: cursor.read(28)?,
        off_image_offsets: cursor.read(32)?,
        trigger_time: Time64 {
            fraction: cursor.read(36)?,
            seconds: cursor.read(40)?,
        },
    };

    if (header.header_size as u64) < FILE_HEADER_SIZE {
        return Err(ConversionError::UnsupportedHeaderVersion {
            structure: "CineFileHeader",
            declared: header.header_size as u64,
            minimum: FILE_HEADER_SIZE,
        });
    }
    // An empty offset table may sit exactly at end of file.
    for (name, offset, len) in [
        ("OffImageHeader", header.off_image_header, 1),
        ("OffSetup", header.off_setup, 1),
        (
            "OffImageOffsets",
            header.off_image_offsets,
            8 * header.image_count as u64,
        ),
    ] {
        if !cursor.contains(offset as u64, len) {
            return Err(ConversionError::OutOfBounds {
                offset: offset as u64,
                len,
                available: cursor.len(),
            });
        }
        if (offset as u64) < header.header_size as u64 {
            return Err(ConversionError::HeaderInconsistency(format!(
                "{} ({}) points inside the {}-byte file header",
                name, offset, header.header_size
            )));
        }
    }
    Ok(header)
}

fn read_bitmap_header(cursor: ByteCursor<'_>, file: &CineFileHeader) -> Result<BitmapInfoHeader> {
    let base = file.off_image_header as u64;
    let header = BitmapInfoHeader {
        size: cursor.read(base)?,
        width: cursor.read(base + 4)?,
        height: cursor.read(base + 8)?,
        planes: cursor.read(base + 12)?,
        bit_count: cursor.read(base + 14)?,
        compression: cursor.read(base + 16)?,
        size_image: cursor.read(base + 20)?,
        x_pels_per_meter: cursor.read(base + 24)?,
        y_pels_per_meter: cursor.read(base + 28)?,
        clr_used: cursor.read(base + 32)?,
        clr_important: cursor.read(base + 36)?,
    };

    if (header.size as u64) < BITMAP_INFO_HEADER_SIZE {
        return Err(ConversionError::UnsupportedHeaderVersion {
            structure: "BitmapInfoHeader",
            declared: header.size as u64,
            minimum: BITMAP_INFO_HEADER_SIZE,
        });
    }
    Ok(header)
}
