//! Cine header decoding module
//!
//! Locates and validates the three fixed-layout structures at the head of a
//! cine file, plus the per-frame image offset table.

mod decoder;
pub(crate) mod setup;
pub mod types;

pub use decoder::decode_headers;
pub use types::{
    BitmapInfoHeader, CineFileHeader, CineHeaders, Setup, Time64, BITMAP_INFO_HEADER_SIZE,
    FILE_HEADER_SIZE, PACKED_12_BIT, SETUP_MIN_SIZE, SETUP_NOMINAL_SIZE,
};
