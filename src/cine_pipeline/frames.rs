//! Pixel unpacking module
//!
//! Turns the packed 12-bit image stream into a lazy sequence of 16-bit frames.

pub mod types;
mod unpack;

pub use types::{Frame, FrameGeometry, FrameLayout};
pub use unpack::{
    pack_12bit, pack_pair, unpack_12bit, unpack_frames, unpack_pair, FrameSequence, Frames,
};
