//! Typed little-endian reads at explicit offsets.
//!
//! `ByteCursor` is a `Copy` view over an immutable byte slice. It keeps no
//! position, so the header, tagged-block and frame decoders can share one
//! cursor (and read concurrently) without coordination.

use byteorder::{ByteOrder, LittleEndian};

use crate::cine_pipeline::common::error::{ConversionError, Result};

/// Fixed-width value that can be decoded from little-endian bytes.
pub trait Primitive: Sized + Copy {
    const SIZE: usize;

    fn from_le(bytes: &[u8]) -> Self;
}

impl Primitive for u8 {
    const SIZE: usize = 1;

    fn from_le(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl Primitive for i8 {
    const SIZE: usize = 1;

    fn from_le(bytes: &[u8]) -> Self {
        bytes[0] as i8
    }
}

macro_rules! impl_primitive {
    ($($ty:ty => $read:ident),* $(,)?) => {
        $(
            impl Primitive for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn from_le(bytes: &[u8]) -> Self {
                    LittleEndian::$read(bytes)
                }
            }
        )*
    };
}

impl_primitive! {
    u16 => read_u16,
    i16 => read_i16,
    u32 => read_u32,
    i32 => read_i32,
    u64 => read_u64,
    i64 => read_i64,
    f32 => read_f32,
    f64 => read_f64,
}

#[derive(Clone, Copy)]
pub struct ByteCursor<'a> {
    bytes: &'a [u8],
}

impl std::fmt::Debug for ByteCursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteCursor").field("len", &self.bytes.len()).finish()
    }
}

impl<'a> ByteCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Borrows `len` bytes starting at `offset`.
    pub fn span(&self, offset: u64, len: u64) -> Result<&'a [u8]> {
        let out_of_bounds = || ConversionError::OutOfBounds {
            offset,
            len,
            available: self.len(),
        };
        let end = offset.checked_add(len).ok_or_else(out_of_bounds)?;
        if end > self.len() {
            return Err(out_of_bounds());
        }
        Ok(&self.bytes[offset as usize..end as usize])
    }

    /// True when `len` bytes at `offset` lie inside the buffer.
    pub fn contains(&self, offset: u64, len: u64) -> bool {
        offset
            .checked_add(len)
            .is_some_and(|end| end <= self.len())
    }

    pub fn read<T: Primitive>(&self, offset: u64) -> Result<T> {
        let bytes = self.span(offset, T::SIZE as u64)?;
        Ok(T::from_le(bytes))
    }

    pub fn read_array<T: Primitive>(&self, offset: u64, count: usize) -> Result<Vec<T>> {
        let total = (count as u64)
            .checked_mul(T::SIZE as u64)
            .ok_or(ConversionError::OutOfBounds {
                offset,
                len: u64::MAX,
                available: self.len(),
            })?;
        let bytes = self.span(offset, total)?;
        Ok(bytes.chunks_exact(T::SIZE).map(T::from_le).collect())
    }

    pub fn read_bytes<const N: usize>(&self, offset: u64) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.span(offset, N as u64)?);
        Ok(out)
    }

    /// Win32 `BOOL`: four bytes, non-zero is true.
    pub fn read_bool32(&self, offset: u64) -> Result<bool> {
        Ok(self.read::<u32>(offset)? != 0)
    }

    /// Fixed-length character field, cut at the first NUL.
    pub fn read_str(&self, offset: u64, len: u64) -> Result<String> {
        let bytes = self.span(offset, len)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}
