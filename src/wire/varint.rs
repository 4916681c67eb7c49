// Variable-length integer encoding for the little-endian varint variant.
//
// Base-128, least-significant group first. Every byte except the last has
// bit 7 set. Signed Int/Long go through zig-zag first so small negative
// numbers stay short; string lengths are plain unsigned varints.
//
// Decoding is bounded: 5 bytes for 32-bit values, 10 for 64-bit. Longer
// chains, or a final byte carrying bits past the type width, are rejected
// instead of wrapping.

use std::io::{self, Read, Write};

use crate::config::{MAX_VARINT32_LEN, MAX_VARINT64_LEN};

/// Bits of the 5th byte that fit in a `u32` (32 - 4*7 = 4).
const U32_LAST_BYTE_MASK: u8 = 0x0F;

/// Bits of the 10th byte that fit in a `u64` (64 - 9*7 = 1).
const U64_LAST_BYTE_MASK: u8 = 0x01;

// ---------------------------------------------------------------------------
// Zig-zag
// ---------------------------------------------------------------------------

#[inline]
pub fn zigzag_encode32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

#[inline]
pub fn zigzag_decode32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

#[inline]
pub fn zigzag_encode64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

#[inline]
pub fn zigzag_decode64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode a `u64` into `buf`, least-significant group first.
/// Returns the number of bytes used (1..=10).
#[inline]
pub fn encode_u64(mut num: u64, buf: &mut [u8; MAX_VARINT64_LEN]) -> usize {
    let mut i = 0;
    loop {
        let group = (num & 0x7F) as u8;
        num >>= 7;
        if num == 0 {
            buf[i] = group;
            return i + 1;
        }
        buf[i] = group | 0x80;
        i += 1;
    }
}

/// Encode a `u32` into `buf`. Returns the number of bytes used (1..=5).
#[inline]
pub fn encode_u32(num: u32, buf: &mut [u8; MAX_VARINT64_LEN]) -> usize {
    encode_u64(u64::from(num), buf)
}

pub fn write_u32<W: Write>(w: &mut W, num: u32) -> io::Result<usize> {
    let mut buf = [0u8; MAX_VARINT64_LEN];
    let len = encode_u32(num, &mut buf);
    w.write_all(&buf[..len])?;
    Ok(len)
}

pub fn write_u64<W: Write>(w: &mut W, num: u64) -> io::Result<usize> {
    let mut buf = [0u8; MAX_VARINT64_LEN];
    let len = encode_u64(num, &mut buf);
    w.write_all(&buf[..len])?;
    Ok(len)
}

/// Zig-zag then varint-encode an `i32`.
pub fn write_i32<W: Write>(w: &mut W, num: i32) -> io::Result<usize> {
    write_u32(w, zigzag_encode32(num))
}

/// Zig-zag then varint-encode an `i64`.
pub fn write_i64<W: Write>(w: &mut W, num: i64) -> io::Result<usize> {
    write_u64(w, zigzag_encode64(num))
}

// ---------------------------------------------------------------------------
// Decoding from byte slices
// ---------------------------------------------------------------------------

/// Decode a `u32` from the front of `data`. Returns `(value, bytes_consumed)`.
pub fn read_u32(data: &[u8]) -> Result<(u32, usize), VarIntError> {
    let mut val: u32 = 0;
    for (i, &byte) in data.iter().take(MAX_VARINT32_LEN).enumerate() {
        if i == MAX_VARINT32_LEN - 1 && byte & !U32_LAST_BYTE_MASK != 0 {
            return Err(VarIntError::Overflow { max_len: MAX_VARINT32_LEN });
        }
        val |= u32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((val, i + 1));
        }
    }
    Err(VarIntError::Underflow)
}

/// Decode a `u64` from the front of `data`. Returns `(value, bytes_consumed)`.
pub fn read_u64(data: &[u8]) -> Result<(u64, usize), VarIntError> {
    let mut val: u64 = 0;
    for (i, &byte) in data.iter().take(MAX_VARINT64_LEN).enumerate() {
        if i == MAX_VARINT64_LEN - 1 && byte & !U64_LAST_BYTE_MASK != 0 {
            return Err(VarIntError::Overflow { max_len: MAX_VARINT64_LEN });
        }
        val |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((val, i + 1));
        }
    }
    Err(VarIntError::Underflow)
}

// ---------------------------------------------------------------------------
// Decoding from `Read` (streaming)
// ---------------------------------------------------------------------------

/// Read a `u32` varint from a streaming source.
/// Returns `(value, bytes_consumed)`.
pub fn stream_read_u32<R: Read>(r: &mut R) -> Result<(u32, usize), VarIntError> {
    let mut val: u32 = 0;
    let mut buf = [0u8; 1];
    for i in 0..MAX_VARINT32_LEN {
        r.read_exact(&mut buf)?;
        let byte = buf[0];
        if i == MAX_VARINT32_LEN - 1 && byte & !U32_LAST_BYTE_MASK != 0 {
            return Err(VarIntError::Overflow { max_len: MAX_VARINT32_LEN });
        }
        val |= u32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((val, i + 1));
        }
    }
    Err(VarIntError::Overflow { max_len: MAX_VARINT32_LEN })
}

/// Read a `u64` varint from a streaming source.
/// Returns `(value, bytes_consumed)`.
pub fn stream_read_u64<R: Read>(r: &mut R) -> Result<(u64, usize), VarIntError> {
    let mut val: u64 = 0;
    let mut buf = [0u8; 1];
    for i in 0..MAX_VARINT64_LEN {
        r.read_exact(&mut buf)?;
        let byte = buf[0];
        if i == MAX_VARINT64_LEN - 1 && byte & !U64_LAST_BYTE_MASK != 0 {
            return Err(VarIntError::Overflow { max_len: MAX_VARINT64_LEN });
        }
        val |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((val, i + 1));
        }
    }
    Err(VarIntError::Overflow { max_len: MAX_VARINT64_LEN })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Encoded byte-length of a `u64` value.
#[inline]
pub fn sizeof_u64(num: u64) -> usize {
    let bits = 64 - num.leading_zeros();
    (bits.max(1).div_ceil(7) as usize).min(MAX_VARINT64_LEN)
}

/// Encoded byte-length of a `u32` value.
#[inline]
pub fn sizeof_u32(num: u32) -> usize {
    let bits = 32 - num.leading_zeros();
    (bits.max(1).div_ceil(7) as usize).min(MAX_VARINT32_LEN)
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum VarIntError {
    /// Not enough input bytes to complete the integer.
    #[error("varint underflow (truncated input)")]
    Underflow,
    /// The continuation chain or the value exceeds the target width.
    #[error("varint wider than {max_len} bytes")]
    Overflow { max_len: usize },
    #[error(transparent)]
    Io(io::Error),
}

impl From<io::Error> for VarIntError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::Underflow
        } else {
            Self::Io(e)
        }
    }
}

impl PartialEq for VarIntError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Underflow, Self::Underflow) => true,
            (Self::Overflow { max_len: a }, Self::Overflow { max_len: b }) => a == b,
            _ => false,
        }
    }
}

impl From<VarIntError> for crate::error::NbtError {
    fn from(e: VarIntError) -> Self {
        match e {
            VarIntError::Underflow => Self::eof(),
            VarIntError::Overflow { .. } => Self::format(e.to_string()),
            VarIntError::Io(e) => e.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
