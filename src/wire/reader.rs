// Variant-aware primitive reads over a byte source.
//
// Every read advances an absolute offset used for error context. When the
// total source length is known, string length headers are checked against
// the remaining bytes before anything is allocated; otherwise payloads are
// pulled incrementally so a hostile header can only run the source dry.

use std::io::{self, Read};

use crate::config::{MAX_VAR_STRING_LEN, Variant};
use crate::error::{NbtError, Result};
use crate::tag::TagType;
use crate::wire::varint;

pub struct WireReader<R> {
    inner: R,
    variant: Variant,
    offset: u64,
    len: Option<u64>,
}

impl<R: Read> WireReader<R> {
    pub fn new(inner: R, variant: Variant) -> Self {
        Self {
            inner,
            variant,
            offset: 0,
            len: None,
        }
    }

    /// A reader over a source of exactly `len` bytes.
    pub fn with_len(inner: R, variant: Variant, len: u64) -> Self {
        Self {
            inner,
            variant,
            offset: 0,
            len: Some(len),
        }
    }

    #[inline]
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Bytes consumed so far.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Bytes left in the source, if its length is known.
    #[inline]
    pub fn remaining(&self) -> Option<u64> {
        self.len.map(|len| len.saturating_sub(self.offset))
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    // -----------------------------------------------------------------------
    // Raw bytes
    // -----------------------------------------------------------------------

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner
            .read_exact(&mut buf)
            .map_err(|e| NbtError::from(e).at_offset(self.offset))?;
        self.offset += N as u64;
        Ok(buf)
    }

    /// Read one byte, or `None` on a clean end of input.
    pub fn try_read_u8(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.inner.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.offset += 1;
                    return Ok(Some(buf[0]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(NbtError::from(e).at_offset(self.offset)),
            }
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a tag byte and resolve it against the registry.
    pub fn read_tag(&mut self) -> Result<TagType> {
        let byte = self.read_u8()?;
        self.tag_from_byte(byte)
    }

    pub fn tag_from_byte(&self, byte: u8) -> Result<TagType> {
        TagType::from_u8(byte).ok_or_else(|| {
            NbtError::format(format!("invalid tag byte 0x{byte:02X}"))
                .at_offset(self.offset.saturating_sub(1))
        })
    }

    /// Read exactly `len` bytes without trusting `len` for allocation.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        self.ensure_available(len as u64, "payload")?;
        let start = self.offset;
        let mut buf = Vec::new();
        let got = (&mut self.inner)
            .take(len as u64)
            .read_to_end(&mut buf)
            .map_err(|e| NbtError::from(e).at_offset(start))?;
        self.offset += got as u64;
        if got < len {
            return Err(NbtError::eof().at_offset(self.offset));
        }
        Ok(buf)
    }

    /// Fail with a format error if a declared length cannot fit in the rest
    /// of a source of known size.
    pub fn ensure_available(&self, needed: u64, what: &str) -> Result<()> {
        match self.remaining() {
            Some(rem) if needed > rem => Err(NbtError::format(format!(
                "{what} length {needed} exceeds the {rem} remaining bytes"
            ))
            .at_offset(self.offset)),
            _ => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Scalars
    // -----------------------------------------------------------------------

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let b = self.read_array::<2>()?;
        Ok(match self.variant {
            Variant::BigEndian => i16::from_be_bytes(b),
            _ => i16::from_le_bytes(b),
        })
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(self.read_i16()? as u16)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        match self.variant {
            Variant::BigEndian => Ok(i32::from_be_bytes(self.read_array()?)),
            Variant::LittleEndian => Ok(i32::from_le_bytes(self.read_array()?)),
            Variant::LittleEndianVarInt => {
                let raw = self.read_varint32()?;
                Ok(varint::zigzag_decode32(raw))
            }
        }
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        match self.variant {
            Variant::BigEndian => Ok(i64::from_be_bytes(self.read_array()?)),
            Variant::LittleEndian => Ok(i64::from_le_bytes(self.read_array()?)),
            Variant::LittleEndianVarInt => {
                let start = self.offset;
                let (raw, used) = varint::stream_read_u64(&mut self.inner)
                    .map_err(|e| NbtError::from(e).at_offset(start))?;
                self.offset += used as u64;
                Ok(varint::zigzag_decode64(raw))
            }
        }
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let b = self.read_array::<4>()?;
        Ok(match self.variant {
            Variant::BigEndian => f32::from_be_bytes(b),
            _ => f32::from_le_bytes(b),
        })
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let b = self.read_array::<8>()?;
        Ok(match self.variant {
            Variant::BigEndian => f64::from_be_bytes(b),
            _ => f64::from_le_bytes(b),
        })
    }

    fn read_varint32(&mut self) -> Result<u32> {
        let start = self.offset;
        let (raw, used) = varint::stream_read_u32(&mut self.inner)
            .map_err(|e| NbtError::from(e).at_offset(start))?;
        self.offset += used as u64;
        Ok(raw)
    }

    // -----------------------------------------------------------------------
    // Composite fields
    // -----------------------------------------------------------------------

    /// List/array element count. Travels as an int32 and is reinterpreted
    /// as unsigned, so a set sign bit reads as a huge count.
    pub fn read_count(&mut self) -> Result<u32> {
        Ok(self.read_i32()? as u32)
    }

    /// Length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String> {
        let start = self.offset;
        let len = match self.variant {
            Variant::LittleEndianVarInt => {
                let len = self.read_varint32()? as usize;
                if len > MAX_VAR_STRING_LEN {
                    return Err(NbtError::format(format!(
                        "string length {len} exceeds {MAX_VAR_STRING_LEN}"
                    ))
                    .at_offset(start));
                }
                len
            }
            _ => self.read_u16()? as usize,
        };
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes).map_err(|e| {
            NbtError::format(format!(
                "invalid UTF-8 in string at byte {}",
                e.utf8_error().valid_up_to()
            ))
            .at_offset(start)
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
