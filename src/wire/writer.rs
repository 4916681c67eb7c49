// Variant-aware primitive writes over a byte sink.

use std::io::Write;

use crate::config::{MAX_SEQUENCE_LEN, Variant};
use crate::error::{NbtError, Result};
use crate::tag::TagType;
use crate::wire::varint;

pub struct WireWriter<W> {
    inner: W,
    variant: Variant,
    written: u64,
}

impl<W: Write> WireWriter<W> {
    pub fn new(inner: W, variant: Variant) -> Self {
        Self {
            inner,
            variant,
            written: 0,
        }
    }

    #[inline]
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Bytes written so far.
    #[inline]
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner
            .flush()
            .map_err(|e| NbtError::from(e).at_offset(self.written))
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner
            .write_all(bytes)
            .map_err(|e| NbtError::from(e).at_offset(self.written))?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.write_bytes(&[v])
    }

    pub fn write_tag(&mut self, tag: TagType) -> Result<()> {
        self.write_u8(tag.ordinal())
    }

    pub fn write_i8(&mut self, v: i8) -> Result<()> {
        self.write_u8(v as u8)
    }

    pub fn write_i16(&mut self, v: i16) -> Result<()> {
        match self.variant {
            Variant::BigEndian => self.write_bytes(&v.to_be_bytes()),
            _ => self.write_bytes(&v.to_le_bytes()),
        }
    }

    pub fn write_i32(&mut self, v: i32) -> Result<()> {
        match self.variant {
            Variant::BigEndian => self.write_bytes(&v.to_be_bytes()),
            Variant::LittleEndian => self.write_bytes(&v.to_le_bytes()),
            Variant::LittleEndianVarInt => {
                let used = varint::write_i32(&mut self.inner, v)
                    .map_err(|e| NbtError::from(e).at_offset(self.written))?;
                self.written += used as u64;
                Ok(())
            }
        }
    }

    pub fn write_i64(&mut self, v: i64) -> Result<()> {
        match self.variant {
            Variant::BigEndian => self.write_bytes(&v.to_be_bytes()),
            Variant::LittleEndian => self.write_bytes(&v.to_le_bytes()),
            Variant::LittleEndianVarInt => {
                let used = varint::write_i64(&mut self.inner, v)
                    .map_err(|e| NbtError::from(e).at_offset(self.written))?;
                self.written += used as u64;
                Ok(())
            }
        }
    }

    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        match self.variant {
            Variant::BigEndian => self.write_bytes(&v.to_be_bytes()),
            _ => self.write_bytes(&v.to_le_bytes()),
        }
    }

    pub fn write_f64(&mut self, v: f64) -> Result<()> {
        match self.variant {
            Variant::BigEndian => self.write_bytes(&v.to_be_bytes()),
            _ => self.write_bytes(&v.to_le_bytes()),
        }
    }

    /// List/array element count, through the int32 path.
    pub fn write_count(&mut self, len: usize) -> Result<()> {
        if len > MAX_SEQUENCE_LEN {
            return Err(NbtError::unsupported(format!(
                "sequence of {len} elements exceeds {MAX_SEQUENCE_LEN}"
            )));
        }
        self.write_i32(len as i32)
    }

    /// Length-prefixed UTF-8 string. The limit depends on the variant.
    pub fn write_string(&mut self, s: &str) -> Result<()> {
        let len = s.len();
        let max = self.variant.max_string_len();
        if len > max {
            return Err(NbtError::format(format!(
                "string of {len} bytes exceeds the {max}-byte limit"
            ))
            .at_offset(self.written));
        }
        match self.variant {
            Variant::LittleEndianVarInt => {
                let used = varint::write_u32(&mut self.inner, len as u32)
                    .map_err(|e| NbtError::from(e).at_offset(self.written))?;
                self.written += used as u64;
            }
            _ => self.write_i16(len as u16 as i16)?,
        }
        self.write_bytes(s.as_bytes())
    }
}
