// Wire variant configuration.
//
// Three independent flags select the physical layout. Only three of the four
// endianness/integer-width combinations are legal: varints exist only in the
// little-endian layout.

use bitflags::bitflags;

use crate::error::{NbtError, Result};

/// Largest string (or name) length expressible by the fixed-width `u16` prefix.
pub const MAX_FIXED_STRING_LEN: usize = u16::MAX as usize;

/// Largest string length accepted under the varint variant.
pub const MAX_VAR_STRING_LEN: usize = i32::MAX as usize;

/// Largest List/array count. Counts travel as int32 on the wire.
pub const MAX_SEQUENCE_LEN: usize = i32::MAX as usize;

/// Maximum encoded length of a 32-bit varint (ceil(32/7) = 5).
pub const MAX_VARINT32_LEN: usize = 5;

/// Maximum encoded length of a 64-bit varint (ceil(64/7) = 10).
pub const MAX_VARINT64_LEN: usize = 10;

bitflags! {
    /// Wire format features.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u8 {
        /// Multi-byte scalars in little-endian order.
        const LITTLE_ENDIAN = 1 << 0;
        /// Int and Long (and counts, and string lengths) as varints.
        /// Requires `LITTLE_ENDIAN`.
        const VAR_INT = 1 << 1;
        /// The document is a bare Compound payload: no root tag, no root
        /// name, no trailing End.
        const NO_WRAP = 1 << 2;
    }
}

impl Default for Flags {
    fn default() -> Self {
        Self::empty()
    }
}

impl Flags {
    /// Validate the endianness/integer-width combination.
    pub fn variant(self) -> Result<Variant> {
        match (
            self.contains(Self::LITTLE_ENDIAN),
            self.contains(Self::VAR_INT),
        ) {
            (false, false) => Ok(Variant::BigEndian),
            (true, false) => Ok(Variant::LittleEndian),
            (true, true) => Ok(Variant::LittleEndianVarInt),
            (false, true) => Err(NbtError::format(
                "varint encoding requires little-endian byte order",
            )),
        }
    }

    /// Root wrapping is enabled unless `NO_WRAP` is set.
    #[inline]
    pub fn wraps_root(self) -> bool {
        !self.contains(Self::NO_WRAP)
    }
}

/// Physical byte layout of multi-byte scalars and length prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Variant {
    /// Network byte order, fixed-width integers. The canonical layout.
    #[default]
    BigEndian,
    /// Reversed byte order, fixed-width integers.
    LittleEndian,
    /// Little-endian with zig-zag varint Int/Long and varint string lengths.
    LittleEndianVarInt,
}

impl Variant {
    pub fn flags(self) -> Flags {
        match self {
            Self::BigEndian => Flags::empty(),
            Self::LittleEndian => Flags::LITTLE_ENDIAN,
            Self::LittleEndianVarInt => Flags::LITTLE_ENDIAN | Flags::VAR_INT,
        }
    }

    #[inline]
    pub fn is_varint(self) -> bool {
        self == Self::LittleEndianVarInt
    }

    /// Largest encodable string length under this variant.
    pub fn max_string_len(self) -> usize {
        if self.is_varint() {
            MAX_VAR_STRING_LEN
        } else {
            MAX_FIXED_STRING_LEN
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::BigEndian => "big-endian",
            Self::LittleEndian => "little-endian",
            Self::LittleEndianVarInt => "little-endian varint",
        }
    }
}

/// Configuration for [`Encoder`](crate::encoder::Encoder).
#[derive(Debug, Clone)]
pub struct EncoderOptions {
    /// Wire variant and root wrapping.
    pub flags: Flags,
    /// Reject a field name written twice in the same Compound.
    pub strict_duplicates: bool,
    /// Name written in the root tag header. Ignored with `NO_WRAP`.
    pub root_name: String,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            flags: Flags::empty(),
            strict_duplicates: false,
            root_name: String::new(),
        }
    }
}

impl EncoderOptions {
    pub fn with_flags(flags: Flags) -> Self {
        Self {
            flags,
            ..Default::default()
        }
    }
}
