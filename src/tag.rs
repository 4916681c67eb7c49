// NBT tag type registry.
//
// The thirteen physical tag kinds with their stable wire ordinals and
// fixed payload widths.

use std::fmt;

/// Physical tag kind, with its wire ordinal as the discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TagType {
    End = 0,
    Byte = 1,
    Short = 2,
    Int = 3,
    Long = 4,
    Float = 5,
    Double = 6,
    ByteArray = 7,
    String = 8,
    List = 9,
    Compound = 10,
    IntArray = 11,
    LongArray = 12,
}

/// All tag kinds in ordinal order.
pub const ALL_TAGS: [TagType; 13] = [
    TagType::End,
    TagType::Byte,
    TagType::Short,
    TagType::Int,
    TagType::Long,
    TagType::Float,
    TagType::Double,
    TagType::ByteArray,
    TagType::String,
    TagType::List,
    TagType::Compound,
    TagType::IntArray,
    TagType::LongArray,
];

impl TagType {
    /// Look up a tag kind by its wire ordinal.
    #[inline]
    pub fn from_u8(ordinal: u8) -> Option<Self> {
        ALL_TAGS.get(ordinal as usize).copied()
    }

    /// The wire ordinal.
    #[inline]
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Fixed payload width in bytes for fixed-width scalars.
    ///
    /// Strings, containers and End have no fixed width. Note that the varint
    /// wire variant writes Int and Long with a variable width regardless.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            Self::Byte => Some(1),
            Self::Short => Some(2),
            Self::Int | Self::Float => Some(4),
            Self::Long | Self::Double => Some(8),
            _ => None,
        }
    }

    /// Count-prefixed runs of raw scalars (ByteArray, IntArray, LongArray).
    #[inline]
    pub fn is_array(self) -> bool {
        matches!(self, Self::ByteArray | Self::IntArray | Self::LongArray)
    }

    /// Tags whose payload holds other values: List, Compound and the array kinds.
    #[inline]
    pub fn is_container(self) -> bool {
        matches!(self, Self::List | Self::Compound) || self.is_array()
    }

    /// Leaf values: the numeric kinds and String.
    #[inline]
    pub fn is_scalar(self) -> bool {
        !self.is_container() && self != Self::End
    }

    /// Element kind of an array tag.
    pub fn array_element(self) -> Option<Self> {
        match self {
            Self::ByteArray => Some(Self::Byte),
            Self::IntArray => Some(Self::Int),
            Self::LongArray => Some(Self::Long),
            _ => None,
        }
    }

    /// Conventional `TAG_*` name.
    pub fn name(self) -> &'static str {
        match self {
            Self::End => "TAG_End",
            Self::Byte => "TAG_Byte",
            Self::Short => "TAG_Short",
            Self::Int => "TAG_Int",
            Self::Long => "TAG_Long",
            Self::Float => "TAG_Float",
            Self::Double => "TAG_Double",
            Self::ByteArray => "TAG_Byte_Array",
            Self::String => "TAG_String",
            Self::List => "TAG_List",
            Self::Compound => "TAG_Compound",
            Self::IntArray => "TAG_Int_Array",
            Self::LongArray => "TAG_Long_Array",
        }
    }
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
