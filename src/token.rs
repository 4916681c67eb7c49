// Token model shared by the decoder and the encoder.

use std::fmt;

use crate::tag::TagType;

/// A width-tagged integer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntValue {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
}

impl IntValue {
    /// The physical tag this value is written under.
    pub fn tag(self) -> TagType {
        match self {
            Self::Byte(_) => TagType::Byte,
            Self::Short(_) => TagType::Short,
            Self::Int(_) => TagType::Int,
            Self::Long(_) => TagType::Long,
        }
    }

    /// Widen to `i64`.
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Byte(v) => i64::from(v),
            Self::Short(v) => i64::from(v),
            Self::Int(v) => i64::from(v),
            Self::Long(v) => v,
        }
    }
}

impl fmt::Display for IntValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Byte(v) => write!(f, "{v}b"),
            Self::Short(v) => write!(f, "{v}s"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}L"),
        }
    }
}

/// One structural or value event of a depth-first traversal.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    StartObject,
    EndObject,
    /// Opens a List (`container == List`) or a packed array
    /// (`ByteArray`/`IntArray`/`LongArray`). `element` is the declared
    /// type of every child; `len` is the declared count.
    StartArray {
        container: TagType,
        element: TagType,
        len: u32,
    },
    EndArray,
    FieldName(String),
    Int(IntValue),
    Float(f32),
    Double(f64),
    String(String),
    /// A fully materialized ByteArray. Only produced by callers; the
    /// decoder streams ByteArrays element by element.
    Binary(Vec<u8>),
    /// Written as a Byte 0/1.
    Bool(bool),
    /// An empty wrapped document (a lone End tag at the root), or an
    /// omitted field when encoding.
    Null,
}

impl Token {
    /// Shorthand for a List header token.
    pub fn list(element: TagType, len: u32) -> Self {
        Self::StartArray {
            container: TagType::List,
            element,
            len,
        }
    }

    /// Shorthand for a ByteArray/IntArray/LongArray header token.
    /// Returns `None` if `container` is not an array kind.
    pub fn packed(container: TagType, len: u32) -> Option<Self> {
        let element = container.array_element()?;
        Some(Self::StartArray {
            container,
            element,
            len,
        })
    }

    /// The tag a value token is written under, `None` for structural
    /// tokens and `Null`.
    pub fn value_tag(&self) -> Option<TagType> {
        match self {
            Self::StartObject => Some(TagType::Compound),
            Self::StartArray { container, .. } => Some(*container),
            Self::Int(v) => Some(v.tag()),
            Self::Float(_) => Some(TagType::Float),
            Self::Double(_) => Some(TagType::Double),
            Self::String(_) => Some(TagType::String),
            Self::Binary(_) => Some(TagType::ByteArray),
            Self::Bool(_) => Some(TagType::Byte),
            Self::EndObject | Self::EndArray | Self::FieldName(_) | Self::Null => None,
        }
    }

    /// Change in nesting depth caused by this token.
    pub fn depth_delta(&self) -> isize {
        match self {
            Self::StartObject | Self::StartArray { .. } => 1,
            Self::EndObject | Self::EndArray => -1,
            _ => 0,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartObject => f.write_str("StartObject"),
            Self::EndObject => f.write_str("EndObject"),
            Self::StartArray {
                container,
                element,
                len,
            } => write!(f, "StartArray({container} of {element}, {len})"),
            Self::EndArray => f.write_str("EndArray"),
            Self::FieldName(name) => write!(f, "FieldName({name:?})"),
            Self::Int(v) => write!(f, "Int({v})"),
            Self::Float(v) => write!(f, "Float({v})"),
            Self::Double(v) => write!(f, "Double({v})"),
            Self::String(s) => write!(f, "String({s:?})"),
            Self::Binary(b) => write!(f, "Binary({} bytes)", b.len()),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Null => f.write_str("Null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_value_tags_and_widening() {
        assert_eq!(IntValue::Byte(-1).tag(), TagType::Byte);
        assert_eq!(IntValue::Long(5).tag(), TagType::Long);
        assert_eq!(IntValue::Short(-300).as_i64(), -300);
        assert_eq!(IntValue::Byte(-1).to_string(), "-1b");
    }

    #[test]
    fn packed_headers() {
        assert_eq!(
            Token::packed(TagType::IntArray, 3),
            Some(Token::StartArray {
                container: TagType::IntArray,
                element: TagType::Int,
                len: 3
            })
        );
        assert_eq!(Token::packed(TagType::List, 3), None);
    }

    #[test]
    fn value_tags() {
        assert_eq!(Token::Bool(true).value_tag(), Some(TagType::Byte));
        assert_eq!(Token::Binary(vec![]).value_tag(), Some(TagType::ByteArray));
        assert_eq!(
            Token::list(TagType::String, 0).value_tag(),
            Some(TagType::List)
        );
        assert_eq!(Token::EndArray.value_tag(), None);
    }

    #[test]
    fn display() {
        assert_eq!(
            Token::list(TagType::Int, 2).to_string(),
            "StartArray(TAG_List of TAG_Int, 2)"
        );
        assert_eq!(Token::FieldName("a".into()).to_string(), "FieldName(\"a\")");
    }
}
