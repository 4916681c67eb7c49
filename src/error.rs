//! Error types for NBT decoding and encoding.

use std::fmt;
use std::io;

use crate::tag::TagType;

/// Where an error was detected. Diagnostic only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Context stack depth at the failing call.
    pub depth: usize,
    /// Last tag read or written before the failure.
    pub last_tag: Option<TagType>,
    /// Absolute byte offset in the source or sink.
    pub offset: Option<u64>,
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "depth {}", self.depth)?;
        if let Some(tag) = self.last_tag {
            write!(f, ", last tag {tag}")?;
        }
        if let Some(offset) = self.offset {
            write!(f, ", offset {offset}")?;
        }
        Ok(())
    }
}

/// Errors that can occur while decoding or encoding NBT.
#[derive(Debug, thiserror::Error)]
pub enum NbtError {
    /// Malformed bytes or an invalid wire configuration.
    #[error("format error: {message} ({context})")]
    Format {
        message: String,
        context: ErrorContext,
    },

    /// The source ran out in the middle of an entry.
    #[error("unexpected end of input ({context})")]
    UnexpectedEof { context: ErrorContext },

    /// A value the tag set cannot represent.
    #[error("unsupported value: {message} ({context})")]
    Unsupported {
        message: String,
        context: ErrorContext,
    },

    /// Calls or tokens that violate the tree structure.
    #[error("structural error: {message} ({context})")]
    Structure {
        message: String,
        context: ErrorContext,
    },

    /// Any other failure of the underlying reader or writer.
    #[error("I/O error: {source} ({context})")]
    Io {
        #[source]
        source: io::Error,
        context: ErrorContext,
    },
}

pub type Result<T, E = NbtError> = std::result::Result<T, E>;

impl NbtError {
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn structure(message: impl Into<String>) -> Self {
        Self::Structure {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn eof() -> Self {
        Self::UnexpectedEof {
            context: ErrorContext::default(),
        }
    }

    /// True for [`NbtError::UnexpectedEof`].
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::UnexpectedEof { .. })
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Format { context, .. }
            | Self::UnexpectedEof { context }
            | Self::Unsupported { context, .. }
            | Self::Structure { context, .. }
            | Self::Io { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::Format { context, .. }
            | Self::UnexpectedEof { context }
            | Self::Unsupported { context, .. }
            | Self::Structure { context, .. }
            | Self::Io { context, .. } => context,
        }
    }

    /// Record the byte offset unless a more precise one is already set.
    pub(crate) fn at_offset(mut self, offset: u64) -> Self {
        self.context_mut().offset.get_or_insert(offset);
        self
    }

    /// Record the frame depth and last tag of the instance that raised it.
    pub(crate) fn in_frame(mut self, depth: usize, last_tag: Option<TagType>) -> Self {
        let ctx = self.context_mut();
        ctx.depth = depth;
        if ctx.last_tag.is_none() {
            ctx.last_tag = last_tag;
        }
        self
    }
}

impl From<io::Error> for NbtError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::eof()
        } else {
            Self::Io {
                source: e,
                context: ErrorContext::default(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_eof_maps_to_unexpected_eof() {
        let err: NbtError = io::Error::from(io::ErrorKind::UnexpectedEof).into();
        assert!(err.is_eof());

        let err: NbtError = io::Error::from(io::ErrorKind::PermissionDenied).into();
        assert!(matches!(err, NbtError::Io { .. }));
    }

    #[test]
    fn context_is_filled_once() {
        let err = NbtError::format("bad tag 0x2A")
            .at_offset(17)
            .at_offset(99)
            .in_frame(3, Some(TagType::List));
        let ctx = err.context();
        assert_eq!(ctx.offset, Some(17));
        assert_eq!(ctx.depth, 3);
        assert_eq!(ctx.last_tag, Some(TagType::List));
        assert_eq!(
            err.to_string(),
            "format error: bad tag 0x2A (depth 3, last tag TAG_List, offset 17)"
        );
    }

    #[test]
    fn unsupported_and_io_carry_context() {
        let err = NbtError::unsupported("u64 18446744073709551615")
            .at_offset(4)
            .in_frame(1, Some(TagType::Compound));
        assert_eq!(err.context().offset, Some(4));
        assert_eq!(err.context().depth, 1);
        assert!(err.to_string().ends_with("(depth 1, last tag TAG_Compound, offset 4)"));

        let err: NbtError = io::Error::from(io::ErrorKind::BrokenPipe).into();
        let err = err.at_offset(12).in_frame(2, None);
        assert!(matches!(err, NbtError::Io { .. }));
        assert_eq!(err.context().offset, Some(12));
        assert_eq!(err.context().depth, 2);
    }
}
