// Streaming NBT decoder.
//
// A pull reader that turns bytes into a depth-first token sequence. State
// lives entirely on a parse stack:
//   - Compound frames read the next entry header (tag + name) and emit a
//     FieldName; the entry's value waits in an Entry frame for the next call.
//   - Sequence frames (List and packed arrays) count down their declared
//     elements and close with EndArray at zero. No End byte is read for them.
//
// Nothing is allocated in proportion to a declared count; elements are
// decoded one at a time.

use std::io::Read;

use log::{debug, trace};

use crate::config::Flags;
use crate::error::{NbtError, Result};
use crate::tag::TagType;
use crate::token::{IntValue, Token};
use crate::wire::WireReader;

// ---------------------------------------------------------------------------
// Parse stack
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Frame {
    /// A field header has been read; its value of this tag comes next.
    Entry(TagType),
    /// An open Compound. `implicit` marks the unwrapped root, which may also
    /// close on a clean end of input.
    Compound { implicit: bool },
    /// An open List or packed array.
    Sequence {
        container: TagType,
        element: TagType,
        remaining: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Running,
    Done,
    Failed,
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Pull decoder over any byte source.
///
/// Yields tokens through [`next_token`](Self::next_token) or as an
/// [`Iterator`]. After an error the decoder is poisoned: `next_token`
/// returns a structural error and the iterator ends.
pub struct Decoder<R> {
    reader: WireReader<R>,
    flags: Flags,
    stack: Vec<Frame>,
    state: State,
    root_name: Option<String>,
    last_tag: Option<TagType>,
    max_depth: usize,
}

impl<R: Read> Decoder<R> {
    /// Create a decoder over a source of unknown length.
    pub fn new(reader: R, flags: Flags) -> Result<Self> {
        let variant = flags.variant()?;
        Ok(Self::from_wire(WireReader::new(reader, variant), flags))
    }

    /// Create a decoder over a source of exactly `len` bytes. String
    /// headers that overrun the source fail before allocating, and
    /// [`finish`](Self::finish) reports trailing bytes.
    pub fn with_len(reader: R, len: u64, flags: Flags) -> Result<Self> {
        let variant = flags.variant()?;
        Ok(Self::from_wire(
            WireReader::with_len(reader, variant, len),
            flags,
        ))
    }

    fn from_wire(reader: WireReader<R>, flags: Flags) -> Self {
        debug!(
            "decoder: {} variant, root {}",
            reader.variant().name(),
            if flags.wraps_root() { "wrapped" } else { "unwrapped" }
        );
        Self {
            reader,
            flags,
            stack: Vec::new(),
            state: State::Start,
            root_name: None,
            last_tag: None,
            max_depth: 0,
        }
    }

    /// Produce the next token, or `None` once the document is complete.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        match self.state {
            State::Done => return Ok(None),
            State::Failed => {
                return Err(NbtError::structure("decoder used after a failure")
                    .in_frame(self.stack.len(), self.last_tag));
            }
            State::Start | State::Running => {}
        }

        match self.step() {
            Ok(Some(token)) => {
                self.max_depth = self.max_depth.max(self.stack.len());
                Ok(Some(token))
            }
            Ok(None) => {
                self.state = State::Done;
                Ok(None)
            }
            Err(e) => {
                self.state = State::Failed;
                let e = e
                    .at_offset(self.reader.offset())
                    .in_frame(self.stack.len(), self.last_tag);
                debug!("decoder poisoned: {e}");
                Err(e)
            }
        }
    }

    fn step(&mut self) -> Result<Option<Token>> {
        if self.state == State::Start {
            self.state = State::Running;
            return self.start_root();
        }

        let Some(top) = self.stack.last_mut() else {
            return Ok(None);
        };
        match top {
            Frame::Compound { implicit } => {
                let implicit = *implicit;
                self.next_entry(implicit).map(Some)
            }
            Frame::Sequence { remaining: 0, .. } => {
                self.pop();
                Ok(Some(Token::EndArray))
            }
            Frame::Sequence {
                element, remaining, ..
            } => {
                *remaining -= 1;
                let element = *element;
                self.read_value(element).map(Some)
            }
            Frame::Entry(tag) => {
                let tag = *tag;
                self.pop();
                self.read_value(tag).map(Some)
            }
        }
    }

    fn start_root(&mut self) -> Result<Option<Token>> {
        if !self.flags.wraps_root() {
            self.push(Frame::Compound { implicit: true });
            return Ok(Some(Token::StartObject));
        }

        let Some(byte) = self.reader.try_read_u8()? else {
            debug!("decoder: empty input");
            return Ok(None);
        };
        let tag = self.reader.tag_from_byte(byte)?;
        self.last_tag = Some(tag);
        if tag == TagType::End {
            return Ok(Some(Token::Null));
        }
        let name = self.reader.read_string()?;
        debug!("decoder: root {tag} {name:?}");
        self.root_name = Some(name);
        self.read_value(tag).map(Some)
    }

    /// Read one Compound entry header, or the End that closes the Compound.
    fn next_entry(&mut self, implicit: bool) -> Result<Token> {
        let tag = if implicit {
            match self.reader.try_read_u8()? {
                Some(byte) => self.reader.tag_from_byte(byte)?,
                None => TagType::End,
            }
        } else {
            self.reader.read_tag()?
        };
        self.last_tag = Some(tag);

        if tag == TagType::End {
            self.pop();
            return Ok(Token::EndObject);
        }
        let name = self.reader.read_string()?;
        self.push(Frame::Entry(tag));
        Ok(Token::FieldName(name))
    }

    /// Decode one value of `tag`. Containers push a frame and emit their
    /// start token; scalars are leaves.
    fn read_value(&mut self, tag: TagType) -> Result<Token> {
        let r = &mut self.reader;
        let token = match tag {
            TagType::End => {
                return Err(NbtError::format("TAG_End where a value was expected"));
            }
            TagType::Byte => Token::Int(IntValue::Byte(r.read_i8()?)),
            TagType::Short => Token::Int(IntValue::Short(r.read_i16()?)),
            TagType::Int => Token::Int(IntValue::Int(r.read_i32()?)),
            TagType::Long => Token::Int(IntValue::Long(r.read_i64()?)),
            TagType::Float => Token::Float(r.read_f32()?),
            TagType::Double => Token::Double(r.read_f64()?),
            TagType::String => Token::String(r.read_string()?),
            TagType::List => {
                let element = r.read_tag()?;
                let len = r.read_count()?;
                if element == TagType::End && len != 0 {
                    return Err(NbtError::format(format!(
                        "list of TAG_End with {len} elements"
                    )));
                }
                self.push(Frame::Sequence {
                    container: TagType::List,
                    element,
                    remaining: len,
                });
                Token::list(element, len)
            }
            TagType::Compound => {
                self.push(Frame::Compound { implicit: false });
                Token::StartObject
            }
            TagType::ByteArray | TagType::IntArray | TagType::LongArray => {
                let len = r.read_count()?;
                let element = match tag.array_element() {
                    Some(element) => element,
                    None => return Err(NbtError::format(format!("{tag} is not an array"))),
                };
                self.push(Frame::Sequence {
                    container: tag,
                    element,
                    remaining: len,
                });
                Token::StartArray {
                    container: tag,
                    element,
                    len,
                }
            }
        };
        self.last_tag = Some(tag);
        Ok(token)
    }

    fn push(&mut self, frame: Frame) {
        trace!("decoder: push {frame:?} at depth {}", self.stack.len());
        self.stack.push(frame);
    }

    fn pop(&mut self) {
        if let Some(frame) = self.stack.pop() {
            trace!("decoder: pop {frame:?} to depth {}", self.stack.len());
            if let Frame::Sequence { container, .. } = frame {
                self.last_tag = Some(container);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Current parse stack depth.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Deepest parse stack seen so far.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Bytes consumed from the source.
    pub fn offset(&self) -> u64 {
        self.reader.offset()
    }

    /// Name of the wrapped root tag, once it has been read.
    pub fn root_name(&self) -> Option<&str> {
        self.root_name.as_deref()
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// True once the root value has been fully emitted.
    pub fn is_complete(&self) -> bool {
        match self.state {
            State::Done => true,
            State::Running => self.stack.is_empty(),
            State::Start | State::Failed => false,
        }
    }

    /// Check that the document is complete and nothing follows it, then
    /// return the source.
    pub fn finish(mut self) -> Result<R> {
        if self.state == State::Failed {
            return Err(NbtError::structure("decoder used after a failure"));
        }
        if !self.is_complete() {
            return Err(NbtError::structure(format!(
                "document incomplete with {} open frames",
                self.stack.len()
            ))
            .at_offset(self.reader.offset())
            .in_frame(self.stack.len(), self.last_tag));
        }
        let trailing = match self.reader.remaining() {
            Some(rem) => rem,
            None => u64::from(self.reader.try_read_u8()?.is_some()),
        };
        if trailing > 0 {
            return Err(NbtError::format(format!(
                "trailing bytes after the document ({trailing})"
            ))
            .at_offset(self.reader.offset()));
        }
        Ok(self.reader.into_inner())
    }

    /// Give back the source without any checks.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

impl<'a> Decoder<&'a [u8]> {
    /// Create a decoder over an in-memory buffer.
    pub fn from_slice(bytes: &'a [u8], flags: Flags) -> Result<Self> {
        Self::with_len(bytes, bytes.len() as u64, flags)
    }
}

impl<R: Read> Iterator for Decoder<R> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == State::Failed {
            return None;
        }
        self.next_token().transpose()
    }
}

impl<R: Read> std::iter::FusedIterator for Decoder<R> {}

// ---------------------------------------------------------------------------
// Convenience function
// ---------------------------------------------------------------------------

/// Decode a whole in-memory document, rejecting trailing bytes.
pub fn decode_all(bytes: &[u8], flags: Flags) -> Result<Vec<Token>> {
    let mut decoder = Decoder::from_slice(bytes, flags)?;
    let mut tokens = Vec::new();
    while let Some(token) = decoder.next_token()? {
        tokens.push(token);
    }
    decoder.finish()?;
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: [u8; 12] = [
        0x0A, 0x00, 0x00, 0x03, 0x00, 0x01, b'a', 0x00, 0x00, 0x00, 0x01, 0x00,
    ];

    fn field(name: &str) -> Token {
        Token::FieldName(name.to_string())
    }

    #[test]
    fn literal_document() {
        let tokens = decode_all(&CANONICAL, Flags::empty()).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::StartObject,
                field("a"),
                Token::Int(IntValue::Int(1)),
                Token::EndObject,
            ]
        );
    }

    #[test]
    fn root_name_is_exposed() {
        let data = [0x0A, 0x00, 0x02, b'h', b'i', 0x00];
        let mut dec = Decoder::from_slice(&data, Flags::empty()).unwrap();
        assert_eq!(dec.root_name(), None);
        assert_eq!(dec.next_token().unwrap(), Some(Token::StartObject));
        assert_eq!(dec.root_name(), Some("hi"));
        assert_eq!(dec.next_token().unwrap(), Some(Token::EndObject));
        assert_eq!(dec.next_token().unwrap(), None);
        assert!(dec.is_complete());
        dec.finish().unwrap();
    }

    #[test]
    fn field_value_is_one_call_later() {
        let mut dec = Decoder::from_slice(&CANONICAL, Flags::empty()).unwrap();
        dec.next_token().unwrap();
        assert_eq!(dec.next_token().unwrap(), Some(field("a")));
        // The pending Int value is an Entry frame above the Compound.
        assert_eq!(dec.depth(), 2);
        assert_eq!(dec.offset(), 7);
        dec.next_token().unwrap();
        assert_eq!(dec.depth(), 1);
    }

    #[test]
    fn empty_list_consumes_only_its_header() {
        // Compound { "l": List<Int>[] }
        let data = [
            0x0A, 0x00, 0x00, 0x09, 0x00, 0x01, b'l', 0x03, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        let mut dec = Decoder::from_slice(&data, Flags::empty()).unwrap();
        dec.next_token().unwrap();
        dec.next_token().unwrap();
        assert_eq!(
            dec.next_token().unwrap(),
            Some(Token::list(TagType::Int, 0))
        );
        assert_eq!(dec.offset(), 12);
        assert_eq!(dec.next_token().unwrap(), Some(Token::EndArray));
        assert_eq!(dec.offset(), 12);
        assert_eq!(dec.next_token().unwrap(), Some(Token::EndObject));
    }

    #[test]
    fn byte_array_streams_elements() {
        let data = [
            0x0A, 0x00, 0x00, 0x07, 0x00, 0x01, b'b', 0x00, 0x00, 0x00, 0x02, 0x05, 0xFB, 0x00,
        ];
        let tokens = decode_all(&data, Flags::empty()).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::StartObject,
                field("b"),
                Token::packed(TagType::ByteArray, 2).unwrap(),
                Token::Int(IntValue::Byte(5)),
                Token::Int(IntValue::Byte(-5)),
                Token::EndArray,
                Token::EndObject,
            ]
        );
    }

    #[test]
    fn list_of_compounds_closes_with_end_array() {
        // List<Compound>[ {}, {} ] as the root.
        let data = [
            0x09, 0x00, 0x00, 0x0A, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00,
        ];
        let tokens = decode_all(&data, Flags::empty()).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::list(TagType::Compound, 2),
                Token::StartObject,
                Token::EndObject,
                Token::StartObject,
                Token::EndObject,
                Token::EndArray,
            ]
        );
    }

    #[test]
    fn no_wrap_closes_on_eof() {
        let data = [0x01, 0x00, 0x01, b'x', 0x07];
        let tokens = decode_all(&data, Flags::NO_WRAP).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::StartObject,
                field("x"),
                Token::Int(IntValue::Byte(7)),
                Token::EndObject,
            ]
        );
    }

    #[test]
    fn no_wrap_closes_on_end_byte() {
        let tokens = decode_all(&[0x00], Flags::NO_WRAP).unwrap();
        assert_eq!(tokens, vec![Token::StartObject, Token::EndObject]);
    }

    #[test]
    fn root_end_is_null() {
        assert_eq!(decode_all(&[0x00], Flags::empty()).unwrap(), vec![Token::Null]);
    }

    #[test]
    fn empty_input_has_no_tokens() {
        assert!(decode_all(&[], Flags::empty()).unwrap().is_empty());
    }

    #[test]
    fn eof_mid_entry() {
        let err = decode_all(&CANONICAL[..9], Flags::empty()).unwrap_err();
        assert!(err.is_eof(), "{err}");
        let ctx = err.context();
        assert_eq!(ctx.depth, 1);
        assert_eq!(ctx.last_tag, Some(TagType::Int));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut data = CANONICAL.to_vec();
        data.push(0x00);
        let err = decode_all(&data, Flags::empty()).unwrap_err();
        assert!(matches!(err, NbtError::Format { .. }), "{err}");
    }

    #[test]
    fn list_of_end_with_elements_is_rejected() {
        let data = [0x09, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01];
        let err = decode_all(&data, Flags::empty()).unwrap_err();
        assert!(matches!(err, NbtError::Format { .. }), "{err}");
    }

    #[test]
    fn poisoned_after_error() {
        let mut dec = Decoder::from_slice(&[0x2A], Flags::empty()).unwrap();
        assert!(matches!(
            dec.next_token().unwrap_err(),
            NbtError::Format { .. }
        ));
        assert!(matches!(
            dec.next_token().unwrap_err(),
            NbtError::Structure { .. }
        ));
        assert!(dec.next().is_none());
    }

    #[test]
    fn iterator_yields_error_once() {
        let dec = Decoder::from_slice(&CANONICAL[..5], Flags::empty()).unwrap();
        let items: Vec<_> = dec.collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }

    #[test]
    fn invalid_variant_is_rejected_up_front() {
        let err = Decoder::from_slice(&CANONICAL, Flags::VAR_INT).err().unwrap();
        assert!(matches!(err, NbtError::Format { .. }));
    }

    #[test]
    fn finish_requires_completion() {
        let mut dec = Decoder::from_slice(&CANONICAL, Flags::empty()).unwrap();
        dec.next_token().unwrap();
        let err = dec.finish().unwrap_err();
        assert!(matches!(err, NbtError::Structure { .. }));
    }

    #[test]
    fn unsized_source_trailing_check() {
        let mut data = CANONICAL.to_vec();
        data.push(0xAA);
        let mut dec = Decoder::new(&data[..], Flags::empty()).unwrap();
        while dec.next_token().unwrap().is_some() {}
        assert!(dec.finish().is_err());
    }

    #[test]
    fn max_depth_tracks_nesting() {
        // { "c": { } }
        let data = [
            0x0A, 0x00, 0x00, 0x0A, 0x00, 0x01, b'c', 0x00, 0x00,
        ];
        let mut dec = Decoder::from_slice(&data, Flags::empty()).unwrap();
        while dec.next_token().unwrap().is_some() {}
        assert_eq!(dec.max_depth(), 2);
    }
}
