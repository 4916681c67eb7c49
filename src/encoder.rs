// Streaming NBT encoder.
//
// A push writer whose calls mirror the decoder's token order. Each value
// write consults the top of the write stack:
//   - root:   write the root tag header (unless the root is unwrapped)
//   - object: write tag + pending field name, then the payload
//   - array:  check the declared element type and count, then write only
//             the raw payload
//
// Headers are committed as soon as a container opens, so List and packed
// array lengths must be known up front.

use std::collections::HashSet;
use std::io::Write;

use log::{debug, trace};

use crate::config::EncoderOptions;
use crate::error::{NbtError, Result};
use crate::tag::TagType;
use crate::token::{IntValue, Token};
use crate::wire::WireWriter;

// ---------------------------------------------------------------------------
// Write stack
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Frame {
    Object {
        /// The unwrapped root: no header, no End byte.
        implicit: bool,
        /// Field names seen so far, tracked only in strict mode.
        names: Option<HashSet<String>>,
    },
    Array {
        container: TagType,
        element: TagType,
        len: u32,
        remaining: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing written yet.
    Ready,
    Open,
    Done,
    Failed,
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Push encoder over any byte sink.
///
/// Any error poisons the encoder; later calls fail with a structural error.
pub struct Encoder<W: Write> {
    writer: WireWriter<W>,
    options: EncoderOptions,
    stack: Vec<Frame>,
    pending_name: Option<String>,
    state: State,
    last_tag: Option<TagType>,
    tokens: u64,
}

impl<W: Write> Encoder<W> {
    pub fn new(sink: W, options: EncoderOptions) -> Result<Self> {
        let variant = options.flags.variant()?;
        debug!(
            "encoder: {} variant, root {}, strict duplicates {}",
            variant.name(),
            if options.flags.wraps_root() { "wrapped" } else { "unwrapped" },
            options.strict_duplicates
        );
        Ok(Self {
            writer: WireWriter::new(sink, variant),
            options,
            stack: Vec::new(),
            pending_name: None,
            state: State::Ready,
            last_tag: None,
            tokens: 0,
        })
    }

    /// Run one call, poisoning the encoder if it fails.
    fn guarded(&mut self, f: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        match self.state {
            State::Failed => {
                return Err(NbtError::structure("encoder used after a failure")
                    .in_frame(self.stack.len(), self.last_tag));
            }
            State::Done => {
                return Err(NbtError::structure("document already complete")
                    .at_offset(self.writer.written())
                    .in_frame(0, self.last_tag));
            }
            State::Ready | State::Open => {}
        }
        match f(self) {
            Ok(()) => {
                self.tokens += 1;
                Ok(())
            }
            Err(e) => {
                self.state = State::Failed;
                let e = e
                    .at_offset(self.writer.written())
                    .in_frame(self.stack.len(), self.last_tag);
                debug!("encoder poisoned: {e}");
                Err(e)
            }
        }
    }

    /// Write whatever precedes a value of `tag` in the current context.
    fn begin_value(&mut self, tag: TagType) -> Result<()> {
        match self.stack.last_mut() {
            None => {
                if !self.options.flags.wraps_root() {
                    return Err(NbtError::structure(format!(
                        "unwrapped root must be a Compound, got {tag}"
                    )));
                }
                self.writer.write_tag(tag)?;
                self.writer.write_string(&self.options.root_name)?;
                self.state = State::Open;
            }
            Some(Frame::Object { .. }) => {
                let Some(name) = self.pending_name.take() else {
                    return Err(NbtError::structure(format!(
                        "{tag} value in an object without a field name"
                    )));
                };
                self.writer.write_tag(tag)?;
                self.writer.write_string(&name)?;
            }
            Some(Frame::Array {
                element,
                len,
                remaining,
                ..
            }) => {
                if *element != tag {
                    return Err(NbtError::structure(format!(
                        "array element type mismatch: declared {element}, got {tag}"
                    )));
                }
                if *remaining == 0 {
                    return Err(NbtError::structure(format!(
                        "more elements than the {len} declared"
                    )));
                }
                *remaining -= 1;
            }
        }
        self.last_tag = Some(tag);
        Ok(())
    }

    /// A value just ended. At the root that completes the document.
    fn end_value(&mut self) {
        if self.stack.is_empty() {
            self.state = State::Done;
        }
    }

    fn push(&mut self, frame: Frame) {
        trace!("encoder: push {frame:?} at depth {}", self.stack.len());
        self.stack.push(frame);
    }

    // -----------------------------------------------------------------------
    // Structure
    // -----------------------------------------------------------------------

    pub fn start_object(&mut self) -> Result<()> {
        self.guarded(|enc| {
            let implicit = enc.stack.is_empty() && !enc.options.flags.wraps_root();
            if implicit {
                enc.state = State::Open;
                enc.last_tag = Some(TagType::Compound);
            } else {
                enc.begin_value(TagType::Compound)?;
            }
            let names = enc.options.strict_duplicates.then(HashSet::new);
            enc.push(Frame::Object { implicit, names });
            Ok(())
        })
    }

    pub fn end_object(&mut self) -> Result<()> {
        self.guarded(|enc| {
            match enc.stack.last() {
                Some(Frame::Object { .. }) => {}
                Some(Frame::Array { .. }) => {
                    return Err(NbtError::structure("end_object inside an array"));
                }
                None => return Err(NbtError::structure("end_object without an open object")),
            }
            if let Some(name) = &enc.pending_name {
                return Err(NbtError::structure(format!(
                    "field name {name:?} has no value"
                )));
            }
            if let Some(Frame::Object { implicit, .. }) = enc.stack.pop() {
                trace!("encoder: pop object to depth {}", enc.stack.len());
                if !implicit {
                    enc.writer.write_tag(TagType::End)?;
                }
            }
            enc.last_tag = Some(TagType::Compound);
            enc.end_value();
            Ok(())
        })
    }

    /// Open a List of `len` elements of type `element`. The header is
    /// written immediately.
    pub fn start_array(&mut self, element: TagType, len: usize) -> Result<()> {
        self.guarded(|enc| {
            if element == TagType::End && len != 0 {
                return Err(NbtError::structure(format!(
                    "list of TAG_End cannot hold {len} elements"
                )));
            }
            enc.begin_value(TagType::List)?;
            enc.writer.write_tag(element)?;
            enc.writer.write_count(len)?;
            enc.push(Frame::Array {
                container: TagType::List,
                element,
                len: len as u32,
                remaining: len as u32,
            });
            Ok(())
        })
    }

    /// Open a ByteArray/IntArray/LongArray to be written one element at a
    /// time through the matching scalar calls.
    pub fn start_packed_array(&mut self, container: TagType, len: usize) -> Result<()> {
        self.guarded(|enc| {
            let Some(element) = container.array_element() else {
                return Err(NbtError::structure(format!(
                    "{container} is not a packed array kind"
                )));
            };
            enc.begin_value(container)?;
            enc.writer.write_count(len)?;
            enc.push(Frame::Array {
                container,
                element,
                len: len as u32,
                remaining: len as u32,
            });
            Ok(())
        })
    }

    pub fn end_array(&mut self) -> Result<()> {
        self.guarded(|enc| {
            match enc.stack.last() {
                Some(Frame::Array { remaining: 0, .. }) => {}
                Some(Frame::Array { len, remaining, .. }) => {
                    return Err(NbtError::structure(format!(
                        "array ended after {} of {len} declared elements",
                        len - remaining
                    )));
                }
                Some(Frame::Object { .. }) => {
                    return Err(NbtError::structure("end_array inside an object"));
                }
                None => return Err(NbtError::structure("end_array without an open array")),
            }
            if let Some(Frame::Array { container, .. }) = enc.stack.pop() {
                trace!("encoder: pop {container} to depth {}", enc.stack.len());
                enc.last_tag = Some(container);
            }
            enc.end_value();
            Ok(())
        })
    }

    pub fn write_field_name(&mut self, name: &str) -> Result<()> {
        self.guarded(|enc| {
            let Some(Frame::Object { names, .. }) = enc.stack.last_mut() else {
                return Err(NbtError::structure(format!(
                    "field name {name:?} outside an object"
                )));
            };
            if let Some(pending) = &enc.pending_name {
                return Err(NbtError::structure(format!(
                    "field name {name:?} follows {pending:?} which has no value"
                )));
            }
            if let Some(names) = names
                && !names.insert(name.to_string())
            {
                return Err(NbtError::structure(format!(
                    "duplicate field name {name:?}"
                )));
            }
            enc.pending_name = Some(name.to_string());
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Scalars
    // -----------------------------------------------------------------------

    pub fn write_byte(&mut self, v: i8) -> Result<()> {
        self.guarded(|enc| {
            enc.begin_value(TagType::Byte)?;
            enc.writer.write_i8(v)?;
            enc.end_value();
            Ok(())
        })
    }

    pub fn write_short(&mut self, v: i16) -> Result<()> {
        self.guarded(|enc| {
            enc.begin_value(TagType::Short)?;
            enc.writer.write_i16(v)?;
            enc.end_value();
            Ok(())
        })
    }

    pub fn write_int(&mut self, v: i32) -> Result<()> {
        self.guarded(|enc| {
            enc.begin_value(TagType::Int)?;
            enc.writer.write_i32(v)?;
            enc.end_value();
            Ok(())
        })
    }

    pub fn write_long(&mut self, v: i64) -> Result<()> {
        self.guarded(|enc| {
            enc.begin_value(TagType::Long)?;
            enc.writer.write_i64(v)?;
            enc.end_value();
            Ok(())
        })
    }

    pub fn write_float(&mut self, v: f32) -> Result<()> {
        self.guarded(|enc| {
            enc.begin_value(TagType::Float)?;
            enc.writer.write_f32(v)?;
            enc.end_value();
            Ok(())
        })
    }

    pub fn write_double(&mut self, v: f64) -> Result<()> {
        self.guarded(|enc| {
            enc.begin_value(TagType::Double)?;
            enc.writer.write_f64(v)?;
            enc.end_value();
            Ok(())
        })
    }

    pub fn write_string(&mut self, v: &str) -> Result<()> {
        self.guarded(|enc| {
            enc.begin_value(TagType::String)?;
            enc.writer.write_string(v)?;
            enc.end_value();
            Ok(())
        })
    }

    /// Booleans are Bytes holding 0 or 1.
    pub fn write_bool(&mut self, v: bool) -> Result<()> {
        self.write_byte(i8::from(v))
    }

    pub fn write_int_value(&mut self, v: IntValue) -> Result<()> {
        match v {
            IntValue::Byte(v) => self.write_byte(v),
            IntValue::Short(v) => self.write_short(v),
            IntValue::Int(v) => self.write_int(v),
            IntValue::Long(v) => self.write_long(v),
        }
    }

    /// Write as a Long, or fail if the value does not fit in 64 signed bits.
    pub fn write_i128(&mut self, v: i128) -> Result<()> {
        match i64::try_from(v) {
            Ok(v) => self.write_long(v),
            Err(_) => self.guarded(|_| {
                Err(NbtError::unsupported(format!(
                    "integer {v} does not fit in {}",
                    TagType::Long
                )))
            }),
        }
    }

    /// Write as a Long, or fail if the value exceeds `i64::MAX`.
    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        self.write_i128(i128::from(v))
    }

    // -----------------------------------------------------------------------
    // Materialized arrays
    // -----------------------------------------------------------------------

    pub fn write_binary(&mut self, bytes: &[u8]) -> Result<()> {
        self.guarded(|enc| {
            enc.begin_value(TagType::ByteArray)?;
            enc.writer.write_count(bytes.len())?;
            enc.writer.write_bytes(bytes)?;
            enc.end_value();
            Ok(())
        })
    }

    pub fn write_int_array(&mut self, values: &[i32]) -> Result<()> {
        self.guarded(|enc| {
            enc.begin_value(TagType::IntArray)?;
            enc.writer.write_count(values.len())?;
            for &v in values {
                enc.writer.write_i32(v)?;
            }
            enc.end_value();
            Ok(())
        })
    }

    pub fn write_long_array(&mut self, values: &[i64]) -> Result<()> {
        self.guarded(|enc| {
            enc.begin_value(TagType::LongArray)?;
            enc.writer.write_count(values.len())?;
            for &v in values {
                enc.writer.write_i64(v)?;
            }
            enc.end_value();
            Ok(())
        })
    }

    /// Null has no tag of its own. In an object the pending field is
    /// dropped; at a wrapped root a lone End byte is written.
    pub fn write_null(&mut self) -> Result<()> {
        self.guarded(|enc| match enc.stack.last_mut() {
            None if enc.options.flags.wraps_root() => {
                enc.writer.write_tag(TagType::End)?;
                enc.last_tag = Some(TagType::End);
                enc.state = State::Done;
                Ok(())
            }
            None => Err(NbtError::unsupported("null root without root wrapping")),
            Some(Frame::Object { names, .. }) => {
                let Some(name) = enc.pending_name.take() else {
                    return Err(NbtError::structure("null in an object without a field name"));
                };
                trace!("encoder: dropping null field {name:?}");
                if let Some(names) = names {
                    names.remove(&name);
                }
                Ok(())
            }
            Some(Frame::Array { .. }) => Err(NbtError::unsupported("null inside an array")),
        })
    }

    /// Dispatch one token to the matching call.
    pub fn write_token(&mut self, token: &Token) -> Result<()> {
        match token {
            Token::StartObject => self.start_object(),
            Token::EndObject => self.end_object(),
            Token::StartArray {
                container: TagType::List,
                element,
                len,
            } => self.start_array(*element, *len as usize),
            Token::StartArray { container, len, .. } => {
                self.start_packed_array(*container, *len as usize)
            }
            Token::EndArray => self.end_array(),
            Token::FieldName(name) => self.write_field_name(name),
            Token::Int(v) => self.write_int_value(*v),
            Token::Float(v) => self.write_float(*v),
            Token::Double(v) => self.write_double(*v),
            Token::String(s) => self.write_string(s),
            Token::Binary(b) => self.write_binary(b),
            Token::Bool(b) => self.write_bool(*b),
            Token::Null => self.write_null(),
        }
    }

    // -----------------------------------------------------------------------
    // Completion
    // -----------------------------------------------------------------------

    /// Current write stack depth.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Bytes written to the sink.
    pub fn written(&self) -> u64 {
        self.writer.written()
    }

    /// Successful calls so far.
    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    pub fn is_complete(&self) -> bool {
        self.state == State::Done
    }

    /// Flush the sink, then check that the document is complete.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        match self.state {
            State::Done => Ok(self.writer.into_inner()),
            State::Failed => Err(NbtError::structure("encoder used after a failure")),
            State::Ready => Err(NbtError::structure("nothing was written")),
            State::Open => Err(NbtError::structure(format!(
                "document incomplete with {} open frames",
                self.stack.len()
            ))
            .at_offset(self.writer.written())
            .in_frame(self.stack.len(), self.last_tag)),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience function
// ---------------------------------------------------------------------------

/// Encode a token sequence into memory.
pub fn encode_tokens(tokens: &[Token], options: EncoderOptions) -> Result<Vec<u8>> {
    let mut encoder = Encoder::new(Vec::new(), options)?;
    for token in tokens {
        encoder.write_token(token)?;
    }
    encoder.finish()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
