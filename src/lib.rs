//! nbtstream: a streaming codec for NBT (named binary tag) documents.
//!
//! The crate provides:
//! - A pull decoder turning bytes into depth-first tokens (`decoder`)
//! - A push encoder writing the mirrored calls back to bytes (`encoder`)
//! - Big-endian, little-endian and little-endian varint wire layouts,
//!   with optional root wrapping (`config`, `wire`)
//! - File-oriented helpers with gzip detection (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use nbtstream::config::{EncoderOptions, Flags};
//! use nbtstream::{decoder, Encoder, Token, IntValue};
//!
//! let mut enc = Encoder::new(Vec::new(), EncoderOptions::default()).unwrap();
//! enc.start_object().unwrap();
//! enc.write_field_name("a").unwrap();
//! enc.write_int(1).unwrap();
//! enc.end_object().unwrap();
//! let bytes = enc.finish().unwrap();
//! assert_eq!(bytes, [0x0A, 0, 0, 0x03, 0, 1, b'a', 0, 0, 0, 1, 0]);
//!
//! let tokens = decoder::decode_all(&bytes, Flags::empty()).unwrap();
//! assert_eq!(tokens[2], Token::Int(IntValue::Int(1)));
//! ```

pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod io;
pub mod tag;
pub mod token;
pub mod wire;

#[cfg(feature = "cli")]
pub mod cli;

pub use config::{EncoderOptions, Flags, Variant};
pub use decoder::{Decoder, decode_all};
pub use encoder::{Encoder, encode_tokens};
pub use error::{ErrorContext, NbtError, Result};
pub use tag::TagType;
pub use token::{IntValue, Token};
