// File-level helpers around the streaming decoder and encoder.
//
// `scan_file()` and `write_file()` wrap the token codec with buffered file
// I/O and optional gzip framing. `scan_file()` hands tokens out one at a time;
// `read_file()` collects them. `convert()` pipes a decoder straight into an
// encoder without building a tree.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::debug;

use crate::config::{EncoderOptions, Flags};
use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::NbtError;
use crate::token::Token;

/// First two bytes of a gzip member.
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `scan_file()` and `read_file()`.
#[derive(Debug, Clone, Default)]
pub struct DecodeStats {
    /// Size of the file on disk.
    pub input_size: u64,
    /// Tokens produced.
    pub tokens: u64,
    /// Deepest nesting reached.
    pub max_depth: usize,
    /// Name of the wrapped root tag.
    pub root_name: Option<String>,
    /// The file was gzip-compressed.
    pub compressed: bool,
}

/// Statistics returned by `write_file()` and `convert()`.
#[derive(Debug, Clone, Default)]
pub struct EncodeStats {
    /// Bytes written to the destination.
    pub output_size: u64,
    /// Tokens consumed.
    pub tokens: u64,
    /// The output was gzip-compressed.
    pub compressed: bool,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// File open, read or write failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Malformed or unrepresentable NBT.
    #[error(transparent)]
    Nbt(#[from] NbtError),
    /// Gzip requested without the `gzip` feature.
    #[error("gzip support not compiled in (enable the `gzip` feature)")]
    GzipUnavailable,
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// True if `reader`'s next bytes are the gzip magic. Consumes nothing.
pub fn is_gzip<R: BufRead>(reader: &mut R) -> io::Result<bool> {
    let buf = reader.fill_buf()?;
    Ok(buf.len() >= 2 && buf[..2] == GZIP_MAGIC)
}

/// Walk a file token by token, handing each token to `visit` along with the
/// root name once it is known. Nothing is retained between tokens.
///
/// Gzip input is detected by its magic and inflated on the fly. For plain
/// files the file size bounds string headers and trailing bytes are
/// rejected.
pub fn scan_file<F>(path: &Path, flags: Flags, mut visit: F) -> Result<DecodeStats, IoError>
where
    F: FnMut(Token, Option<&str>) -> Result<(), IoError>,
{
    let file = File::open(path)?;
    let input_size = file.metadata()?.len();
    let mut reader = BufReader::with_capacity(BUF_SIZE, file);

    let compressed = is_gzip(&mut reader)?;
    debug!(
        "scan_file: {} ({input_size} bytes{})",
        path.display(),
        if compressed { ", gzip" } else { "" }
    );

    let mut stats = if compressed {
        scan_stream(Decoder::new(gunzip(reader)?, flags)?, &mut visit)?
    } else {
        scan_stream(Decoder::with_len(reader, input_size, flags)?, &mut visit)?
    };
    stats.input_size = input_size;
    stats.compressed = compressed;
    Ok(stats)
}

/// Validate a file without keeping any tokens.
pub fn check_file(path: &Path, flags: Flags) -> Result<DecodeStats, IoError> {
    scan_file(path, flags, |_, _| Ok(()))
}

/// Decode a whole file into tokens.
pub fn read_file(path: &Path, flags: Flags) -> Result<(Vec<Token>, DecodeStats), IoError> {
    let mut tokens = Vec::new();
    let stats = scan_file(path, flags, |token, _| {
        tokens.push(token);
        Ok(())
    })?;
    Ok((tokens, stats))
}

fn scan_stream<R: Read, F>(mut decoder: Decoder<R>, visit: &mut F) -> Result<DecodeStats, IoError>
where
    F: FnMut(Token, Option<&str>) -> Result<(), IoError>,
{
    let mut tokens = 0u64;
    while let Some(token) = decoder.next_token()? {
        tokens += 1;
        visit(token, decoder.root_name())?;
    }
    let stats = DecodeStats {
        tokens,
        max_depth: decoder.max_depth(),
        root_name: decoder.root_name().map(str::to_owned),
        ..Default::default()
    };
    decoder.finish()?;
    Ok(stats)
}

#[cfg(feature = "gzip")]
fn gunzip<R: BufRead>(reader: R) -> Result<impl Read, IoError> {
    Ok(flate2::bufread::GzDecoder::new(reader))
}

#[cfg(not(feature = "gzip"))]
fn gunzip<R: BufRead>(_reader: R) -> Result<std::io::Empty, IoError> {
    Err(IoError::GzipUnavailable)
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Encode `tokens` into a new file at `path`, optionally gzip-compressed.
pub fn write_file(
    path: &Path,
    tokens: &[Token],
    options: EncoderOptions,
    gzip: bool,
) -> Result<EncodeStats, IoError> {
    let file = File::create(path)?;
    let writer = BufWriter::with_capacity(BUF_SIZE, file);

    let mut encoder = Encoder::new(wrap_sink(writer, gzip)?, options)?;
    for token in tokens {
        encoder.write_token(token)?;
    }
    let token_count = encoder.tokens();
    finish_sink(encoder.finish()?)?;

    let output_size = std::fs::metadata(path)?.len();
    debug!("write_file: {} ({output_size} bytes)", path.display());
    Ok(EncodeStats {
        output_size,
        tokens: token_count,
        compressed: gzip,
    })
}

/// Sink that is either plain or gzip-framed.
pub enum Sink<W: Write> {
    Plain(W),
    #[cfg(feature = "gzip")]
    Gzip(flate2::write::GzEncoder<W>),
}

impl<W: Write> Write for Sink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            #[cfg(feature = "gzip")]
            Self::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            #[cfg(feature = "gzip")]
            Self::Gzip(w) => w.flush(),
        }
    }
}

fn wrap_sink<W: Write>(writer: W, gzip: bool) -> Result<Sink<W>, IoError> {
    if !gzip {
        return Ok(Sink::Plain(writer));
    }
    #[cfg(feature = "gzip")]
    {
        Ok(Sink::Gzip(flate2::write::GzEncoder::new(
            writer,
            flate2::Compression::default(),
        )))
    }
    #[cfg(not(feature = "gzip"))]
    {
        Err(IoError::GzipUnavailable)
    }
}

/// Write the gzip trailer if any, then flush the underlying writer.
fn finish_sink<W: Write>(sink: Sink<W>) -> Result<W, IoError> {
    let mut inner = match sink {
        Sink::Plain(w) => w,
        #[cfg(feature = "gzip")]
        Sink::Gzip(w) => w.finish()?,
    };
    inner.flush()?;
    Ok(inner)
}

// ---------------------------------------------------------------------------
// convert
// ---------------------------------------------------------------------------

/// Re-encode a document from one wire layout to another, token by token.
///
/// A wrapped root's name is carried over unless `to.root_name` is set.
/// Empty input produces empty output. The destination is flushed but not
/// closed.
pub fn convert<R: Read, W: Write>(
    reader: R,
    writer: W,
    from: Flags,
    mut to: EncoderOptions,
) -> Result<(W, EncodeStats), IoError> {
    let mut decoder = Decoder::new(reader, from)?;
    let Some(first) = decoder.next_token()? else {
        decoder.finish()?;
        return Ok((writer, EncodeStats::default()));
    };
    if to.root_name.is_empty()
        && let Some(name) = decoder.root_name()
    {
        debug!("convert: carrying root name {name:?}");
        to.root_name = name.to_owned();
    }

    let mut encoder = Encoder::new(writer, to)?;
    encoder.write_token(&first)?;
    while let Some(token) = decoder.next_token()? {
        encoder.write_token(&token)?;
    }
    decoder.finish()?;

    let stats = EncodeStats {
        output_size: encoder.written(),
        tokens: encoder.tokens(),
        compressed: false,
    };
    let writer = encoder.finish()?;
    Ok((writer, stats))
}

/// Convert one file into another, reading gzip transparently and writing
/// gzip when asked.
///
/// The output is only created once the input is open. If the conversion
/// fails after that, the partial output is removed.
pub fn convert_file(
    input: &Path,
    output: &Path,
    from: Flags,
    to: EncoderOptions,
    gzip: bool,
) -> Result<EncodeStats, IoError> {
    let mut reader = BufReader::with_capacity(BUF_SIZE, File::open(input)?);
    let compressed = is_gzip(&mut reader)?;
    let file = File::create(output)?;

    let mut stats = match convert_into(reader, compressed, file, from, to, gzip) {
        Ok(stats) => stats,
        Err(e) => {
            debug!("convert_file: removing partial {}", output.display());
            if let Err(rm) = std::fs::remove_file(output) {
                debug!("convert_file: could not remove {}: {rm}", output.display());
            }
            return Err(e);
        }
    };

    stats.output_size = std::fs::metadata(output)?.len();
    stats.compressed = gzip;
    debug!(
        "convert_file: {} -> {} ({} bytes)",
        input.display(),
        output.display(),
        stats.output_size
    );
    Ok(stats)
}

fn convert_into<R: BufRead>(
    reader: R,
    compressed: bool,
    file: File,
    from: Flags,
    to: EncoderOptions,
    gzip: bool,
) -> Result<EncodeStats, IoError> {
    let sink = wrap_sink(BufWriter::with_capacity(BUF_SIZE, file), gzip)?;
    let (sink, stats) = if compressed {
        convert(gunzip(reader)?, sink, from, to)?
    } else {
        convert(reader, sink, from, to)?
    };
    finish_sink(sink)?;
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::TagType;
    use crate::token::IntValue;

    fn sample() -> Vec<Token> {
        vec![
            Token::StartObject,
            Token::FieldName("name".into()),
            Token::String("Bananrama".into()),
            Token::FieldName("pos".into()),
            Token::list(TagType::Double, 2),
            Token::Double(1.5),
            Token::Double(-2.0),
            Token::EndArray,
            Token::FieldName("ids".into()),
            Token::packed(TagType::IntArray, 1).unwrap(),
            Token::Int(IntValue::Int(42)),
            Token::EndArray,
            Token::EndObject,
        ]
    }

    #[test]
    fn write_read_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.nbt");

        let enc_stats = write_file(&path, &sample(), EncoderOptions::default(), false).unwrap();
        assert_eq!(enc_stats.tokens, sample().len() as u64);
        assert!(!enc_stats.compressed);

        let (tokens, stats) = read_file(&path, Flags::empty()).unwrap();
        assert_eq!(tokens, sample());
        assert_eq!(stats.input_size, enc_stats.output_size);
        assert_eq!(stats.max_depth, 2);
        assert_eq!(stats.root_name.as_deref(), Some(""));
        assert!(!stats.compressed);
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn gzip_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("packed.nbt");
        let options = EncoderOptions::with_flags(Flags::LITTLE_ENDIAN);

        let enc_stats = write_file(&path, &sample(), options, true).unwrap();
        assert!(enc_stats.compressed);
        let raw = std::fs::read(&path).unwrap();
        assert_eq!(raw[..2], GZIP_MAGIC);

        let (tokens, stats) = read_file(&path, Flags::LITTLE_ENDIAN).unwrap();
        assert_eq!(tokens, sample());
        assert!(stats.compressed);
    }

    #[test]
    fn convert_between_variants() {
        let options = EncoderOptions {
            root_name: "level".into(),
            ..Default::default()
        };
        let canonical = crate::encoder::encode_tokens(&sample(), options).unwrap();
        let to = EncoderOptions::with_flags(Flags::LITTLE_ENDIAN | Flags::VAR_INT);
        let (varint, stats) = convert(&canonical[..], Vec::new(), Flags::empty(), to).unwrap();
        assert_eq!(stats.output_size, varint.len() as u64);
        let tokens =
            crate::decoder::decode_all(&varint, Flags::LITTLE_ENDIAN | Flags::VAR_INT).unwrap();
        assert_eq!(tokens, sample());
        let mut dec =
            Decoder::from_slice(&varint, Flags::LITTLE_ENDIAN | Flags::VAR_INT).unwrap();
        dec.next_token().unwrap();
        assert_eq!(dec.root_name(), Some("level"));
    }

    #[test]
    fn convert_empty_input() {
        let (out, stats) =
            convert(&[][..], Vec::new(), Flags::empty(), EncoderOptions::default()).unwrap();
        assert!(out.is_empty());
        assert_eq!(stats.tokens, 0);
    }

    #[test]
    fn convert_file_keeps_root_name() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.nbt");
        let output = dir.path().join("out.nbt");
        let options = EncoderOptions {
            root_name: "Data".into(),
            ..Default::default()
        };
        write_file(&input, &sample(), options, false).unwrap();

        let stats = convert_file(
            &input,
            &output,
            Flags::empty(),
            EncoderOptions::with_flags(Flags::LITTLE_ENDIAN),
            false,
        )
        .unwrap();
        assert_eq!(stats.tokens, sample().len() as u64);

        let bytes = std::fs::read(&output).unwrap();
        let mut dec = Decoder::from_slice(&bytes, Flags::LITTLE_ENDIAN).unwrap();
        dec.next_token().unwrap();
        assert_eq!(dec.root_name(), Some("Data"));
    }

    #[test]
    fn check_file_streams_large_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bytes.nbt");
        let mut enc =
            Encoder::new(std::fs::File::create(&path).unwrap(), EncoderOptions::default())
                .unwrap();
        enc.write_binary(&vec![7u8; 1 << 20]).unwrap();
        enc.finish().unwrap();

        let stats = check_file(&path, Flags::empty()).unwrap();
        assert_eq!(stats.tokens, (1 << 20) + 2);
        assert_eq!(stats.max_depth, 1);
        assert_eq!(stats.root_name.as_deref(), Some(""));
        assert_eq!(stats.input_size, 7 + (1 << 20));
    }

    #[test]
    fn scan_file_sees_the_root_name_with_the_first_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("named.nbt");
        let options = EncoderOptions {
            root_name: "Level".into(),
            ..Default::default()
        };
        write_file(&path, &sample(), options, false).unwrap();

        let mut names = Vec::new();
        scan_file(&path, Flags::empty(), |_, root| {
            names.push(root.map(str::to_owned));
            Ok(())
        })
        .unwrap();
        assert_eq!(names.len(), sample().len());
        assert!(names.iter().all(|n| n.as_deref() == Some("Level")));
    }

    #[test]
    fn convert_file_missing_input_leaves_output_alone() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.nbt");
        std::fs::write(&output, b"keep me").unwrap();

        let err = convert_file(
            &dir.path().join("missing.nbt"),
            &output,
            Flags::empty(),
            EncoderOptions::default(),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, IoError::Io(_)), "{err}");
        assert_eq!(std::fs::read(&output).unwrap(), b"keep me");
    }

    #[test]
    fn convert_file_removes_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bad.nbt");
        let output = dir.path().join("out.nbt");
        std::fs::write(&input, [0x0A, 0x00, 0x00, 0x2A]).unwrap();
        std::fs::write(&output, b"old").unwrap();

        let err = convert_file(
            &input,
            &output,
            Flags::empty(),
            EncoderOptions::default(),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, IoError::Nbt(_)), "{err}");
        assert!(!output.exists());
    }

    #[test]
    fn corrupt_file_reports_nbt_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.nbt");
        std::fs::write(&path, [0x0A, 0x00, 0x00, 0x2A]).unwrap();
        let err = read_file(&path, Flags::empty()).unwrap_err();
        assert!(matches!(err, IoError::Nbt(NbtError::Format { .. })), "{err}");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_file(&dir.path().join("nope.nbt"), Flags::empty()).unwrap_err();
        assert!(matches!(err, IoError::Io(_)));
    }
}
