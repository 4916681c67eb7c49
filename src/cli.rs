// Command-line front end for nbtstream.
//
// Subcommands inspect, validate and re-encode NBT files under any of the
// three wire variants.

use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use serde_json::{Map, Value};

use crate::config::{EncoderOptions, Flags, Variant};
use crate::io::{self as nbt_io, DecodeStats};
use crate::token::{IntValue, Token};

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Streaming NBT inspector and converter.
#[derive(Parser, Debug)]
#[command(
    name = "nbtstream",
    version,
    about = "Inspect, validate and convert NBT files",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Print the token stream of a file.
    Dump(DumpArgs),
    /// Re-encode a file under another wire variant.
    Convert(ConvertArgs),
    /// Validate a file and report statistics.
    Check(CheckArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum VariantArg {
    /// Big-endian, fixed-width integers.
    Be,
    /// Little-endian, fixed-width integers.
    Le,
    /// Little-endian with zig-zag varint integers.
    LeVarint,
}

impl VariantArg {
    fn flags(self, no_wrap: bool) -> Flags {
        let variant = match self {
            Self::Be => Variant::BigEndian,
            Self::Le => Variant::LittleEndian,
            Self::LeVarint => Variant::LittleEndianVarInt,
        };
        let mut flags = variant.flags();
        flags.set(Flags::NO_WRAP, no_wrap);
        flags
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DumpFormat {
    /// One token per line, indented by depth.
    Tokens,
    /// A JSON rendering of the tree.
    Json,
}

#[derive(Args, Debug)]
struct ReadArgs {
    /// Wire variant of the input.
    #[arg(long, value_enum, default_value_t = VariantArg::Be)]
    variant: VariantArg,

    /// Input is a bare Compound payload without a root header.
    #[arg(long = "no-wrap")]
    no_wrap: bool,

    /// Input file (gzip is detected automatically).
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

#[derive(Args, Debug)]
struct DumpArgs {
    #[command(flatten)]
    read: ReadArgs,

    /// Output format.
    #[arg(long, value_enum, default_value_t = DumpFormat::Tokens)]
    format: DumpFormat,
}

#[derive(Args, Debug)]
struct CheckArgs {
    #[command(flatten)]
    read: ReadArgs,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Wire variant of the input.
    #[arg(long, value_enum, default_value_t = VariantArg::Be)]
    from: VariantArg,

    /// Wire variant of the output.
    #[arg(long, value_enum)]
    to: VariantArg,

    /// Input is a bare Compound payload without a root header.
    #[arg(long = "from-no-wrap")]
    from_no_wrap: bool,

    /// Write a bare Compound payload without a root header.
    #[arg(long = "to-no-wrap")]
    to_no_wrap: bool,

    /// Gzip the output.
    #[arg(long)]
    gzip: bool,

    /// Reject duplicate field names while writing.
    #[arg(long = "strict")]
    strict_duplicates: bool,

    /// Input file (gzip is detected automatically).
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Output file.
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,
}

// ---------------------------------------------------------------------------
// Global options
// ---------------------------------------------------------------------------

struct Globals {
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
}

fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

/// Parse arguments without running anything.
#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("nbtstream".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = log_filter(cli.verbose);
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run() -> ! {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(cli.verbose)),
    )
    .format_timestamp(None)
    .format_target(false)
    .init();

    let globals = Globals {
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        json_output: cli.json_output,
    };

    let exit_code = match cli.command {
        Cmd::Dump(args) => cmd_dump(&globals, &args),
        Cmd::Convert(args) => cmd_convert(&globals, &args),
        Cmd::Check(args) => cmd_check(&globals, &args),
        Cmd::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("nbtstream version {version} (Rust)");

    let gzip = cfg!(feature = "gzip") as u8;
    let ptr_size = std::mem::size_of::<*const ()>();

    eprintln!("GZIP={gzip}");
    eprintln!("MAX_FIXED_STRING_LEN={}", crate::config::MAX_FIXED_STRING_LEN);
    eprintln!("MAX_VAR_STRING_LEN={}", crate::config::MAX_VAR_STRING_LEN);
    eprintln!("MAX_SEQUENCE_LEN={}", crate::config::MAX_SEQUENCE_LEN);
    eprintln!("sizeof(usize)={ptr_size}");

    0
}

// ---------------------------------------------------------------------------
// Dump command
// ---------------------------------------------------------------------------

fn report_read_error(args: &ReadArgs, e: &nbt_io::IoError) -> i32 {
    eprintln!("nbtstream: {}: {e}", args.input.display());
    1
}

fn cmd_dump(globals: &Globals, args: &DumpArgs) -> i32 {
    let flags = args.read.variant.flags(args.read.no_wrap);
    let result = match args.format {
        DumpFormat::Tokens => dump_tokens(&args.read.input, flags),
        DumpFormat::Json => dump_json(&args.read.input, flags),
    };
    match result {
        Ok(stats) => report_read_stats(globals, "dump", &args.read.input, &stats),
        Err(e) => report_read_error(&args.read, &e),
    }
}

/// Print tokens as they are decoded, never holding more than one.
fn dump_tokens(input: &Path, flags: Flags) -> Result<DecodeStats, nbt_io::IoError> {
    let mut out = BufWriter::new(io::stdout().lock());
    let mut renderer = TokenRenderer::default();
    let stats = nbt_io::scan_file(input, flags, |token, root_name| {
        if renderer.lines == 0
            && let Some(name) = root_name
        {
            writeln!(out, "# root {name:?}")?;
        }
        renderer.write(&mut out, &token)?;
        Ok(())
    })?;
    out.flush()?;
    Ok(stats)
}

fn dump_json(input: &Path, flags: Flags) -> Result<DecodeStats, nbt_io::IoError> {
    let (tokens, stats) = nbt_io::read_file(input, flags)?;
    let text = serde_json::to_string_pretty(&tokens_to_json(&tokens)).map_err(io::Error::from)?;
    println!("{text}");
    Ok(stats)
}

/// One token per line, indented two spaces per nesting level.
#[derive(Default)]
struct TokenRenderer {
    depth: usize,
    lines: u64,
}

impl TokenRenderer {
    fn write<W: Write>(&mut self, out: &mut W, token: &Token) -> io::Result<()> {
        if token.depth_delta() < 0 {
            self.depth = self.depth.saturating_sub(1);
        }
        writeln!(out, "{:indent$}{token}", "", indent = self.depth * 2)?;
        if token.depth_delta() > 0 {
            self.depth += 1;
        }
        self.lines += 1;
        Ok(())
    }
}

enum JsonFrame {
    Object(Map<String, Value>, Option<String>),
    Array(Vec<Value>),
}

/// Build a JSON tree from a token sequence. Integers become numbers,
/// non-finite floats become null.
fn tokens_to_json(tokens: &[Token]) -> Value {
    let mut stack: Vec<JsonFrame> = Vec::new();
    let mut root = Value::Null;

    fn place(stack: &mut [JsonFrame], root: &mut Value, value: Value) {
        match stack.last_mut() {
            Some(JsonFrame::Object(map, key)) => {
                if let Some(key) = key.take() {
                    map.insert(key, value);
                }
            }
            Some(JsonFrame::Array(items)) => items.push(value),
            None => *root = value,
        }
    }

    for token in tokens {
        let value = match token {
            Token::StartObject => {
                stack.push(JsonFrame::Object(Map::new(), None));
                continue;
            }
            Token::StartArray { len, .. } => {
                stack.push(JsonFrame::Array(Vec::with_capacity((*len as usize).min(1024))));
                continue;
            }
            Token::FieldName(name) => {
                if let Some(JsonFrame::Object(_, key)) = stack.last_mut() {
                    *key = Some(name.clone());
                }
                continue;
            }
            Token::EndObject | Token::EndArray => match stack.pop() {
                Some(JsonFrame::Object(map, _)) => Value::Object(map),
                Some(JsonFrame::Array(items)) => Value::Array(items),
                None => continue,
            },
            Token::Int(v) => match v {
                IntValue::Byte(v) => Value::from(*v),
                IntValue::Short(v) => Value::from(*v),
                IntValue::Int(v) => Value::from(*v),
                IntValue::Long(v) => Value::from(*v),
            },
            Token::Float(v) => serde_json::Number::from_f64(f64::from(*v))
                .map_or(Value::Null, Value::Number),
            Token::Double(v) => serde_json::Number::from_f64(*v).map_or(Value::Null, Value::Number),
            Token::String(s) => Value::String(s.clone()),
            Token::Binary(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b as i8)).collect()),
            Token::Bool(b) => Value::Bool(*b),
            Token::Null => Value::Null,
        };
        place(&mut stack, &mut root, value);
    }
    root
}

// ---------------------------------------------------------------------------
// Check command
// ---------------------------------------------------------------------------

fn cmd_check(globals: &Globals, args: &CheckArgs) -> i32 {
    let flags = args.read.variant.flags(args.read.no_wrap);
    let stats = match nbt_io::check_file(&args.read.input, flags) {
        Ok(stats) => stats,
        Err(e) => return report_read_error(&args.read, &e),
    };
    if !globals.quiet && !globals.json_output {
        eprintln!(
            "nbtstream: {}: ok, {} tokens, max depth {}",
            args.read.input.display(),
            stats.tokens,
            stats.max_depth
        );
    }
    report_read_stats(globals, "check", &args.read.input, &stats)
}

fn report_read_stats(globals: &Globals, command: &str, input: &Path, stats: &DecodeStats) -> i32 {
    if globals.verbose > 0 && !globals.quiet {
        eprintln!(
            "nbtstream: input size: {}, tokens: {}, max depth: {}, gzip: {}",
            stats.input_size, stats.tokens, stats.max_depth, stats.compressed
        );
    }
    if globals.json_output {
        let json = serde_json::json!({
            "command": command,
            "input": input.display().to_string(),
            "input_size": stats.input_size,
            "tokens": stats.tokens,
            "max_depth": stats.max_depth,
            "root_name": stats.root_name,
            "compressed": stats.compressed,
        });
        eprintln!("{json:#}");
    }
    0
}

// ---------------------------------------------------------------------------
// Convert command
// ---------------------------------------------------------------------------

fn cmd_convert(globals: &Globals, args: &ConvertArgs) -> i32 {
    if args.output.exists() && !globals.force {
        eprintln!(
            "nbtstream: output file exists, use -f to overwrite: {}",
            args.output.display()
        );
        return 1;
    }

    let from = args.from.flags(args.from_no_wrap);
    let to = EncoderOptions {
        flags: args.to.flags(args.to_no_wrap),
        strict_duplicates: args.strict_duplicates,
        ..Default::default()
    };

    let stats = match nbt_io::convert_file(&args.input, &args.output, from, to, args.gzip) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("nbtstream: convert {}: {e}", args.input.display());
            return 1;
        }
    };

    if globals.verbose > 0 && !globals.quiet {
        eprintln!(
            "nbtstream: converter: tokens: {}, output size: {}",
            stats.tokens, stats.output_size
        );
    }

    if globals.json_output {
        let json = serde_json::json!({
            "command": "convert",
            "from": format!("{:?}", args.from),
            "to": format!("{:?}", args.to),
            "tokens": stats.tokens,
            "output_size": stats.output_size,
            "compressed": stats.compressed,
        });
        eprintln!("{json:#}");
    }

    0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
