// Byte-level adapters: endianness and varint encodings over Read/Write.

pub mod reader;
pub mod varint;
pub mod writer;

pub use reader::WireReader;
pub use writer::WireWriter;
