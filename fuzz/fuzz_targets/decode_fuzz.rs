#![no_main]
use libfuzzer_sys::fuzz_target;
use nbtstream::{Decoder, Flags};

const VARIANTS: [Flags; 3] = [
    Flags::empty(),
    Flags::LITTLE_ENDIAN,
    Flags::LITTLE_ENDIAN.union(Flags::VAR_INT),
];

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must only ever produce errors, never panics or
    // count-sized allocations.
    for flags in VARIANTS {
        for flags in [flags, flags | Flags::NO_WRAP] {
            let _ = nbtstream::decode_all(data, flags);

            // The unsized path reads payloads incrementally.
            if let Ok(decoder) = Decoder::new(data, flags) {
                for token in decoder.take(1 << 16) {
                    if token.is_err() {
                        break;
                    }
                }
            }
        }
    }
});
