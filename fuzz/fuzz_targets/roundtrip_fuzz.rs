#![no_main]
use libfuzzer_sys::fuzz_target;
use nbtstream::{Decoder, EncoderOptions, Flags, Token, encode_tokens};

fn decode(data: &[u8], flags: Flags) -> Option<(Vec<Token>, String)> {
    let mut decoder = Decoder::from_slice(data, flags).ok()?;
    let mut tokens = Vec::new();
    while let Some(token) = decoder.next_token().ok()? {
        tokens.push(token);
    }
    let root_name = decoder.root_name().unwrap_or_default().to_string();
    decoder.finish().ok()?;
    Some((tokens, root_name))
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // First byte selects the variant.
    let flags = match data[0] % 6 {
        0 => Flags::empty(),
        1 => Flags::LITTLE_ENDIAN,
        2 => Flags::LITTLE_ENDIAN | Flags::VAR_INT,
        3 => Flags::NO_WRAP,
        4 => Flags::LITTLE_ENDIAN | Flags::NO_WRAP,
        _ => Flags::LITTLE_ENDIAN | Flags::VAR_INT | Flags::NO_WRAP,
    };
    let Some((tokens, root_name)) = decode(&data[1..], flags) else {
        return;
    };
    if tokens.is_empty() {
        return;
    }

    let options = EncoderOptions {
        flags,
        root_name,
        ..Default::default()
    };
    // Anything the decoder accepts, the encoder must reproduce.
    let once = encode_tokens(&tokens, options.clone()).unwrap();
    let (again, name) = decode(&once, flags).unwrap();
    let twice = encode_tokens(
        &again,
        EncoderOptions {
            root_name: name,
            ..options
        },
    )
    .unwrap();
    assert_eq!(once, twice);

    // Fixed-width wrapped layouts have a single encoding per document. An
    // unwrapped root may end on EOF or on an End byte.
    if !flags.intersects(Flags::VAR_INT | Flags::NO_WRAP) {
        assert_eq!(once, &data[1..]);
    }
});
