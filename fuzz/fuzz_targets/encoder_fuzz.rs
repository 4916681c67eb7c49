#![no_main]
use libfuzzer_sys::fuzz_target;
use nbtstream::{Encoder, EncoderOptions, Flags, TagType};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let flags = match data[0] % 3 {
        0 => Flags::empty(),
        1 => Flags::LITTLE_ENDIAN | Flags::NO_WRAP,
        _ => Flags::LITTLE_ENDIAN | Flags::VAR_INT,
    };
    let options = EncoderOptions {
        flags,
        strict_duplicates: data[0] & 0x80 != 0,
        ..Default::default()
    };
    let Ok(mut enc) = Encoder::new(Vec::new(), options) else {
        return;
    };

    // Each byte picks one call; the encoder must reject bad sequences
    // with errors, never panic.
    for &op in &data[1..] {
        let arg = op >> 4;
        let tag = TagType::from_u8(arg % 13).unwrap_or(TagType::Byte);
        let _ = match op & 0x0F {
            0 => enc.start_object(),
            1 => enc.end_object(),
            2 => enc.start_array(tag, arg as usize % 3),
            3 => enc.start_packed_array(tag, arg as usize % 3),
            4 => enc.end_array(),
            5 => enc.write_field_name(["a", "b", "c"][arg as usize % 3]),
            6 => enc.write_byte(arg as i8),
            7 => enc.write_int(arg as i32),
            8 => enc.write_long(-(arg as i64)),
            9 => enc.write_string("s"),
            10 => enc.write_binary(&[arg]),
            11 => enc.write_null(),
            12 => enc.write_u64(u64::MAX >> arg),
            13 => enc.write_double(f64::from(arg)),
            14 => enc.write_int_array(&[1, 2]),
            _ => enc.write_bool(arg & 1 != 0),
        };
    }
    let _ = enc.finish();
});
