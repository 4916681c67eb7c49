use std::io::Read;

use nbtstream::{Decoder, Flags, NbtError, TagType, Token, decode_all};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ALL_FLAGS: [Flags; 6] = [
    Flags::empty(),
    Flags::LITTLE_ENDIAN,
    Flags::LITTLE_ENDIAN.union(Flags::VAR_INT),
    Flags::NO_WRAP,
    Flags::LITTLE_ENDIAN.union(Flags::NO_WRAP),
    Flags::LITTLE_ENDIAN
        .union(Flags::VAR_INT)
        .union(Flags::NO_WRAP),
];

/// A reader that counts how many bytes were pulled from it.
struct Counting<'a> {
    data: &'a [u8],
    pulled: usize,
}

impl Read for Counting<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.data.read(buf)?;
        self.pulled += n;
        Ok(n)
    }
}

#[test]
fn huge_list_count_is_eof_not_allocation() {
    // Root List<Int> declaring 0xFFFFFFFF elements, followed by two.
    let data = [
        0x09, 0x00, 0x00, 0x03, 0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 1, 0, 0, 0, 2,
    ];
    let mut dec = Decoder::from_slice(&data, Flags::empty()).unwrap();
    assert_eq!(
        dec.next_token().unwrap(),
        Some(Token::list(TagType::Int, u32::MAX))
    );
    assert!(dec.next_token().unwrap().is_some());
    assert!(dec.next_token().unwrap().is_some());
    let err = dec.next_token().unwrap_err();
    assert!(err.is_eof(), "{err}");
}

#[test]
fn huge_list_count_through_unsized_reader() {
    let data = [0x09, 0x00, 0x00, 0x0A, 0x7F, 0xFF, 0xFF, 0xFF, 0x00];
    let mut reader = Counting {
        data: &data,
        pulled: 0,
    };
    let dec = Decoder::new(&mut reader, Flags::empty()).unwrap();
    let results: Vec<_> = dec.collect();
    assert!(results.last().unwrap().as_ref().unwrap_err().is_eof());
    assert_eq!(reader.pulled, data.len());
}

#[test]
fn huge_string_header_is_rejected_before_reading() {
    // Root String with a varint length of i32::MAX and no payload.
    let data = [0x08, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0x07, b'x'];
    let flags = Flags::LITTLE_ENDIAN | Flags::VAR_INT;
    let err = decode_all(&data, flags).unwrap_err();
    assert!(matches!(err, NbtError::Format { .. }), "{err}");

    // Unsized: the payload is pulled incrementally and simply runs out.
    let err = Decoder::new(&data[..], flags)
        .unwrap()
        .find_map(Result::err)
        .unwrap();
    assert!(err.is_eof(), "{err}");
}

#[test]
fn every_truncation_of_a_valid_document_fails_cleanly() {
    // { "name": "x", "l": List<Long>[1, 2], "c": { "b": ByteArray[3] } }
    let doc: Vec<u8> = [
        &[0x0A, 0x00, 0x00][..],
        &[0x08, 0x00, 0x04, b'n', b'a', b'm', b'e', 0x00, 0x01, b'x'],
        &[0x09, 0x00, 0x01, b'l', 0x04, 0, 0, 0, 2],
        &[0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 2],
        &[0x0A, 0x00, 0x01, b'c', 0x07, 0x00, 0x01, b'b', 0, 0, 0, 3, 1, 2, 3, 0x00],
        &[0x00],
    ]
    .concat();
    assert!(decode_all(&doc, Flags::empty()).is_ok());

    for cut in 1..doc.len() {
        let err = decode_all(&doc[..cut], Flags::empty()).unwrap_err();
        assert!(
            matches!(err, NbtError::UnexpectedEof { .. } | NbtError::Format { .. }),
            "cut at {cut}: {err}"
        );
    }
}

#[test]
fn deep_nesting_does_not_overflow_the_stack() {
    // 100k nested single-element lists of lists, then truncated.
    let mut data = vec![0x09, 0x00, 0x00];
    for _ in 0..100_000 {
        data.extend_from_slice(&[0x09, 0x00, 0x00, 0x00, 0x01]);
    }
    let mut depth = 0;
    let mut dec = Decoder::from_slice(&data, Flags::empty()).unwrap();
    let err = loop {
        match dec.next_token() {
            Ok(Some(_)) => depth = depth.max(dec.depth()),
            Ok(None) => panic!("truncated document decoded"),
            Err(e) => break e,
        }
    };
    assert!(err.is_eof());
    assert!(depth >= 100_000);
}

#[test]
fn random_bytes_never_panic() {
    let mut rng = StdRng::seed_from_u64(0x5EED_0A0A);
    for _ in 0..2_000 {
        let len = rng.random_range(0..96);
        let mut data: Vec<u8> = (0..len).map(|_| rng.random()).collect();
        // Bias towards a plausible header so the walk gets past the root.
        if !data.is_empty() && rng.random_bool(0.5) {
            data[0] = 0x0A;
        }
        for flags in ALL_FLAGS {
            let _ = decode_all(&data, flags);
        }
    }
}

#[test]
fn random_corruption_of_a_valid_document() {
    let doc = [
        0x0A, 0x00, 0x00, 0x09, 0x00, 0x01, b'l', 0x0A, 0x00, 0x00, 0x00, 0x02, 0x03, 0x00, 0x01,
        b'i', 0x00, 0x00, 0x00, 0x05, 0x00, 0x0B, 0x00, 0x01, b'a', 0x00, 0x00, 0x00, 0x01, 0x00,
        0x00, 0x00, 0x07, 0x00, 0x00,
    ];
    assert_eq!(decode_all(&doc, Flags::empty()).unwrap().len(), 15);

    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..5_000 {
        let mut data = doc.to_vec();
        let i = rng.random_range(0..data.len());
        data[i] = rng.random();
        match decode_all(&data, Flags::empty()) {
            Ok(tokens) => {
                // Whatever decodes must be balanced.
                let balance: isize = tokens.iter().map(Token::depth_delta).sum();
                assert_eq!(balance, 0, "{data:02X?}");
            }
            Err(e) => assert!(e.context().offset.is_some(), "{e}"),
        }
    }
}

#[test]
fn iterator_stops_after_first_error() {
    let data = [0x0A, 0x00, 0x00, 0x2A, 0x00];
    let items: Vec<_> = Decoder::from_slice(&data, Flags::empty()).unwrap().collect();
    assert_eq!(items.len(), 2);
    assert!(matches!(items[1], Err(NbtError::Format { .. })));
}
