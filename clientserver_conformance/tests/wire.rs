// Copyright 2026 the ClientServer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binary and textual forms, checked against fixtures.

use clientserver_conformance::{widget_interpreter, widget_value};
use clientserver_stream::{Argument, ByteOrder, Command, DecodeError, Id, Stream, Variant};

const FIXTURES: [(&str, &str); 2] = [
    ("widget_session", include_str!("fixtures/widget_session.txt")),
    ("all_types", include_str!("fixtures/all_types.txt")),
];

#[test]
fn fixtures_reproduce_their_own_text() {
    for (name, text) in FIXTURES {
        let s: Stream = text.parse().unwrap_or_else(|e| panic!("{name}: {e}"));
        assert_eq!(s.to_text(), text, "{name}");
    }
}

#[test]
fn fixtures_survive_both_byte_orders() {
    for (name, text) in FIXTURES {
        let s: Stream = text.parse().unwrap();
        let little = s.data_with_order(ByteOrder::Little);
        let big = s.data_with_order(ByteOrder::Big);
        assert_ne!(little, big, "{name}");
        assert_eq!(Stream::from_data(&little).unwrap(), s, "{name}");
        assert_eq!(Stream::from_data(&big).unwrap(), s, "{name}");
    }
}

#[test]
fn big_endian_producer_little_endian_consumer() {
    let mut s = Stream::new();
    s.begin(Command::Reply)
        .arg(0x0102_i16)
        .arg(0x0102_0304_u32)
        .arg(-1.5_f64)
        .arg(vec![0x0a0b_0c0d_i32, -2])
        .end();

    let big = s.data_with_order(ByteOrder::Big);
    assert_eq!(big[0], ByteOrder::Big.tag());
    // Command, then the first argument's tag, then its payload, all most significant byte first.
    assert_eq!(&big[1..5], &[0, 0, 0, 4]);
    assert_eq!(&big[5..9], &[0, 0, 0, 2]);
    assert_eq!(&big[9..11], &[0x01, 0x02]);

    let back = Stream::from_data(&big).unwrap();
    assert_eq!(back.get::<i16>(0, 0), Some(0x0102));
    assert_eq!(back.get::<u32>(0, 1), Some(0x0102_0304));
    assert_eq!(back.get::<f64>(0, 2), Some(-1.5));
    assert_eq!(back.get::<Vec<i32>>(0, 3), Some(vec![0x0a0b_0c0d, -2]));
}

#[test]
fn truncated_input_is_rejected() {
    let mut s = Stream::new();
    s.begin(Command::Invoke).arg(Id(1)).arg("SetValue").arg(42_i32).end();
    let bytes = s.data();

    let mut out = s.clone();
    // The byte-order tag alone is a valid empty stream.
    assert_eq!(out.set_data(&bytes[..1]), Ok(()));
    assert!(out.is_empty());
    for len in (0..bytes.len()).filter(|len| *len != 1) {
        out = s.clone();
        assert!(out.set_data(&bytes[..len]).is_err(), "prefix of {len} bytes decoded");
        assert!(out.is_empty(), "failed decode left messages behind");
    }
    assert_eq!(out.set_data(&bytes), Ok(()));
    assert_eq!(out, s);

    let mut bad_order = bytes.clone();
    bad_order[0] = 7;
    assert_eq!(
        Stream::from_data(&bad_order),
        Err(DecodeError::BadByteOrder(7))
    );
}

#[test]
fn session_fixture_runs() {
    let (_, text) = FIXTURES[0];
    let s: Stream = text.parse().unwrap();
    let mut interp = widget_interpreter().unwrap();
    interp.process_stream(&s).unwrap();
    assert_eq!(widget_value(&interp, Id(1)), Some(42));

    // Echo saw: id 5 expanded, the nested GetValue result, then the Assign reply as last result.
    let assigned = [
        Argument::Int64(-3),
        Argument::String("three {values}".into()),
        Argument::Float32Array(vec![1.5, 2.5]),
    ];
    let mut expected = assigned.to_vec();
    expected.push(Argument::Int64(42));
    expected.extend(assigned);
    assert_eq!(interp.last_result().arguments(0).unwrap(), expected.as_slice());
}

#[test]
fn variants_are_self_describing() {
    let values = [
        Variant::Invalid,
        Variant::Int16(-4),
        Variant::String("v".into()),
        Variant::Float64(0.25),
        Variant::Id(Id(9)),
    ];
    let mut s = Stream::new();
    s.begin(Command::Reply);
    for v in &values {
        s.push_variant(v);
    }
    s.end();

    let back = Stream::from_data(&s.data_with_order(ByteOrder::Big)).unwrap();
    let mut index = 0;
    for v in &values {
        assert_eq!(back.variant(0, &mut index).as_ref(), Some(v));
    }
    assert_eq!(index, back.argument_count(0).unwrap());
}
