// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Hostile and truncated input never panics and maps to a typed error.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use echo_dry_tests::{sample_person, EngineTestBuilder, FrameBuilder, Person};
use echo_xcodec::types::frame;
use echo_xcodec::CodecError;
use proptest::prelude::*;

fn engine() -> echo_xcodec::Engine {
    EngineTestBuilder::new()
        .compatible(true)
        .track_ref(true)
        .with_models()
        .build()
        .unwrap()
}

#[test]
fn frame_level_errors() {
    let mut engine = engine();
    assert!(matches!(
        engine.deserialize::<i32>(&[]),
        Err(CodecError::MalformedFrame(_))
    ));
    assert!(matches!(
        engine.deserialize::<i32>(&FrameBuilder::with_header(0x40).i32(1).build()),
        Err(CodecError::MalformedFrame(_))
    ));
    assert!(matches!(
        engine.deserialize::<i32>(&FrameBuilder::with_header(0).i32(1).build()),
        Err(CodecError::FrameModeMismatch { .. })
    ));
    assert!(matches!(
        engine.deserialize::<i32>(&[frame::XLANG | frame::IS_NULL]),
        Err(CodecError::UnexpectedNull(_))
    ));
    assert_eq!(
        engine.deserialize::<Option<Person>>(&[frame::XLANG | frame::IS_NULL]),
        Ok(None)
    );
    assert!(matches!(
        engine.deserialize::<i32>(&FrameBuilder::xlang().i32(1).u8(0).build()),
        Err(CodecError::TrailingBytes { remaining: 1 })
    ));
}

#[test]
fn every_truncation_of_a_valid_frame_is_rejected() {
    let mut engine = engine();
    let bytes = engine.serialize(&vec![sample_person(); 2]).unwrap();
    for end in 0..bytes.len() {
        assert!(
            engine.deserialize::<Vec<Person>>(&bytes[..end]).is_err(),
            "prefix of {end} bytes decoded"
        );
    }
    assert!(engine.deserialize::<Vec<Person>>(&bytes).is_ok());
}

#[test]
fn unregistered_reader_reports_the_type() {
    let bytes = engine().serialize(&sample_person()).unwrap();
    let mut bare = EngineTestBuilder::new().compatible(true).track_ref(true).build().unwrap();
    assert!(matches!(
        bare.deserialize::<Person>(&bytes),
        Err(CodecError::UnregisteredType(_) | CodecError::UnknownTypeId(_))
    ));
}

#[test]
fn oversized_string_length_is_bounded() {
    let mut engine = engine();
    let bytes = FrameBuilder::xlang()
        .raw(&[0xff, 0xff, 0xff, 0xff, 0x0f])
        .build();
    assert!(engine.deserialize::<String>(&bytes).is_err());
}

proptest! {
    #[test]
    fn arbitrary_bytes_never_panic(body in proptest::collection::vec(any::<u8>(), 0..256)) {
        let mut engine = engine();
        let bytes = FrameBuilder::xlang().raw(&body).build();
        let _ = engine.deserialize::<Person>(&bytes);
        let _ = engine.deserialize::<Vec<Option<String>>>(&bytes);
        let _ = engine.deserialize::<echo_xcodec::DynValue>(&bytes);
    }

    #[test]
    fn flipped_bytes_never_panic(index in any::<prop::sample::Index>(), mask in 1u8..=255) {
        let mut engine = engine();
        let mut bytes = engine.serialize(&sample_person()).unwrap();
        let at = index.index(bytes.len());
        bytes[at] ^= mask;
        let _ = engine.deserialize::<Person>(&bytes);
    }
}
