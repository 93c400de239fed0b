// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared and cyclic references across whole frames.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::cell::RefCell;
use std::rc::Rc;

use echo_dry_tests::{ring, sample_person, unlink, EngineTestBuilder, Node, Person};
use echo_xcodec::CodecError;

fn tracking() -> echo_xcodec::Engine {
    EngineTestBuilder::new()
        .track_ref(true)
        .with_models()
        .build()
        .unwrap()
}

#[test]
fn shared_struct_decodes_to_one_allocation() {
    let mut engine = tracking();
    let person = Rc::new(sample_person());
    let crowd = vec![Rc::clone(&person), Rc::clone(&person), Rc::new(Person::default())];
    let bytes = engine.serialize(&crowd).unwrap();
    assert_eq!(engine.write_state().ref_count(), 2);

    let back = engine.deserialize::<Vec<Rc<Person>>>(&bytes).unwrap();
    assert!(Rc::ptr_eq(&back[0], &back[1]));
    assert!(!Rc::ptr_eq(&back[0], &back[2]));
    assert_eq!(*back[0], *person);
}

#[test]
fn sharing_is_smaller_than_copying() {
    let person = Rc::new(sample_person());
    let crowd = vec![Rc::clone(&person); 8];
    let shared = tracking().serialize(&crowd).unwrap();
    let copied = EngineTestBuilder::new()
        .with_models()
        .build()
        .unwrap()
        .serialize(&crowd)
        .unwrap();
    assert!(shared.len() < copied.len());
}

#[test]
fn cyclic_ring_round_trips() {
    let mut engine = tracking();
    let head = ring(4);
    let bytes = engine.serialize(&head).unwrap();
    let back = engine.deserialize::<Rc<RefCell<Node>>>(&bytes).unwrap();

    let mut cursor = Rc::clone(&back);
    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(cursor.borrow().value);
        let next = cursor.borrow().next.clone().unwrap();
        cursor = next;
    }
    assert_eq!(seen, vec![0, 1, 2, 3]);
    assert!(Rc::ptr_eq(&cursor, &back));

    unlink(&head);
    unlink(&back);
}

#[test]
fn cycle_without_tracking_hits_the_depth_limit() {
    let mut engine = EngineTestBuilder::new().with_models().build().unwrap();
    let head = ring(2);
    let result = engine.serialize(&head);
    unlink(&head);
    assert!(matches!(result, Err(CodecError::DepthExceeded { .. })));
}

#[test]
fn long_chain_respects_max_depth() {
    let mut engine = EngineTestBuilder::new()
        .track_ref(true)
        .max_depth(16)
        .with_models()
        .build()
        .unwrap();
    let head = ring(32);
    let result = engine.serialize(&head);
    unlink(&head);
    assert!(matches!(result, Err(CodecError::DepthExceeded { .. })));
}

#[test]
fn equal_strings_are_canonicalized_on_read() {
    let mut engine = tracking();
    let words: Vec<Rc<str>> = ["left", "right", "left", "left"].into_iter().map(Rc::from).collect();
    let bytes = engine.serialize(&words).unwrap();
    let back = engine.deserialize::<Vec<Rc<str>>>(&bytes).unwrap();
    assert!(Rc::ptr_eq(&back[0], &back[2]));
    assert!(Rc::ptr_eq(&back[0], &back[3]));
    assert!(engine.read_state().canonical_hits() >= 2);
}
