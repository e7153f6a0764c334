//! Streaming session tests: chunked arrival, suspension, resumption.
//!
//! The invariant under test everywhere: however an encoding is split into
//! chunks, a session produces exactly the values a one-shot parse of the
//! whole encoding would, with `try_next` reporting "need more" in between.

use pretty_assertions::assert_eq;

use mpack_core::{unpack, SizeThreshold, Unpacker, UnpackLimits, ValueView, Zone};

/// Render every value a fully-fed session produces, for order-insensitive
/// comparison with a one-shot parse.
fn drain(unp: &mut Unpacker) -> Vec<String> {
    let mut out = Vec::new();
    while let Some(u) = unp.try_next().expect("valid input") {
        out.push(format!("{:?}", u.get()));
    }
    out
}

fn one_shot_repr(data: &[u8]) -> String {
    let mut zone = Zone::new();
    let (v, _) = unpack(data, &mut zone, &UnpackLimits::default()).expect("valid input");
    format!("{:?}", ValueView::new(&zone, None, v))
}

// =============================================================================
// Scenario: byte-at-a-time arrival
// =============================================================================

#[test]
fn array_fed_one_byte_at_a_time() {
    let data = [0x93, 0x01, 0x02, 0x03];
    let mut unp = Unpacker::new();

    for &b in &data[..3] {
        unp.reserve(1);
        unp.write_target()[0] = b;
        unp.commit(1);
        assert!(unp.try_next().expect("valid").is_none(), "incomplete prefix");
    }

    unp.reserve(1);
    unp.write_target()[0] = data[3];
    unp.commit(1);
    let u = unp.try_next().expect("valid").expect("complete");
    assert_eq!(format!("{:?}", u.get()), "[1, 2, 3]");
    assert_eq!(unp.parsed_size(), 4);
}

#[test]
fn every_split_point_of_a_nested_document() {
    // {"k": [1, "ab"], "n": nil}
    let data: &[u8] = &[
        0x82, 0xa1, 0x6b, 0x92, 0x01, 0xa2, 0x61, 0x62, 0xa1, 0x6e, 0xc0,
    ];
    let expected = one_shot_repr(data);

    for split in 1..data.len() {
        let mut unp = Unpacker::new();
        unp.feed(&data[..split]);
        assert!(unp.try_next().expect("valid").is_none(), "split at {}", split);
        unp.feed(&data[split..]);
        let u = unp.try_next().expect("valid").expect("complete");
        assert_eq!(format!("{:?}", u.get()), expected, "split at {}", split);
    }
}

#[test]
fn three_way_chunkings_match_one_shot() {
    let data: &[u8] = &[
        0x93, 0xcd, 0x01, 0x00, 0x92, 0xc3, 0xcb, 0x3f, 0xf0, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xa3, 0x61, 0x62, 0x63,
    ];
    let expected = one_shot_repr(data);

    for i in 1..data.len() - 1 {
        for j in i + 1..data.len() {
            let mut unp = Unpacker::new();
            unp.feed(&data[..i]);
            let _ = unp.try_next().expect("valid");
            unp.feed(&data[i..j]);
            let _ = unp.try_next().expect("valid");
            unp.feed(&data[j..]);
            let u = unp.try_next().expect("valid").expect("complete");
            assert_eq!(format!("{:?}", u.get()), expected, "chunks at {}/{}", i, j);
        }
    }
}

// =============================================================================
// Multiple values per stream
// =============================================================================

#[test]
fn back_to_back_values_in_one_commit() {
    let mut unp = Unpacker::new();
    unp.feed(&[0x2a, 0x90, 0xa1, 0x78]);
    assert_eq!(drain(&mut unp), vec!["42", "[]", "\"x\""]);
}

#[test]
fn values_split_across_commits() {
    let mut unp = Unpacker::new();
    unp.feed(&[0x92, 0x01]);
    assert_eq!(drain(&mut unp), Vec::<String>::new());
    unp.feed(&[0x02, 0xc3, 0xa1]);
    // array completes, bool completes, str header pends
    assert_eq!(drain(&mut unp), vec!["[1, 2]", "true"]);
    unp.feed(&[0x79]);
    assert_eq!(drain(&mut unp), vec!["\"y\""]);
    assert_eq!(unp.pending_len(), 0);
}

#[test]
fn values_outlive_the_session() {
    let mut unp = Unpacker::new();
    unp.feed(&[0x92, 0xa5, 0x68, 0x65, 0x6c, 0x6c, 0x6f, 0x2a]);
    let u = unp.try_next().expect("valid").expect("complete");
    drop(unp);
    // payloads were copied into the value's own zone
    assert_eq!(u.get().get(0).and_then(|e| e.as_str()), Some("hello"));
    assert_eq!(u.get().get(1).and_then(|e| e.as_u64()), Some(42));
}

#[test]
fn zone_migration_merges_session_results() {
    let mut unp = Unpacker::new();
    unp.feed(&[0xa1, 0x61, 0xa1, 0x62]);
    let first = unp.try_next().expect("valid").expect("one");
    let second = unp.try_next().expect("valid").expect("two");

    let (mut merged_zone, first_root) = first.into_parts();
    let (mut donor_zone, second_root) = second.into_parts();
    merged_zone.migrate(&mut donor_zone);
    drop(donor_zone);

    let a = ValueView::new(&merged_zone, None, first_root);
    let b = ValueView::new(&merged_zone, None, second_root);
    assert_eq!(a.as_str(), Some("a"));
    assert_eq!(b.as_str(), Some("b"));
}

// =============================================================================
// Buffer management
// =============================================================================

#[test]
fn compaction_reclaims_consumed_bytes() {
    let mut unp = Unpacker::new();
    for _ in 0..100 {
        unp.feed(&[0x91, 0x2a]);
        let u = unp.try_next().expect("valid").expect("complete");
        assert_eq!(format!("{:?}", u.get()), "[42]");
    }
    assert_eq!(unp.parsed_size(), 200);
    assert!(unp.compact());
    assert_eq!(unp.parsed_size(), 200);
    assert_eq!(unp.pending_len(), 0);

    // still works after compaction
    unp.feed(&[0xc0]);
    assert!(unp.try_next().expect("valid").expect("nil").get().is_nil());
}

#[test]
fn large_payload_grows_the_buffer() {
    let payload = vec![0xabu8; 200_000];
    let mut enc = vec![0xc6];
    enc.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    enc.extend_from_slice(&payload);

    let mut unp = Unpacker::with_config(64, 64, UnpackLimits::default());
    for chunk in enc.chunks(4096) {
        unp.reserve(chunk.len());
        unp.write_target()[..chunk.len()].copy_from_slice(chunk);
        unp.commit(chunk.len());
    }
    let u = unp.try_next().expect("valid").expect("complete");
    assert_eq!(u.get().payload().map(<[u8]>::len), Some(200_000));
}

// =============================================================================
// Zero-copy references against the session buffer
// =============================================================================

#[test]
fn referenced_payloads_resolve_through_the_session() {
    let mut unp = Unpacker::new();
    unp.set_reference_policy(Box::new(SizeThreshold(1)));
    unp.feed(&[0xa5, 0x68, 0x65, 0x6c, 0x6c, 0x6f]);
    let u = unp.try_next().expect("valid").expect("complete");

    // without the session's input window the payload is unreachable
    assert_eq!(u.get().payload(), None);
    // through the session it resolves
    assert_eq!(unp.view(&u).as_str(), Some("hello"));
    assert!(unp.buffer_referenced());
}

#[test]
fn references_pin_the_buffer_until_released() {
    let mut unp = Unpacker::new();
    unp.set_reference_policy(Box::new(SizeThreshold(1)));
    unp.feed(&[0xa2, 0x68, 0x69]);
    let u = unp.try_next().expect("valid").expect("complete");

    assert!(!unp.compact(), "referenced buffer must not move");
    assert_eq!(unp.view(&u).as_str(), Some("hi"));

    unp.release_references();
    assert!(unp.compact());
    // the bytes are gone now; resolution degrades to None, never dangles
    assert_eq!(unp.view(&u).payload(), None);
}
