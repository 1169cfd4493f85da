//! Property-based tests using proptest
//!
//! These tests validate framing and chain invariants across a wide range of
//! randomly generated inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::{Bytes, BytesMut};
use network_pipeline::core::frame::Frame;
use network_pipeline::core::framer::{Framer, LengthPrefixedFramer};
use network_pipeline::core::header_body::{
    HeaderBodyFramer, HeaderBodySession, HeaderBodyState, BODY_CHANNEL, HEADER_CHANNEL,
};
use network_pipeline::error::PipelineError;
use network_pipeline::pipeline::{Context, FnHandler, Message, Pipeline};
use proptest::prelude::*;

fn arb_frame() -> impl Strategy<Value = Frame> {
    (any::<u32>(), prop::collection::vec(any::<u8>(), 0..512))
        .prop_map(|(channel, payload)| Frame::new(channel, payload))
}

fn encode_all(frames: &[Frame]) -> BytesMut {
    let framer = LengthPrefixedFramer::new();
    let mut wire = BytesMut::new();
    for frame in frames {
        Framer::<()>::pack(&framer, frame, &(), &mut wire).expect("pack should not fail");
    }
    wire
}

/// Feed `wire` to `framer` in pieces ending at each of `cuts`.
fn unpack_chunked<S, F: Framer<S>>(framer: &F, session: &S, wire: &[u8], cuts: &[usize]) -> Vec<Frame> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (wire.len() + 1)).collect();
    points.push(wire.len());
    points.sort_unstable();

    let mut buf = BytesMut::new();
    let mut frames = Vec::new();
    let mut start = 0;
    for end in points {
        buf.extend_from_slice(&wire[start..end]);
        framer.unpack(&mut buf, session, &mut frames).expect("unpack should not fail");
        start = end;
    }
    frames
}

// Property: the default framer round-trips any frame
proptest! {
    #[test]
    fn prop_length_prefixed_roundtrip(frame in arb_frame()) {
        let mut wire = encode_all(std::slice::from_ref(&frame));
        prop_assert_eq!(wire.len(), LengthPrefixedFramer::HEADER_LEN + frame.len());

        let mut frames = Vec::new();
        Framer::<()>::unpack(&LengthPrefixedFramer::new(), &mut wire, &(), &mut frames).unwrap();
        prop_assert_eq!(frames, vec![frame]);
        prop_assert!(wire.is_empty());
    }
}

// Property: chunk boundaries never change the decoded frame sequence
proptest! {
    #[test]
    fn prop_length_prefixed_chunking_invariance(
        frames in prop::collection::vec(arb_frame(), 0..16),
        cuts in prop::collection::vec(any::<usize>(), 0..24),
    ) {
        let wire = encode_all(&frames);
        let framer = LengthPrefixedFramer::new();
        let whole = unpack_chunked(&framer, &(), &wire, &[]);
        let chunked = unpack_chunked(&framer, &(), &wire, &cuts);
        prop_assert_eq!(&whole, &frames);
        prop_assert_eq!(chunked, whole);
    }
}

// Property: a truncated stream never yields a frame for unverified data
proptest! {
    #[test]
    fn prop_truncated_stream_keeps_partial_frame(
        frames in prop::collection::vec(arb_frame(), 1..8),
        cut in any::<usize>(),
    ) {
        let wire = encode_all(&frames);
        let keep = cut % wire.len();
        let mut buf = BytesMut::from(&wire[..keep]);
        let mut decoded = Vec::new();
        Framer::<()>::unpack(&LengthPrefixedFramer::new(), &mut buf, &(), &mut decoded).unwrap();

        let consumed: usize = decoded.iter().map(|f| LengthPrefixedFramer::HEADER_LEN + f.len()).sum();
        prop_assert!(decoded.len() < frames.len());
        prop_assert_eq!(&decoded[..], &frames[..decoded.len()]);
        prop_assert_eq!(consumed + buf.len(), keep);
    }
}

#[derive(Default)]
struct HttpSession {
    state: HeaderBodyState,
}

impl HeaderBodySession for HttpSession {
    fn header_body_state(&self) -> &HeaderBodyState {
        &self.state
    }
}

// Property: header block is chunking-invariant; body bytes arrive intact
proptest! {
    #[test]
    fn prop_header_body_chunking(
        header in "[A-Za-z0-9:/ .-]{1,80}",
        body in prop::collection::vec(any::<u8>(), 0..256),
        cuts in prop::collection::vec(any::<usize>(), 0..12),
    ) {
        let mut wire = header.clone().into_bytes();
        wire.extend_from_slice(b"\r\n\r\n");
        wire.extend_from_slice(&body);

        let framer = HeaderBodyFramer::default();
        let session = HttpSession::default();
        framer.init(&session);
        let frames = unpack_chunked(&framer, &session, &wire, &cuts);

        prop_assert_eq!(&frames[0], &Frame::new(HEADER_CHANNEL, header.into_bytes()));
        let mut received = Vec::new();
        for frame in &frames[1..] {
            prop_assert_eq!(frame.channel, BODY_CHANNEL);
            received.extend_from_slice(&frame.payload);
        }
        prop_assert_eq!(received, body);
    }
}

// ============================================================================
// Chain mutation model
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    AddFirst(usize, bool),
    AddLast(usize, bool),
    Replace(usize, bool),
    Remove(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..6usize, any::<bool>()).prop_map(|(n, s)| Op::AddFirst(n, s)),
        (0..6usize, any::<bool>()).prop_map(|(n, s)| Op::AddLast(n, s)),
        (0..6usize, any::<bool>()).prop_map(|(n, s)| Op::Replace(n, s)),
        (0..6usize).prop_map(Op::Remove),
    ]
}

fn handler(accepts_strings: bool) -> FnHandler<()> {
    if accepts_strings {
        FnHandler::new().on_received::<String, _>(|s: &(), v: String, c: u32, ctx: &Context<'_, ()>| {
            ctx.fire_message_received(s, Message::new(v), c)
        })
    } else {
        FnHandler::new().on_received::<Bytes, _>(|s: &(), v: Bytes, c: u32, ctx: &Context<'_, ()>| {
            ctx.fire_message_received(s, Message::new(v), c)
        })
    }
}

// Property: any mutation sequence keeps names unique, traversals in agreement,
// and routing identical to a scan of the current chain
proptest! {
    #[test]
    fn prop_mutation_sequences_match_model(ops in prop::collection::vec(arb_op(), 0..40)) {
        let pipeline = Pipeline::<()>::new();
        let mut model: Vec<(String, bool)> = Vec::new();

        for op in ops {
            let position = |model: &Vec<(String, bool)>, name: &str| model.iter().position(|(n, _)| n == name);
            match op {
                Op::AddFirst(n, s) | Op::AddLast(n, s) => {
                    let name = format!("n{n}");
                    let first = matches!(op, Op::AddFirst(..));
                    let result = if first {
                        pipeline.add_first(&name, handler(s))
                    } else {
                        pipeline.add_last(&name, handler(s))
                    };
                    if position(&model, &name).is_some() {
                        prop_assert!(matches!(result, Err(PipelineError::DuplicateName(_))));
                    } else {
                        prop_assert!(result.is_ok());
                        if first { model.insert(0, (name, s)); } else { model.push((name, s)); }
                    }
                }
                Op::Replace(n, s) => {
                    let name = format!("n{n}");
                    let result = pipeline.replace(&name, handler(s));
                    match position(&model, &name) {
                        Some(i) => { prop_assert!(result.is_ok()); model[i].1 = s; }
                        None => prop_assert!(matches!(result, Err(PipelineError::NodeNotFound(_)))),
                    }
                }
                Op::Remove(n) => {
                    let name = format!("n{n}");
                    let result = pipeline.remove(&name);
                    match position(&model, &name) {
                        Some(i) => { prop_assert!(result.is_ok()); model.remove(i); }
                        None => prop_assert!(matches!(result, Err(PipelineError::NodeNotFound(_)))),
                    }
                }
            }

            let snapshot = pipeline.snapshot().unwrap();
            let expected: Vec<String> = model.iter().map(|(n, _)| n.clone()).collect();
            prop_assert_eq!(&snapshot.forward, &expected);
            let mut backward = snapshot.backward.clone();
            backward.reverse();
            prop_assert_eq!(&backward, &expected);

            let first_string = model.iter().find(|(_, s)| *s).map(|(n, _)| n.clone());
            let first_bytes = model.iter().find(|(_, s)| !*s).map(|(n, _)| n.clone());
            pipeline.fire_message_received(&(), Message::new(String::from("probe")), 0).unwrap();
            prop_assert_eq!(pipeline.resolve_received::<String>().unwrap(), first_string);
            prop_assert_eq!(pipeline.resolve_received::<Bytes>().unwrap(), first_bytes);
        }
    }
}
