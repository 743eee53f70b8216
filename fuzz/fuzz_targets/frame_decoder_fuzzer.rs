//! Fuzz target for the length-prefixed CBOR frame decoder
//!
//! Untrusted bytes from a client socket must never crash the server.
//!
//! # Strategy
//!
//! - Raw input: arbitrary bytes fed straight to the decoder
//! - Chunking: the same bytes split at a fuzzed offset to mimic partial reads
//! - Message kinds: decoded as client calls and as replica requests
//!
//! # Invariants
//!
//! - NEVER panic on malformed length prefix or CBOR body
//! - Incomplete input returns `Ok(None)` and consumes nothing
//! - A decoded frame re-encodes without error

#![no_main]

use arbitrary::Arbitrary;
use bytes::BytesMut;
use gavel_proto::{Call, ReplicaRequest, decode_frame, encode_frame};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    split: u16,
    bytes: Vec<u8>,
}

fn check<T>(bytes: &[u8], split: usize)
where
    T: serde::de::DeserializeOwned + serde::Serialize,
{
    let split = split.min(bytes.len());
    let mut buf = BytesMut::from(&bytes[..split]);

    let before = buf.len();
    match decode_frame::<T>(&mut buf) {
        Ok(None) => assert_eq!(buf.len(), before, "partial frame consumed input"),
        Ok(Some(_)) | Err(_) => return,
    }

    buf.extend_from_slice(&bytes[split..]);
    if let Ok(Some(message)) = decode_frame::<T>(&mut buf) {
        let mut out = BytesMut::new();
        assert!(encode_frame(&message, &mut out).is_ok(), "decoded frame failed to re-encode");
    }
}

fuzz_target!(|input: Input| {
    let split = usize::from(input.split);
    check::<Call>(&input.bytes, split);
    check::<ReplicaRequest>(&input.bytes, split);
});
