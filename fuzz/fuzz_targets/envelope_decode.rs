//! Fuzz target for envelope decoding
//!
//! Feeds arbitrary bytes through the inbound codec:
//! - Malformed JSON
//! - Valid JSON with missing or mistyped fields
//! - Unknown `type` discriminants
//! - Mixed naming conventions in one envelope
//!
//! The decoder should NEVER panic. Invalid envelopes return an error,
//! unknown kinds return Ok(None).

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = chatlink_proto::decode(text);
    }
});
