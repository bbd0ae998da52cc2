//! Fuzz target for CBOR decoding of wire messages
//!
//! Arbitrary bytes from an untrusted peer must decode to a message or an
//! error, never a panic, and anything that decodes must re-encode.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tandem_proto::{ClientMessage, ServerMessage};

fuzz_target!(|data: &[u8]| {
    if let Ok(message) = ServerMessage::from_cbor(data) {
        let encoded = message.to_cbor().expect("decoded message must re-encode");
        assert!(ServerMessage::from_cbor(&encoded).is_ok());
    }

    if let Ok(message) = ClientMessage::from_cbor(data) {
        let encoded = message.to_cbor().expect("decoded message must re-encode");
        assert!(ClientMessage::from_cbor(&encoded).is_ok());
    }
});
