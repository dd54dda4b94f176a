#![no_main]

use libfuzzer_sys::fuzz_target;
use vau_core::frame::Frame;

fuzz_target!(|data: &[u8]| {
    // Parsing must never panic, and anything accepted must serialize back unchanged.
    if let Ok(frame) = Frame::parse(data) {
        assert_eq!(frame.serialize(), data);
    }
});
