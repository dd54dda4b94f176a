#![no_main]

use libfuzzer_sys::fuzz_target;
use vau_transport::codec::{decode_request, decode_response, encode_request};

fuzz_target!(|data: &[u8]| {
    let _ = decode_response(data);

    // A decoded request re-encodes, and the encoding decodes to the same request.
    if let Ok(request) = decode_request(data) {
        if let Ok(encoded) = encode_request(&request) {
            assert_eq!(decode_request(&encoded).ok(), Some(request));
        }
    }
});
