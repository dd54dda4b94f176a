#![no_main]

use libfuzzer_sys::fuzz_target;
use vau_core::keys::SignedPublicKeyBundle;
use vau_core::message::{Message1, Message2, Message3, Message3Inner, Message4};
use vau_core::peek_message_type;

fuzz_target!(|data: &[u8]| {
    let _ = peek_message_type(data);
    let _ = Message1::decode(data);
    let _ = Message2::decode(data);
    let _ = Message3::decode(data);
    let _ = Message3Inner::decode(data);
    let _ = Message4::decode(data);
    let _ = SignedPublicKeyBundle::decode(data);
});
