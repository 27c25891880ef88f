#![no_main]

use std::io::Cursor;

use cts_protocol::resp::read_reply;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Decode frames back to back until the input is exhausted or rejected.
    let mut reader = Cursor::new(data);
    while read_reply(&mut reader).is_ok() {}
});
