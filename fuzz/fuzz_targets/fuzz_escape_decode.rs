#![no_main]

use cts_conformance::decode_escapes;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|template: &str| {
    // Every recognized escape shrinks the output, so it never outgrows the input.
    if let Ok(bytes) = decode_escapes(template) {
        assert!(bytes.len() <= template.chars().count());
    }
});
