#![no_main]

use arbitrary::Arbitrary;
use cts_conformance::{CommandDescriptor, TestCase, materialize, split_quoted};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    line: String,
    argv: Vec<String>,
    binary: bool,
    split: bool,
}

fuzz_target!(|input: Input| {
    let mut case = TestCase::new("fuzz", "1.0.0", Vec::new(), Vec::new());
    case.command_binary = input.binary;
    case.command_split = input.split;

    let parts = split_quoted(input.line.as_bytes());
    assert!(!parts.is_empty());
    assert!(parts.iter().all(|part| !part.contains(&b'"')));

    for descriptor in [
        CommandDescriptor::Line(input.line),
        CommandDescriptor::Argv(input.argv),
    ] {
        if let Ok(args) = materialize(&case, &descriptor) {
            assert!(!args.is_empty());
        }
    }
});
