#![no_main]

use hushkit_core::password_hash::parse_password_hash;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(encoded) = std::str::from_utf8(data) else {
        return;
    };

    // parse_password_hash must never panic on arbitrary text
    if let Ok(record) = parse_password_hash(encoded) {
        // A parsed record re-encodes to a string that parses back to itself
        let reencoded = record.encode();
        assert_eq!(parse_password_hash(&reencoded).ok(), Some(record));
    }
});
