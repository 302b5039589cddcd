#![no_main]

use hushkit_core::envelope::SealedEnvelope;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Parsing arbitrary bytes must never panic, only return Ok or Err.
    if let Ok(envelope) = SealedEnvelope::from_bytes(data) {
        // Whatever parses must re-encode to exactly the input
        assert_eq!(envelope.to_bytes(), data);
        let armored = envelope.to_armored();
        let _ = SealedEnvelope::from_armored(&armored);
    }

    if let Ok(text) = std::str::from_utf8(data) {
        let _ = SealedEnvelope::from_armored(text);
    }
});
