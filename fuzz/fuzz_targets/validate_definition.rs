//! Fuzz harness for definition validation and canonicalization.
//!
//! Arbitrary bytes must never panic the validator, and any accepted
//! definition must stay accepted, and unchanged, after canonicalization.

#![no_main]
use auditfilter_core::{canonicalize, validate};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if validate(text).is_err() {
        return;
    }

    let canonical = canonicalize(text).expect("valid definitions are JSON");
    assert!(validate(&canonical).is_ok());
    assert_eq!(
        canonicalize(&canonical).expect("canonical text is JSON"),
        canonical
    );

    let reparsed: serde_json::Value = serde_json::from_str(&canonical).expect("canonical JSON");
    let original: serde_json::Value = serde_json::from_str(text).expect("original JSON");
    assert_eq!(reparsed, original);
});
