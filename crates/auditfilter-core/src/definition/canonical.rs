//! Canonical text form of filter definitions.
//!
//! Canonical text is compact JSON with object members in the map's iteration
//! order (sorted by key) and values unchanged. It is what the controller sends
//! to the store and what read-backs are compared against, so whitespace and
//! member order never register as drift.

use serde_json::Value;

use super::validate::{ValidationError, parse_document};

/// Re-serialize `text` into canonical form.
///
/// Only JSON well-formedness is required; structural checks are left to
/// [`super::validate`].
///
/// # Errors
///
/// Returns [`ValidationError::MalformedJson`] if `text` is not JSON.
pub fn canonicalize(text: &str) -> Result<String, ValidationError> {
    parse_document(text).map(|document| to_canonical(&document))
}

/// Canonical text of an already-parsed document.
#[must_use]
pub fn to_canonical(document: &Value) -> String {
    document.to_string()
}

/// Whether two definition texts are equal once canonicalized.
///
/// Texts that are not JSON compare byte for byte.
#[must_use]
pub fn same_definition(left: &str, right: &str) -> bool {
    match (canonicalize(left), canonicalize(right)) {
        (Ok(left), Ok(right)) => left == right,
        _ => left == right,
    }
}
