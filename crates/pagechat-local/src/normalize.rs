//! Whitespace normalization for extracted text fields.

/// Collapse every maximal whitespace run (newlines included) to one space and
/// trim the ends. Total and idempotent.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
