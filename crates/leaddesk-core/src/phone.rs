//! Caller phone normalization.
//!
//! The normalized form is the contact dedup key. Every write and every lookup
//! must go through [`normalize_phone`].

/// Strip every character that is not an ASCII digit or `+`.
///
/// `"+1 (555) 010-2020"` becomes `"+15550102020"`. Returns an empty string
/// when the input holds no digits at all.
#[must_use]
pub fn normalize_phone(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    if kept.chars().any(|c| c.is_ascii_digit()) {
        kept
    } else {
        String::new()
    }
}
