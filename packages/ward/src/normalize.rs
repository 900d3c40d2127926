//! Join key normalization.
//!
//! Ward names in tabular sources rarely match the boundary file exactly
//! ("Ward No. 014", "WARD-14", "14 Ward"). The same pipeline is applied to
//! both sides of the join so that equivalent spellings meet on one key.

use regex::Regex;
use std::sync::LazyLock;

/// Punctuation that never distinguishes one ward from another.
static PUNCTUATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.,#:;'()/\\\-_]+").expect("valid regex"));

/// Administrative tokens that carry no identity.
const NOISE_TOKENS: &[&str] = &[
    "ward",
    "wards",
    "no",
    "num",
    "number",
    "division",
    "div",
    "zone",
    "circle",
    "municipal",
    "corporation",
    "gvmc",
    "ghmc",
];

/// Normalizes a ward code: trimmed, case-folded, inner whitespace
/// collapsed.
#[must_use]
pub fn normalize_code(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalizes a ward name.
///
/// The pipeline:
/// 1. Lowercase
/// 2. Strip punctuation
/// 3. Drop administrative noise tokens
/// 4. Strip leading zeros from numeric tokens
/// 5. Collapse whitespace
///
/// A name made only of noise tokens normalizes to the empty string, which
/// never matches anything.
#[must_use]
pub fn normalize_name(input: &str) -> String {
    let lower = input.to_lowercase();
    let no_punct = PUNCTUATION_RE.replace_all(&lower, " ");

    no_punct
        .split_whitespace()
        .filter(|token| !NOISE_TOKENS.contains(token))
        .map(strip_leading_zeros)
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_leading_zeros(token: &str) -> &str {
    if token.chars().all(|c| c.is_ascii_digit()) {
        let trimmed = token.trim_start_matches('0');
        if trimmed.is_empty() { "0" } else { trimmed }
    } else {
        token
    }
}
