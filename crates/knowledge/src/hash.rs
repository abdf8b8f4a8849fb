//! Content addresses for rules and scripts.

use sha2::{Digest, Sha256};

/// Canonical form of a rule: trimmed, lower-cased, inner whitespace
/// collapsed to single spaces. Two rules are the same rule iff their
/// normalized texts are equal.
pub fn normalize_rule(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rule id: hex SHA-256 of the normalized rule text.
pub fn rule_id(text: &str) -> String {
    sha256_hex(&normalize_rule(text))
}

/// Script hash: hex SHA-256 of the trimmed script text.
pub fn script_hash(script: &str) -> String {
    sha256_hex(script.trim())
}

/// First `max_chars` characters of a script on a single line.
pub fn excerpt(script: &str, max_chars: usize) -> String {
    script
        .chars()
        .take(max_chars)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

fn sha256_hex(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}
