// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Key → pattern normalization.
//!
//! Keys are split on a delimiter set, each token is classified, and
//! variable-looking tokens are replaced with a placeholder:
//!
//! ```text
//! user:123:profile                                 → user:*:profile
//! cache/9f86d081884c7d65/thumb                     → cache/*/thumb
//! job.6f1c2d3e-0a4b-4c5d-8e9f-001122334455.state   → job.*.state
//! session:abc                                      → session:abc
//! ```
//!
//! Empty tokens between consecutive delimiters are kept as empty segments,
//! so `a::1` and `a:1` never collapse into the same pattern.
//!
//! Classification is heuristic: a short numeric token such as `v2` is kept,
//! but `1` in `tier:1:members` is always treated as an ID. That over-grouping
//! is a known limitation, not an error.
//!
//! # Example
//!
//! ```
//! use keyspace_analyzer::PatternNormalizer;
//!
//! let normalizer = PatternNormalizer::default();
//! assert_eq!(normalizer.normalize(b"user:123:profile"), "user:*:profile");
//! assert_eq!(normalizer.normalize(b"user:456:profile"), "user:*:profile");
//! ```

const MIN_HEX_LEN: usize = 8;
const MIN_BASE64_LEN: usize = 16;
const UUID_GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

/// Deterministic key normalizer. Cheap to clone, holds no state besides
/// its delimiter set and placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternNormalizer {
    delimiters: Vec<char>,
    placeholder: String,
}

impl Default for PatternNormalizer {
    fn default() -> Self {
        Self::new(vec![':', '.', '/'], "*")
    }
}

impl PatternNormalizer {
    #[must_use]
    pub fn new(delimiters: Vec<char>, placeholder: impl Into<String>) -> Self {
        Self {
            delimiters,
            placeholder: placeholder.into(),
        }
    }

    pub fn delimiters(&self) -> &[char] {
        &self.delimiters
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Normalize a raw key into its pattern.
    #[must_use]
    pub fn normalize(&self, key: &[u8]) -> String {
        let key = String::from_utf8_lossy(key);
        let mut pattern = String::with_capacity(key.len());
        let mut token_start = 0;

        for (idx, ch) in key.char_indices() {
            if self.delimiters.contains(&ch) {
                self.push_token(&mut pattern, &key[token_start..idx]);
                pattern.push(ch);
                token_start = idx + ch.len_utf8();
            }
        }
        self.push_token(&mut pattern, &key[token_start..]);

        pattern
    }

    fn push_token(&self, out: &mut String, token: &str) {
        if is_variable_token(token) {
            out.push_str(&self.placeholder);
        } else {
            out.push_str(token);
        }
    }
}

/// Whether a token looks like an identifier rather than a fixed name.
#[must_use]
pub fn is_variable_token(token: &str) -> bool {
    !token.is_empty()
        && (is_all_digits(token) || is_long_hex(token) || is_uuid(token) || is_base64_blob(token))
}

fn is_all_digits(token: &str) -> bool {
    token.bytes().all(|b| b.is_ascii_digit())
}

fn is_long_hex(token: &str) -> bool {
    token.len() >= MIN_HEX_LEN && token.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_uuid(token: &str) -> bool {
    let groups: Vec<&str> = token.split('-').collect();
    groups.len() == UUID_GROUPS.len()
        && groups
            .iter()
            .zip(UUID_GROUPS)
            .all(|(g, len)| g.len() == len && g.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Standard or URL-safe base64 of at least 16 chars that is either padded
/// or mixes upper-case, lower-case and digits. Plain lowercase words like
/// `notificationsettings` stay stable.
fn is_base64_blob(token: &str) -> bool {
    if token.len() < MIN_BASE64_LEN {
        return false;
    }

    let body = token.trim_end_matches('=');
    let padding = token.len() - body.len();
    if padding > 2 || body.is_empty() {
        return false;
    }

    let alphabet_ok = body
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'-' | b'_'));
    if !alphabet_ok {
        return false;
    }

    if padding > 0 {
        return true;
    }

    let has_upper = body.bytes().any(|b| b.is_ascii_uppercase());
    let has_lower = body.bytes().any(|b| b.is_ascii_lowercase());
    let has_digit = body.bytes().any(|b| b.is_ascii_digit());
    has_upper && has_lower && has_digit
}
