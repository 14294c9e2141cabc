// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier scanning over attribute text.

/// Length in bytes of the leading identifier run.
///
/// Identifiers are ASCII alphanumerics plus `-` and `_`; anything else ends
/// the run. Token classification, driver lookup, and argument validation
/// all cut tokens with this.
pub fn ident_len(s: &str) -> usize {
    s.bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'-' || *b == b'_')
        .count()
}

/// The leading identifier of `s`, possibly empty.
pub fn leading_ident(s: &str) -> &str {
    &s[..ident_len(s)]
}

#[cfg(test)]
#[path = "ident_tests.rs"]
mod tests;
