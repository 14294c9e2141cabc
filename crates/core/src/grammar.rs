// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Attribute grammars for the two fed attribute values.
//!
//! Both checks run on every staged fork before it touches any object. The
//! `distinguishedName` grammar is deliberately looser than RFC 4514: values
//! are any bytes free of `,` and `+`, or a double-quoted run additionally
//! free of `"`.

use regex::Regex;
use std::sync::LazyLock;

const IDENTIFIER: &str = "[a-zA-Z_-]+[0-9]*";
const TIMESTAMP: &str = "[0-9]+";
const VALUE: &str = "[^ .]*";

// Past tokens carry their timestamp or payload; the cursor token and
// anything after it may still lack one (fire as soon as possible).
#[allow(clippy::expect_used)]
static LIFECYCLE_STATE: LazyLock<Regex> = LazyLock::new(|| {
    let done = format!(
        "({IDENTIFIER}[@]{TIMESTAMP}|{IDENTIFIER}[?]{IDENTIFIER}|{IDENTIFIER}[=]{VALUE})"
    );
    let next = format!("({IDENTIFIER}[@]{TIMESTAMP}?|{IDENTIFIER}[?]{IDENTIFIER})");
    let todo = format!(
        "({IDENTIFIER}[@]{TIMESTAMP}?|{IDENTIFIER}[?]{IDENTIFIER}|{IDENTIFIER}[=]{VALUE}?)"
    );
    let whole = format!(
        "^({IDENTIFIER}([ ]{done})*[ ][.][ ]{next}([ ]{todo})*\
         |{IDENTIFIER}([ ]{done})*[ ][.])$"
    );
    Regex::new(&whole).expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static DISTINGUISHED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    let keystring = "[A-Za-z][A-Za-z0-9-]*";
    let oid = "[1-9][0-9]*([.][1-9][0-9]*)*";
    let value = "([^,+]*|[\"][^,+\"]*[\"])";
    let pair = format!("(({keystring}|{oid})[=]{value})");
    let rdn = format!("({pair}([+]{pair})*)");
    let whole = format!("^({rdn}([,]{rdn})*)$");
    Regex::new(&whole).expect("constant regex pattern is valid")
});

/// Check one `lifecycleState` attribute value.
pub fn lifecycle_state_ok(lcs: &str) -> bool {
    LIFECYCLE_STATE.is_match(lcs)
}

/// Check one `distinguishedName` attribute value.
pub fn distinguished_name_ok(dn: &str) -> bool {
    DISTINGUISHED_NAME.is_match(dn)
}

#[cfg(test)]
#[path = "grammar_tests.rs"]
mod tests;
