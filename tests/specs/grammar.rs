// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Input validation at the feed boundary.

use crate::prelude::*;
use lcm_engine::Fork;

#[test]
fn lifecycle_state_with_two_dots_is_rejected() {
    let env = open_env();
    assert!(!add(&env, DN_BAKKER, LCS_TWO_DOTS));
    assert!(!env.prepare());
    env.rollback();
    env.close();
}

#[test]
fn malformed_distinguished_name_is_rejected() {
    let env = open_env();
    assert!(!add(&env, "not a dn,,", LCS_X));
    assert!(!env.prepare());
    env.rollback();
    env.close();
}

#[test]
fn embedded_nul_is_rejected() {
    let env = open_env();
    let dn = lcm_core::der::encode(b"uid=bakker\0,dc=nep").unwrap();
    let lcs = lcm_core::der::encode(LCS_X.as_bytes()).unwrap();
    assert!(!env.add(Fork {
        dn: &dn,
        lifecycle_state: &lcs,
    }));
    assert!(!env.prepare());
    env.rollback();
    env.close();
}

#[test]
fn embedded_newline_is_rejected() {
    let env = open_env();
    let (dn, _) = fork_bytes(DN_BAKKER, LCS_X);
    let lcs = lcm_core::der::encode(b"x . go@\ngone@").unwrap();
    assert!(!env.add(Fork {
        dn: &dn,
        lifecycle_state: &lcs,
    }));
    env.rollback();
    env.close();
}

#[test]
fn wide_der_length_is_rejected() {
    let env = open_env();
    let (_, lcs) = fork_bytes(DN_BAKKER, LCS_X);
    assert!(!env.add(Fork {
        dn: b"\x04\x83\x00\x00\x01a",
        lifecycle_state: &lcs,
    }));
    assert!(!env.prepare());
    env.rollback();
    env.close();
}

#[test]
fn a_failure_never_leaks_partial_data() {
    let env = open_env();
    assert!(add(&env, DN_BAKKER, LCS_X));
    assert!(!add(&env, DN_SMID, LCS_TWO_DOTS));
    assert!(!env.commit());
    assert!(env.object_names().is_empty());
    env.close();
}
