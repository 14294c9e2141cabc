// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment open/close round-trips.

use crate::prelude::*;
use lcm_engine::{DriverError, LifecycleEnv, OpenError};

#[test]
fn open_close_round_trip() {
    let env = open_env_with(&["x=/bin/true"]);
    env.close();
}

#[test]
fn repeated_open_close_cycles() {
    for _ in 0..3 {
        let env = open_env();
        env.close();
    }
}

#[test]
fn open_rejects_a_wrong_variable_count() {
    let args = vec!["lcm-spec".to_string(), "x=/bin/true".to_string()];
    assert!(matches!(
        LifecycleEnv::open(&args, 1),
        Err(OpenError::VariableCount(1))
    ));
}

#[test]
fn open_rejects_an_argument_without_equals() {
    let args = vec!["lcm-spec".to_string(), "nocommand".to_string()];
    assert!(matches!(
        LifecycleEnv::open(&args, 2),
        Err(OpenError::Driver(DriverError::MalformedArgument(_)))
    ));
}

#[test]
fn close_discards_uncommitted_work() {
    let env = open_env();
    assert!(add(&env, DN_BAKKER, LCS_X));
    // No commit: close breaks the transaction and tears everything down.
    env.close();
}
