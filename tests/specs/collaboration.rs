// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-environment transaction collaboration.

use crate::prelude::*;
use lcm_engine::{Collaboration, LifecycleEnv};

#[test]
fn merged_transactions_fail_together() {
    let one = open_env();
    let two = open_env();
    assert!(add(&one, DN_BAKKER, LCS_X));
    assert!(add(&two, DN_SMID, LCS_Y));
    assert_eq!(
        LifecycleEnv::collaborate(&one, &two),
        Collaboration::Merged
    );

    // A grammar failure on one side now breaks both.
    assert!(!add(&two, DN_SMID, LCS_TWO_DOTS));
    assert!(!one.commit());
    assert!(!two.commit());
    assert!(one.object_names().is_empty());
    assert!(two.object_names().is_empty());
    one.close();
    two.close();
}

#[test]
fn merged_transactions_commit_together() {
    let one = open_env();
    let two = open_env();
    assert!(add(&one, DN_BAKKER, LCS_X));
    assert!(add(&two, DN_SMID, LCS_Y));
    assert_eq!(
        LifecycleEnv::collaborate(&one, &two),
        Collaboration::Merged
    );

    assert!(two.commit());
    assert_eq!(one.committed_states_of(DN_BAKKER), [LCS_X]);
    assert_eq!(two.committed_states_of(DN_SMID), [LCS_Y]);
    one.close();
    two.close();
}

#[test]
fn merged_transactions_roll_back_together() {
    let one = open_env();
    let two = open_env();
    assert!(add(&one, DN_BAKKER, LCS_X));
    assert!(add(&two, DN_SMID, LCS_Y));
    assert_eq!(
        LifecycleEnv::collaborate(&one, &two),
        Collaboration::Merged
    );

    one.rollback();
    assert!(one.prepare());
    // The partner still carries its break until resolved on its side.
    assert!(!two.prepare());
    two.rollback();
    assert!(two.prepare());
    one.close();
    two.close();
}

#[test]
fn collaboration_with_one_broken_side_breaks_the_other() {
    let one = open_env();
    let two = open_env();
    assert!(add(&one, DN_BAKKER, LCS_X));
    assert!(!add(&two, DN_SMID, LCS_TWO_DOTS));
    assert_eq!(
        LifecycleEnv::collaborate(&one, &two),
        Collaboration::Resolved
    );
    assert!(!one.prepare());
    assert!(!two.prepare());
    one.close();
    two.close();
}

#[test]
fn collaboration_of_two_broken_sides_is_trivial() {
    let one = open_env();
    let two = open_env();
    assert!(!add(&one, DN_BAKKER, LCS_TWO_DOTS));
    assert!(!add(&two, DN_SMID, LCS_TWO_DOTS));
    assert_eq!(
        LifecycleEnv::collaborate(&one, &two),
        Collaboration::Resolved
    );
    one.rollback();
    two.rollback();
    assert!(one.prepare());
    assert!(two.prepare());
    one.close();
    two.close();
}

#[test]
fn three_way_collaboration_commits_every_member() {
    let one = open_env();
    let two = open_env();
    let three = open_env();
    assert!(add(&one, DN_BAKKER, LCS_X));
    assert!(add(&two, DN_SMID, LCS_Y));
    assert!(add(&three, "dc=orvelte,dc=nep", LCS_X));
    assert_eq!(
        LifecycleEnv::collaborate(&one, &two),
        Collaboration::Merged
    );
    assert_eq!(
        LifecycleEnv::collaborate(&two, &three),
        Collaboration::Merged
    );
    assert!(three.commit());
    assert_eq!(one.committed_states_of(DN_BAKKER).len(), 1);
    assert_eq!(two.committed_states_of(DN_SMID).len(), 1);
    assert_eq!(three.committed_states_of("dc=orvelte,dc=nep").len(), 1);
    one.close();
    two.close();
    three.close();
}
