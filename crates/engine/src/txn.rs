// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transaction open, break, and commit over collaboration cycles.
//!
//! Cycle-wide operations lock one member environment at a time and never
//! hold two locks at once, so no lock ordering between environments is
//! needed. A member whose cycle pointer no longer matches (it was already
//! resolved through another entry point) is skipped.

use crate::env::{EnvState, LcEnv, TxnCycle};
use lcm_core::LcObject;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Open a fresh singleton transaction on an environment.
///
/// The caller holds the state lock and has checked that no transaction is
/// active and the environment is not aborted.
pub(crate) fn open(env: &LcEnv, state: &mut EnvState) {
    debug_assert!(!state.txn_active() && !state.aborted);
    debug_assert!(state.objects.values().all(|o| !o.has_staging()));
    state.txn = Some(Arc::new(TxnCycle {
        members: vec![env.weak.clone()],
    }));
    debug!("transaction opened");
}

fn cycle_members(cycle: &TxnCycle) -> Vec<Arc<LcEnv>> {
    cycle.members.iter().filter_map(Weak::upgrade).collect()
}

fn in_cycle(state: &EnvState, cycle: &Arc<TxnCycle>) -> bool {
    state.txn.as_ref().is_some_and(|c| Arc::ptr_eq(c, cycle))
}

/// Drop staged additions, restore staged deletions, and raise the aborted
/// flag on every member of the cycle.
pub(crate) fn break_cycle(cycle: &Arc<TxnCycle>) {
    for env in cycle_members(cycle) {
        let mut state = env.state.lock();
        if !in_cycle(&state, cycle) {
            continue;
        }
        state.txn = None;
        sweep_objects(&mut state, LcObject::apply_abort);
        state.aborted = true;
        env.signal.notify_all();
        debug!("transaction broken");
    }
}

/// Realise staged changes and drop emptied objects on every member of the
/// cycle, waking each service worker.
pub(crate) fn commit_cycle(cycle: &Arc<TxnCycle>) {
    for env in cycle_members(cycle) {
        let mut state = env.state.lock();
        if !in_cycle(&state, cycle) {
            continue;
        }
        state.txn = None;
        sweep_objects(&mut state, LcObject::apply_commit);
        env.signal.notify_all();
        debug!("transaction committed");
    }
}

fn sweep_objects(state: &mut EnvState, apply: fn(&mut LcObject) -> bool) {
    let emptied: Vec<Arc<str>> = state
        .objects
        .iter_mut()
        .filter_map(|(dn, obj)| apply(obj).then(|| dn.clone()))
        .collect();
    for dn in emptied {
        state.remove_object(&dn);
    }
}

/// Splice two live cycles into one, re-pointing every member.
pub(crate) fn merge_cycles(first: &Arc<TxnCycle>, second: &Arc<TxnCycle>) {
    if Arc::ptr_eq(first, second) {
        return;
    }
    let mut members = first.members.clone();
    for candidate in &second.members {
        if !members.iter().any(|m| Weak::ptr_eq(m, candidate)) {
            members.push(candidate.clone());
        }
    }
    let merged = Arc::new(TxnCycle { members });
    for env in cycle_members(&merged) {
        let mut state = env.state.lock();
        if state.txn_active() {
            state.txn = Some(merged.clone());
        }
    }
    debug!(members = merged.members.len(), "transactions merged");
}

#[cfg(test)]
#[path = "txn_tests.rs"]
mod tests;
