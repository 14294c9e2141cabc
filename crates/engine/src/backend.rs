// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin entry points for the upstream replication driver.
//!
//! The driver opens one environment per backend instance and feeds it
//! `(distinguishedName, lifecycleState)` forks inside transactions. Every
//! input failure breaks the running transaction: the environment then
//! refuses further changes until the driver resolves it with a rollback or
//! a (failing) commit.

use crate::driver::{DriverError, DriverTable};
use crate::env::{EnvState, LcEnv, TxnCycle};
use crate::{service, txn};
use lcm_core::{der, grammar, StageError};
use parking_lot::MutexGuard;
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;
use tracing::warn;

/// Two DER-encoded attribute values forming one fork of the feed.
#[derive(Debug, Clone, Copy)]
pub struct Fork<'a> {
    pub dn: &'a [u8],
    pub lifecycle_state: &'a [u8],
}

/// Why an environment refused to open.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("exactly two fork variables required, got {0}")]
    VariableCount(usize),
    #[error("at least one name=command driver argument required")]
    NoDrivers,
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error("failed to start service worker: {0}")]
    Worker(#[from] std::io::Error),
}

/// Outcome of [`LifecycleEnv::collaborate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaboration {
    /// Both transactions were live and now commit or break as one.
    Merged,
    /// At least one side was already broken; both now fail together.
    Resolved,
}

enum TxnPhase {
    Active(Arc<TxnCycle>),
    Aborted,
    Idle,
}

/// One plugin environment: the opaque handle the replication driver keeps
/// between calls.
///
/// Dropping the handle closes the environment; [`LifecycleEnv::close`]
/// does the same at a chosen moment.
pub struct LifecycleEnv {
    env: Arc<LcEnv>,
    worker: Option<JoinHandle<()>>,
}

impl LifecycleEnv {
    /// Open an environment.
    ///
    /// `args` follows the plugin convention: `args[0]` names the caller and
    /// every further argument is `name=command`, one per handled life
    /// cycle. `var_count` is the fork width and must be 2 for
    /// distinguishedName plus lifecycleState.
    pub fn open(args: &[String], var_count: usize) -> Result<Self, OpenError> {
        if var_count != 2 {
            return Err(OpenError::VariableCount(var_count));
        }
        let driver_args = args.get(1..).unwrap_or_default();
        if driver_args.is_empty() {
            return Err(OpenError::NoDrivers);
        }
        let drivers = DriverTable::open(driver_args)?;
        let env = LcEnv::new(drivers);
        let worker = service::start(env.clone())?;
        Ok(Self {
            env,
            worker: Some(worker),
        })
    }

    /// Close the environment: break any live transaction, stop the worker,
    /// reap the handlers, drop all objects.
    pub fn close(mut self) {
        self.shutdown();
    }

    /// Stage an addition into the running transaction, opening one when
    /// needed. Failure breaks the transaction.
    pub fn add(&self, fork: Fork<'_>) -> bool {
        self.stage(fork, true)
    }

    /// Stage a deletion into the running transaction, opening one when
    /// needed. The exact pair must be present; failure breaks the
    /// transaction.
    pub fn delete(&self, fork: Fork<'_>) -> bool {
        self.stage(fork, false)
    }

    /// Stage removal of all current data. Requires an active transaction;
    /// additions staged afterwards form the new data set.
    pub fn reset(&self) -> bool {
        let mut state = self.env.state.lock();
        if !state.txn_active() {
            return false;
        }
        for obj in state.objects.values_mut() {
            obj.stage_reset();
        }
        true
    }

    /// Two-phase-commit probe: would a commit succeed right now? Empty
    /// transactions succeed trivially.
    pub fn prepare(&self) -> bool {
        !self.env.state.lock().aborted
    }

    /// Commit the running transaction, including every collaborating
    /// environment. A broken transaction clears its flag and reports
    /// failure; no transaction at all is a trivial success.
    pub fn commit(&self) -> bool {
        let cycle = {
            let mut state = self.env.state.lock();
            if state.aborted {
                state.aborted = false;
                return false;
            }
            match state.txn.clone() {
                None => return true,
                Some(cycle) => cycle,
            }
        };
        txn::commit_cycle(&cycle);
        true
    }

    /// Abandon the running transaction (cycle-wide) and clear this
    /// environment's aborted flag. Idempotent.
    pub fn rollback(&self) {
        let cycle = self.env.state.lock().txn.clone();
        if let Some(cycle) = cycle {
            txn::break_cycle(&cycle);
        }
        self.env.state.lock().aborted = false;
    }

    /// Tie two environments' transactions together so they commit or fail
    /// as one. Both sides must be in a transaction or already broken.
    pub fn collaborate(first: &Self, second: &Self) -> Collaboration {
        match (first.txn_phase(), second.txn_phase()) {
            (TxnPhase::Active(a), TxnPhase::Active(b)) => {
                txn::merge_cycles(&a, &b);
                Collaboration::Merged
            }
            (TxnPhase::Active(a), _) => {
                txn::break_cycle(&a);
                Collaboration::Resolved
            }
            (_, TxnPhase::Active(b)) => {
                txn::break_cycle(&b);
                Collaboration::Resolved
            }
            _ => Collaboration::Resolved,
        }
    }

    /// Distinguished names currently known, in service order.
    pub fn object_names(&self) -> Vec<String> {
        let state = self.env.state.lock();
        state.order.iter().map(|dn| dn.to_string()).collect()
    }

    /// Committed attribute values of one object, in storage order.
    pub fn committed_states_of(&self, dn: &str) -> Vec<String> {
        let state = self.env.state.lock();
        state
            .objects
            .get(dn)
            .map(|obj| {
                obj.committed_states()
                    .map(|s| s.text().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn txn_phase(&self) -> TxnPhase {
        let state = self.env.state.lock();
        if let Some(cycle) = state.txn.clone() {
            TxnPhase::Active(cycle)
        } else if state.aborted {
            TxnPhase::Aborted
        } else {
            warn!("collaboration requested outside a transaction");
            TxnPhase::Idle
        }
    }

    fn stage(&self, fork: Fork<'_>, add: bool) -> bool {
        let mut state = self.env.state.lock();
        if state.aborted {
            return false;
        }
        if !state.txn_active() {
            txn::open(&self.env, &mut state);
        }
        let Some((dn, lcs)) = decode_fork(fork) else {
            return self.fail(state);
        };
        if add && !state.objects.contains_key(dn.as_str()) {
            state.insert_object(Arc::from(dn.as_str()));
        }
        let staged = match state.objects.get_mut(dn.as_str()) {
            Some(obj) if add => obj.stage_add(&lcs),
            Some(obj) => obj.stage_del(&lcs),
            None => Err(StageError::UnknownState),
        };
        match staged {
            Ok(()) => true,
            Err(err) => {
                warn!(dn = %dn, attr = %lcs, %err, "staging failed");
                self.fail(state)
            }
        }
    }

    /// Break the cycle this environment is part of. Consumes the guard:
    /// the break re-locks every member, this one included.
    fn fail(&self, state: MutexGuard<'_, EnvState>) -> bool {
        let cycle = state.txn.clone();
        drop(state);
        if let Some(cycle) = cycle {
            txn::break_cycle(&cycle);
        }
        false
    }

    fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let cycle = self.env.state.lock().txn.clone();
        if let Some(cycle) = cycle {
            txn::break_cycle(&cycle);
        }
        service::stop(&self.env, worker);
        let mut state = self.env.state.lock();
        state.objects.clear();
        state.order.clear();
        state.drivers.close();
    }
}

impl Drop for LifecycleEnv {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Decode and validate both fork values: DER framing, clean ASCII text
/// without NUL or newline, and the attribute grammars.
fn decode_fork(fork: Fork<'_>) -> Option<(String, String)> {
    let dn = text_of(fork.dn)?;
    let lcs = text_of(fork.lifecycle_state)?;
    if !grammar::distinguished_name_ok(&dn) {
        warn!(dn = %dn, "distinguishedName rejected by grammar");
        return None;
    }
    if !grammar::lifecycle_state_ok(&lcs) {
        warn!(attr = %lcs, "lifecycleState rejected by grammar");
        return None;
    }
    Some((dn, lcs))
}

fn text_of(value: &[u8]) -> Option<String> {
    let payload = match der::parse(value) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(%err, "fork value is not a usable DER primitive");
            return None;
        }
    };
    let Ok(text) = std::str::from_utf8(payload) else {
        warn!("fork value is not valid text");
        return None;
    };
    if !text.is_ascii() || text.bytes().any(|b| b == 0 || b == b'\n') {
        warn!("fork value carries forbidden bytes");
        return None;
    }
    Some(text.to_string())
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
