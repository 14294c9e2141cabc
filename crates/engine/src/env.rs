// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment state shared between the feeder and the service worker.

use crate::driver::DriverTable;
use lcm_core::LcObject;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// A group of environments whose transactions commit or break together.
///
/// A lone transaction is a singleton cycle. Collaboration replaces every
/// member's cycle with the union, so membership tests are pointer equality
/// on the shared allocation.
pub(crate) struct TxnCycle {
    pub members: Vec<Weak<LcEnv>>,
}

/// Shared core of one plugin environment.
///
/// All mutable state lives under `state`. `signal` wakes the service worker
/// after commits and breaks, and once more at shutdown.
pub(crate) struct LcEnv {
    pub state: Mutex<EnvState>,
    pub signal: Condvar,
    /// Self-reference handed out to transaction cycles.
    pub weak: Weak<LcEnv>,
}

pub(crate) struct EnvState {
    /// Committed and staged objects by distinguished name.
    pub objects: HashMap<Arc<str>, LcObject>,
    /// Service order: a time-sorted prefix of soon-firing objects followed
    /// by the unsorted rest.
    pub order: Vec<Arc<str>>,
    /// Current transaction cycle; `None` outside transactions.
    pub txn: Option<Arc<TxnCycle>>,
    /// A broken transaction lingers here until rollback or a failed commit.
    pub aborted: bool,
    /// Cleared exactly once, at close, to end the worker loop.
    pub serviced: bool,
    pub drivers: DriverTable,
}

impl LcEnv {
    pub fn new(drivers: DriverTable) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            state: Mutex::new(EnvState {
                objects: HashMap::new(),
                order: Vec::new(),
                txn: None,
                aborted: false,
                serviced: true,
                drivers,
            }),
            signal: Condvar::new(),
            weak: weak.clone(),
        })
    }
}

impl EnvState {
    pub fn txn_active(&self) -> bool {
        self.txn.is_some()
    }

    /// Insert a fresh object for `dn` at the tail of the service order.
    pub fn insert_object(&mut self, dn: Arc<str>) -> &mut LcObject {
        self.order.push(dn.clone());
        self.objects
            .entry(dn.clone())
            .or_insert_with(|| LcObject::new(dn))
    }

    /// Drop an object together with its service-order entry.
    pub fn remove_object(&mut self, dn: &str) {
        self.objects.remove(dn);
        self.order.retain(|d| &**d != dn);
    }

    /// The head of the service order, when it has an actual timer.
    pub fn head_fire_time(&self) -> Option<i64> {
        let dn = self.order.first()?;
        self.objects.get(dn)?.first_fire().at()
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
