// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-environment service worker.
//!
//! One thread per environment, started at open and joined at close. Each
//! iteration runs under the environment lock: advance await-events, refresh
//! timers with a bounded partial sort, fire whatever is due into the
//! handler pipes, then sleep until the next timer or a commit signal. While
//! a transaction is staged the worker stays out of the data entirely.
//!
//! Shutdown is cooperative: the close path clears `serviced` under the
//! lock, signals, and joins. The worker is never cancelled from outside.

use crate::env::{EnvState, LcEnv};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Current UNIX time in whole seconds.
pub(crate) fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Start the worker for an environment.
pub(crate) fn start(env: Arc<LcEnv>) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("lcm-service".into())
        .spawn(move || service_main(&env))
}

/// Stop the worker from the close path: clear the flag under the lock,
/// wake the worker, then join it.
pub(crate) fn stop(env: &LcEnv, worker: JoinHandle<()>) {
    {
        let mut state = env.state.lock();
        state.serviced = false;
        env.signal.notify_all();
    }
    if worker.join().is_err() {
        warn!("service worker panicked");
    }
}

fn service_main(env: &LcEnv) {
    let mut state = env.state.lock();
    debug!("service worker started");
    while state.serviced {
        // The feeder owns all objects while a transaction is staged.
        if state.txn_active() {
            env.signal.wait(&mut state);
            continue;
        }
        advance_events(&mut state);
        update_timers(&mut state);
        match state.head_fire_time() {
            Some(fire_at) => {
                let _ = env
                    .signal
                    .wait_until(&mut state, deadline_instant(fire_at));
            }
            None => env.signal.wait(&mut state),
        }
    }
    debug!("service worker stopped");
}

/// Longest single condition wait. Far-future timers wake once per cap and
/// simply wait again; this also keeps the deadline arithmetic in range on
/// every platform.
const MAX_WAIT_SECS: u64 = 30 * 24 * 3600;

fn deadline_instant(fire_at: i64) -> Instant {
    let delay = fire_at.saturating_sub(now_unix()).max(0) as u64;
    Instant::now() + Duration::from_secs(delay.min(MAX_WAIT_SECS))
}

/// Advance every satisfied await. One pass suffices: objects do not
/// exchange events with each other.
fn advance_events(state: &mut EnvState) {
    for obj in state.objects.values_mut() {
        obj.advance_events();
    }
}

/// Refresh fire times, sort the soon-firing objects to the head of the
/// service order, and fire everything due. When firing outlasted the
/// acceptance window the sorted prefix is stale, so the pass restarts
/// against fresh time.
fn update_timers(state: &mut EnvState) {
    let mut now = now_unix();
    loop {
        let window = partial_sort(state, now);
        let after = fire_due(state);
        if after.saturating_sub(now) <= window {
            break;
        }
        now = after;
    }
}

/// One bounded insertion-sort pass. Returns the acceptance window the pass
/// settled on.
///
/// Objects due at `now` or within the window move into a time-ordered head;
/// an object strictly closer than half the window tightens it to twice that
/// object's distance for the rest of the pass. Everything else keeps its
/// position in the tail, which stays unsorted.
fn partial_sort(state: &mut EnvState, now: i64) -> i64 {
    let mut window = i64::MAX;
    let order = std::mem::take(&mut state.order);
    let mut head: Vec<Arc<str>> = Vec::new();
    let mut tail: Vec<Arc<str>> = Vec::new();
    for dn in order {
        let fire = {
            let Some(obj) = state.objects.get_mut(&dn) else {
                continue;
            };
            if obj.first_fire().is_dirty() {
                obj.update_fire_time(now);
            }
            obj.first_fire().at()
        };
        let accept = match fire {
            Some(at) if at <= now => true,
            Some(at) => {
                let future = at - now;
                if future <= window {
                    if future < window / 2 {
                        window = future.saturating_mul(2);
                    }
                    true
                } else {
                    false
                }
            }
            None => false,
        };
        match (accept, fire) {
            (true, Some(at)) => {
                let pos = head.partition_point(|other| {
                    state
                        .objects
                        .get(other)
                        .and_then(|o| o.first_fire().at())
                        .is_some_and(|t| t <= at)
                });
                head.insert(pos, dn);
            }
            _ => tail.push(dn),
        }
    }
    head.extend(tail);
    state.order = head;
    window
}

/// Fire the sorted head for as long as it stays due. Returns the time after
/// the last check, for the caller's window test.
fn fire_due(state: &mut EnvState) -> i64 {
    let mut index = 0;
    let mut now = now_unix();
    while index < state.order.len() {
        now = now_unix();
        let dn = state.order[index].clone();
        let due = state
            .objects
            .get(&dn)
            .is_some_and(|o| o.first_fire().due(now));
        if !due {
            break;
        }
        fire_object(state, &dn, now);
        let still_due = state
            .objects
            .get_mut(&dn)
            .is_some_and(|o| o.update_fire_time(now).due(now));
        if !still_due {
            index += 1;
        }
    }
    now
}

/// Deliver every due timer state of one object.
///
/// A state without a registered handler loses its event: the cursor moves
/// on so the same timer cannot wedge the whole environment.
fn fire_object(state: &mut EnvState, dn: &str, now: i64) {
    let EnvState {
        objects, drivers, ..
    } = state;
    let Some(obj) = objects.get_mut(dn) else {
        return;
    };
    let due = obj.due_state_indices();
    assert!(
        !due.is_empty(),
        "scheduler woke for an object with no due timer"
    );
    for index in due {
        let delivered = {
            let fired = obj.state(index);
            drivers.dispatch(fired.lifecycle_name(), dn, fired.text())
        };
        if delivered {
            obj.note_delivery(index, now);
        } else {
            warn!(
                dn,
                lifecycle = obj.state(index).lifecycle_name(),
                "no handler for life cycle, dropping the timer event"
            );
            obj.advance_state_cursor(index);
        }
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
