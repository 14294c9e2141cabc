// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A directory object and the life cycles attached to it.

use crate::state::{LcState, NextType, Stage};
use crate::time::FireTime;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Staging failures inside a transaction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StageError {
    #[error("lifecycleState already present on this object")]
    DuplicateState,
    #[error("lifecycleState not present on this object")]
    UnknownState,
}

/// One directory object: a distinguished name with its life cycles.
///
/// The state list keeps feed order. Transactional changes are expressed as
/// [`Stage`] tags on the entries; outside a transaction every entry is
/// committed. `first_fire` caches the earliest timer across the committed
/// states and goes dirty whenever any of them might have changed.
#[derive(Debug)]
pub struct LcObject {
    dn: Arc<str>,
    states: Vec<LcState>,
    first_fire: FireTime,
}

impl LcObject {
    pub fn new(dn: Arc<str>) -> Self {
        Self {
            dn,
            states: Vec::new(),
            first_fire: FireTime::Never,
        }
    }

    pub fn dn(&self) -> &str {
        &self.dn
    }

    pub fn first_fire(&self) -> FireTime {
        self.first_fire
    }

    pub fn states(&self) -> &[LcState] {
        &self.states
    }

    pub fn state(&self, index: usize) -> &LcState {
        &self.states[index]
    }

    /// Committed states, the only ones event propagation and the timer
    /// machinery may look at.
    pub fn committed_states(&self) -> impl Iterator<Item = &LcState> {
        self.states
            .iter()
            .filter(|s| s.stage() == Stage::Committed)
    }

    /// States a running transaction still considers present.
    fn live_states(&self) -> impl Iterator<Item = &LcState> {
        self.states
            .iter()
            .filter(|s| matches!(s.stage(), Stage::Added | Stage::Committed))
    }

    /// Whether any entry carries a staging tag.
    pub fn has_staging(&self) -> bool {
        self.states.iter().any(|s| s.stage() != Stage::Committed)
    }

    /// Queue a new attribute value for addition on commit.
    ///
    /// Doubly adding a value that is already live fails; a value queued for
    /// deletion may be re-added as a fresh entry.
    pub fn stage_add(&mut self, text: &str) -> Result<(), StageError> {
        if self.live_states().any(|s| s.text() == text) {
            return Err(StageError::DuplicateState);
        }
        self.states.push(LcState::new(text, Stage::Added));
        self.first_fire = FireTime::Dirty;
        Ok(())
    }

    /// Queue an existing live attribute value for removal on commit.
    pub fn stage_del(&mut self, text: &str) -> Result<(), StageError> {
        let state = self
            .states
            .iter_mut()
            .find(|s| {
                matches!(s.stage(), Stage::Added | Stage::Committed) && s.text() == text
            })
            .ok_or(StageError::UnknownState)?;
        let removed = match state.stage() {
            Stage::Added => Stage::Retracted,
            _ => Stage::Deleted,
        };
        state.set_stage(removed);
        self.first_fire = FireTime::Dirty;
        Ok(())
    }

    /// Queue every live state for removal (the transaction reset).
    ///
    /// Additions staged after the reset start the new data set.
    pub fn stage_reset(&mut self) {
        for state in &mut self.states {
            match state.stage() {
                Stage::Added => state.set_stage(Stage::Retracted),
                Stage::Committed => state.set_stage(Stage::Deleted),
                Stage::Deleted | Stage::Retracted => {}
            }
        }
        self.first_fire = FireTime::Dirty;
    }

    /// Realise staged changes. Returns `true` when no committed state is
    /// left and the object must be dropped by the caller.
    pub fn apply_commit(&mut self) -> bool {
        self.states
            .retain(|s| matches!(s.stage(), Stage::Added | Stage::Committed));
        for state in &mut self.states {
            state.set_stage(Stage::Committed);
        }
        self.first_fire = FireTime::Dirty;
        self.states.is_empty()
    }

    /// Undo staged changes. Returns `true` when the object only existed for
    /// the duration of the broken transaction.
    pub fn apply_abort(&mut self) -> bool {
        self.states
            .retain(|s| matches!(s.stage(), Stage::Committed | Stage::Deleted));
        for state in &mut self.states {
            state.set_stage(Stage::Committed);
        }
        self.first_fire = FireTime::Dirty;
        self.states.is_empty()
    }

    /// Drain every satisfied await across this object's life cycles.
    ///
    /// Must not run while a transaction is staged on this object: a staged
    /// removal would be acted on before it is decided. A satisfied await
    /// only grows the advancing state's past, so the fixed point arrives
    /// within one pass per consumed token. Idempotent; returns whether
    /// anything advanced.
    pub fn advance_events(&mut self) -> bool {
        let mut advanced = false;
        loop {
            let mut moved = false;
            for i in 0..self.states.len() {
                moved |= self.advance_state(i);
            }
            if !moved {
                break;
            }
            advanced = true;
        }
        advanced
    }

    /// Consume a run of satisfied `name?event` tokens on one state.
    fn advance_state(&mut self, index: usize) -> bool {
        let mut advanced = false;
        loop {
            let satisfied = {
                let state = &self.states[index];
                if state.stage() != Stage::Committed {
                    break;
                }
                let Some((target, event)) = state.await_target() else {
                    break;
                };
                match self
                    .states
                    .iter()
                    .find(|s| s.stage() == Stage::Committed && s.lifecycle_name() == target)
                {
                    // An absent partner never blocks progress.
                    None => {
                        warn!(
                            dn = %self.dn,
                            lifecycle = target,
                            "no matching life cycle, passing await silently"
                        );
                        true
                    }
                    Some(other) => other.passed_event(event),
                }
            };
            if !satisfied {
                break;
            }
            self.advance_state_cursor(index);
            advanced = true;
        }
        advanced
    }

    /// Advance one state's cursor, propagating dirtiness upward when that
    /// state determined the object's fire time.
    pub fn advance_state_cursor(&mut self, index: usize) {
        let prior = self.states[index].advance_cursor();
        if !prior.is_dirty() && prior == self.first_fire {
            self.first_fire = FireTime::Dirty;
        }
    }

    /// Record a handler delivery for one state and push its re-fire out.
    pub fn note_delivery(&mut self, index: usize, now: i64) {
        self.states[index].note_delivery(now);
        self.first_fire = FireTime::Dirty;
    }

    /// Recompute the cached minimum fire time across committed states.
    pub fn update_fire_time(&mut self, now: i64) -> FireTime {
        let mut first = FireTime::Never;
        for state in &mut self.states {
            if state.stage() != Stage::Committed {
                continue;
            }
            let at = if state.next_time().is_dirty() {
                state.compute_fire_time(now)
            } else {
                state.next_time()
            };
            first = first.earlier(at);
        }
        self.first_fire = first;
        first
    }

    /// Committed timer states due at the object's cached fire time.
    ///
    /// Non-empty whenever the cached minimum is an actual timer; the
    /// entries are what a fire pass must deliver.
    pub fn due_state_indices(&self) -> Vec<usize> {
        let Some(deadline) = self.first_fire.at() else {
            return Vec::new();
        };
        self.states
            .iter()
            .enumerate()
            .filter(|(_, s)| {
                s.stage() == Stage::Committed
                    && s.next_type() == NextType::Timer
                    && s.next_time().at().is_some_and(|t| t <= deadline)
            })
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
#[path = "object_tests.rs"]
mod tests;
