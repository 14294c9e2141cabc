// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One `lifecycleState` attribute value and its cursor.

use crate::ident::{ident_len, leading_ident};
use crate::time::FireTime;
use tracing::error;

/// Backoff doubling stops here: 2^12 seconds is a little over an hour.
const MAX_BACKOFF_SHIFT: u32 = 12;

/// Transactional tag on a state entry.
///
/// Outside a transaction every state is `Committed`. The tags encode both
/// where a state came from and where it is going, so that commit and abort
/// each resolve in a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Created inside the open transaction; committed on commit, dropped
    /// on abort.
    Added,
    /// Committed before the transaction (or no transaction is open).
    Committed,
    /// Committed before the transaction, queued for removal; dropped on
    /// commit, restored on abort.
    Deleted,
    /// Created and then removed inside the same transaction (or swept by a
    /// reset); gone whichever way the transaction ends.
    Retracted,
}

/// Classification of the token at the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextType {
    /// `name@timestamp` — waits for an absolute time.
    Timer,
    /// `name?event` — waits for an event in a sibling life cycle.
    Await,
    /// `name=value`, or no future token left.
    Done,
}

/// One `lifecycleState` attribute value.
///
/// The text is kept exactly as fed from the directory. The cursor is the
/// byte offset of the first future token, just past the `" . "` separator;
/// it only ever moves forward. Progress that matters durably is made by the
/// external handler rewriting the attribute, which replaces this value
/// wholesale.
#[derive(Debug)]
pub struct LcState {
    text: Box<str>,
    next_offset: usize,
    next_type: NextType,
    next_time: FireTime,
    missed: u8,
    stage: Stage,
}

fn classify(token: &str) -> NextType {
    match token.as_bytes().get(ident_len(token)) {
        Some(b'@') => NextType::Timer,
        Some(b'?') => NextType::Await,
        _ => NextType::Done,
    }
}

impl LcState {
    /// Parse an attribute value and position the cursor after the dot.
    ///
    /// A value ending in `" ."` has nothing left to do. A value without any
    /// dot separator is accepted but inert: the flaw is logged and the
    /// state classifies as done.
    pub fn new(text: &str, stage: Stage) -> Self {
        let (next_offset, next_type) = match text.find(" . ") {
            Some(dot) => {
                let offset = dot + 3;
                (offset, classify(&text[offset..]))
            }
            None if text.ends_with(" .") => (text.len(), NextType::Done),
            None => {
                error!(attr = text, "lifecycleState without internal dot");
                (text.len(), NextType::Done)
            }
        };
        Self {
            text: text.into(),
            next_offset,
            next_type,
            next_time: FireTime::Dirty,
            missed: 0,
            stage,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The process name: the attribute's leading identifier.
    pub fn lifecycle_name(&self) -> &str {
        leading_ident(&self.text)
    }

    pub fn next_type(&self) -> NextType {
        self.next_type
    }

    pub fn next_time(&self) -> FireTime {
        self.next_time
    }

    pub fn missed(&self) -> u8 {
        self.missed
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
    }

    /// The token at the cursor, if any future token remains.
    pub fn next_token(&self) -> Option<&str> {
        let rest = &self.text[self.next_offset..];
        if rest.is_empty() {
            None
        } else {
            rest.split(' ').next().filter(|tok| !tok.is_empty())
        }
    }

    /// The `(life cycle, event)` pair of an await cursor token.
    pub fn await_target(&self) -> Option<(&str, &str)> {
        if self.next_type != NextType::Await {
            return None;
        }
        let (name, event) = self.next_token()?.split_once('?')?;
        Some((name, leading_ident(event)))
    }

    /// Whether `event` already occurred among this state's past tokens.
    ///
    /// Past tokens are everything between the lifecycle name and the dot;
    /// matching is on the token's leading identifier only, so `go@123`
    /// counts as an occurrence of `go`.
    pub fn passed_event(&self, event: &str) -> bool {
        self.past_tokens().any(|tok| leading_ident(tok) == event)
    }

    fn past_tokens(&self) -> impl Iterator<Item = &str> {
        self.text[..self.next_offset]
            .split(' ')
            .skip(1)
            .take_while(|tok| *tok != ".")
            .filter(|tok| !tok.is_empty())
    }

    /// Move the cursor past one token and reclassify.
    ///
    /// Returns the previously cached fire time so the owning object can
    /// propagate dirtiness when this state determined its minimum.
    pub fn advance_cursor(&mut self) -> FireTime {
        let prior = self.next_time;
        let rest = &self.text[self.next_offset..];
        self.next_offset = match rest.find(' ') {
            Some(sp) => self.next_offset + sp + 1,
            None => self.text.len(),
        };
        self.next_type = classify(&self.text[self.next_offset..]);
        self.next_time = FireTime::Dirty;
        prior
    }

    /// Recompute the cached fire time for the cursor token.
    ///
    /// Timer tokens with no timestamp, or a literal `0`, fire at `now`.
    /// Timestamps beyond the signed 64-bit range are unusable: logged, and
    /// the state never fires.
    pub fn compute_fire_time(&mut self, now: i64) -> FireTime {
        let computed = match self.timer_stamp() {
            None => FireTime::Never,
            Some("") => FireTime::At(now),
            Some(digits) => match digits.parse::<i64>() {
                Ok(0) => FireTime::At(now),
                Ok(at) => FireTime::At(at),
                Err(_) => {
                    error!(stamp = digits, "timestamp out of bounds");
                    FireTime::Never
                }
            },
        };
        self.next_time = computed;
        computed
    }

    /// The digit run after `@` of a timer cursor token, if this is one.
    fn timer_stamp(&self) -> Option<&str> {
        if self.next_type != NextType::Timer {
            return None;
        }
        let (_, stamp) = self.next_token()?.split_once('@')?;
        let digits = stamp.bytes().take_while(u8::is_ascii_digit).count();
        Some(&stamp[..digits])
    }

    /// Record a delivery to the external handler and push the next attempt
    /// out.
    ///
    /// Each delivery without a directory update doubles the re-fire delay;
    /// an update replaces this value wholesale and so starts over at zero.
    /// The first delivery waits one second before assuming it was missed.
    pub fn note_delivery(&mut self, now: i64) {
        self.missed = self.missed.saturating_add(1);
        let shift = u32::from(self.missed - 1).min(MAX_BACKOFF_SHIFT);
        self.next_time = FireTime::At(now.saturating_add(1 << shift));
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
