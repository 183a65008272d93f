//! Timers owned by one minimap instance.
//!
//! Deadlines are plain `Instant`s; whoever drives the minimap (the tokio
//! driver, or a host's own event loop) sleeps until [`Timers::next_deadline`]
//! and then polls. Teardown cancels the whole set.

use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Debounced rebuild after a structural change.
    Rebuild,
    /// Retry while the host has no anchors yet.
    EmptyRetry,
    /// Min-gap settle pass after the last resize.
    Settle,
    /// Debounced identity index flush.
    Persist,
    /// Deferred active-marker change.
    ActivePending,
}

#[derive(Debug, Default)]
pub struct Timers {
    deadlines: HashMap<TimerKind, Instant>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer, replacing any existing deadline (debounce).
    pub fn schedule(&mut self, kind: TimerKind, at: Instant) {
        self.deadlines.insert(kind, at);
    }

    /// Arm a timer only if it is not already pending (coalesce).
    /// Returns whether it was armed.
    pub fn schedule_if_idle(&mut self, kind: TimerKind, at: Instant) -> bool {
        if self.deadlines.contains_key(&kind) {
            return false;
        }
        self.deadlines.insert(kind, at);
        true
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        self.deadlines.remove(&kind);
    }

    pub fn cancel_all(&mut self) {
        self.deadlines.clear();
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.deadlines.contains_key(&kind)
    }

    pub fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        self.deadlines.get(&kind).copied()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Disarm and return every timer due at `now`, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<TimerKind> {
        let mut due: Vec<(Instant, TimerKind)> = self
            .deadlines
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(kind, at)| (*at, *kind))
            .collect();
        due.sort_by_key(|(at, _)| *at);
        for (_, kind) in &due {
            self.deadlines.remove(kind);
        }
        due.into_iter().map(|(_, kind)| kind).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}
