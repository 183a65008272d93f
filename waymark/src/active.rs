//! Active-Marker Resolver
//!
//! Picks the single marker that represents "here now" and rate-limits changes
//! so fast programmatic or inertial scrolling does not make the highlight
//! flicker.

use std::time::{Duration, Instant};

use waymark_api::MarkerId;

use crate::marker::Marker;

/// Index of the active marker for a reference line.
///
/// The last marker whose anchor top is at or above `reference`; the first
/// marker when none is. `None` only for an empty list.
pub fn resolve_active(markers: &[Marker], reference: f32) -> Option<usize> {
    if markers.is_empty() {
        return None;
    }
    Some(
        markers
            .iter()
            .rposition(|m| m.offset() <= reference)
            .unwrap_or(0),
    )
}

/// Result of proposing a new active candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveUpdate {
    /// The candidate is already active; any pending change was dropped.
    Unchanged,
    /// The change was applied immediately.
    Applied(MarkerId),
    /// The change is held until `until`; call [`ActiveTracker::fire`] then.
    Deferred { until: Instant },
}

/// Hysteresis state for the active marker.
#[derive(Debug, Clone)]
pub struct ActiveTracker {
    current: Option<MarkerId>,
    pending: Option<MarkerId>,
    last_change: Option<Instant>,
    hysteresis: Duration,
}

impl ActiveTracker {
    pub fn new(hysteresis: Duration) -> Self {
        Self {
            current: None,
            pending: None,
            last_change: None,
            hysteresis,
        }
    }

    pub fn current(&self) -> Option<&MarkerId> {
        self.current.as_ref()
    }

    pub fn pending(&self) -> Option<&MarkerId> {
        self.pending.as_ref()
    }

    /// Offer a candidate. Applied at once if the last change is older than the
    /// hysteresis window; otherwise it replaces whatever was pending.
    pub fn propose(&mut self, candidate: MarkerId, now: Instant) -> ActiveUpdate {
        if self.current.as_ref() == Some(&candidate) {
            self.pending = None;
            return ActiveUpdate::Unchanged;
        }

        match self.last_change {
            Some(last) if now.saturating_duration_since(last) < self.hysteresis => {
                self.pending = Some(candidate);
                ActiveUpdate::Deferred {
                    until: last + self.hysteresis,
                }
            }
            _ => {
                self.apply(candidate.clone(), now);
                ActiveUpdate::Applied(candidate)
            }
        }
    }

    /// Apply the pending candidate, if any. Returns it when it changed the
    /// active marker.
    pub fn fire(&mut self, now: Instant) -> Option<MarkerId> {
        let candidate = self.pending.take()?;
        if self.current.as_ref() == Some(&candidate) {
            return None;
        }
        self.apply(candidate.clone(), now);
        Some(candidate)
    }

    /// Forget the active marker (e.g. after a rebuild dropped it).
    pub fn reset(&mut self) {
        self.current = None;
        self.pending = None;
    }

    /// Drop the deferred candidate without touching the active marker.
    pub fn drop_pending(&mut self) {
        self.pending = None;
    }

    fn apply(&mut self, id: MarkerId, now: Instant) {
        self.current = Some(id);
        self.pending = None;
        self.last_change = Some(now);
    }
}
