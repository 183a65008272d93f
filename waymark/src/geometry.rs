//! Geometry Model
//!
//! Maps raw anchor offsets onto the minimap's virtual track.
//!
//! ```text
//! offsets -> base_n in [0,1] -> desired y on the track -> min-gap solver -> n in [0,1]
//! ```
//!
//! The virtual track is at least as tall as the minimap viewport, and tall
//! enough that every marker can sit `min_gap` pixels from its neighbours.
//! The track scrolls (see [`crate::scroll_sync`]) when it outgrows the viewport.

use crate::marker::Marker;

/// Geometry of the virtual track for one marker set.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub track_padding: f32,
    pub min_gap: f32,
    /// Length of the virtual track.
    pub content_height: f32,
    /// Track pixels per document pixel.
    pub scale: f32,
    /// Marker positions on the track, aligned with the marker list.
    /// Non-decreasing.
    pub y_positions: Vec<f32>,
    pub first_anchor_offset: f32,
    /// Distance between the first and last anchor offsets, at least 1.
    pub content_span: f32,
    /// Minimap viewport height the geometry was computed for.
    pub viewport_height: f32,
}

impl Geometry {
    /// Geometry with no markers.
    pub fn empty(viewport_height: f32, track_padding: f32, min_gap: f32) -> Self {
        let content_height = viewport_height.max(2.0 * track_padding);
        Self {
            track_padding,
            min_gap,
            content_height,
            scale: 0.0,
            y_positions: Vec::new(),
            first_anchor_offset: 0.0,
            content_span: 1.0,
            viewport_height,
        }
    }

    /// Compute geometry for `markers`, writing `base_n` and `n` back into them.
    pub fn compute(
        markers: &mut [Marker],
        viewport_height: f32,
        track_padding: f32,
        min_gap: f32,
    ) -> Self {
        if markers.is_empty() {
            return Self::empty(viewport_height, track_padding, min_gap);
        }

        let first = markers[0].offset();
        let last = markers[markers.len() - 1].offset();
        let content_span = if markers.len() < 2 {
            1.0
        } else {
            (last - first).max(1.0)
        };

        for marker in markers.iter_mut() {
            marker.base_n = ((marker.offset() - first) / content_span).clamp(0.0, 1.0);
        }

        let mut geometry = Self {
            track_padding,
            min_gap,
            content_height: 0.0,
            scale: 0.0,
            y_positions: Vec::new(),
            first_anchor_offset: first,
            content_span,
            viewport_height,
        };
        geometry.layout(markers, viewport_height);
        geometry
    }

    /// Re-run the track layout from the cached `base_n` values.
    ///
    /// Used by the settle pass, which re-applies the min-gap solver to absorb
    /// rounding drift.
    pub fn resettle(&mut self, markers: &mut [Marker], viewport_height: f32) {
        self.layout(markers, viewport_height);
    }

    fn layout(&mut self, markers: &mut [Marker], viewport_height: f32) {
        let pad = self.track_padding;
        let count = markers.len();
        let spaced = 2.0 * pad + count.saturating_sub(1) as f32 * self.min_gap;

        self.viewport_height = viewport_height;
        self.content_height = viewport_height.max(spaced).max(2.0 * pad);
        let usable = self.usable();
        self.scale = usable / self.content_span;

        let mut ys: Vec<f32> = markers
            .iter()
            .map(|m| (pad + m.base_n * usable).round())
            .collect();
        solve_min_gap(&mut ys, pad, pad + usable, self.min_gap);

        for (marker, y) in markers.iter_mut().zip(&ys) {
            marker.n = if usable > 0.0 { (y - pad) / usable } else { 0.0 };
        }
        self.y_positions = ys;
    }

    /// Track length available to markers (between the paddings).
    pub fn usable(&self) -> f32 {
        (self.content_height - 2.0 * self.track_padding).max(0.0)
    }

    /// Largest scroll offset of the virtual track inside the minimap viewport.
    pub fn max_virtual_scroll(&self) -> f32 {
        (self.content_height - self.viewport_height).max(0.0)
    }

    /// Track position of a raw document offset (unadjusted by the solver).
    pub fn track_position(&self, offset: f32) -> f32 {
        let ratio = ((offset - self.first_anchor_offset) / self.content_span).clamp(0.0, 1.0);
        self.track_padding + ratio * self.usable()
    }

    pub fn len(&self) -> usize {
        self.y_positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y_positions.is_empty()
    }
}

/// Enforce `ys[i + 1] - ys[i] >= gap` within `[lo, hi]`, preserving order.
///
/// Forward pass pushes markers down; if the last one overflows `hi`, a
/// backward pass pins it to `hi` and pulls predecessors up. A final forward
/// correction handles the first marker being pulled under `lo`. Feasible
/// whenever `hi - lo >= (len - 1) * gap`.
pub fn solve_min_gap(ys: &mut [f32], lo: f32, hi: f32, gap: f32) {
    let count = ys.len();
    if count == 0 {
        return;
    }
    let hi = hi.max(lo);

    ys[0] = ys[0].clamp(lo, hi);
    for i in 1..count {
        ys[i] = ys[i].max(ys[i - 1] + gap);
    }

    if ys[count - 1] > hi {
        ys[count - 1] = hi;
        for i in (0..count - 1).rev() {
            ys[i] = ys[i].min(ys[i + 1] - gap);
        }
        if ys[0] < lo {
            ys[0] = lo;
            for i in 1..count {
                ys[i] = ys[i].max(ys[i - 1] + gap);
            }
        }
    }

    for y in ys.iter_mut() {
        *y = y.clamp(lo, hi);
    }
}
