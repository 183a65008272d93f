//! Scroll Synchronizer
//!
//! Keeps two coordinate spaces consistent:
//!
//! - **main space**: the host document's real scroll range.
//! - **virtual space**: the minimap's own track, `Geometry::content_height`
//!   tall, which scrolls inside the minimap viewport when it is taller.
//!
//! Forward sync (main -> virtual) follows the host's reference line. Dragging
//! the minimap's own scrollbar thumb drives virtual space directly, and while
//! a drag is active forward sync is suppressed so the two never fight.

use crate::geometry::Geometry;

/// An action on the minimap's own scrollbar, produced by event handling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollAction {
    /// Start dragging the thumb at this pointer Y.
    DragStart(f32),
    /// Continue dragging the thumb to this pointer Y.
    DragMove(f32),
    /// End the thumb drag.
    DragEnd,
}

/// Scrollbar geometry of the minimap viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThumbTrack {
    /// Height of the scroll track (the minimap viewport height).
    pub track_height: f32,
    pub thumb_height: f32,
    /// Maximum virtual scroll offset.
    pub max_scroll: f32,
}

impl ThumbTrack {
    /// Track for a viewport showing `viewport_height` of `content_height`.
    pub fn new(viewport_height: f32, content_height: f32, min_thumb: f32) -> Self {
        let max_scroll = (content_height - viewport_height).max(0.0);
        let thumb_height = if content_height > 0.0 {
            (viewport_height * viewport_height / content_height)
                .max(min_thumb)
                .min(viewport_height)
        } else {
            viewport_height
        };
        Self {
            track_height: viewport_height,
            thumb_height,
            max_scroll,
        }
    }

    /// Pixels the thumb can travel.
    pub fn travel(&self) -> f32 {
        (self.track_height - self.thumb_height).max(0.0)
    }

    /// Thumb top for a virtual scroll offset.
    pub fn thumb_y(&self, scroll_offset: f32) -> f32 {
        let travel = self.travel();
        if travel <= 0.0 || self.max_scroll <= 0.0 {
            return 0.0;
        }
        (scroll_offset / self.max_scroll).clamp(0.0, 1.0) * travel
    }
}

/// Viewport of the host document.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MainViewport {
    pub scroll_offset: f32,
    pub height: f32,
}

/// Reference line: the document offset considered "here now".
///
/// Biased above center (`bias` = 0.45 by default) to match reading focus.
pub fn reference_line(main: MainViewport, bias: f32) -> f32 {
    main.scroll_offset + bias * main.height
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Drag {
    start_pointer: f32,
    start_ratio: f32,
}

/// Scroll position of the virtual track plus the drag state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollSync {
    virtual_scroll: f32,
    drag: Option<Drag>,
    bias: f32,
    threshold: f32,
}

impl ScrollSync {
    pub fn new(bias: f32, threshold: f32) -> Self {
        Self {
            virtual_scroll: 0.0,
            drag: None,
            bias,
            threshold,
        }
    }

    pub fn virtual_scroll(&self) -> f32 {
        self.virtual_scroll
    }

    /// Set the virtual scroll directly, clamped into the track.
    pub fn set_virtual_scroll(&mut self, offset: f32, geometry: &Geometry) {
        self.virtual_scroll = offset.clamp(0.0, geometry.max_virtual_scroll());
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn reference(&self, main: MainViewport) -> f32 {
        reference_line(main, self.bias)
    }

    /// Virtual scroll offset matching the host's reference line.
    pub fn forward_target(&self, main: MainViewport, geometry: &Geometry) -> f32 {
        let reference = self.reference(main);
        let ratio = ((reference - geometry.first_anchor_offset) / geometry.content_span)
            .clamp(0.0, 1.0);
        (ratio * geometry.max_virtual_scroll()).round()
    }

    /// Main -> virtual sync.
    ///
    /// Returns the new virtual offset when it moved. Skipped while dragging,
    /// and when the target is within the jitter threshold.
    pub fn sync_forward(&mut self, main: MainViewport, geometry: &Geometry) -> Option<f32> {
        if self.drag.is_some() {
            return None;
        }
        let target = self.forward_target(main, geometry);
        if (target - self.virtual_scroll).abs() <= self.threshold {
            return None;
        }
        self.virtual_scroll = target;
        Some(target)
    }

    /// Apply a scrollbar action. Returns the virtual offset after the action.
    pub fn apply(&mut self, action: ScrollAction, track: &ThumbTrack) -> f32 {
        match action {
            ScrollAction::DragStart(pointer_y) => self.start_drag(pointer_y, track),
            ScrollAction::DragMove(pointer_y) => self.drag_to(pointer_y, track),
            ScrollAction::DragEnd => self.end_drag(),
        }
        self.virtual_scroll
    }

    /// Start a thumb drag at the given pointer Y.
    pub fn start_drag(&mut self, pointer_y: f32, track: &ThumbTrack) {
        let start_ratio = if track.max_scroll > 0.0 {
            (self.virtual_scroll / track.max_scroll).clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.drag = Some(Drag {
            start_pointer: pointer_y,
            start_ratio,
        });
    }

    /// Continue a thumb drag: pointer delta over thumb travel, as a ratio of the
    /// virtual scroll range.
    pub fn drag_to(&mut self, pointer_y: f32, track: &ThumbTrack) {
        let Some(drag) = self.drag else {
            return;
        };
        let travel = track.travel();
        if travel <= 0.0 {
            return;
        }
        let ratio = (drag.start_ratio + (pointer_y - drag.start_pointer) / travel).clamp(0.0, 1.0);
        self.virtual_scroll = ratio * track.max_scroll;
    }

    /// End the thumb drag. Forward sync resumes on the next scroll or resize.
    pub fn end_drag(&mut self) {
        self.drag = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::Marker;
    use waymark_api::{Anchor, AnchorRef, MarkerId};

    /// 300 anchors, 100px apart, on a 400px minimap -> taller virtual track.
    fn main_at(scroll_offset: f32, height: f32) -> MainViewport {
        MainViewport {
            scroll_offset,
            height,
        }
    }

    fn tall_geometry() -> Geometry {
        let mut markers: Vec<Marker> = (0..300)
            .map(|i| {
                Marker::new(
                    MarkerId::new(format!("m{i}")),
                    Anchor::new(AnchorRef(i), 1000.0 + i as f32 * 100.0, "x"),
                )
            })
            .collect();
        Geometry::compute(&mut markers, 400.0, 12.0, 12.0)
    }

    #[test]
    fn forward_maps_reference_line_to_virtual_range() {
        let geometry = tall_geometry();
        assert_eq!(geometry.content_height, 24.0 + 299.0 * 12.0);
        let sync = ScrollSync::new(0.45, 1.0);

        // Reference line above the first anchor clamps to 0.
        let top = main_at(0.0, 1000.0);
        assert_eq!(sync.forward_target(top, &geometry), 0.0);

        // Reference line at the middle of the anchor span.
        let mid = main_at(15_950.0 - 450.0, 1000.0);
        let expected = (0.5 * geometry.max_virtual_scroll()).round();
        assert_eq!(sync.forward_target(mid, &geometry), expected);

        let bottom = main_at(1e9, 1000.0);
        assert_eq!(sync.forward_target(bottom, &geometry), geometry.max_virtual_scroll());
    }

    #[test]
    fn forward_sync_skips_micro_jitter() {
        let geometry = tall_geometry();
        let mut sync = ScrollSync::new(0.45, 1.0);
        let main = main_at(10_000.0, 800.0);
        let first = sync.sync_forward(main, &geometry);
        assert!(first.is_some());

        // A sub-threshold change in the target leaves the track alone.
        let nudged = main_at(10_001.0, 800.0);
        assert_eq!(sync.sync_forward(nudged, &geometry), None);
        assert_eq!(Some(sync.virtual_scroll()), first);
    }

    #[test]
    fn drag_suppresses_forward_sync() {
        let geometry = tall_geometry();
        let track = ThumbTrack::new(400.0, geometry.content_height, 24.0);
        let mut sync = ScrollSync::new(0.45, 1.0);

        sync.apply(ScrollAction::DragStart(10.0), &track);
        assert!(sync.is_dragging());
        let main = main_at(20_000.0, 800.0);
        assert_eq!(sync.sync_forward(main, &geometry), None);
        assert_eq!(sync.virtual_scroll(), 0.0);

        sync.apply(ScrollAction::DragEnd, &track);
        assert!(sync.sync_forward(main, &geometry).is_some());
    }

    #[test]
    fn drag_delta_maps_through_thumb_travel() {
        let geometry = tall_geometry();
        let track = ThumbTrack::new(400.0, geometry.content_height, 24.0);
        let mut sync = ScrollSync::new(0.45, 1.0);

        sync.start_drag(50.0, &track);
        let halfway = 50.0 + track.travel() / 2.0;
        let offset = sync.apply(ScrollAction::DragMove(halfway), &track);
        assert!((offset - track.max_scroll / 2.0).abs() < 1e-2);

        // Dragging past the end clamps.
        let offset = sync.apply(ScrollAction::DragMove(10_000.0), &track);
        assert_eq!(offset, track.max_scroll);
        let offset = sync.apply(ScrollAction::DragMove(-10_000.0), &track);
        assert_eq!(offset, 0.0);
    }

    #[test]
    fn drag_resumes_from_current_position() {
        let geometry = tall_geometry();
        let track = ThumbTrack::new(400.0, geometry.content_height, 24.0);
        let mut sync = ScrollSync::new(0.45, 1.0);
        sync.set_virtual_scroll(track.max_scroll / 4.0, &geometry);

        sync.start_drag(100.0, &track);
        sync.drag_to(100.0, &track);
        assert!((sync.virtual_scroll() - track.max_scroll / 4.0).abs() < 1e-2);
    }

    #[test]
    fn thumb_track_proportions() {
        let track = ThumbTrack::new(400.0, 1600.0, 24.0);
        assert_eq!(track.thumb_height, 100.0);
        assert_eq!(track.travel(), 300.0);
        assert_eq!(track.max_scroll, 1200.0);
        assert_eq!(track.thumb_y(600.0), 150.0);

        let short = ThumbTrack::new(400.0, 400.0, 24.0);
        assert_eq!(short.travel(), 0.0);
        assert_eq!(short.thumb_y(0.0), 0.0);

        let huge = ThumbTrack::new(400.0, 1_000_000.0, 24.0);
        assert_eq!(huge.thumb_height, 24.0);
    }

    #[test]
    fn move_without_drag_is_ignored() {
        let track = ThumbTrack::new(400.0, 1600.0, 24.0);
        let mut sync = ScrollSync::new(0.45, 1.0);
        sync.drag_to(300.0, &track);
        assert_eq!(sync.virtual_scroll(), 0.0);
    }
}
