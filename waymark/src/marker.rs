//! Markers - the engine's per-anchor state.

use waymark_api::{Anchor, MarkerId, MarkerView};

use crate::identity::normalize_whitespace;

/// Internal representation of one anchor on the minimap track.
///
/// The visual binding is not stored here: it belongs to the render layer and
/// lives in [`crate::virtualize::RenderWindow`] only while the marker is
/// inside the virtualization window.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: MarkerId,
    pub anchor: Anchor,
    /// Whitespace-normalized anchor text, used for tooltips.
    pub summary: String,
    /// Raw normalized position in `[0, 1]`.
    pub base_n: f32,
    /// Position after min-gap adjustment, in `[0, 1]`.
    pub n: f32,
    pub starred: bool,
}

impl Marker {
    pub fn new(id: MarkerId, anchor: Anchor) -> Self {
        let summary = normalize_whitespace(&anchor.text);
        Self {
            id,
            anchor,
            summary,
            base_n: 0.0,
            n: 0.0,
            starred: false,
        }
    }

    /// Offset of the anchor in the host document.
    #[inline]
    pub fn offset(&self) -> f32 {
        self.anchor.offset
    }

    pub fn view(&self, index: usize, active: bool) -> MarkerView {
        MarkerView {
            id: self.id.clone(),
            index,
            n: self.n,
            starred: self.starred,
            active,
        }
    }
}
