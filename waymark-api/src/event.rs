//! Output types the engine reports to its host.

use serde::{Deserialize, Serialize};

use crate::MarkerId;

/// Events emitted by the minimap to subscribers (presentation layer, host glue).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MinimapEvent {
    /// The "here now" marker changed.
    ActiveChanged { id: MarkerId },

    /// A marker's starred flag was toggled.
    MarkerToggled { id: MarkerId, starred: bool },

    /// Markers were rebuilt from the host's anchor list.
    Rebuilt { version: u64, count: usize },
}

/// What the presentation layer needs to place and style one marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerView {
    pub id: MarkerId,
    /// Index into the marker list.
    pub index: usize,
    /// Normalized position on the track, in `[0, 1]`.
    pub n: f32,
    pub starred: bool,
    pub active: bool,
}
