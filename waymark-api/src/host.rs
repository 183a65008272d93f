//! Host collaborator traits.
//!
//! The engine is single-threaded and event-driven: the host calls into the
//! minimap when its document changes, and the minimap calls back through
//! these traits. None of them are required to be `Send`.

use thiserror::Error;

use crate::{Anchor, AnchorRef, MarkerView, Rect};

/// Errors raised by a [`KeyValueStore`].
///
/// The engine never propagates these to the host; it logs them and degrades
/// to in-memory state for the rest of the session.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The document being navigated: its anchors and its scrollable viewport.
pub trait HostDocument {
    /// Current anchors, in document order. May be empty while the host is
    /// still loading.
    fn anchors(&self) -> Vec<Anchor>;

    /// Live bounding rect of an anchor relative to the viewport top, if the
    /// host can still resolve it.
    fn anchor_rect(&self, _anchor: AnchorRef) -> Option<Rect> {
        None
    }

    /// Current scroll offset of the host viewport.
    fn scroll_offset(&self) -> f32;

    /// Visible height of the host viewport.
    fn viewport_height(&self) -> f32;

    /// Scroll the host viewport.
    fn set_scroll_offset(&mut self, offset: f32);
}

/// A persistent string key-value store.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Render layer for materialized markers.
///
/// A binding is created when a marker enters the virtualization window,
/// updated in place while it stays inside, and handed back for teardown when
/// it leaves.
pub trait MarkerSurface {
    type Binding;

    fn materialize(&mut self, view: &MarkerView) -> Self::Binding;
    fn update(&mut self, binding: &mut Self::Binding, view: &MarkerView);
    fn teardown(&mut self, binding: Self::Binding);
}
