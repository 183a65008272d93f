//! Waymark API - Shared types and host contract for the Waymark minimap engine.
//!
//! Hosts (a transcript view, a browser content script, a terminal pager) hand
//! the engine an ordered list of [`Anchor`]s and implement the collaborator
//! traits in [`host`]. The engine reports back through [`MinimapEvent`] and
//! per-marker [`MarkerView`]s.

mod anchor;
mod event;
mod host;
mod primitives;

pub use anchor::*;
pub use event::*;
pub use host::*;
pub use primitives::*;
