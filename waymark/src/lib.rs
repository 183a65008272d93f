//! Waymark: minimap navigation engine for long, growing documents.
//!
//! A host hands the engine an ordered list of anchors (offset + text) and the
//! engine keeps a small navigation strip in step with the document:
//! - stable marker ids for anchors without durable identifiers
//! - a min-gap track layout that keeps thousands of markers distinguishable
//! - a bounded working set of rendered markers
//! - two-way scroll synchronization and an anti-flicker "active" marker
//! - deterministic tooltip placement and text fitting
//!
//! # Usage
//!
//! ```ignore
//! use waymark::{Minimap, MinimapConfig, MemoryStore};
//!
//! let (mut minimap, mut events) = Minimap::init(
//!     MinimapConfig::default(),
//!     host,
//!     surface,
//!     Box::new(MemoryStore::new()),
//!     400.0,
//!     Instant::now(),
//! );
//! minimap.on_scroll();
//! minimap.on_frame(Instant::now());
//! ```

// Core model
pub mod config;
pub mod error;
pub mod hash;
pub mod identity;
pub mod marker;

// Track layout and rendering
pub mod geometry;
pub mod virtualize;
pub mod scroll_sync;
pub mod active;
pub mod tooltip;

// State and persistence
pub mod stars;
pub mod store;
pub mod timers;

// Component and async driver
pub mod minimap;
pub mod driver;

// Re-export core types
pub use config::{MinimapConfig, TooltipConfig};
pub use error::WaymarkError;
pub use identity::{Fingerprint, IdentityIndex, fingerprint};
pub use marker::Marker;
pub use geometry::{Geometry, solve_min_gap};
pub use virtualize::{
    DiffStats, RenderPass, RenderWindow, StaleRender, Version, VirtualRange, compute_range,
};
pub use scroll_sync::{MainViewport, ScrollAction, ScrollSync, ThumbTrack, reference_line};
pub use active::{ActiveTracker, ActiveUpdate, resolve_active};
pub use tooltip::{MonospaceMeasure, Side, TextMeasure, TooltipLayout, fit_text, place};
pub use stars::StarredSet;
pub use store::{FileStore, MemoryStore};
pub use timers::{TimerKind, Timers};
pub use minimap::Minimap;
pub use driver::HostSignal;

pub use waymark_api::{
    Anchor, AnchorRef, HostDocument, KeyValueStore, MarkerId, MarkerSurface, MarkerView,
    MinimapEvent, Point, Rect, Role, Size, StoreError,
};
