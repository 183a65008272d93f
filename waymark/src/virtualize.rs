//! Virtualization Window
//!
//! Only markers near the visible band of the virtual track get a live visual
//! binding. Everything else exists as data only.
//!
//! Render passes are planned against a [`Version`] and applied later; a pass
//! whose version no longer matches (the markers were rebuilt in between) is
//! discarded whole, never partially applied.

use std::collections::BTreeMap;
use std::ops::Range;

use waymark_api::{MarkerSurface, MarkerView};

/// Monotonic marker-set version, bumped on every rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version(pub u64);

impl Version {
    pub fn bump(&mut self) -> Version {
        self.0 += 1;
        *self
    }
}

/// Half-open index range `[start, end)` of materialized markers.
///
/// Empty when `end == start` (the inclusive form would be `end = start - 1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VirtualRange {
    pub start: usize,
    pub end: usize,
}

impl VirtualRange {
    pub const EMPTY: Self = Self { start: 0, end: 0 };

    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }

    /// Last included index.
    pub fn last(&self) -> Option<usize> {
        if self.is_empty() { None } else { Some(self.end - 1) }
    }

    pub fn overlaps(&self, other: &VirtualRange) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }

    pub fn indices(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Buffer kept on each side of the visible band.
pub fn buffer_for(viewport_height: f32, min_buffer: f32) -> f32 {
    viewport_height.max(min_buffer)
}

/// Indices whose track position lies within the visible band plus buffer.
///
/// `y_positions` must be sorted (the geometry model guarantees it), so both
/// bounds are binary searches.
pub fn compute_range(
    scroll_offset: f32,
    viewport_height: f32,
    y_positions: &[f32],
    min_buffer: f32,
) -> VirtualRange {
    let buffer = buffer_for(viewport_height, min_buffer);
    let low = scroll_offset - buffer;
    let high = scroll_offset + viewport_height + buffer;
    let start = y_positions.partition_point(|&y| y < low);
    let end = y_positions.partition_point(|&y| y <= high);
    VirtualRange::new(start, end)
}

/// A planned render pass, tagged with the version it was computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderPass {
    pub version: Version,
    pub range: VirtualRange,
}

/// A pass was planned for an older marker set and was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleRender {
    pub planned: Version,
    pub live: Version,
}

/// What a pass did to the bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffStats {
    pub materialized: usize,
    pub updated: usize,
    pub torn_down: usize,
    /// The pass fell back to clear-and-rebuild.
    pub rebuilt: bool,
}

/// Live visual bindings for the materialized range.
#[derive(Debug)]
pub struct RenderWindow<B> {
    range: VirtualRange,
    bindings: BTreeMap<usize, B>,
}

impl<B> Default for RenderWindow<B> {
    fn default() -> Self {
        Self {
            range: VirtualRange::EMPTY,
            bindings: BTreeMap::new(),
        }
    }
}

impl<B> RenderWindow<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn range(&self) -> VirtualRange {
        self.range
    }

    pub fn binding(&self, index: usize) -> Option<&B> {
        self.bindings.get(&index)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Apply a planned pass if it is still current.
    ///
    /// Indices leaving the range are torn down, new ones materialized, and
    /// ones staying are updated in place. An empty or disjoint previous range
    /// falls back to clear-and-rebuild.
    pub fn apply<S, F>(
        &mut self,
        pass: RenderPass,
        live: Version,
        surface: &mut S,
        view: F,
    ) -> Result<DiffStats, StaleRender>
    where
        S: MarkerSurface<Binding = B>,
        F: Fn(usize) -> MarkerView,
    {
        if pass.version != live {
            return Err(StaleRender {
                planned: pass.version,
                live,
            });
        }

        let previous = self.range;
        let next = pass.range;
        let mut stats = DiffStats::default();

        if previous.is_empty() || !previous.overlaps(&next) {
            stats.torn_down = self.clear(surface);
            for index in next.indices() {
                self.bindings.insert(index, surface.materialize(&view(index)));
                stats.materialized += 1;
            }
            stats.rebuilt = true;
            self.range = next;
            return Ok(stats);
        }

        let leaving: Vec<usize> = self
            .bindings
            .keys()
            .copied()
            .filter(|i| !next.contains(*i))
            .collect();
        for index in leaving {
            if let Some(binding) = self.bindings.remove(&index) {
                surface.teardown(binding);
                stats.torn_down += 1;
            }
        }

        for index in next.indices() {
            match self.bindings.get_mut(&index) {
                Some(binding) => {
                    surface.update(binding, &view(index));
                    stats.updated += 1;
                }
                None => {
                    self.bindings.insert(index, surface.materialize(&view(index)));
                    stats.materialized += 1;
                }
            }
        }

        self.range = next;
        Ok(stats)
    }

    /// Tear down every binding. Returns how many were removed.
    pub fn clear<S>(&mut self, surface: &mut S) -> usize
    where
        S: MarkerSurface<Binding = B>,
    {
        let count = self.bindings.len();
        for (_, binding) in std::mem::take(&mut self.bindings) {
            surface.teardown(binding);
        }
        self.range = VirtualRange::EMPTY;
        count
    }
}
