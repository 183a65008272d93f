//! The minimap component.
//!
//! One `Minimap` per host document. It owns the marker list, geometry, the
//! virtualization window, scroll and active-marker state, and every timer.
//! All entry points run on the host's event loop; time-dependent ones take
//! `now` so the caller (or the tokio driver) owns the clock.

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::broadcast;
use waymark_api::{
    AnchorRef, HostDocument, KeyValueStore, MarkerId, MarkerSurface, MarkerView, MinimapEvent,
    Rect, Size, StoreError,
};

use crate::active::{ActiveTracker, ActiveUpdate, resolve_active};
use crate::config::MinimapConfig;
use crate::error::WaymarkError;
use crate::geometry::Geometry;
use crate::identity::IdentityIndex;
use crate::marker::Marker;
use crate::scroll_sync::{MainViewport, ScrollAction, ScrollSync, ThumbTrack};
use crate::stars::StarredSet;
use crate::timers::{TimerKind, Timers};
use crate::tooltip::{TextMeasure, TooltipLayout, place};
use crate::virtualize::{DiffStats, RenderPass, RenderWindow, StaleRender, Version, compute_range};

const EVENT_CAPACITY: usize = 256;

/// Minimap over a host document `H`, rendering through surface `R`.
pub struct Minimap<H: HostDocument, R: MarkerSurface> {
    config: MinimapConfig,
    host: H,
    surface: R,
    /// `None` once a write failed: the rest of the session is in-memory only.
    store: Option<Box<dyn KeyValueStore>>,
    identity: IdentityIndex,
    stars: StarredSet,
    markers: Vec<Marker>,
    geometry: Geometry,
    sync: ScrollSync,
    window: RenderWindow<R::Binding>,
    version: Version,
    active: ActiveTracker,
    timers: Timers,
    minimap_height: f32,
    scroll_pending: bool,
    event_tx: Option<broadcast::Sender<MinimapEvent>>,
}

impl<H: HostDocument, R: MarkerSurface> Minimap<H, R> {
    /// Create a minimap, seed identity and stars from `store`, and run the
    /// first rebuild.
    pub fn init(
        config: MinimapConfig,
        host: H,
        surface: R,
        store: Box<dyn KeyValueStore>,
        minimap_height: f32,
        now: Instant,
    ) -> (Self, broadcast::Receiver<MinimapEvent>) {
        let (event_tx, event_rx) = broadcast::channel(EVENT_CAPACITY);

        let identity = IdentityIndex::load(
            &*store,
            &config.identity_key(),
            config.conversation_key.clone(),
            config.fingerprint_map_limit,
        );
        let stars = StarredSet::load(&*store, &config.stars_key());

        let mut minimap = Self {
            geometry: Geometry::empty(minimap_height, config.track_padding, config.min_gap),
            sync: ScrollSync::new(config.reference_bias, config.sync_threshold),
            active: ActiveTracker::new(config.active_hysteresis()),
            config,
            host,
            surface,
            store: Some(store),
            identity,
            stars,
            markers: Vec::new(),
            window: RenderWindow::new(),
            version: Version::default(),
            timers: Timers::new(),
            minimap_height,
            scroll_pending: false,
            event_tx: Some(event_tx),
        };

        tracing::info!(
            "Minimap initialized for conversation {}",
            minimap.config.conversation_key
        );
        minimap.rebuild(now);
        (minimap, event_rx)
    }

    /// Another receiver for minimap events. `None` after teardown.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<MinimapEvent>> {
        self.event_tx.as_ref().map(|tx| tx.subscribe())
    }

    pub fn is_torn_down(&self) -> bool {
        self.event_tx.is_none()
    }

    // ------------------------------------------------------------------
    // Host notifications
    // ------------------------------------------------------------------

    /// The host's anchor list changed. Rebuilds are coalesced: one pending
    /// rebuild absorbs every change until it fires.
    pub fn on_structure_changed(&mut self, now: Instant) {
        if self.is_torn_down() {
            return;
        }
        self.timers
            .schedule_if_idle(TimerKind::Rebuild, now + self.config.rebuild_debounce());
    }

    /// The minimap viewport was resized. Anchor offsets are re-read from the
    /// host (a resize reflows the document), geometry is recomputed right
    /// away and a settle pass is scheduled after the last resize.
    pub fn on_resize(&mut self, minimap_height: f32, now: Instant) {
        if self.is_torn_down() {
            return;
        }
        self.minimap_height = minimap_height;
        self.reread_offsets(now);
        self.geometry = Geometry::compute(
            &mut self.markers,
            minimap_height,
            self.config.track_padding,
            self.config.min_gap,
        );
        self.sync
            .set_virtual_scroll(self.sync.virtual_scroll(), &self.geometry);
        self.timers
            .schedule(TimerKind::Settle, now + self.config.settle_delay());
        self.sync_pass(now);
    }

    /// The host scrolled. The sync pass runs on the next frame, so any number
    /// of scroll events between frames cost one pass.
    pub fn on_scroll(&mut self) {
        if self.is_torn_down() {
            return;
        }
        self.scroll_pending = true;
    }

    /// Display refresh: run the pending sync pass, if any.
    pub fn on_frame(&mut self, now: Instant) {
        if !self.scroll_pending || self.is_torn_down() {
            return;
        }
        self.scroll_pending = false;
        self.sync_pass(now);
    }

    pub fn is_scroll_pending(&self) -> bool {
        self.scroll_pending
    }

    /// Pointer pressed on the minimap's own scrollbar thumb.
    pub fn drag_start(&mut self, pointer_y: f32) {
        self.scroll_action(ScrollAction::DragStart(pointer_y));
    }

    pub fn drag_move(&mut self, pointer_y: f32) {
        self.scroll_action(ScrollAction::DragMove(pointer_y));
    }

    /// Forward sync resumes with the next scroll or resize.
    pub fn drag_end(&mut self) {
        self.scroll_action(ScrollAction::DragEnd);
    }

    fn scroll_action(&mut self, action: ScrollAction) {
        if self.is_torn_down() {
            return;
        }
        let track = self.thumb_track();
        let before = self.sync.virtual_scroll();
        let after = self.sync.apply(action, &track);
        if after != before {
            self.refresh();
        }
    }

    /// Fire every timer due at `now`.
    pub fn poll(&mut self, now: Instant) {
        if self.is_torn_down() {
            return;
        }
        for kind in self.timers.take_due(now) {
            match kind {
                TimerKind::Rebuild | TimerKind::EmptyRetry => self.rebuild(now),
                TimerKind::Settle => {
                    self.geometry
                        .resettle(&mut self.markers, self.minimap_height);
                    self.refresh();
                }
                TimerKind::Persist => self.flush_identity(),
                TimerKind::ActivePending => {
                    if let Some(id) = self.active.fire(now) {
                        self.emit(MinimapEvent::ActiveChanged { id });
                        self.refresh();
                    }
                }
            }
        }
    }

    /// Earliest armed timer, for the caller's sleep.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn is_timer_pending(&self, kind: TimerKind) -> bool {
        self.timers.is_pending(kind)
    }

    // ------------------------------------------------------------------
    // Rebuild and render
    // ------------------------------------------------------------------

    /// Rebuild markers from the host's current anchors.
    ///
    /// With no anchors yet, the minimap stays empty and retries on a timer
    /// until anchors appear or the minimap is torn down.
    pub fn rebuild(&mut self, now: Instant) {
        if self.is_torn_down() {
            return;
        }
        let anchors = self.host.anchors();
        let version = self.version.bump();
        self.timers.cancel(TimerKind::Rebuild);

        if anchors.is_empty() {
            self.markers.clear();
            self.geometry = Geometry::empty(
                self.minimap_height,
                self.config.track_padding,
                self.config.min_gap,
            );
            self.window.clear(&mut self.surface);
            self.active.reset();
            self.timers.cancel(TimerKind::ActivePending);
            self.timers
                .schedule(TimerKind::EmptyRetry, now + self.config.empty_retry());
            tracing::debug!("No anchors yet, retrying");
            self.emit(MinimapEvent::Rebuilt {
                version: version.0,
                count: 0,
            });
            return;
        }
        self.timers.cancel(TimerKind::EmptyRetry);

        let ids = self.identity.resolve_all(&anchors);
        self.markers = ids
            .into_iter()
            .zip(anchors)
            .map(|(id, anchor)| {
                let mut marker = Marker::new(id, anchor);
                marker.starred = self.stars.contains(&marker.id);
                marker
            })
            .collect();
        if self.identity.is_dirty() {
            self.timers
                .schedule(TimerKind::Persist, now + self.config.persist_debounce());
        }

        self.geometry = Geometry::compute(
            &mut self.markers,
            self.minimap_height,
            self.config.track_padding,
            self.config.min_gap,
        );
        self.sync
            .set_virtual_scroll(self.sync.virtual_scroll(), &self.geometry);

        let present = |id: &MarkerId| self.markers.iter().any(|m| &m.id == id);
        if !self.active.current().is_none_or(present) {
            self.active.reset();
            self.timers.cancel(TimerKind::ActivePending);
        } else if !self.active.pending().is_none_or(present) {
            self.active.drop_pending();
            self.timers.cancel(TimerKind::ActivePending);
        }

        let count = self.markers.len();
        tracing::debug!("Rebuilt {} markers (version {})", count, version.0);
        self.emit(MinimapEvent::Rebuilt {
            version: version.0,
            count,
        });
        self.sync_pass(now);
    }

    /// Refresh each marker's offset from the host's current anchors, keeping
    /// ids and the marker list as they are. Anchors the host no longer has,
    /// or new ones, leave a rebuild pending.
    fn reread_offsets(&mut self, now: Instant) {
        let offsets: HashMap<AnchorRef, f32> = self
            .host
            .anchors()
            .into_iter()
            .map(|anchor| (anchor.anchor_ref, anchor.offset))
            .collect();

        let mut matched = 0;
        for marker in &mut self.markers {
            if let Some(&offset) = offsets.get(&marker.anchor.anchor_ref) {
                marker.anchor.offset = offset;
                matched += 1;
            }
        }
        if matched != self.markers.len() || offsets.len() != self.markers.len() {
            tracing::debug!("Anchor set changed during resize, scheduling rebuild");
            self.timers
                .schedule_if_idle(TimerKind::Rebuild, now + self.config.rebuild_debounce());
        }
    }

    /// Plan a render pass for the current virtual scroll position.
    pub fn plan_render(&self) -> RenderPass {
        RenderPass {
            version: self.version,
            range: compute_range(
                self.sync.virtual_scroll(),
                self.minimap_height,
                &self.geometry.y_positions,
                self.config.min_buffer,
            ),
        }
    }

    /// Apply a planned pass. A pass planned before the last rebuild is
    /// rejected without touching any binding.
    pub fn apply_render(&mut self, pass: RenderPass) -> Result<DiffStats, StaleRender> {
        let markers = &self.markers;
        let active = self.active.current();
        self.window
            .apply(pass, self.version, &mut self.surface, |index| {
                let marker = &markers[index];
                marker.view(index, active == Some(&marker.id))
            })
    }

    fn refresh(&mut self) {
        let pass = self.plan_render();
        if let Err(stale) = self.apply_render(pass) {
            tracing::debug!(
                "Dropped stale render pass (planned {}, live {})",
                stale.planned.0,
                stale.live.0
            );
        }
    }

    fn main_viewport(&self) -> MainViewport {
        MainViewport {
            scroll_offset: self.host.scroll_offset(),
            height: self.host.viewport_height(),
        }
    }

    /// Forward sync, active marker, render.
    fn sync_pass(&mut self, now: Instant) {
        let main = self.main_viewport();
        self.sync.sync_forward(main, &self.geometry);
        self.update_active(main, now);
        self.refresh();
    }

    fn update_active(&mut self, main: MainViewport, now: Instant) {
        let reference = self.sync.reference(main);
        let Some(index) = resolve_active(&self.markers, reference) else {
            return;
        };
        let candidate = self.markers[index].id.clone();
        match self.active.propose(candidate, now) {
            ActiveUpdate::Unchanged => self.timers.cancel(TimerKind::ActivePending),
            ActiveUpdate::Applied(id) => {
                self.timers.cancel(TimerKind::ActivePending);
                self.emit(MinimapEvent::ActiveChanged { id });
            }
            ActiveUpdate::Deferred { until } => {
                self.timers.schedule(TimerKind::ActivePending, until);
            }
        }
    }

    // ------------------------------------------------------------------
    // Interaction
    // ------------------------------------------------------------------

    fn ensure_live(&self) -> Result<(), WaymarkError> {
        if self.is_torn_down() {
            Err(WaymarkError::TornDown)
        } else {
            Ok(())
        }
    }

    fn index_of(&self, id: &MarkerId) -> Result<usize, WaymarkError> {
        self.markers
            .iter()
            .position(|m| &m.id == id)
            .ok_or_else(|| WaymarkError::UnknownMarker(id.to_string()))
    }

    /// Flip a marker's starred flag and persist the set. Returns the new flag.
    pub fn toggle_star(&mut self, id: &MarkerId) -> Result<bool, WaymarkError> {
        self.ensure_live()?;
        let index = self.index_of(id)?;
        let starred = self.stars.toggle(id);
        self.markers[index].starred = starred;
        self.persist_stars();
        self.emit(MinimapEvent::MarkerToggled {
            id: id.clone(),
            starred,
        });
        self.refresh();
        Ok(starred)
    }

    /// Scroll the host to a marker's anchor. Returns the offset applied.
    ///
    /// Uses the anchor's live rect when the host can still resolve it,
    /// otherwise the offset captured at the last rebuild.
    pub fn jump_to(&mut self, id: &MarkerId) -> Result<f32, WaymarkError> {
        self.ensure_live()?;
        let index = self.index_of(id)?;
        let anchor = &self.markers[index].anchor;
        let top = match self.host.anchor_rect(anchor.anchor_ref) {
            Some(rect) => self.host.scroll_offset() + rect.y,
            None => anchor.offset,
        };
        let target = (top - self.config.jump_margin).max(0.0);
        self.host.set_scroll_offset(target);
        self.scroll_pending = true;
        Ok(target)
    }

    /// Jump `step` markers away from the active one, clamped to the ends.
    /// Returns the marker jumped to, or `None` when there are no markers.
    pub fn jump_relative(&mut self, step: isize) -> Result<Option<MarkerId>, WaymarkError> {
        self.ensure_live()?;
        if self.markers.is_empty() {
            return Ok(None);
        }
        let current = match self.active.current() {
            Some(id) => self.index_of(id)?,
            None => {
                let reference = self.sync.reference(self.main_viewport());
                resolve_active(&self.markers, reference).unwrap_or(0)
            }
        };
        let last = self.markers.len() - 1;
        let target = current.saturating_add_signed(step).min(last);
        let id = self.markers[target].id.clone();
        self.jump_to(&id)?;
        Ok(Some(id))
    }

    /// Tooltip layout for a marker hovered or focused at `anchor_rect`.
    pub fn tooltip(
        &self,
        id: &MarkerId,
        anchor_rect: Rect,
        viewport: Size,
        measure: &dyn TextMeasure,
    ) -> Result<TooltipLayout, WaymarkError> {
        self.ensure_live()?;
        let index = self.index_of(id)?;
        Ok(place(
            anchor_rect,
            viewport,
            &self.markers[index].summary,
            measure,
            &self.config.tooltip,
        ))
    }

    /// Views of the materialized markers, in order.
    pub fn marker_views(&self) -> Vec<MarkerView> {
        let active = self.active.current();
        self.window
            .range()
            .indices()
            .filter_map(|index| {
                let marker = self.markers.get(index)?;
                Some(marker.view(index, active == Some(&marker.id)))
            })
            .collect()
    }

    /// Scrollbar geometry of the minimap viewport.
    pub fn thumb_track(&self) -> ThumbTrack {
        ThumbTrack::new(
            self.minimap_height,
            self.geometry.content_height,
            self.config.min_thumb_height,
        )
    }

    /// The host's visible band on the virtual track, as `(top, bottom)`.
    pub fn viewport_indicator(&self) -> Option<(f32, f32)> {
        if self.markers.is_empty() {
            return None;
        }
        let main = self.main_viewport();
        let top = self.geometry.track_position(main.scroll_offset);
        let bottom = self
            .geometry
            .track_position(main.scroll_offset + main.height);
        Some((top, bottom))
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    fn flush_identity(&mut self) {
        let key = self.config.identity_key();
        let Some(store) = self.store.as_mut() else {
            return;
        };
        if let Err(e) = self.identity.flush(&mut **store, &key) {
            self.degrade(e);
        }
    }

    fn persist_stars(&mut self) {
        let key = self.config.stars_key();
        let Some(store) = self.store.as_mut() else {
            return;
        };
        if let Err(e) = self.stars.save(&mut **store, &key) {
            self.degrade(e);
        }
    }

    fn degrade(&mut self, error: StoreError) {
        tracing::warn!(
            "Minimap persistence failed, keeping state in memory for this session: {}",
            error
        );
        self.store = None;
    }

    pub fn is_persistence_degraded(&self) -> bool {
        self.store.is_none()
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Cancel timers, flush the identity index now, release every binding and
    /// close the event channel. Later notifications are ignored and later
    /// operations return [`WaymarkError::TornDown`].
    pub fn teardown(&mut self) {
        if self.is_torn_down() {
            return;
        }
        self.timers.cancel_all();
        self.flush_identity();
        let released = self.window.clear(&mut self.surface);
        self.scroll_pending = false;
        self.event_tx = None;
        tracing::info!("Minimap torn down ({} bindings released)", released);
    }

    fn emit(&self, event: MinimapEvent) {
        if let Some(tx) = &self.event_tx {
            // No receivers is fine.
            let _ = tx.send(event);
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn config(&self) -> &MinimapConfig {
        &self.config
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn active_id(&self) -> Option<&MarkerId> {
        self.active.current()
    }

    pub fn virtual_scroll(&self) -> f32 {
        self.sync.virtual_scroll()
    }

    pub fn is_dragging(&self) -> bool {
        self.sync.is_dragging()
    }

    pub fn identity(&self) -> &IdentityIndex {
        &self.identity
    }

    pub fn stars(&self) -> &StarredSet {
        &self.stars
    }

    pub fn window(&self) -> &RenderWindow<R::Binding> {
        &self.window
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn surface(&self) -> &R {
        &self.surface
    }

    pub fn minimap_height(&self) -> f32 {
        self.minimap_height
    }
}
