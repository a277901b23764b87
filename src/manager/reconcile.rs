//! Viewport reconciliation and the map event state machine.

use super::ClusterManager;
use crate::schedule::{Debounce, ReclusterScope};
use crate::viewport::{MapViewport, geobox_in_bounds, padded_bounds};
use std::time::{Duration, Instant};

/// Attachment, drag and debounce state of the manager.
#[derive(Debug, Default)]
pub(crate) struct ViewportState {
    attached: bool,
    dragging: bool,
    move_timer: Debounce,
    recluster_timer: Debounce,
    pending: Option<ReclusterScope>,
}

impl ViewportState {
    pub fn attached(attached: bool) -> Self {
        Self {
            attached,
            ..Self::default()
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Union `scope` into the pending recluster and restart its timer. Before
    /// attachment the scope is only remembered.
    pub fn request_recluster(&mut self, scope: ReclusterScope, now: Instant, delay: Duration) {
        self.pending = Some(match self.pending.take() {
            Some(pending) => pending.merge(scope),
            None => scope,
        });
        if self.attached {
            self.recluster_timer.schedule(now, delay);
        }
    }
}

impl<V: MapViewport> ClusterManager<V> {
    /// Reconcile rendered markers with the padded viewport at the active
    /// precision.
    ///
    /// Cells in view show their representative, or each non-hidden member
    /// when they have none; cells out of view are un-rendered. A second call
    /// without intervening changes flips nothing.
    pub fn update_markers(&mut self) {
        let Some(bounds) = self.viewport.bounds() else {
            log::debug!("viewport has no bounds yet, skipping reconcile");
            return;
        };
        let padded = padded_bounds(
            &bounds,
            self.config.padding,
            self.viewport.zoom(),
            self.viewport.projection(),
        );

        let Self {
            index,
            markers,
            categories,
            precision,
            ..
        } = self;
        let Some(level) = index.level(*precision) else {
            return;
        };

        for (category, cells) in level {
            let counts = categories.entry(category.clone()).or_default();
            for (key, cell) in cells {
                let in_view = geobox_in_bounds(key, &padded);
                match (in_view, cell.representative()) {
                    (true, Some(representative)) => {
                        let waiting = markers
                            .meta(representative)
                            .is_some_and(|meta| !meta.hidden && !meta.visible);
                        if waiting {
                            for member in cell.members() {
                                let hidden = markers.meta(member.id).is_some_and(|meta| meta.hidden);
                                markers.set_visible(member.id, !hidden);
                            }
                            markers.show(representative, counts);
                        }
                    }
                    (true, None) => {
                        for member in cell.members() {
                            let waiting = markers
                                .meta(member.id)
                                .is_some_and(|meta| !meta.hidden && !meta.visible);
                            if waiting {
                                markers.show(member.id, counts);
                            }
                        }
                    }
                    (false, Some(representative)) => {
                        markers.hide(representative, counts);
                        for member in cell.members() {
                            markers.set_visible(member.id, false);
                        }
                    }
                    (false, None) => {
                        for member in cell.members() {
                            markers.hide(member.id, counts);
                        }
                    }
                }
            }
        }
    }

    /// The host finished attaching the overlay to its map.
    ///
    /// Show/hide requests made before attachment are scheduled now, and the
    /// current viewport is reconciled.
    pub fn on_attached(&mut self, now: Instant) {
        self.state.attached = true;
        if self.state.pending.is_some() {
            self.state
                .recluster_timer
                .schedule(now, self.config.recluster_debounce());
        }
        self.update_markers();
    }

    pub fn is_attached(&self) -> bool {
        self.state.attached
    }

    /// A drag gesture started: pending move reconciliation is cancelled until
    /// the drag ends.
    pub fn on_drag_start(&mut self) {
        self.state.dragging = true;
        self.state.move_timer.cancel();
    }

    pub fn on_drag_end(&mut self, now: Instant) {
        self.state.dragging = false;
        self.on_move_end(now);
    }

    /// The map center moved. Ignored while dragging.
    pub fn on_center_changed(&mut self, now: Instant) {
        if !self.state.dragging {
            self.on_move_end(now);
        }
    }

    pub fn on_zoom_changed(&mut self, now: Instant) {
        self.on_move_end(now);
    }

    /// Switch precision right away when the zoom maps to a new one, otherwise
    /// debounce a reconcile. While dragging the reconcile waits for the drag
    /// to end.
    fn on_move_end(&mut self, now: Instant) {
        self.state.move_timer.cancel();
        let target = self.zoom_to_precision(self.viewport.zoom());
        let valid = usize::try_from(target)
            .is_ok_and(|target| target <= crate::geohash::MAX_PRECISION);
        if valid && usize::try_from(target).ok() != Some(self.precision) {
            self.set_precision(target);
        } else if !self.state.dragging {
            self.state
                .move_timer
                .schedule(now, self.config.move_debounce());
        }
    }

    /// Run the debounced work that is due at `now`. Returns whether anything ran.
    pub fn poll(&mut self, now: Instant) -> bool {
        let mut ran = false;

        if self.state.recluster_timer.fire_if_due(now) {
            log::debug!("debounced recluster fired: {:?}", self.state.pending);
            match self.state.pending.take() {
                Some(ReclusterScope::All) | None => self.recluster(None),
                Some(ReclusterScope::Categories(categories)) => {
                    for category in &categories {
                        self.clear(Some(category));
                        self.cluster(category);
                    }
                    self.update_markers();
                }
            }
            ran = true;
        }

        if !self.state.dragging && self.state.move_timer.fire_if_due(now) {
            log::debug!("debounced reconcile fired at precision {}", self.precision);
            self.update_markers();
            ran = true;
        }
        ran
    }

    /// Earliest instant at which [`ClusterManager::poll`] has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (
            self.state.move_timer.deadline(),
            self.state.recluster_timer.deadline(),
        ) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}
