//! The cluster manager façade.
//!
//! [`ClusterManager`] owns every registered marker, the geobox index and the
//! per-category counters. It aggregates cells into cluster representatives
//! ([`cluster`]), reconciles what is rendered against the host viewport
//! ([`reconcile`]) and exposes the filtering and counting API used by panels.

use crate::builder::ClusterManagerBuilder;
use crate::config::ClusterConfig;
use crate::error::{ClusterError, Result};
use crate::factory::{ClusterContext, ClusterFactory, ClusterMember};
use crate::geohash;
use crate::index::ClusterIndex;
use crate::marker::{
    CLUSTER_SUBCATEGORY, CategoryCounts, CountKind, GENERIC, Marker, MarkerId, MarkerMeta,
    MarkerOptions, RenderChange, Visibility, capitalize,
};
use crate::schedule::ReclusterScope;
use crate::viewport::MapViewport;
use geo::Point;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

mod cluster;
mod reconcile;
mod registry;

use reconcile::ViewportState;
use registry::MarkerStore;

/// Maps a map zoom level to a geohash precision.
pub type ZoomToPrecision = Box<dyn Fn(u32) -> i32>;

/// Marker clustering overlay for one map viewport.
///
/// The manager is single-threaded and event-driven: the host forwards its
/// map events (`on_drag_start`, `on_zoom_changed`, ...) together with the
/// current [`Instant`], and calls [`ClusterManager::poll`] when
/// [`ClusterManager::next_deadline`] has passed. Every change to what should
/// be on the map is visible through [`Marker::is_rendered`] and
/// [`ClusterManager::drain_render_changes`].
///
/// # Examples
///
/// ```rust
/// use geocluster::{ClusterConfig, ClusterManagerBuilder, CountKind, LatLngBounds, Marker,
///     MarkerOptions, StaticViewport};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let viewport = StaticViewport::new(8, LatLngBounds::new(33.0, -118.5, 34.5, -117.0));
/// let mut manager = ClusterManagerBuilder::new()
///     .config(ClusterConfig::default().with_precision(2))
///     .build(viewport)?;
///
/// let crime = MarkerOptions::new().category("crime");
/// manager.add_marker(Marker::new(33.7510, -117.8505), crime.clone())?;
/// manager.add_marker(Marker::new(33.7520, -117.8510), crime.clone())?;
/// manager.recluster(Some("crime"));
///
/// assert_eq!(manager.count("crime", CountKind::Total), 2);
/// assert_eq!(manager.count("crime", CountKind::Cluster), 1);
/// assert_eq!(manager.count("crime", CountKind::Visible), 1);
/// # Ok(())
/// # }
/// ```
pub struct ClusterManager<V> {
    viewport: V,
    config: ClusterConfig,
    zoom_to_precision: Option<ZoomToPrecision>,
    precision: usize,
    index: ClusterIndex,
    markers: MarkerStore,
    categories: BTreeMap<String, CategoryCounts>,
    factories: FxHashMap<String, Box<dyn ClusterFactory>>,
    state: ViewportState,
}

impl<V: fmt::Debug> fmt::Debug for ClusterManager<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterManager")
            .field("viewport", &self.viewport)
            .field("config", &self.config)
            .field("precision", &self.precision)
            .field("markers", &self.markers.len())
            .field("categories", &self.categories)
            .finish_non_exhaustive()
    }
}

impl<V: MapViewport> ClusterManager<V> {
    /// Manager with the default configuration. See [`ClusterManagerBuilder`]
    /// for custom configurations and zoom mappings.
    pub fn new(viewport: V) -> Result<Self> {
        ClusterManagerBuilder::new().build(viewport)
    }

    pub(crate) fn from_parts(
        viewport: V,
        config: ClusterConfig,
        zoom_to_precision: Option<ZoomToPrecision>,
    ) -> Self {
        let precision = usize::from(config.base_precision());
        let mut manager = Self {
            viewport,
            config,
            zoom_to_precision,
            precision,
            index: ClusterIndex::new(),
            markers: MarkerStore::default(),
            categories: BTreeMap::new(),
            factories: FxHashMap::default(),
            state: ViewportState::default(),
        };
        manager.index.ensure_level(precision);
        let initial = manager.zoom_to_precision(manager.viewport.zoom());
        manager.set_precision(initial);
        manager
    }

    /// Precision for a zoom level: the configured mapping, or
    /// `zoom + base_precision` by default.
    pub fn zoom_to_precision(&self, zoom: u32) -> i32 {
        match &self.zoom_to_precision {
            Some(mapping) => mapping(zoom),
            None => i32::try_from(zoom)
                .unwrap_or(i32::MAX)
                .saturating_add(i32::from(self.config.base_precision())),
        }
    }

    /// Register a marker.
    ///
    /// Category and subcategory default to `"generic"`, `hidden` to `false`.
    /// The marker is placed into every precision level built so far; it is
    /// shown by the next recluster or reconcile pass.
    pub fn add_marker(&mut self, marker: Marker, options: MarkerOptions) -> Result<MarkerId> {
        let (lat, lng) = (marker.lat(), marker.lng());
        if !lat.is_finite() || !lng.is_finite() {
            log::warn!("Rejecting marker with non-finite coordinates ({lat}, {lng})");
            return Err(ClusterError::InvalidInput(format!(
                "non-finite coordinates ({lat}, {lng})"
            )));
        }
        let category = options.category.unwrap_or_else(|| GENERIC.to_string());
        let subcategory = options.subcategory.unwrap_or_else(|| GENERIC.to_string());
        if subcategory == CLUSTER_SUBCATEGORY {
            log::warn!("Rejecting marker in reserved subcategory {CLUSTER_SUBCATEGORY:?}");
            return Err(ClusterError::InvalidInput(format!(
                "subcategory {CLUSTER_SUBCATEGORY:?} is reserved for cluster representatives"
            )));
        }

        let counts = self.categories.entry(category.clone()).or_default();
        counts.total += 1;
        let summary = options
            .summary
            .or_else(|| marker.title().map(str::to_string))
            .unwrap_or_else(|| format!("{} marker {}", capitalize(&category), counts.total));

        let position = marker.position();
        let meta = MarkerMeta {
            category,
            subcategory,
            hidden: options.hidden.unwrap_or(false),
            visible: false,
            summary,
        };
        let id = self.register(marker, meta);
        if let Some(entry) = self.markers.get(id) {
            for precision in self.index.levels() {
                self.index
                    .insert(id, position, &entry.meta.category, precision, None);
            }
        }
        Ok(id)
    }

    /// Register several markers with the same options.
    pub fn add_markers<I>(&mut self, markers: I, options: &MarkerOptions) -> Result<Vec<MarkerId>>
    where
        I: IntoIterator<Item = Marker>,
    {
        markers
            .into_iter()
            .map(|marker| self.add_marker(marker, options.clone()))
            .collect()
    }

    fn register(&mut self, mut marker: Marker, meta: MarkerMeta) -> MarkerId {
        marker.set_rendered(false);
        self.markers.insert(marker, meta)
    }

    /// Unregister a marker and schedule a recluster of its category.
    ///
    /// Cluster representatives cannot be removed directly; they are replaced
    /// by the next aggregation pass.
    pub fn remove_marker(&mut self, id: MarkerId, now: Instant) -> Option<Marker> {
        let meta = self.markers.meta(id)?;
        if meta.is_representative() {
            log::warn!("{id} is a cluster representative and cannot be removed");
            return None;
        }
        let category = meta.category.clone();

        for stale in self.index.remove_everywhere(id) {
            self.retire_representative(stale);
        }
        let entry = self.markers.remove(id)?;
        if let Some(counts) = self.categories.get_mut(&category) {
            counts.total = counts.total.saturating_sub(1);
            if entry.marker.is_rendered() {
                counts.visible = counts.visible.saturating_sub(1);
            }
        }
        self.request_recluster(ReclusterScope::category(category), now);

        let mut marker = entry.marker;
        marker.set_rendered(false);
        Some(marker)
    }

    /// Move a marker to a new position and schedule a recluster of its category.
    pub fn move_marker(&mut self, id: MarkerId, lat: f64, lng: f64, now: Instant) -> Result<()> {
        if !lat.is_finite() || !lng.is_finite() {
            log::warn!("Rejecting move of {id} to non-finite coordinates ({lat}, {lng})");
            return Err(ClusterError::InvalidInput(format!(
                "non-finite coordinates ({lat}, {lng})"
            )));
        }
        let meta = self
            .markers
            .meta(id)
            .ok_or_else(|| ClusterError::InvalidInput(format!("unknown marker {id}")))?;
        if meta.is_representative() {
            return Err(ClusterError::InvalidInput(format!(
                "{id} is a cluster representative"
            )));
        }
        let category = meta.category.clone();

        for stale in self.index.remove_everywhere(id) {
            self.retire_representative(stale);
        }
        let position = Point::new(lng, lat);
        if let Some(marker) = self.markers.marker_mut(id) {
            marker.set_position(position);
        }
        for precision in self.index.levels() {
            self.index.insert(id, position, &category, precision, None);
        }
        self.request_recluster(ReclusterScope::category(category), now);
        Ok(())
    }

    /// Unregister a representative, withdrawing it from the counters.
    fn retire_representative(&mut self, id: MarkerId) {
        let Some(entry) = self.markers.remove(id) else {
            return;
        };
        if let Some(counts) = self.categories.get_mut(&entry.meta.category) {
            if entry.marker.is_rendered() {
                counts.visible = counts.visible.saturating_sub(1);
            }
            counts.cluster = counts.cluster.saturating_sub(1);
        }
    }

    /// Switch the active precision.
    ///
    /// Values outside `[0, 50)` are ignored. Otherwise everything is
    /// un-rendered, the level is built from all registered markers if it does
    /// not exist yet, and every category is re-aggregated and reconciled.
    pub fn set_precision(&mut self, precision: i32) {
        let Some(precision) = usize::try_from(precision)
            .ok()
            .filter(|precision| *precision <= geohash::MAX_PRECISION)
        else {
            log::warn!("Ignoring precision {precision} outside [0, 50)");
            return;
        };

        self.precision = precision;
        self.clear(None);
        if self.index.ensure_level(precision) {
            for id in self.markers.ids(None, None) {
                let Some(entry) = self.markers.get(id) else {
                    continue;
                };
                if entry.meta.is_representative() {
                    continue;
                }
                self.index.insert(
                    id,
                    entry.marker.position(),
                    &entry.meta.category,
                    precision,
                    None,
                );
            }
            log::debug!(
                "built precision level {precision} with {} markers",
                self.index.stats(precision).member_count
            );
        }
        self.cluster_all();
        self.update_markers();
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    /// Un-hide matching markers and schedule a recluster.
    pub fn show(&mut self, category: Option<&str>, subcategory: Option<&str>, now: Instant) {
        self.set_hidden(category, subcategory, false, now);
    }

    /// Hide matching markers and schedule a recluster.
    pub fn hide(&mut self, category: Option<&str>, subcategory: Option<&str>, now: Instant) {
        self.set_hidden(category, subcategory, true, now);
    }

    fn set_hidden(
        &mut self,
        category: Option<&str>,
        subcategory: Option<&str>,
        hidden: bool,
        now: Instant,
    ) {
        if let Some(category) = category
            && !self.categories.contains_key(category)
        {
            log::debug!("show/hide on unknown category {category:?}");
            return;
        }
        for id in self.markers.ids(category, subcategory) {
            if let Some(meta) = self.markers.meta_mut(id) {
                meta.hidden = hidden;
            }
        }
        self.request_recluster(ReclusterScope::for_filter(category), now);
    }

    /// Un-render every marker of `category` (all categories for `None`) and
    /// zero the visible counters.
    pub fn clear(&mut self, category: Option<&str>) {
        for id in self.markers.ids(category, None) {
            self.markers.set_rendered(id, false);
            if let Some(meta) = self.markers.meta_mut(id) {
                meta.visible = false;
            }
        }
        match category {
            Some(category) => {
                if let Some(counts) = self.categories.get_mut(category) {
                    counts.visible = 0;
                }
            }
            None => {
                for counts in self.categories.values_mut() {
                    counts.visible = 0;
                }
            }
        }
    }

    /// Forget every marker and cell of `category` (all categories for `None`)
    /// and zero its counters. Cluster factories are kept.
    pub fn reset(&mut self, category: Option<&str>) {
        let categories: Vec<String> = match category {
            Some(category) => vec![category.to_string()],
            None => self.categories.keys().cloned().collect(),
        };
        for category in categories {
            self.clear(Some(&category));
            self.index.reset_category(&category);
            self.markers.remove_category(&category);
            if let Some(counts) = self.categories.get_mut(&category) {
                *counts = CategoryCounts::default();
            }
        }
    }

    /// Replace the configuration and forget all markers, cells, factories and
    /// counters, then rebuild the active precision.
    pub fn reset_manager(&mut self, config: ClusterConfig) -> Result<()> {
        config.validate().map_err(ClusterError::Config)?;
        for id in self.markers.ids(None, None) {
            self.markers.remove(id);
        }
        self.index.clear();
        self.categories.clear();
        self.factories.clear();
        self.state = ViewportState::attached(self.state.is_attached());

        self.config = config;
        self.precision = usize::from(self.config.base_precision());
        self.index.ensure_level(self.precision);
        let initial = self.zoom_to_precision(self.viewport.zoom());
        self.set_precision(initial);
        Ok(())
    }

    /// Install the representative factory of a category.
    pub fn set_cluster_factory<F>(&mut self, category: impl Into<String>, factory: F)
    where
        F: ClusterFactory + 'static,
    {
        self.factories.insert(category.into(), Box::new(factory));
    }

    /// Install a closure as the representative factory of a category.
    pub fn set_cluster_fn<F>(&mut self, category: impl Into<String>, factory: F)
    where
        F: Fn(&[ClusterMember<'_>], f64, f64, &ClusterContext<'_>) -> Marker + 'static,
    {
        self.set_cluster_factory(category, factory);
    }

    /// A counter of `category`; unknown categories count zero.
    pub fn count(&self, category: &str, kind: CountKind) -> usize {
        self.categories
            .get(category)
            .map_or(0, |counts| counts.get(kind))
    }

    /// Markers matching the filters, in registration order per subcategory.
    ///
    /// Without a visibility filter representatives are included; with one
    /// they never are. See [`Visibility`].
    pub fn markers(
        &self,
        category: Option<&str>,
        subcategory: Option<&str>,
        visibility: Option<Visibility>,
    ) -> Vec<MarkerId> {
        let ids = self.markers.ids(category, subcategory);
        let Some(visibility) = visibility else {
            return ids;
        };
        ids.into_iter()
            .filter(|id| {
                self.markers.meta(*id).is_some_and(|meta| {
                    !meta.is_representative()
                        && match visibility {
                            Visibility::All => true,
                            Visibility::Only(shown) => !meta.hidden && meta.visible == shown,
                        }
                })
            })
            .collect()
    }

    pub fn marker(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.get(id).map(|entry| &entry.marker)
    }

    pub fn meta(&self, id: MarkerId) -> Option<&MarkerMeta> {
        self.markers.meta(id)
    }

    /// Rendered-flag flips since the last call, in order.
    pub fn drain_render_changes(&mut self) -> Vec<RenderChange> {
        self.markers.drain_changes()
    }

    /// Known categories with their counters.
    pub fn categories(&self) -> impl Iterator<Item = (&str, CategoryCounts)> {
        self.categories
            .iter()
            .map(|(category, counts)| (category.as_str(), *counts))
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn viewport(&self) -> &V {
        &self.viewport
    }

    /// Mutable access to the viewport; follow up with the matching event
    /// (`on_center_changed`, `on_zoom_changed`, ...).
    pub fn viewport_mut(&mut self) -> &mut V {
        &mut self.viewport
    }

    pub fn index(&self) -> &ClusterIndex {
        &self.index
    }

    fn request_recluster(&mut self, scope: ReclusterScope, now: Instant) {
        let delay = self.config.recluster_debounce();
        self.state.request_recluster(scope, now, delay);
    }
}
