//! Markers and the metadata the manager keeps about them.

use crate::factory::MarkerIcon;
use bytes::Bytes;
use geo::Point;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category and subcategory assigned when none is given.
pub const GENERIC: &str = "generic";

/// Reserved subcategory of synthesized cluster representatives.
pub const CLUSTER_SUBCATEGORY: &str = "cluster";

/// Stable handle of a marker registered with a [`crate::ClusterManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarkerId(u64);

impl MarkerId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for MarkerId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "marker#{}", self.0)
    }
}

/// A point on the map as seen by the host widget.
///
/// The manager owns registered markers and flips their `rendered` flag; the
/// host reads it (or drains [`RenderChange`]s) to update its map.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    position: Point<f64>,
    title: Option<String>,
    content: Vec<String>,
    icon: Option<MarkerIcon>,
    z_index: i32,
    payload: Bytes,
    rendered: bool,
}

impl Marker {
    /// Create a marker at `(lat, lng)`.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self::at(Point::new(lng, lat))
    }

    /// Create a marker from a `geo::Point` (x = longitude, y = latitude).
    pub fn at(position: Point<f64>) -> Self {
        Self {
            position,
            title: None,
            content: Vec::new(),
            icon: None,
            z_index: 0,
            payload: Bytes::new(),
            rendered: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Lines shown in the marker's popup.
    pub fn with_content<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.content = lines.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_icon(mut self, icon: MarkerIcon) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    /// Attach opaque host data (e.g. the serialized incident).
    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn position(&self) -> Point<f64> {
        self.position
    }

    pub fn lat(&self) -> f64 {
        self.position.y()
    }

    pub fn lng(&self) -> f64 {
        self.position.x()
    }

    pub(crate) fn set_position(&mut self, position: Point<f64>) {
        self.position = position;
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn content(&self) -> &[String] {
        &self.content
    }

    pub fn icon(&self) -> Option<&MarkerIcon> {
        self.icon.as_ref()
    }

    pub fn z_index(&self) -> i32 {
        self.z_index
    }

    pub fn set_z_index(&mut self, z_index: i32) {
        self.z_index = z_index;
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Whether the marker is currently on the map.
    pub fn is_rendered(&self) -> bool {
        self.rendered
    }

    pub(crate) fn set_rendered(&mut self, rendered: bool) -> bool {
        let changed = self.rendered != rendered;
        self.rendered = rendered;
        changed
    }
}

/// Options accepted when registering a marker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerOptions {
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub hidden: Option<bool>,
    pub summary: Option<String>,
}

impl MarkerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = Some(hidden);
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

/// Rendering state the manager keeps per marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerMeta {
    pub category: String,
    pub subcategory: String,
    /// Suppressed regardless of the viewport.
    pub hidden: bool,
    /// Currently shown, either directly or through its cluster representative.
    pub visible: bool,
    pub summary: String,
}

impl MarkerMeta {
    pub fn is_representative(&self) -> bool {
        self.subcategory == CLUSTER_SUBCATEGORY
    }
}

/// A flip of a marker's `rendered` flag, reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderChange {
    pub id: MarkerId,
    pub rendered: bool,
}

/// Visibility filter for [`crate::ClusterManager::markers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Every marker that is not a cluster representative.
    All,
    /// Markers that are not hidden and whose `visible` flag equals the value:
    /// `Only(true)` lists what is shown, `Only(false)` what is out of view.
    Only(bool),
}

/// Per-category counter selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CountKind {
    /// Registered markers, representatives excluded.
    Total,
    /// Rendered markers and representatives.
    Visible,
    /// Cells that currently have a representative.
    Cluster,
}

/// Running counters of a category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub total: usize,
    pub visible: usize,
    pub cluster: usize,
}

impl CategoryCounts {
    pub fn get(&self, kind: CountKind) -> usize {
        match kind {
            CountKind::Total => self.total,
            CountKind::Visible => self.visible,
            CountKind::Cluster => self.cluster,
        }
    }
}

/// Upper-case the first character, used for derived summaries.
pub(crate) fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
