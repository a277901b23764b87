//! Geohash-based marker clustering for interactive maps.
//!
//! Markers are bucketed into binary-geohash geoboxes, neighbouring boxes whose
//! centroids are close are merged, every box with several markers gets a
//! cluster representative, and what is rendered is reconciled against the
//! host's viewport as it pans and zooms.
//!
//! ```rust
//! use geocluster::{ClusterManager, CountKind, LatLngBounds, Marker, MarkerOptions, StaticViewport};
//! use std::time::Instant;
//!
//! let viewport = StaticViewport::new(8, LatLngBounds::new(33.0, -118.5, 34.5, -117.0));
//! let mut manager = ClusterManager::new(viewport)?;
//! manager.on_attached(Instant::now());
//!
//! let crime = MarkerOptions::new().category("crime");
//! manager.add_marker(Marker::new(33.7510, -117.8505).with_title("Burglary"), crime.clone())?;
//! manager.add_marker(Marker::new(33.7520, -117.8510).with_title("Vandalism"), crime)?;
//! manager.recluster(Some("crime"));
//!
//! assert_eq!(manager.count("crime", CountKind::Cluster), 1);
//! for change in manager.drain_render_changes() {
//!     println!("{} rendered: {}", change.id, change.rendered);
//! }
//! # Ok::<(), geocluster::ClusterError>(())
//! ```

pub mod aggregate;
pub mod bounds;
pub mod builder;
pub mod config;
pub mod error;
pub mod factory;
pub mod geohash;
pub mod index;
pub mod manager;
pub mod marker;
pub mod schedule;
pub mod viewport;

#[cfg(feature = "geojson")]
pub mod visualize;

pub use builder::ClusterManagerBuilder;
pub use error::{ClusterError, Result};
pub use manager::{ClusterManager, ZoomToPrecision};

pub use geo::{Point, Polygon};

pub use bounds::LatLngBounds;
pub use config::{ClusterConfig, IconColor};
pub use factory::{
    ClusterContext, ClusterFactory, ClusterMember, DefaultClusterFactory, IconShape, MarkerIcon,
    cluster_icon, marker_icon,
};
pub use index::{CellMember, ClusterCell, ClusterIndex, IndexStats};
pub use marker::{
    CategoryCounts, CountKind, Marker, MarkerId, MarkerMeta, MarkerOptions, RenderChange,
    Visibility,
};
pub use schedule::{Debounce, ReclusterScope};
pub use viewport::{MapViewport, Projection, StaticViewport, WebMercator};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{ClusterError, ClusterManager, ClusterManagerBuilder, Result};

    pub use geo::{Point, Polygon};

    pub use crate::{ClusterConfig, IconColor, LatLngBounds};

    pub use crate::{
        ClusterContext, ClusterFactory, ClusterMember, CountKind, Marker, MarkerId,
        MarkerOptions, Visibility,
    };

    pub use crate::{MapViewport, StaticViewport};
}
