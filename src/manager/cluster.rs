//! Aggregation pass: turns multi-member cells into cluster representatives.

use super::ClusterManager;
use crate::aggregate::combine_by_distance;
use crate::factory::{ClusterContext, ClusterFactory, ClusterMember, DefaultClusterFactory};
use crate::geohash;
use crate::marker::{CLUSTER_SUBCATEGORY, CountKind, MarkerId, MarkerMeta};
use crate::viewport::MapViewport;
use geo::Point;

/// A cell that needs a representative.
struct Pending {
    key: String,
    members: Vec<MarkerId>,
    centroid: Point<f64>,
}

impl<V: MapViewport> ClusterManager<V> {
    /// Clear, re-aggregate and reconcile `category` (every category for
    /// `None`) right away.
    pub fn recluster(&mut self, category: Option<&str>) {
        self.clear(category);
        match category {
            Some(category) => self.cluster(category),
            None => self.cluster_all(),
        }
        self.update_markers();
    }

    pub(crate) fn cluster_all(&mut self) {
        let categories: Vec<String> = self.categories.keys().cloned().collect();
        for category in categories {
            self.cluster(&category);
        }
    }

    /// Rebuild the representatives of one category at the active precision.
    pub(crate) fn cluster(&mut self, category: &str) {
        if !self.categories.contains_key(category) {
            return;
        }
        self.retire_representatives(category);

        let precision = self.precision;
        if self.config.cluster_by_distance {
            let factor = self.config.cluster_distance_factor;
            if let Err(err) = combine_by_distance(&mut self.index, precision, category, factor) {
                log::warn!("Skipping distance merge for {category}: {err}");
            }
        }

        let Some(cells) = self.index.cells(precision, category) else {
            return;
        };
        let pending: Vec<Pending> = cells
            .iter()
            .filter_map(|(key, cell)| {
                if self.config.visualize {
                    log::debug!(
                        "{category} geobox {key}: {} members, bounds {:?}",
                        cell.len(),
                        geohash::decode(key)
                    );
                }
                let members: Vec<MarkerId> = cell
                    .members()
                    .iter()
                    .map(|member| member.id)
                    .filter(|id| self.markers.meta(*id).is_some_and(|meta| !meta.hidden))
                    .collect();
                (members.len() >= 2).then(|| Pending {
                    key: key.clone(),
                    members,
                    centroid: cell.centroid(),
                })
            })
            .collect();

        for cell in pending {
            let representative = {
                let members: Vec<ClusterMember<'_>> = cell
                    .members
                    .iter()
                    .filter_map(|id| {
                        self.markers.get(*id).map(|entry| ClusterMember {
                            id: *id,
                            marker: &entry.marker,
                            meta: &entry.meta,
                        })
                    })
                    .collect();
                let ctx = ClusterContext {
                    category,
                    precision,
                    config: &self.config,
                };
                let factory: &dyn ClusterFactory = match self.factories.get(category) {
                    Some(factory) => factory.as_ref(),
                    None => &DefaultClusterFactory,
                };
                factory.build(&members, cell.centroid.y(), cell.centroid.x(), &ctx)
            };

            let summary = representative
                .title()
                .map_or_else(|| format!("{} markers", cell.members.len()), str::to_string);
            let meta = MarkerMeta {
                category: category.to_string(),
                subcategory: CLUSTER_SUBCATEGORY.to_string(),
                hidden: false,
                visible: false,
                summary,
            };
            let id = self.register(representative, meta);
            self.index
                .set_representative(precision, category, &cell.key, Some(id));
            if let Some(counts) = self.categories.get_mut(category) {
                counts.cluster += 1;
            }
        }

        log::debug!(
            "clustered {category} at precision {precision}: {} cells, {} representatives",
            self.index.cell_count(precision, category),
            self.count(category, CountKind::Cluster)
        );
    }

    /// Un-render and unregister every representative of `category`.
    fn retire_representatives(&mut self, category: &str) {
        for id in self.markers.ids(Some(category), Some(CLUSTER_SUBCATEGORY)) {
            self.retire_representative(id);
        }
        self.index.clear_representatives(category);
        if let Some(counts) = self.categories.get_mut(category) {
            counts.cluster = 0;
        }
    }
}
