//! GeoJSON export of geoboxes, for debugging cluster layouts.

use crate::ClusterManager;
use crate::error::{ClusterError, Result};
use crate::geohash;
use crate::index::ClusterCell;
use crate::viewport::MapViewport;
use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::{Map, json};

/// Polygon feature covering the geobox `key`, or `None` for malformed keys.
pub fn geobox_feature(key: &str, properties: Map<String, serde_json::Value>) -> Option<Feature> {
    let bounds = geohash::decode(key)?;
    let (south, west) = (bounds.south(), bounds.west());
    let (north, east) = (bounds.north(), bounds.east());
    let ring = vec![
        vec![west, south],
        vec![east, south],
        vec![east, north],
        vec![west, north],
        vec![west, south],
    ];

    Some(Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Polygon(vec![ring]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    })
}

fn cell_properties(
    key: &str,
    category: &str,
    precision: usize,
    cell: &ClusterCell,
) -> Map<String, serde_json::Value> {
    let mut properties = Map::new();
    properties.insert("geobox".to_string(), json!(key));
    properties.insert("category".to_string(), json!(category));
    properties.insert("precision".to_string(), json!(precision));
    properties.insert("members".to_string(), json!(cell.len()));
    properties.insert("clustered".to_string(), json!(cell.representative().is_some()));
    properties
}

impl<V: MapViewport> ClusterManager<V> {
    /// GeoJSON `FeatureCollection` of the active precision's geoboxes for
    /// `category` (every category for `None`), with member counts.
    pub fn cells_geojson(&self, category: Option<&str>) -> Result<String> {
        let precision = self.precision();
        let categories = match category {
            Some(category) => vec![category.to_string()],
            None => self.index().categories(precision),
        };

        let features: Vec<Feature> = categories
            .iter()
            .filter_map(|category| {
                self.index()
                    .cells(precision, category)
                    .map(|cells| (category, cells))
            })
            .flat_map(|(category, cells)| {
                cells.iter().filter_map(move |(key, cell)| {
                    geobox_feature(key, cell_properties(key, category, precision, cell))
                })
            })
            .collect();

        let collection = FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        };
        serde_json::to_string(&collection).map_err(|e| {
            ClusterError::SerializationErrorWithContext(format!(
                "Failed to serialize geobox collection: {}",
                e
            ))
        })
    }
}
