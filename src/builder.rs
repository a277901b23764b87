//! Cluster manager builder
//!
//! This module provides a builder pattern for creating cluster managers with
//! a custom configuration, zoom mapping and initial markers.

use crate::config::ClusterConfig;
use crate::error::{ClusterError, Result};
use crate::manager::{ClusterManager, ZoomToPrecision};
use crate::marker::{Marker, MarkerOptions};
use crate::viewport::MapViewport;
use std::fmt;

/// Builder for [`ClusterManager`].
pub struct ClusterManagerBuilder {
    config: ClusterConfig,
    zoom_to_precision: Option<ZoomToPrecision>,
    markers: Vec<(Marker, MarkerOptions)>,
}

impl ClusterManagerBuilder {
    /// Create a new builder with the default configuration.
    pub fn new() -> Self {
        Self {
            config: ClusterConfig::default(),
            zoom_to_precision: None,
            markers: Vec::new(),
        }
    }

    /// Set the manager configuration.
    pub fn config(mut self, config: ClusterConfig) -> Self {
        self.config = config;
        self
    }

    /// Map zoom levels to precisions. Defaults to `zoom + base_precision`;
    /// results outside `[0, 50)` leave the precision unchanged.
    pub fn zoom_to_precision<F>(mut self, mapping: F) -> Self
    where
        F: Fn(u32) -> i32 + 'static,
    {
        self.zoom_to_precision = Some(Box::new(mapping));
        self
    }

    /// Register a marker when the manager is built.
    pub fn marker(mut self, marker: Marker, options: MarkerOptions) -> Self {
        self.markers.push((marker, options));
        self
    }

    /// Register several markers with the same options when the manager is built.
    pub fn markers<I>(mut self, markers: I, options: MarkerOptions) -> Self
    where
        I: IntoIterator<Item = Marker>,
    {
        self.markers
            .extend(markers.into_iter().map(|marker| (marker, options.clone())));
        self
    }

    /// Build the manager for `viewport`.
    ///
    /// The configuration is validated, the initial precision is derived from
    /// the viewport zoom and initial markers are clustered right away.
    pub fn build<V: MapViewport>(self, viewport: V) -> Result<ClusterManager<V>> {
        self.config.validate().map_err(ClusterError::Config)?;
        if self.config.precision > ClusterConfig::MAX_BASE_PRECISION {
            log::warn!(
                "Base precision {} exceeds {}, falling back to {}",
                self.config.precision,
                ClusterConfig::MAX_BASE_PRECISION,
                self.config.base_precision()
            );
        }

        let mut manager = ClusterManager::from_parts(viewport, self.config, self.zoom_to_precision);
        if !self.markers.is_empty() {
            for (marker, options) in self.markers {
                manager.add_marker(marker, options)?;
            }
            manager.recluster(None);
        }
        Ok(manager)
    }
}

impl Default for ClusterManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ClusterManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterManagerBuilder")
            .field("config", &self.config)
            .field("zoom_to_precision", &self.zoom_to_precision.is_some())
            .field("markers", &self.markers.len())
            .finish()
    }
}
