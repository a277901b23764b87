//! Serializable configuration for the cluster manager.
//!
//! Every field has a default, so partial JSON (or TOML with the `toml`
//! feature) documents are accepted.

use serde::de::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Colour used when neither the configuration nor the category provides one.
pub const DEFAULT_ICON_COLOR: &str = "00CC00";

/// Icon colour setting: one hex colour for every category, or one per category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IconColor {
    Single(String),
    PerCategory(BTreeMap<String, String>),
}

impl IconColor {
    /// Resolve the colour for `category`.
    pub fn for_category(&self, category: &str) -> &str {
        match self {
            Self::Single(color) => color,
            Self::PerCategory(colors) => colors
                .get(category)
                .map(String::as_str)
                .unwrap_or(DEFAULT_ICON_COLOR),
        }
    }
}

impl Default for IconColor {
    fn default() -> Self {
        Self::Single(DEFAULT_ICON_COLOR.to_string())
    }
}

/// Cluster manager configuration.
///
/// # Example
///
/// ```rust
/// use geocluster::ClusterConfig;
///
/// let json = r#"{
///     "padding": 64,
///     "cluster_distance_factor": 1024000,
///     "icon_color": { "crime": "ff0000" }
/// }"#;
/// let config = ClusterConfig::from_json(json).unwrap();
/// assert_eq!(config.padding, 64.0);
/// assert_eq!(config.icon_color.for_category("crime"), "ff0000");
/// assert_eq!(config.icon_color.for_category("traffic"), "00CC00");
/// assert!(config.cluster_by_distance);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Offset of the default zoom-to-precision mapping (`zoom + precision`).
    /// Values above 27 fall back to 2.
    #[serde(default = "ClusterConfig::default_precision")]
    pub precision: u8,

    /// Pixels around the viewport in which markers are still rendered.
    #[serde(default = "ClusterConfig::default_padding")]
    pub padding: f64,

    /// Merge neighbouring cells whose centroids are close together.
    #[serde(default = "ClusterConfig::default_cluster_by_distance")]
    pub cluster_by_distance: bool,

    /// Cells merge when closer than `factor * 2^(2 - precision)` meters.
    #[serde(default = "ClusterConfig::default_cluster_distance_factor")]
    pub cluster_distance_factor: f64,

    #[serde(default)]
    pub icon_color: IconColor,

    #[serde(default = "ClusterConfig::default_text_color")]
    pub text_color: String,

    /// Quiet period before a pan triggers reconciliation.
    #[serde(default = "ClusterConfig::default_debounce_ms")]
    pub move_debounce_ms: u64,

    /// Quiet period before a show/hide triggers reclustering.
    #[serde(default = "ClusterConfig::default_debounce_ms")]
    pub recluster_debounce_ms: u64,

    /// Log every geobox taking part in an aggregation pass.
    #[serde(default)]
    pub visualize: bool,
}

impl ClusterConfig {
    /// Highest accepted value for [`ClusterConfig::precision`].
    pub const MAX_BASE_PRECISION: u8 = 27;

    const fn default_precision() -> u8 {
        2
    }

    const fn default_padding() -> f64 {
        200.0
    }

    const fn default_cluster_by_distance() -> bool {
        true
    }

    const fn default_cluster_distance_factor() -> f64 {
        2_048_000.0
    }

    fn default_text_color() -> String {
        "000000".to_string()
    }

    const fn default_debounce_ms() -> u64 {
        100
    }

    pub fn with_precision(mut self, precision: u8) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_padding(mut self, padding: f64) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_cluster_by_distance(mut self, enabled: bool) -> Self {
        self.cluster_by_distance = enabled;
        self
    }

    pub fn with_cluster_distance_factor(mut self, factor: f64) -> Self {
        self.cluster_distance_factor = factor;
        self
    }

    pub fn with_icon_color(mut self, icon_color: IconColor) -> Self {
        self.icon_color = icon_color;
        self
    }

    pub fn with_debounce(mut self, delay: Duration) -> Self {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.move_debounce_ms = ms;
        self.recluster_debounce_ms = ms;
        self
    }

    pub fn with_visualize(mut self, visualize: bool) -> Self {
        self.visualize = visualize;
        self
    }

    /// The precision offset actually used by the default zoom mapping.
    pub fn base_precision(&self) -> u8 {
        if self.precision <= Self::MAX_BASE_PRECISION {
            self.precision
        } else {
            Self::default_precision()
        }
    }

    pub fn move_debounce(&self) -> Duration {
        Duration::from_millis(self.move_debounce_ms)
    }

    pub fn recluster_debounce(&self) -> Duration {
        Duration::from_millis(self.recluster_debounce_ms)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if !self.padding.is_finite() || self.padding < 0.0 {
            return Err(format!(
                "Padding must be a finite, non-negative pixel count, got: {}",
                self.padding
            ));
        }

        if !self.cluster_distance_factor.is_finite() || self.cluster_distance_factor <= 0.0 {
            return Err(format!(
                "Cluster distance factor must be finite and positive, got: {}",
                self.cluster_distance_factor
            ));
        }

        if let IconColor::Single(color) = &self.icon_color
            && color.is_empty()
        {
            return Err("Icon color cannot be empty".to_string());
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: ClusterConfig = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(serde_json::Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: ClusterConfig = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            precision: Self::default_precision(),
            padding: Self::default_padding(),
            cluster_by_distance: Self::default_cluster_by_distance(),
            cluster_distance_factor: Self::default_cluster_distance_factor(),
            icon_color: IconColor::default(),
            text_color: Self::default_text_color(),
            move_debounce_ms: Self::default_debounce_ms(),
            recluster_debounce_ms: Self::default_debounce_ms(),
            visualize: false,
        }
    }
}
