//! Cluster representative factories and icon descriptions.
//!
//! When a cell holds two or more visible markers, the manager asks the
//! category's [`ClusterFactory`] for a marker standing in for all of them.
//! Any `Fn(&[ClusterMember], f64, f64, &ClusterContext) -> Marker` closure is
//! a factory; [`DefaultClusterFactory`] is used for categories without one.

use crate::config::ClusterConfig;
use crate::marker::{Marker, MarkerId, MarkerMeta};
use serde::{Deserialize, Serialize};

/// Number of member summaries listed in a default cluster popup.
pub const SUMMARY_LIMIT: usize = 10;

/// Above this precision cluster icons are drawn as pins instead of circles.
pub const PIN_PRECISION: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IconShape {
    /// Map pin anchored at its tip.
    Pin,
    /// Floating circle anchored at its center.
    Circle { radius: f64 },
    /// Rectangular marker image.
    Rect,
}

/// Provider-neutral description of a marker image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerIcon {
    /// Text drawn on the icon (the member count for clusters).
    pub label: Option<String>,
    /// Hex fill colour without `#`.
    pub color: String,
    pub text_color: String,
    pub width: u32,
    pub height: u32,
    /// Pixel offset of the anchor from the top-left corner.
    pub anchor: (f64, f64),
    pub shape: IconShape,
}

/// Icon for a cluster of `count` markers.
///
/// Above [`PIN_PRECISION`] the cluster looks like a precise pin; below it is
/// a circle that grows with the number of digits in `count`.
pub fn cluster_icon(count: usize, precision: usize, color: &str, text_color: &str) -> MarkerIcon {
    let label = Some(count.to_string());
    if precision > PIN_PRECISION {
        return MarkerIcon {
            label,
            color: strip_hash(color),
            text_color: strip_hash(text_color),
            width: 21,
            height: 34,
            anchor: (10.5, 34.0),
            shape: IconShape::Pin,
        };
    }

    let digits = count.to_string().len() as u32;
    let size = (digits - 1) * 6 + 24;
    let half = f64::from(size) / 2.0;
    MarkerIcon {
        label,
        color: strip_hash(color),
        text_color: strip_hash(text_color),
        width: size,
        height: size,
        anchor: (half, half),
        shape: IconShape::Circle { radius: half },
    }
}

/// Plain marker icon anchored at the bottom center.
pub fn marker_icon(width: u32, height: u32, color: &str) -> MarkerIcon {
    MarkerIcon {
        label: None,
        color: strip_hash(color),
        text_color: "000000".to_string(),
        width,
        height,
        anchor: (f64::from(width) / 2.0, f64::from(height)),
        shape: IconShape::Rect,
    }
}

fn strip_hash(color: &str) -> String {
    color.trim_start_matches('#').to_string()
}

/// A member of the cell being clustered.
#[derive(Debug, Clone, Copy)]
pub struct ClusterMember<'a> {
    pub id: MarkerId,
    pub marker: &'a Marker,
    pub meta: &'a MarkerMeta,
}

/// Read-only view of the manager handed to factories.
#[derive(Debug, Clone, Copy)]
pub struct ClusterContext<'a> {
    pub category: &'a str,
    pub precision: usize,
    pub config: &'a ClusterConfig,
}

impl ClusterContext<'_> {
    /// Configured icon colour for the category being clustered.
    pub fn icon_color(&self) -> &str {
        self.config.icon_color.for_category(self.category)
    }
}

/// Builds the representative marker of a cell.
pub trait ClusterFactory {
    fn build(
        &self,
        members: &[ClusterMember<'_>],
        center_lat: f64,
        center_lng: f64,
        ctx: &ClusterContext<'_>,
    ) -> Marker;
}

impl<F> ClusterFactory for F
where
    F: Fn(&[ClusterMember<'_>], f64, f64, &ClusterContext<'_>) -> Marker,
{
    fn build(
        &self,
        members: &[ClusterMember<'_>],
        center_lat: f64,
        center_lng: f64,
        ctx: &ClusterContext<'_>,
    ) -> Marker {
        self(members, center_lat, center_lng, ctx)
    }
}

/// List-style popup plus a numbered icon.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClusterFactory;

impl ClusterFactory for DefaultClusterFactory {
    fn build(
        &self,
        members: &[ClusterMember<'_>],
        center_lat: f64,
        center_lng: f64,
        ctx: &ClusterContext<'_>,
    ) -> Marker {
        let count = members.len();
        let mut content: Vec<String> = members
            .iter()
            .take(SUMMARY_LIMIT)
            .map(|member| member.meta.summary.clone())
            .collect();
        if count > SUMMARY_LIMIT {
            content.push(format!(
                "{} more markers in this area. Zoom in for details.",
                count - SUMMARY_LIMIT
            ));
        }

        let icon = cluster_icon(count, ctx.precision, ctx.icon_color(), &ctx.config.text_color);
        Marker::new(center_lat, center_lng)
            .with_title(format!("{count} markers"))
            .with_content(content)
            .with_icon(icon)
            .with_z_index(i32::try_from(count).unwrap_or(i32::MAX))
    }
}
