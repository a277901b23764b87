//! Map viewport capability required by the reconciler.
//!
//! The host map widget is abstracted as a [`MapViewport`]: a zoom level, the
//! visible bounds and a [`Projection`] between degrees and world pixels. The
//! crate ships a Web Mercator projection and a [`StaticViewport`] that hosts
//! (and tests) can drive by hand.

use crate::bounds::LatLngBounds;
use crate::geohash;
use geo::{Coord, Point, coord};
use std::f64::consts::PI;

/// Conversion between geographic coordinates and world pixel coordinates at zoom 0.
pub trait Projection {
    /// Project a coordinate to world pixels.
    fn from_lat_lng_to_point(&self, lat: f64, lng: f64) -> Coord<f64>;

    /// Inverse projection. The returned point has x = longitude, y = latitude;
    /// longitude is not wrapped.
    fn from_point_to_lat_lng(&self, point: Coord<f64>) -> Point<f64>;

    /// Width of the world in pixels at zoom 0.
    fn world_size(&self) -> f64;
}

/// Spherical Web Mercator with a square world of `tile_size` pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WebMercator {
    tile_size: f64,
}

impl WebMercator {
    pub fn new(tile_size: f64) -> Self {
        Self { tile_size }
    }

    fn pixels_per_degree(&self) -> f64 {
        self.tile_size / 360.0
    }

    fn pixels_per_radian(&self) -> f64 {
        self.tile_size / (2.0 * PI)
    }
}

impl Default for WebMercator {
    fn default() -> Self {
        Self::new(256.0)
    }
}

impl Projection for WebMercator {
    fn from_lat_lng_to_point(&self, lat: f64, lng: f64) -> Coord<f64> {
        let origin = self.tile_size / 2.0;
        let siny = lat.to_radians().sin().clamp(-0.9999, 0.9999);
        coord! {
            x: origin + lng * self.pixels_per_degree(),
            y: origin + 0.5 * ((1.0 + siny) / (1.0 - siny)).ln() * -self.pixels_per_radian(),
        }
    }

    fn from_point_to_lat_lng(&self, point: Coord<f64>) -> Point<f64> {
        let origin = self.tile_size / 2.0;
        let lng = (point.x - origin) / self.pixels_per_degree();
        let lat_radians = (point.y - origin) / -self.pixels_per_radian();
        let lat = (2.0 * lat_radians.exp().atan() - PI / 2.0).to_degrees();
        Point::new(lng, lat)
    }

    fn world_size(&self) -> f64 {
        self.tile_size
    }
}

/// What the cluster manager needs to know about the host map.
pub trait MapViewport {
    /// Current integer zoom level.
    fn zoom(&self) -> u32;

    /// Visible bounds, or `None` while the map is not laid out yet.
    fn bounds(&self) -> Option<LatLngBounds>;

    fn projection(&self) -> &dyn Projection;
}

/// A viewport whose state is set explicitly by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticViewport {
    zoom: u32,
    bounds: Option<LatLngBounds>,
    projection: WebMercator,
}

impl StaticViewport {
    pub fn new(zoom: u32, bounds: LatLngBounds) -> Self {
        Self {
            zoom,
            bounds: Some(bounds),
            projection: WebMercator::default(),
        }
    }

    /// A viewport that has not reported bounds yet.
    pub fn unready(zoom: u32) -> Self {
        Self {
            zoom,
            bounds: None,
            projection: WebMercator::default(),
        }
    }

    pub fn set_zoom(&mut self, zoom: u32) {
        self.zoom = zoom;
    }

    pub fn set_bounds(&mut self, bounds: LatLngBounds) {
        self.bounds = Some(bounds);
    }

    /// Move the viewport so that its center is at `(lat, lng)`, keeping its size.
    pub fn pan_to(&mut self, lat: f64, lng: f64) {
        if let Some(bounds) = self.bounds {
            let half_lat = bounds.lat_span() / 2.0;
            let half_lng = bounds.lng_span() / 2.0;
            self.bounds = Some(LatLngBounds::new(
                lat - half_lat,
                lng - half_lng,
                lat + half_lat,
                lng + half_lng,
            ));
        }
    }
}

impl MapViewport for StaticViewport {
    fn zoom(&self) -> u32 {
        self.zoom
    }

    fn bounds(&self) -> Option<LatLngBounds> {
        self.bounds
    }

    fn projection(&self) -> &dyn Projection {
        &self.projection
    }
}

/// Expand `bounds` by `padding` screen pixels at `zoom`.
///
/// The padding is converted to world pixels (`padding / 2^zoom`), applied to
/// the projected corners and converted back to degrees; the result is the
/// union of `bounds` and the padded corners. Padding that wraps all the way
/// around the globe yields the full longitude range.
pub fn padded_bounds(
    bounds: &LatLngBounds,
    padding: f64,
    zoom: u32,
    projection: &dyn Projection,
) -> LatLngBounds {
    if padding <= 0.0 || !padding.is_finite() {
        return *bounds;
    }
    let offset = padding / 2f64.powi(zoom.min(1024) as i32);

    let ne = projection.from_lat_lng_to_point(bounds.north(), bounds.east());
    let sw = projection.from_lat_lng_to_point(bounds.south(), bounds.west());
    let world = projection.world_size();

    let mut width = ne.x - sw.x;
    if bounds.crosses_antimeridian() {
        width += world;
    }

    let new_ne = projection.from_point_to_lat_lng(coord! { x: ne.x + offset, y: ne.y - offset });
    let new_sw = projection.from_point_to_lat_lng(coord! { x: sw.x - offset, y: sw.y + offset });

    if bounds.is_full_longitude() || width + 2.0 * offset >= world {
        return LatLngBounds::full_longitude(
            bounds.south().min(new_sw.y()),
            bounds.north().max(new_ne.y()),
        );
    }
    // The projection clamps latitude short of the poles, so the padded
    // corners only ever grow the original bounds.
    let mut padded = *bounds;
    padded.extend(new_ne.y(), new_ne.x());
    padded.extend(new_sw.y(), new_sw.x());
    padded
}

/// Whether the geobox `key` overlaps `bounds`.
///
/// Bounds spanning at least the whole latitude or longitude range contain
/// every box. Malformed keys are never in view.
pub fn geobox_in_bounds(key: &str, bounds: &LatLngBounds) -> bool {
    if bounds.lat_span() >= 180.0 || bounds.lng_span() >= 360.0 {
        return true;
    }
    geohash::decode(key).is_some_and(|geobox| geobox.intersects(bounds))
}
