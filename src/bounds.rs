//! Latitude/longitude rectangles that may cross the antimeridian.

use geo::{Point, Polygon, Rect, coord};
use serde::{Deserialize, Serialize};

/// A geographic rectangle in degrees.
///
/// `west > east` means the rectangle crosses the antimeridian. A rectangle
/// spanning the whole longitude range is stored as `[-180, 180]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    south: f64,
    west: f64,
    north: f64,
    east: f64,
}

impl LatLngBounds {
    /// Build bounds from the south-west and north-east corners.
    ///
    /// Latitudes are clamped to `[-90, 90]`; longitudes outside `[-180, 180]`
    /// are wrapped.
    pub fn new(sw_lat: f64, sw_lng: f64, ne_lat: f64, ne_lng: f64) -> Self {
        let south = sw_lat.clamp(-90.0, 90.0);
        let north = ne_lat.clamp(-90.0, 90.0);
        let (south, north) = if south <= north {
            (south, north)
        } else {
            (north, south)
        };
        Self {
            south,
            west: normalize_lng(sw_lng),
            north,
            east: normalize_lng(ne_lng),
        }
    }

    /// Bounds covering the whole globe.
    pub fn world() -> Self {
        Self::full_longitude(-90.0, 90.0)
    }

    /// Bounds covering every longitude between two latitudes.
    pub fn full_longitude(south: f64, north: f64) -> Self {
        Self {
            south: south.clamp(-90.0, 90.0),
            west: -180.0,
            north: north.clamp(-90.0, 90.0),
            east: 180.0,
        }
    }

    pub fn south(&self) -> f64 {
        self.south
    }

    pub fn west(&self) -> f64 {
        self.west
    }

    pub fn north(&self) -> f64 {
        self.north
    }

    pub fn east(&self) -> f64 {
        self.east
    }

    /// South-west corner as a `geo::Point` (x = longitude, y = latitude).
    pub fn south_west(&self) -> Point<f64> {
        Point::new(self.west, self.south)
    }

    /// North-east corner as a `geo::Point` (x = longitude, y = latitude).
    pub fn north_east(&self) -> Point<f64> {
        Point::new(self.east, self.north)
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.west > self.east
    }

    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    pub fn lng_span(&self) -> f64 {
        if self.crosses_antimeridian() {
            self.east - self.west + 360.0
        } else {
            self.east - self.west
        }
    }

    pub fn is_full_longitude(&self) -> bool {
        self.lng_span() >= 360.0
    }

    pub fn center(&self) -> Point<f64> {
        let lat = (self.south + self.north) / 2.0;
        let lng = normalize_lng(self.west + self.lng_span() / 2.0);
        Point::new(lng, lat)
    }

    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.south && lat <= self.north && self.contains_lng(lng)
    }

    fn contains_lng(&self, lng: f64) -> bool {
        if self.is_full_longitude() {
            return true;
        }
        let lng = normalize_lng(lng);
        if self.crosses_antimeridian() {
            lng >= self.west || lng <= self.east
        } else {
            lng >= self.west && lng <= self.east
        }
    }

    /// True when the two rectangles share at least one point.
    pub fn intersects(&self, other: &Self) -> bool {
        if self.south > other.north || other.south > self.north {
            return false;
        }
        if self.is_full_longitude() || other.is_full_longitude() {
            return true;
        }
        self.lng_intervals().iter().any(|(w1, e1)| {
            other
                .lng_intervals()
                .iter()
                .any(|(w2, e2)| w1 <= e2 && w2 <= e1)
        })
    }

    fn lng_intervals(&self) -> Vec<(f64, f64)> {
        if self.crosses_antimeridian() {
            vec![(self.west, 180.0), (-180.0, self.east)]
        } else {
            vec![(self.west, self.east)]
        }
    }

    /// Grow the bounds to include a point, extending longitude on whichever
    /// side needs the smaller increase.
    pub fn extend(&mut self, lat: f64, lng: f64) {
        let lat = lat.clamp(-90.0, 90.0);
        self.south = self.south.min(lat);
        self.north = self.north.max(lat);

        if self.contains_lng(lng) {
            return;
        }
        let lng = normalize_lng(lng);
        let grow_west = (self.west - lng).rem_euclid(360.0);
        let grow_east = (lng - self.east).rem_euclid(360.0);
        if grow_west + self.lng_span() >= 360.0 && grow_east + self.lng_span() >= 360.0 {
            self.west = -180.0;
            self.east = 180.0;
        } else if grow_west < grow_east {
            self.west = lng;
        } else {
            self.east = lng;
        }
    }

    /// The rectangle as a closed polygon, or `None` when it crosses the antimeridian.
    pub fn to_polygon(&self) -> Option<Polygon<f64>> {
        if self.crosses_antimeridian() {
            return None;
        }
        let rect = Rect::new(
            coord! { x: self.west, y: self.south },
            coord! { x: self.east, y: self.north },
        );
        Some(rect.to_polygon())
    }

    /// Construct from already-normalized edges.
    pub(crate) fn from_edges(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }
}

/// Wrap a longitude into `[-180, 180]`, leaving values already in range untouched.
fn normalize_lng(lng: f64) -> f64 {
    if (-180.0..=180.0).contains(&lng) {
        lng
    } else {
        (lng + 180.0).rem_euclid(360.0) - 180.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_simple() {
        let bounds = LatLngBounds::new(33.0, -118.0, 34.0, -117.0);
        assert!(bounds.contains(33.5, -117.5));
        assert!(!bounds.contains(35.0, -117.5));
        assert!(!bounds.contains(33.5, -116.0));
        assert!(!bounds.crosses_antimeridian());
    }

    #[test]
    fn test_antimeridian_crossing() {
        let bounds = LatLngBounds::new(-10.0, 170.0, 10.0, -170.0);
        assert!(bounds.crosses_antimeridian());
        assert!((bounds.lng_span() - 20.0).abs() < 1e-9);
        assert!(bounds.contains(0.0, 175.0));
        assert!(bounds.contains(0.0, -175.0));
        assert!(!bounds.contains(0.0, 0.0));

        let east_side = LatLngBounds::new(-1.0, -179.0, 1.0, -178.0);
        let far_away = LatLngBounds::new(-1.0, 10.0, 1.0, 20.0);
        assert!(bounds.intersects(&east_side));
        assert!(!bounds.intersects(&far_away));
    }

    #[test]
    fn test_intersects_when_one_contains_the_other() {
        let big = LatLngBounds::new(-50.0, -100.0, 50.0, 100.0);
        let small = LatLngBounds::new(-1.0, -1.0, 1.0, 1.0);
        assert!(big.intersects(&small));
        assert!(small.intersects(&big));
    }

    #[test]
    fn test_disjoint_latitudes() {
        let a = LatLngBounds::new(0.0, 0.0, 10.0, 10.0);
        let b = LatLngBounds::new(20.0, 0.0, 30.0, 10.0);
        assert!(!a.intersects(&b));
    }

    #[test]
    fn test_extend_picks_shorter_side() {
        let mut bounds = LatLngBounds::new(0.0, 170.0, 10.0, 175.0);
        bounds.extend(5.0, -175.0);
        assert!(bounds.crosses_antimeridian());
        assert_eq!(bounds.east(), -175.0);
        assert_eq!(bounds.west(), 170.0);

        bounds.extend(-5.0, 160.0);
        assert_eq!(bounds.west(), 160.0);
        assert_eq!(bounds.south(), -5.0);
    }

    #[test]
    fn test_world_and_center() {
        let world = LatLngBounds::world();
        assert!(world.is_full_longitude());
        assert_eq!(world.lat_span(), 180.0);
        assert!(world.contains(89.0, 179.0));

        let bounds = LatLngBounds::new(-10.0, 170.0, 10.0, -170.0);
        let center = bounds.center();
        assert!((center.x().abs() - 180.0).abs() < 1e-9);
        assert_eq!(center.y(), 0.0);
    }

    #[test]
    fn test_to_polygon() {
        let bounds = LatLngBounds::new(0.0, 0.0, 1.0, 2.0);
        let polygon = bounds.to_polygon().unwrap();
        assert_eq!(polygon.exterior().coords().count(), 5);

        let crossing = LatLngBounds::new(0.0, 170.0, 1.0, -170.0);
        assert!(crossing.to_polygon().is_none());
    }
}
