//! Binary geohash codec.
//!
//! A geobox key is the concatenation of a latitude prefix and a longitude
//! prefix, each `precision` bits long, taken from a 49-bit fixed-point
//! encoding of `(value + offset) * 10^12`. Higher precision means smaller
//! boxes. Longitude cells are narrower in meters towards the poles.
//!
//! | Precision | Box width (degrees) | Latitude width (meters) |
//! |-----------|---------------------|-------------------------|
//! | 2         | 140.737488          | 15 666 825              |
//! | 6         | 8.79609302          | 979 176                 |
//! | 10        | 0.54975581          | 61 198                  |
//! | 14        | 0.03435973          | 3 824                   |
//! | 18        | 0.00214748          | 239                     |
//! | 22        | 0.00013421          | 14.9                    |
//! | 26        | 0.00000838          | 0.93                    |
//!
//! ```rust
//! use geocluster::geohash;
//!
//! let key = geohash::encode(33.7510, -117.8505, 10);
//! assert_eq!(key, "00111000010001110001");
//!
//! let bounds = geohash::decode(&key).unwrap();
//! assert!(bounds.contains(33.7510, -117.8505));
//! assert_eq!(geohash::precision_of(&key), Some(10));
//! ```

use crate::bounds::LatLngBounds;
use geo::{Point, Polygon};

/// Decimal shift applied before converting degrees to integers.
///
/// `(360 * 10^12)` stays below both `2^49` and the exact-integer range of
/// `f64`, so the scaled values are exact in `u64` arithmetic.
pub const MAX_POWER: i32 = 12;

/// Width of the fixed-point latitude and longitude encodings.
pub const HASH_BITS: usize = 49;

/// Highest usable precision; decoding accepts `[0, MAX_PRECISION]`.
pub const MAX_PRECISION: usize = 49;

const SCALE: f64 = 1e12;

/// Clamp a latitude into `[-90, 90]`.
pub fn clamp_latitude(lat: f64) -> f64 {
    lat.clamp(-90.0, 90.0)
}

/// Wrap a longitude into `[-180, 180)`.
pub fn wrap_longitude(lng: f64) -> f64 {
    (lng + 180.0).rem_euclid(360.0) - 180.0
}

fn to_fixed(value: f64, offset: f64) -> u64 {
    // Saturating cast: NaN maps to 0.
    ((value + offset) * SCALE).round() as u64
}

fn from_fixed(bits: u64, offset: f64) -> f64 {
    bits as f64 / SCALE - offset
}

fn push_prefix(key: &mut String, bits: u64, precision: usize) {
    let prefix = bits >> (HASH_BITS - precision);
    key.push_str(&format!("{prefix:0precision$b}"));
}

fn parse_bits(bits: &str) -> Option<u64> {
    bits.bytes().try_fold(0u64, |acc, b| match b {
        b'0' => Some(acc << 1),
        b'1' => Some((acc << 1) | 1),
        _ => None,
    })
}

/// Encode a coordinate into a geobox key of length `2 * precision`.
///
/// Latitude is clamped, longitude wrapped, precision capped at
/// [`MAX_PRECISION`]. A precision of zero yields the empty "whole world" key.
pub fn encode(lat: f64, lng: f64, precision: usize) -> String {
    if precision == 0 {
        return String::new();
    }
    let precision = precision.min(MAX_PRECISION);
    let lat_bits = to_fixed(clamp_latitude(lat), 90.0);
    let lng_bits = to_fixed(wrap_longitude(lng), 180.0);

    let mut key = String::with_capacity(precision * 2);
    push_prefix(&mut key, lat_bits, precision);
    push_prefix(&mut key, lng_bits, precision);
    key
}

/// Encode a `geo::Point` (x = longitude, y = latitude).
pub fn encode_point(point: &Point<f64>, precision: usize) -> String {
    encode(point.y(), point.x(), precision)
}

/// Precision of a key, or `None` for odd lengths and precisions of 50 or more.
pub fn precision_of(key: &str) -> Option<usize> {
    if key.len() % 2 != 0 {
        return None;
    }
    let precision = key.len() / 2;
    (precision <= MAX_PRECISION).then_some(precision)
}

/// Decode a key into the bounds of its geobox.
///
/// Returns `None` for malformed keys (odd length, precision out of range,
/// characters other than `0`/`1`).
pub fn decode(key: &str) -> Option<LatLngBounds> {
    let precision = precision_of(key)?;
    let (lat_part, lng_part) = key.split_at(precision);
    let lat_prefix = parse_bits(lat_part)?;
    let lng_prefix = parse_bits(lng_part)?;

    let shift = HASH_BITS - precision;
    let fill = (1u64 << shift) - 1;
    let lat_min = lat_prefix << shift;
    let lng_min = lng_prefix << shift;

    let south = from_fixed(lat_min, 90.0).clamp(-90.0, 90.0);
    let north = from_fixed(lat_min | fill, 90.0).clamp(-90.0, 90.0);
    let west = from_fixed(lng_min, 180.0).clamp(-180.0, 180.0);
    let east = from_fixed(lng_min | fill, 180.0).clamp(-180.0, 180.0);
    Some(LatLngBounds::from_edges(south, west, north, east))
}

/// Center of a geobox.
pub fn center(key: &str) -> Option<Point<f64>> {
    decode(key).map(|bounds| bounds.center())
}

/// Closed polygon covering a geobox, for debugging and visualisation.
pub fn geobox_polygon(key: &str) -> Option<Polygon<f64>> {
    decode(key).and_then(|bounds| bounds.to_polygon())
}
