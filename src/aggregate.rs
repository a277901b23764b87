//! Distance-based combining of adjacent cells.
//!
//! Geobox boundaries are arbitrary: two markers a few meters apart can land
//! in different boxes. Before representatives are built, each cell is merged
//! into its nearest neighbouring cell when their centroids are closer than a
//! precision-dependent threshold.

use crate::error::Result;
use crate::index::ClusterIndex;
use geo::{Distance, Haversine, Point};

/// Merge threshold in meters: `factor * 2^(2 - precision)`.
///
/// The threshold halves with every precision step, tracking the box size.
pub fn merge_threshold(factor: f64, precision: usize) -> f64 {
    let exponent = 2 - i32::try_from(precision).unwrap_or(i32::MAX - 2);
    factor * 2f64.powi(exponent)
}

/// Great-circle distance in meters between two points (x = longitude).
pub fn distance_meters(a: &Point<f64>, b: &Point<f64>) -> f64 {
    Haversine.distance(*a, *b)
}

/// Nearest neighbouring cell of `key` whose centroid is strictly closer than
/// `threshold` meters. Ties keep the first neighbour in key order.
pub fn nearest_within(
    index: &ClusterIndex,
    precision: usize,
    category: &str,
    key: &str,
    threshold: f64,
) -> Option<(String, f64)> {
    let centroid = index.cell(precision, category, key)?.centroid();
    let mut best: Option<(String, f64)> = None;
    for neighbor in index.neighbors_of(key, category) {
        let Some(cell) = index.cell(precision, category, &neighbor) else {
            continue;
        };
        let distance = distance_meters(&centroid, &cell.centroid());
        let closer = match &best {
            Some((_, best_distance)) => distance < *best_distance,
            None => distance < threshold,
        };
        if closer {
            best = Some((neighbor, distance));
        }
    }
    best
}

/// Merge every cell of `category` at `precision` with its nearest close
/// neighbour. Returns the number of merges performed.
///
/// Cells are visited in key order; a cell that was merged away earlier in the
/// pass is skipped.
pub fn combine_by_distance(
    index: &mut ClusterIndex,
    precision: usize,
    category: &str,
    factor: f64,
) -> Result<usize> {
    let threshold = merge_threshold(factor, precision);
    let mut merges = 0;

    for key in index.cell_keys(precision, category) {
        if index.cell(precision, category, &key).is_none() {
            continue;
        }
        let Some((neighbor, distance)) = nearest_within(index, precision, category, &key, threshold)
        else {
            continue;
        };
        let kept = index.merge(&key, &neighbor, category)?;
        log::trace!(
            "merged geoboxes {key} and {neighbor} ({distance:.1} m apart) into {kept} for {category}"
        );
        merges += 1;
    }

    if merges > 0 {
        log::debug!(
            "combined {merges} geobox pairs for {category} at precision {precision} (threshold {threshold:.1} m)"
        );
    }
    Ok(merges)
}
