//! Geobox cluster index.
//!
//! Markers are partitioned per precision level and per category into geobox
//! cells keyed by their binary geohash. Each cell tracks its members, the
//! running centroid of their positions and the representative marker that
//! stands in for them on the map.
//!
//! # Memory Layout
//!
//! ```text
//! ClusterIndex
//! ├─ levels: HashMap<precision, HashMap<category, BTreeMap<key, ClusterCell>>>
//! │  └─ 10 -> "crime" -> "00111000010001110001" -> [m1, m2, m3], rep = m9
//! └─ placements: HashMap<MarkerId, Placement>
//!    └─ m1 -> ("crime", {10: "00111000010001110001", 12: "..."})
//! ```
//!
//! Cells within a category are kept in key order so that every pass over a
//! level is deterministic.

use crate::error::{ClusterError, Result};
use crate::geohash;
use crate::marker::MarkerId;
use geo::Point;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Offset in degrees used to probe the boxes around a geobox.
pub const NEIGHBOR_EPSILON: f64 = 0.0001;

/// Cells of one category at one precision, in key order.
pub type CategoryCells = BTreeMap<String, ClusterCell>;

/// Neighbour keys of a geobox (at most eight).
pub type NeighborKeys = SmallVec<[String; 8]>;

/// Snapshot of a member's position at insertion time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellMember {
    pub id: MarkerId,
    pub position: Point<f64>,
}

/// One geobox of one category at one precision.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterCell {
    members: Vec<CellMember>,
    centroid: Point<f64>,
    representative: Option<MarkerId>,
}

impl ClusterCell {
    fn new(member: CellMember) -> Self {
        Self {
            members: vec![member],
            centroid: member.position,
            representative: None,
        }
    }

    pub fn members(&self) -> &[CellMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Mean position of the members (x = longitude, y = latitude).
    pub fn centroid(&self) -> Point<f64> {
        self.centroid
    }

    pub fn representative(&self) -> Option<MarkerId> {
        self.representative
    }

    pub fn contains(&self, id: MarkerId) -> bool {
        self.members.iter().any(|member| member.id == id)
    }

    fn push(&mut self, member: CellMember) {
        self.members.push(member);
        let n = self.members.len() as f64;
        let keep = (n - 1.0) / n;
        self.centroid = Point::new(
            keep * self.centroid.x() + member.position.x() / n,
            keep * self.centroid.y() + member.position.y() / n,
        );
    }

    fn remove(&mut self, id: MarkerId) -> bool {
        let before = self.members.len();
        self.members.retain(|member| member.id != id);
        if self.members.len() == before {
            return false;
        }
        self.recompute_centroid();
        true
    }

    fn recompute_centroid(&mut self) {
        if self.members.is_empty() {
            return;
        }
        let n = self.members.len() as f64;
        let (sum_x, sum_y) = self
            .members
            .iter()
            .fold((0.0, 0.0), |(x, y), member| {
                (x + member.position.x(), y + member.position.y())
            });
        self.centroid = Point::new(sum_x / n, sum_y / n);
    }
}

/// Where a marker currently lives: its category and its key per precision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placement {
    pub category: String,
    pub keys: BTreeMap<usize, String>,
}

/// Outcome of removing a marker from one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    /// Representative the cell had before the removal; it no longer matches
    /// the membership and should be retired.
    pub stale_representative: Option<MarkerId>,
    /// The cell became empty and was dropped.
    pub cell_dropped: bool,
}

/// Occupancy of one precision level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexStats {
    pub precision: usize,
    pub cell_count: usize,
    pub member_count: usize,
    pub avg_members_per_cell: f64,
}

/// Multi-precision geobox index.
///
/// A level is created on demand (see [`ClusterIndex::ensure_level`]) and then
/// kept, so switching back to a precision does not re-partition everything.
///
/// # Examples
///
/// ```rust
/// use geocluster::index::ClusterIndex;
///
/// let mut index = ClusterIndex::new();
/// index.ensure_level(10);
/// assert!(index.has_level(10));
/// assert_eq!(index.cell_count(10, "crime"), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClusterIndex {
    levels: FxHashMap<usize, FxHashMap<String, CategoryCells>>,
    placements: FxHashMap<MarkerId, Placement>,
}

impl ClusterIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_level(&self, precision: usize) -> bool {
        self.levels.contains_key(&precision)
    }

    /// Create an empty level if it does not exist yet.
    ///
    /// Returns `true` if the level was created.
    pub fn ensure_level(&mut self, precision: usize) -> bool {
        if self.has_level(precision) {
            return false;
        }
        self.levels.insert(precision, FxHashMap::default());
        true
    }

    /// Built precision levels in ascending order.
    pub fn levels(&self) -> Vec<usize> {
        let mut levels: Vec<usize> = self.levels.keys().copied().collect();
        levels.sort_unstable();
        levels
    }

    /// Number of markers placed in the index.
    pub fn marker_count(&self) -> usize {
        self.placements.len()
    }

    pub fn placement(&self, id: MarkerId) -> Option<&Placement> {
        self.placements.get(&id)
    }

    /// Key of the cell holding `id` at `precision`.
    pub fn key_of(&self, id: MarkerId, precision: usize) -> Option<&str> {
        self.placements
            .get(&id)
            .and_then(|placement| placement.keys.get(&precision))
            .map(String::as_str)
    }

    /// Categories with at least one cell at `precision`, sorted.
    pub fn categories(&self, precision: usize) -> Vec<String> {
        let mut categories: Vec<String> = self
            .levels
            .get(&precision)
            .map(|level| {
                level
                    .iter()
                    .filter(|(_, cells)| !cells.is_empty())
                    .map(|(category, _)| category.clone())
                    .collect()
            })
            .unwrap_or_default();
        categories.sort_unstable();
        categories
    }

    /// All categories of a level with their cells.
    pub fn level(&self, precision: usize) -> Option<&FxHashMap<String, CategoryCells>> {
        self.levels.get(&precision)
    }

    pub fn cells(&self, precision: usize, category: &str) -> Option<&CategoryCells> {
        self.levels.get(&precision)?.get(category)
    }

    pub fn cell(&self, precision: usize, category: &str, key: &str) -> Option<&ClusterCell> {
        self.cells(precision, category)?.get(key)
    }

    /// Keys of a category's cells in ascending order.
    pub fn cell_keys(&self, precision: usize, category: &str) -> Vec<String> {
        self.cells(precision, category)
            .map(|cells| cells.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn cell_count(&self, precision: usize, category: &str) -> usize {
        self.cells(precision, category).map_or(0, BTreeMap::len)
    }

    /// Place a marker into its cell at `precision`.
    ///
    /// The key is computed from `position` unless the caller already knows
    /// it. A marker already placed at this precision is moved out of its old
    /// cell first. The level is created if needed. Returns the key used.
    pub fn insert(
        &mut self,
        id: MarkerId,
        position: Point<f64>,
        category: &str,
        precision: usize,
        key: Option<&str>,
    ) -> String {
        let key = key.map_or_else(|| geohash::encode_point(&position, precision), str::to_string);

        if let Some(previous) = self.key_of(id, precision).map(str::to_string) {
            self.remove(id, precision, &previous);
        }

        let member = CellMember { id, position };
        let cells = self
            .levels
            .entry(precision)
            .or_default()
            .entry(category.to_string())
            .or_default();
        match cells.get_mut(&key) {
            Some(cell) => cell.push(member),
            None => {
                cells.insert(key.clone(), ClusterCell::new(member));
            }
        }

        let placement = self.placements.entry(id).or_insert_with(|| Placement {
            category: category.to_string(),
            keys: BTreeMap::new(),
        });
        placement.category = category.to_string();
        placement.keys.insert(precision, key.clone());
        key
    }

    /// Remove a marker from one cell.
    ///
    /// The cell's centroid is recomputed from the remaining members, its
    /// representative is reset and an emptied cell is dropped. Returns `None`
    /// if the marker was not in that cell.
    pub fn remove(&mut self, id: MarkerId, precision: usize, key: &str) -> Option<Removal> {
        let category = self.placements.get(&id)?.category.clone();
        let cells = self.levels.get_mut(&precision)?.get_mut(&category)?;
        let cell = cells.get_mut(key)?;
        if !cell.remove(id) {
            return None;
        }

        let stale_representative = cell.representative.take();
        let cell_dropped = cell.is_empty();
        if cell_dropped {
            cells.remove(key);
        }

        if let Some(placement) = self.placements.get_mut(&id) {
            placement.keys.remove(&precision);
            if placement.keys.is_empty() {
                self.placements.remove(&id);
            }
        }

        Some(Removal {
            stale_representative,
            cell_dropped,
        })
    }

    /// Remove a marker from every level. Returns the representatives that
    /// went stale.
    pub fn remove_everywhere(&mut self, id: MarkerId) -> Vec<MarkerId> {
        let Some(placement) = self.placements.get(&id).cloned() else {
            return Vec::new();
        };
        placement
            .keys
            .iter()
            .filter_map(|(precision, key)| self.remove(id, *precision, key))
            .filter_map(|removal| removal.stale_representative)
            .collect()
    }

    /// Merge two cells of the same precision and category.
    ///
    /// The cell with fewer members is moved into the other one; on a tie the
    /// second moves into the first. Members keep their order, the target's
    /// centroid is updated incrementally and the source cell is deleted.
    /// Returns the key of the surviving cell.
    ///
    /// Merging keys of different precisions, or a key with itself, is a
    /// programming error: it panics in debug builds and returns an error in
    /// release builds.
    pub fn merge(&mut self, first: &str, second: &str, category: &str) -> Result<String> {
        let first_precision = geohash::precision_of(first)
            .ok_or_else(|| ClusterError::InvalidGeohash(first.to_string()))?;
        let second_precision = geohash::precision_of(second)
            .ok_or_else(|| ClusterError::InvalidGeohash(second.to_string()))?;

        debug_assert_eq!(
            first_precision, second_precision,
            "cannot merge geoboxes of different precisions"
        );
        if first_precision != second_precision {
            return Err(ClusterError::PrecisionMismatch {
                left: first_precision,
                right: second_precision,
            });
        }
        debug_assert_ne!(first, second, "cannot merge a geobox into itself");
        if first == second {
            return Err(ClusterError::SelfMerge(first.to_string()));
        }

        let precision = first_precision;
        let cells = self
            .levels
            .get_mut(&precision)
            .and_then(|level| level.get_mut(category))
            .ok_or_else(|| ClusterError::MissingCell(first.to_string()))?;
        let first_len = cells
            .get(first)
            .map(ClusterCell::len)
            .ok_or_else(|| ClusterError::MissingCell(first.to_string()))?;
        let second_len = cells
            .get(second)
            .map(ClusterCell::len)
            .ok_or_else(|| ClusterError::MissingCell(second.to_string()))?;

        let (target_key, source_key) = if first_len < second_len {
            (second, first)
        } else {
            (first, second)
        };

        let source = cells
            .remove(source_key)
            .ok_or_else(|| ClusterError::MissingCell(source_key.to_string()))?;
        let target = cells
            .get_mut(target_key)
            .ok_or_else(|| ClusterError::MissingCell(target_key.to_string()))?;

        for member in source.members {
            target.push(member);
            if let Some(placement) = self.placements.get_mut(&member.id) {
                placement.keys.insert(precision, target_key.to_string());
            }
        }
        target.representative = None;

        Ok(target_key.to_string())
    }

    /// Existing cells of `category` that border the geobox `key`.
    ///
    /// Points just outside the box corners are encoded at the box's precision;
    /// the key itself and boxes with no cell are excluded.
    pub fn neighbors_of(&self, key: &str, category: &str) -> NeighborKeys {
        let mut neighbors = NeighborKeys::new();
        let Some(bounds) = geohash::decode(key) else {
            return neighbors;
        };
        let precision = key.len() / 2;
        let Some(cells) = self.cells(precision, category) else {
            return neighbors;
        };

        let (south, west) = (bounds.south(), bounds.west());
        let (north, east) = (bounds.north(), bounds.east());
        let eps = NEIGHBOR_EPSILON;
        let probes = [
            (south + eps, west - eps),
            (south - eps, west + eps),
            (south - eps, west - eps),
            (south + eps, west + eps),
            (north - eps, east + eps),
            (north + eps, east - eps),
            (north + eps, east + eps),
            (north - eps, east - eps),
        ];

        for (lat, lng) in probes {
            let candidate = geohash::encode(lat, lng, precision);
            if candidate != key && cells.contains_key(&candidate) && !neighbors.contains(&candidate) {
                neighbors.push(candidate);
            }
        }
        neighbors.sort_unstable();
        neighbors
    }

    /// Set (or clear) the representative of a cell. Returns `false` if the
    /// cell does not exist.
    pub fn set_representative(
        &mut self,
        precision: usize,
        category: &str,
        key: &str,
        representative: Option<MarkerId>,
    ) -> bool {
        match self
            .levels
            .get_mut(&precision)
            .and_then(|level| level.get_mut(category))
            .and_then(|cells| cells.get_mut(key))
        {
            Some(cell) => {
                cell.representative = representative;
                true
            }
            None => false,
        }
    }

    /// Clear the representative of every cell of `category` at every precision.
    pub fn clear_representatives(&mut self, category: &str) {
        for level in self.levels.values_mut() {
            if let Some(cells) = level.get_mut(category) {
                for cell in cells.values_mut() {
                    cell.representative = None;
                }
            }
        }
    }

    /// Drop every cell and placement of `category`.
    pub fn reset_category(&mut self, category: &str) {
        for level in self.levels.values_mut() {
            level.remove(category);
        }
        self.placements
            .retain(|_, placement| placement.category != category);
    }

    /// Drop everything, levels included.
    pub fn clear(&mut self) {
        self.levels.clear();
        self.placements.clear();
    }

    pub fn stats(&self, precision: usize) -> IndexStats {
        let Some(level) = self.levels.get(&precision) else {
            return IndexStats {
                precision,
                ..IndexStats::default()
            };
        };
        let cell_count: usize = level.values().map(BTreeMap::len).sum();
        let member_count: usize = level
            .values()
            .flat_map(|cells| cells.values())
            .map(ClusterCell::len)
            .sum();
        let avg_members_per_cell = if cell_count == 0 {
            0.0
        } else {
            member_count as f64 / cell_count as f64
        };
        IndexStats {
            precision,
            cell_count,
            member_count,
            avg_members_per_cell,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> MarkerId {
        MarkerId::new(raw)
    }

    fn pt(lat: f64, lng: f64) -> Point<f64> {
        Point::new(lng, lat)
    }

    #[test]
    fn test_insert_groups_by_key() {
        let mut index = ClusterIndex::new();
        let a = index.insert(id(1), pt(33.7510, -117.8505), "crime", 10, None);
        let b = index.insert(id(2), pt(33.7520, -117.8510), "crime", 10, None);
        let c = index.insert(id(3), pt(33.7530, -117.8520), "crime", 10, None);
        assert_eq!(a, b);
        assert_eq!(b, c);

        let cell = index.cell(10, "crime", &a).unwrap();
        assert_eq!(cell.len(), 3);
        assert!((cell.centroid().y() - 33.752).abs() < 1e-9);
        assert!((cell.centroid().x() - (-117.851_166_666_666_67)).abs() < 1e-9);
        assert_eq!(index.key_of(id(2), 10), Some(a.as_str()));
        assert_eq!(index.marker_count(), 3);
        assert_eq!(index.categories(10), vec!["crime".to_string()]);
    }

    #[test]
    fn test_categories_are_partitioned() {
        let mut index = ClusterIndex::new();
        let key = index.insert(id(1), pt(10.0, 10.0), "crime", 8, None);
        index.insert(id(2), pt(10.0, 10.0), "traffic", 8, Some(&key));
        assert_eq!(index.cell(8, "crime", &key).unwrap().len(), 1);
        assert_eq!(index.cell(8, "traffic", &key).unwrap().len(), 1);
    }

    #[test]
    fn test_reinsert_moves_marker() {
        let mut index = ClusterIndex::new();
        let old = index.insert(id(1), pt(10.0, 10.0), "crime", 8, None);
        let new = index.insert(id(1), pt(-10.0, -10.0), "crime", 8, None);
        assert_ne!(old, new);
        assert!(index.cell(8, "crime", &old).is_none());
        assert_eq!(index.cell(8, "crime", &new).unwrap().len(), 1);
    }

    #[test]
    fn test_remove_recomputes_and_resets_representative() {
        let mut index = ClusterIndex::new();
        let key = index.insert(id(1), pt(0.0, 0.0), "crime", 4, None);
        index.insert(id(2), pt(2.0, 2.0), "crime", 4, None);
        index.insert(id(3), pt(4.0, 4.0), "crime", 4, None);
        assert!(index.set_representative(4, "crime", &key, Some(id(99))));

        let removal = index.remove(id(3), 4, &key).unwrap();
        assert_eq!(removal.stale_representative, Some(id(99)));
        assert!(!removal.cell_dropped);

        let cell = index.cell(4, "crime", &key).unwrap();
        assert_eq!(cell.representative(), None);
        assert_eq!(cell.centroid(), pt(1.0, 1.0));
        assert!(index.placement(id(3)).is_none());
        assert!(index.remove(id(3), 4, &key).is_none());
    }

    #[test]
    fn test_remove_last_member_drops_cell() {
        let mut index = ClusterIndex::new();
        let key = index.insert(id(1), pt(0.0, 0.0), "crime", 4, None);
        let removal = index.remove(id(1), 4, &key).unwrap();
        assert!(removal.cell_dropped);
        assert_eq!(index.cell_count(4, "crime"), 0);
    }

    #[test]
    fn test_remove_everywhere() {
        let mut index = ClusterIndex::new();
        let coarse = index.insert(id(1), pt(5.0, 5.0), "crime", 4, None);
        index.insert(id(1), pt(5.0, 5.0), "crime", 12, None);
        index.insert(id(2), pt(5.0, 5.0), "crime", 4, None);
        index.set_representative(4, "crime", &coarse, Some(id(50)));

        let stale = index.remove_everywhere(id(1));
        assert_eq!(stale, vec![id(50)]);
        assert!(index.placement(id(1)).is_none());
        assert_eq!(index.cell_count(12, "crime"), 0);
        assert_eq!(index.cell(4, "crime", &coarse).unwrap().len(), 1);
    }

    #[test]
    fn test_merge_smaller_into_larger() {
        let mut index = ClusterIndex::new();
        let big = index.insert(id(1), pt(1.0, 1.0), "crime", 6, None);
        index.insert(id(2), pt(1.0, 1.0), "crime", 6, None);
        let small = index.insert(id(3), pt(-40.0, 100.0), "crime", 6, None);

        let kept = index.merge(&small, &big, "crime").unwrap();
        assert_eq!(kept, big);
        assert!(index.cell(6, "crime", &small).is_none());

        let cell = index.cell(6, "crime", &big).unwrap();
        let ids: Vec<MarkerId> = cell.members().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![id(1), id(2), id(3)]);
        assert!((cell.centroid().y() - (-38.0 / 3.0)).abs() < 1e-9);
        assert!((cell.centroid().x() - 34.0).abs() < 1e-9);
        assert_eq!(index.key_of(id(3), 6), Some(big.as_str()));
    }

    #[test]
    fn test_merge_tie_moves_second_into_first() {
        let mut index = ClusterIndex::new();
        let first = index.insert(id(1), pt(1.0, 1.0), "crime", 6, None);
        let second = index.insert(id(2), pt(-40.0, 100.0), "crime", 6, None);
        assert_eq!(index.merge(&first, &second, "crime").unwrap(), first);
        assert_eq!(index.cell_count(6, "crime"), 1);
    }

    #[test]
    fn test_merge_missing_cell() {
        let mut index = ClusterIndex::new();
        let first = index.insert(id(1), pt(1.0, 1.0), "crime", 6, None);
        let absent = geohash::encode(-40.0, 100.0, 6);
        assert!(matches!(
            index.merge(&first, &absent, "crime"),
            Err(ClusterError::MissingCell(_))
        ));
        assert!(matches!(
            index.merge("0", &first, "crime"),
            Err(ClusterError::InvalidGeohash(_))
        ));
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "different precisions"))]
    fn test_merge_precision_mismatch() {
        let mut index = ClusterIndex::new();
        let coarse = index.insert(id(1), pt(1.0, 1.0), "crime", 6, None);
        let fine = index.insert(id(2), pt(1.0, 1.0), "crime", 7, None);
        let result = index.merge(&coarse, &fine, "crime");
        assert!(matches!(
            result,
            Err(ClusterError::PrecisionMismatch { left: 6, right: 7 })
        ));
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "into itself"))]
    fn test_merge_self() {
        let mut index = ClusterIndex::new();
        let key = index.insert(id(1), pt(1.0, 1.0), "crime", 6, None);
        assert!(matches!(
            index.merge(&key, &key, "crime"),
            Err(ClusterError::SelfMerge(_))
        ));
    }

    #[test]
    fn test_neighbors_of() {
        let mut index = ClusterIndex::new();
        let center = index.insert(id(1), pt(33.75, -117.85), "crime", 10, None);
        let bounds = geohash::decode(&center).unwrap();

        let east = index.insert(
            id(2),
            pt(bounds.center().y(), bounds.east() + 0.01),
            "crime",
            10,
            None,
        );
        let north_east = index.insert(
            id(3),
            pt(bounds.north() + 0.01, bounds.east() + 0.01),
            "crime",
            10,
            None,
        );
        // Far away cell is never a neighbour.
        index.insert(id(4), pt(-33.0, 151.0), "crime", 10, None);
        // Same box, other category.
        index.insert(id(5), pt(bounds.north() + 0.01, bounds.center().x()), "traffic", 10, None);

        let neighbors = index.neighbors_of(&center, "crime");
        assert_eq!(neighbors.len(), 2);
        assert!(neighbors.contains(&east));
        assert!(neighbors.contains(&north_east));
        assert!(!neighbors.contains(&center));

        assert!(index.neighbors_of("012", "crime").is_empty());
        assert!(index.neighbors_of(&center, "weather").is_empty());
    }

    #[test]
    fn test_clear_representatives_all_levels() {
        let mut index = ClusterIndex::new();
        let coarse = index.insert(id(1), pt(1.0, 1.0), "crime", 4, None);
        let fine = index.insert(id(1), pt(1.0, 1.0), "crime", 8, None);
        index.set_representative(4, "crime", &coarse, Some(id(7)));
        index.set_representative(8, "crime", &fine, Some(id(8)));

        index.clear_representatives("crime");
        assert_eq!(index.cell(4, "crime", &coarse).unwrap().representative(), None);
        assert_eq!(index.cell(8, "crime", &fine).unwrap().representative(), None);
        assert!(!index.set_representative(4, "crime", "0000", None));
    }

    #[test]
    fn test_reset_category_and_stats() {
        let mut index = ClusterIndex::new();
        index.insert(id(1), pt(1.0, 1.0), "crime", 4, None);
        index.insert(id(2), pt(1.0, 1.0), "crime", 4, None);
        index.insert(id(3), pt(50.0, 1.0), "traffic", 4, None);

        let stats = index.stats(4);
        assert_eq!(stats.cell_count, 2);
        assert_eq!(stats.member_count, 3);
        assert!((stats.avg_members_per_cell - 1.5).abs() < f64::EPSILON);

        index.reset_category("crime");
        assert_eq!(index.cell_count(4, "crime"), 0);
        assert_eq!(index.marker_count(), 1);
        assert_eq!(index.categories(4), vec!["traffic".to_string()]);
        assert!(index.has_level(4));

        index.clear();
        assert!(!index.has_level(4));
        assert_eq!(index.stats(4).cell_count, 0);
    }
}
