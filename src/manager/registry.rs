//! Marker storage owned by the manager.
//!
//! Markers live in an id-keyed arena together with their [`MarkerMeta`];
//! a category/subcategory table preserves registration order for lookups.
//! Flips of the `rendered` flag are recorded so the host can replay them.

use crate::marker::{CategoryCounts, Marker, MarkerId, MarkerMeta, RenderChange};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub(crate) struct MarkerEntry {
    pub marker: Marker,
    pub meta: MarkerMeta,
}

#[derive(Debug, Default)]
pub(crate) struct MarkerStore {
    next_id: u64,
    entries: FxHashMap<MarkerId, MarkerEntry>,
    by_category: BTreeMap<String, BTreeMap<String, Vec<MarkerId>>>,
    changes: Vec<RenderChange>,
}

impl MarkerStore {
    pub fn insert(&mut self, marker: Marker, meta: MarkerMeta) -> MarkerId {
        let id = MarkerId::new(self.next_id);
        self.next_id += 1;
        self.by_category
            .entry(meta.category.clone())
            .or_default()
            .entry(meta.subcategory.clone())
            .or_default()
            .push(id);
        self.entries.insert(id, MarkerEntry { marker, meta });
        id
    }

    /// Unregister a marker. A rendered marker is reported as un-rendered.
    pub fn remove(&mut self, id: MarkerId) -> Option<MarkerEntry> {
        let entry = self.entries.remove(&id)?;
        if entry.marker.is_rendered() {
            self.changes.push(RenderChange {
                id,
                rendered: false,
            });
        }
        if let Some(subcategories) = self.by_category.get_mut(&entry.meta.category)
            && let Some(ids) = subcategories.get_mut(&entry.meta.subcategory)
        {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                subcategories.remove(&entry.meta.subcategory);
            }
        }
        Some(entry)
    }

    pub fn get(&self, id: MarkerId) -> Option<&MarkerEntry> {
        self.entries.get(&id)
    }

    pub fn meta(&self, id: MarkerId) -> Option<&MarkerMeta> {
        self.entries.get(&id).map(|entry| &entry.meta)
    }

    pub fn meta_mut(&mut self, id: MarkerId) -> Option<&mut MarkerMeta> {
        self.entries.get_mut(&id).map(|entry| &mut entry.meta)
    }

    pub fn marker_mut(&mut self, id: MarkerId) -> Option<&mut Marker> {
        self.entries.get_mut(&id).map(|entry| &mut entry.marker)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Ids matching an optional category and subcategory, in registration
    /// order within each subcategory.
    pub fn ids(&self, category: Option<&str>, subcategory: Option<&str>) -> Vec<MarkerId> {
        let select = |subcategories: &BTreeMap<String, Vec<MarkerId>>| -> Vec<MarkerId> {
            match subcategory {
                Some(subcategory) => subcategories.get(subcategory).cloned().unwrap_or_default(),
                None => subcategories.values().flatten().copied().collect(),
            }
        };
        match category {
            Some(category) => self.by_category.get(category).map(select).unwrap_or_default(),
            None => self.by_category.values().flat_map(select).collect(),
        }
    }

    /// Set the rendered flag, recording the flip. Returns whether it changed.
    pub fn set_rendered(&mut self, id: MarkerId, rendered: bool) -> bool {
        let changed = self
            .entries
            .get_mut(&id)
            .is_some_and(|entry| entry.marker.set_rendered(rendered));
        if changed {
            self.changes.push(RenderChange { id, rendered });
        }
        changed
    }

    /// Unregister every marker of a category.
    pub fn remove_category(&mut self, category: &str) -> Vec<MarkerId> {
        let ids = self.ids(Some(category), None);
        for id in &ids {
            self.remove(*id);
        }
        self.by_category.remove(category);
        ids
    }

    /// Render a marker and count it as visible.
    pub fn show(&mut self, id: MarkerId, counts: &mut CategoryCounts) {
        if self.set_rendered(id, true) {
            counts.visible += 1;
            log::trace!("rendered {id}");
        }
        if let Some(meta) = self.meta_mut(id) {
            meta.visible = true;
        }
    }

    /// Un-render a marker and withdraw it from the visible count.
    pub fn hide(&mut self, id: MarkerId, counts: &mut CategoryCounts) {
        if self.set_rendered(id, false) {
            counts.visible = counts.visible.saturating_sub(1);
            log::trace!("un-rendered {id}");
        }
        if let Some(meta) = self.meta_mut(id) {
            meta.visible = false;
        }
    }

    pub fn set_visible(&mut self, id: MarkerId, visible: bool) {
        if let Some(meta) = self.meta_mut(id) {
            meta.visible = visible;
        }
    }

    pub fn drain_changes(&mut self) -> Vec<RenderChange> {
        std::mem::take(&mut self.changes)
    }
}
