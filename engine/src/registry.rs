//! Selection bookkeeping for one mesh.
//!
//! Selections occupy a dense id range `0..len`. Only the highest id can be
//! removed, so ids stay stable for as long as a selection lives and are only
//! ever reused after the top selection is dropped.

use std::fmt;

use thiserror::Error;
use tracing::{debug, info};

use grasp_types::{MAX_SELECTIONS, SelectionId, SelectionSet, SharedInputState};

use crate::geometry::EngineReadback;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("selection registry is full ({MAX_SELECTIONS} selections)")]
pub struct RegistryFull;

/// Read-only view of one selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub id: SelectionId,
    pub vertex_count: u32,
    pub visible: bool,
}

/// Outcome of the per-selection "clear" button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    /// The selection had vertices; a clear was queued for the next tick.
    ClearRequested,
    /// The selection was empty and the top one, so it was removed.
    Removed,
    /// Empty but not removable (not the top selection, or the only one).
    Ignored,
}

#[derive(Debug, Clone)]
pub struct SelectionRegistry {
    len: usize,
    sizes: [u32; MAX_SELECTIONS],
    visible: SelectionSet,
    active: SelectionId,
    visible_mask_changed: bool,
    pending_clear: SelectionSet,
    selected_vertices: u32,
    vertex_count: u32,
    face_count: u32,
}

impl Default for SelectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionRegistry {
    /// A registry holding a single visible, active selection (id 0).
    #[must_use]
    pub fn new() -> Self {
        Self {
            len: 1,
            sizes: [0; MAX_SELECTIONS],
            visible: SelectionSet::single(SelectionId::FIRST),
            active: SelectionId::FIRST,
            visible_mask_changed: false,
            pending_clear: SelectionSet::EMPTY,
            selected_vertices: 0,
            vertex_count: 0,
            face_count: 0,
        }
    }

    /// A registry with `count` selections (clamped to `1..=32`), all visible.
    /// The highest one is active, as if each had been added in turn.
    #[must_use]
    pub fn with_selections(count: usize) -> Self {
        let mut registry = Self::new();
        for _ in 1..count.clamp(1, MAX_SELECTIONS) {
            let _ = registry.try_add();
        }
        registry
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Never true: the last selection cannot be removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn contains(&self, id: SelectionId) -> bool {
        id.index() < self.len
    }

    /// Ids of every existing selection.
    #[must_use]
    pub fn existing(&self) -> SelectionSet {
        SelectionSet::first_n(self.len)
    }

    #[must_use]
    pub fn visible_mask(&self) -> SelectionSet {
        self.visible & self.existing()
    }

    #[must_use]
    pub fn active(&self) -> SelectionId {
        self.active
    }

    #[must_use]
    pub fn last(&self) -> SelectionId {
        SelectionId::new((self.len - 1) as u32).unwrap_or(SelectionId::FIRST)
    }

    /// Add a selection. It starts visible and becomes the active one.
    pub fn try_add(&mut self) -> Result<SelectionId, RegistryFull> {
        let id = SelectionId::new(self.len as u32).map_err(|_| RegistryFull)?;
        self.len += 1;
        self.sizes[id.index()] = 0;
        self.visible.insert(id);
        self.active = id;
        info!(%id, total = self.len, "selection added");
        Ok(id)
    }

    /// Remove `id` if it is the top selection, empty, and not the only one.
    /// Anything else is a no-op returning `false`.
    pub fn remove(&mut self, id: SelectionId) -> bool {
        let removable = id == self.last() && self.sizes[id.index()] == 0 && self.len > 1;
        if !removable {
            debug!(%id, total = self.len, "ignoring illegal selection removal");
            return false;
        }

        if self.active == id {
            self.active = id.prev().unwrap_or(SelectionId::FIRST);
        }
        self.len -= 1;
        self.sizes[id.index()] = 0;
        self.visible.remove(id);
        self.pending_clear.remove(id);
        info!(%id, total = self.len, "selection removed");
        true
    }

    /// Flip visibility of `id`, returning whether it is now visible.
    ///
    /// Repainting is only requested when the selection has vertices to show
    /// or hide.
    pub fn toggle_visibility(&mut self, id: SelectionId) -> bool {
        if !self.contains(id) {
            return false;
        }
        let visible = self.visible.toggle(id);
        if self.sizes[id.index()] > 0 {
            self.visible_mask_changed = true;
        }
        visible
    }

    pub fn set_active(&mut self, id: SelectionId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.active = id;
        true
    }

    /// Clear a selection with vertices, or drop it if it is already empty.
    pub fn clear_or_remove(&mut self, id: SelectionId) -> ClearOutcome {
        if !self.contains(id) {
            return ClearOutcome::Ignored;
        }
        if self.sizes[id.index()] > 0 {
            self.pending_clear.insert(id);
            ClearOutcome::ClearRequested
        } else if self.remove(id) {
            ClearOutcome::Removed
        } else {
            ClearOutcome::Ignored
        }
    }

    #[must_use]
    pub fn vertex_count(&self, id: SelectionId) -> u32 {
        if self.contains(id) {
            self.sizes[id.index()]
        } else {
            0
        }
    }

    /// Vertices that belong to at least one selection.
    #[must_use]
    pub fn total_vertex_count(&self) -> u32 {
        self.selected_vertices
    }

    #[must_use]
    pub fn get(&self, id: SelectionId) -> Option<Selection> {
        self.contains(id).then(|| Selection {
            id,
            vertex_count: self.sizes[id.index()],
            visible: self.visible.contains(id),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Selection> + '_ {
        self.existing().iter().filter_map(|id| self.get(id))
    }

    /// Copy counts from an engine readback. Mesh totals are always taken;
    /// per-selection sizes only when the readback is dirty. Returns whether
    /// anything changed.
    pub fn refresh(&mut self, readback: &EngineReadback) -> bool {
        let mesh_changed =
            self.vertex_count != readback.vertex_count || self.face_count != readback.face_count;
        self.vertex_count = readback.vertex_count;
        self.face_count = readback.face_count;
        if !readback.dirty {
            return mesh_changed;
        }
        for id in self.existing().iter() {
            self.sizes[id.index()] = readback.selection_size(id);
        }
        self.selected_vertices = readback.selected_vertices;
        true
    }

    /// Take every count from `readback`, dirty or not. Used for the snapshot
    /// an engine reports before any command has run.
    pub fn seed(&mut self, readback: &EngineReadback) {
        self.refresh(&EngineReadback {
            dirty: true,
            ..*readback
        });
    }

    /// Write the registry-owned fields into this tick's shared input and
    /// consume the one-shot flags.
    pub fn stamp(&mut self, shared: &mut SharedInputState) {
        shared.active_selection_id = self.active;
        shared.visible_selection_mask = self.visible_mask();
        shared.visible_mask_changed |= std::mem::take(&mut self.visible_mask_changed);
        shared.clear_selection_mask =
            (shared.clear_selection_mask | std::mem::take(&mut self.pending_clear)) & self.existing();
    }

    #[must_use]
    pub fn summary(&self) -> SelectionSummary {
        SelectionSummary {
            selected_vertices: self.selected_vertices,
            vertex_count: self.vertex_count,
            face_count: self.face_count,
        }
    }
}

/// Mesh-level counts as shown next to the selection list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionSummary {
    pub selected_vertices: u32,
    pub vertex_count: u32,
    pub face_count: u32,
}

impl fmt::Display for SelectionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "V: {}/{} F: {}",
            self.selected_vertices, self.vertex_count, self.face_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(index: u32) -> SelectionId {
        SelectionId::new(index).unwrap()
    }

    fn readback_with(sizes: &[(u32, u32)]) -> EngineReadback {
        let mut readback = EngineReadback {
            dirty: true,
            ..EngineReadback::default()
        };
        for &(index, size) in sizes {
            readback.selection_sizes[index as usize] = size;
        }
        readback
    }

    #[test]
    fn starts_with_one_visible_active_selection() {
        let registry = SelectionRegistry::new();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.active(), SelectionId::FIRST);
        assert_eq!(registry.visible_mask().bits(), 0b1);
    }

    #[test]
    fn iter_lists_existing_selections_in_order() {
        let mut registry = SelectionRegistry::with_selections(3);
        registry.toggle_visibility(id(1));
        registry.refresh(&readback_with(&[(2, 4)]));

        let listed: Vec<_> = registry
            .iter()
            .map(|s| (s.id.value(), s.vertex_count, s.visible))
            .collect();
        assert_eq!(listed, vec![(0, 0, true), (1, 0, false), (2, 4, true)]);
    }

    #[test]
    fn add_makes_new_selection_active_and_visible() {
        let mut registry = SelectionRegistry::new();
        let added = registry.try_add().unwrap();
        assert_eq!(added, id(1));
        assert_eq!(registry.active(), id(1));
        assert!(registry.get(added).unwrap().visible);
    }

    #[test]
    fn thirty_third_add_fails_and_changes_nothing() {
        let mut registry = SelectionRegistry::with_selections(MAX_SELECTIONS);
        assert_eq!(registry.len(), 32);
        let before = registry.clone();

        assert_eq!(registry.try_add(), Err(RegistryFull));
        assert_eq!(registry.len(), 32);
        assert_eq!(registry.active(), before.active());
        assert_eq!(registry.visible_mask(), before.visible_mask());
    }

    #[test]
    fn add_succeeds_exactly_while_below_capacity() {
        let mut registry = SelectionRegistry::new();
        for expected in 1..32 {
            assert_eq!(registry.try_add().map(SelectionId::value), Ok(expected));
        }
        assert!(registry.try_add().is_err());
    }

    #[test]
    fn remove_only_top_empty_selection() {
        let mut registry = SelectionRegistry::with_selections(3);
        assert!(!registry.remove(id(1)), "not the top selection");

        registry.refresh(&readback_with(&[(2, 5)]));
        assert!(!registry.remove(id(2)), "not empty");

        registry.refresh(&readback_with(&[(2, 0)]));
        assert!(registry.remove(id(2)));
        assert_eq!(registry.len(), 2);
        assert!(!registry.visible_mask().contains(id(2)));
    }

    #[test]
    fn remove_never_empties_registry() {
        let mut registry = SelectionRegistry::new();
        assert!(!registry.remove(SelectionId::FIRST));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn removing_active_selection_activates_previous() {
        let mut registry = SelectionRegistry::with_selections(2);
        assert_eq!(registry.active(), id(1));
        assert!(registry.remove(id(1)));
        assert_eq!(registry.active(), id(0));
    }

    #[test]
    fn removed_id_is_reused_by_next_add() {
        let mut registry = SelectionRegistry::with_selections(2);
        assert!(registry.remove(id(1)));
        assert_eq!(registry.try_add(), Ok(id(1)));
        assert!(registry.visible_mask().contains(id(1)));
    }

    #[test]
    fn toggle_visibility_flags_repaint_only_for_non_empty() {
        let mut registry = SelectionRegistry::with_selections(2);
        assert!(!registry.toggle_visibility(id(0)));
        let mut shared = SharedInputState::default();
        registry.stamp(&mut shared);
        assert!(!shared.visible_mask_changed);

        registry.refresh(&readback_with(&[(1, 4)]));
        registry.toggle_visibility(id(1));
        let mut shared = SharedInputState::default();
        registry.stamp(&mut shared);
        assert!(shared.visible_mask_changed);
        assert!(shared.visible_selection_mask.is_empty());

        // One-shot: consumed by the stamp above.
        let mut shared = SharedInputState::default();
        registry.stamp(&mut shared);
        assert!(!shared.visible_mask_changed);
    }

    #[test]
    fn clear_or_remove_picks_action_by_size() {
        let mut registry = SelectionRegistry::with_selections(3);
        registry.refresh(&readback_with(&[(0, 7)]));

        assert_eq!(registry.clear_or_remove(id(0)), ClearOutcome::ClearRequested);
        assert_eq!(registry.clear_or_remove(id(1)), ClearOutcome::Ignored);
        assert_eq!(registry.clear_or_remove(id(2)), ClearOutcome::Removed);

        let mut shared = SharedInputState::default();
        registry.stamp(&mut shared);
        assert_eq!(shared.clear_selection_mask, SelectionSet::single(id(0)));
    }

    #[test]
    fn clean_readback_updates_mesh_totals_only() {
        let mut registry = SelectionRegistry::new();
        let mut readback = readback_with(&[(0, 9)]);
        readback.dirty = false;
        readback.vertex_count = 25;
        readback.face_count = 32;

        assert!(registry.refresh(&readback));
        assert_eq!(registry.vertex_count(SelectionId::FIRST), 0);
        assert_eq!(registry.summary().to_string(), "V: 0/25 F: 32");
        assert!(!registry.refresh(&readback), "same totals again");
    }

    #[test]
    fn seed_takes_sizes_from_clean_snapshot() {
        let mut registry = SelectionRegistry::with_selections(2);
        let mut readback = readback_with(&[(1, 3)]);
        readback.dirty = false;
        readback.selected_vertices = 3;
        readback.vertex_count = 10;

        registry.seed(&readback);
        assert_eq!(registry.vertex_count(id(1)), 3);
        assert_eq!(registry.summary().to_string(), "V: 3/10 F: 0");
    }

    #[test]
    fn summary_formats_counts() {
        let mut registry = SelectionRegistry::new();
        registry.refresh(&EngineReadback {
            selected_vertices: 12,
            vertex_count: 100,
            face_count: 196,
            dirty: true,
            ..EngineReadback::default()
        });
        assert_eq!(registry.total_vertex_count(), 12);
        assert_eq!(registry.summary().to_string(), "V: 12/100 F: 196");
    }
}
