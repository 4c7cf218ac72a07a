//! "What's under the brush" query.

use grasp_types::{SelectionSet, Vec3};

use crate::geometry::GeometryEngine;

/// Sphere query against the engine, restricted to visible selections.
///
/// Holds no state of its own: the result is a function of the engine's
/// current geometry, the brush sphere, and the visible mask.
#[derive(Clone, Copy)]
pub struct BrushProbe<'a> {
    engine: &'a dyn GeometryEngine,
    visible: SelectionSet,
}

impl<'a> BrushProbe<'a> {
    pub fn new(engine: &'a dyn GeometryEngine, visible: SelectionSet) -> Self {
        Self { engine, visible }
    }

    /// Visible selections with a vertex inside the sphere. Empty when nothing
    /// is hit or nothing hit is visible.
    #[must_use]
    pub fn query(&self, position: Vec3, radius: f32) -> SelectionSet {
        if self.visible.is_empty() {
            return SelectionSet::EMPTY;
        }
        self.engine.selection_mask_under_sphere(position, radius) & self.visible
    }
}
