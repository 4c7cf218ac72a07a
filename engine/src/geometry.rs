//! Seam to the external geometry engine.
//!
//! [`GeometryEngine`] is the capability contract the rest of the crate relies
//! on. Implementations own their own synchronization: queries may arrive from
//! the producer thread while the worker is mutating.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use grasp_types::{MAX_SELECTIONS, Quat, SelectionId, SelectionMode, SelectionSet, Vec3};

use crate::commands::{EngineCommand, Pivot};

pub trait GeometryEngine: Send + Sync {
    /// Selections that have at least one vertex inside the sphere.
    fn selection_mask_under_sphere(&self, position: Vec3, radius: f32) -> SelectionSet;
    fn select_sphere(&self, position: Vec3, radius: f32, target: SelectionId, mode: SelectionMode);
    fn translate_selection(&self, translate: Vec3, mask: SelectionSet);
    fn transform_selection(
        &self,
        translate: Vec3,
        scale: f32,
        rotate: Quat,
        pivot: Vec3,
        mask: SelectionSet,
    );
    fn selection_centroid(&self, mask: SelectionSet) -> Vec3;
    fn clear_selections(&self, mask: SelectionSet);
    fn recolor_by_visibility(&self, mask: SelectionSet);
    fn reset_all_vertices(&self);
    fn release_selection(&self, id: SelectionId);
    /// Snapshot of counts. Reading it clears the engine's dirty flag.
    fn readback(&self) -> EngineReadback;
}

/// Counts published by the worker after it drains a batch of commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineReadback {
    pub selection_sizes: [u32; MAX_SELECTIONS],
    /// Vertices belonging to at least one selection.
    pub selected_vertices: u32,
    pub vertex_count: u32,
    pub face_count: u32,
    /// Selection membership changed since the previous readback.
    pub dirty: bool,
}

impl Default for EngineReadback {
    fn default() -> Self {
        Self {
            selection_sizes: [0; MAX_SELECTIONS],
            selected_vertices: 0,
            vertex_count: 0,
            face_count: 0,
            dirty: false,
        }
    }
}

impl EngineReadback {
    #[must_use]
    pub fn selection_size(&self, id: SelectionId) -> u32 {
        self.selection_sizes[id.index()]
    }
}

/// Executes [`EngineCommand`]s against an engine, one call per command.
pub struct GeometryEngineClient<E: ?Sized> {
    engine: Arc<E>,
}

impl<E: ?Sized> Clone for GeometryEngineClient<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<E: ?Sized> fmt::Debug for GeometryEngineClient<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeometryEngineClient").finish_non_exhaustive()
    }
}

impl<E: GeometryEngine + ?Sized> GeometryEngineClient<E> {
    pub fn new(engine: Arc<E>) -> Self {
        Self { engine }
    }

    pub fn execute(&self, command: &EngineCommand) {
        debug!(kind = command.kind(), "executing engine command");
        match *command {
            EngineCommand::SelectSphere {
                position,
                radius,
                target,
                mode,
                ..
            } => self.engine.select_sphere(position, radius, target, mode),
            EngineCommand::TranslateSelection { translate, mask } => {
                if mask.any() {
                    self.engine.translate_selection(translate, mask);
                }
            }
            EngineCommand::TransformSelection {
                translate,
                scale,
                rotate,
                pivot,
                mask,
            } => {
                if mask.is_empty() {
                    return;
                }
                let pivot = match pivot {
                    Pivot::Point(point) => point,
                    Pivot::SelectionCentroid => self.engine.selection_centroid(mask),
                };
                self.engine
                    .transform_selection(translate, scale, rotate, pivot, mask);
            }
            EngineCommand::ClearSelections { mask } => {
                if mask.any() {
                    self.engine.clear_selections(mask);
                }
            }
            EngineCommand::RecolorByVisibility { mask } => self.engine.recolor_by_visibility(mask),
            EngineCommand::ResetAllVertices => self.engine.reset_all_vertices(),
            EngineCommand::ReleaseSelection { id } => self.engine.release_selection(id),
        }
    }

    #[must_use]
    pub fn readback(&self) -> EngineReadback {
        self.engine.readback()
    }
}
