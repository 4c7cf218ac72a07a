//! In-memory [`GeometryEngine`] used by the CLI replay and integration tests.
//!
//! Each vertex carries a position, its spawn position, and a `u32` of
//! selection membership bits. There is no rendering; recolor requests only
//! record the mask they were given.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use grasp_types::{Quat, SelectionId, SelectionMode, SelectionSet, Vec3};

use crate::geometry::{EngineReadback, GeometryEngine};

#[derive(Debug)]
struct Mesh {
    positions: Vec<Vec3>,
    spawn: Vec<Vec3>,
    membership: Vec<u32>,
    face_count: u32,
    color_mask: SelectionSet,
    dirty: bool,
}

#[derive(Debug)]
pub struct HeadlessEngine {
    mesh: RwLock<Mesh>,
}

impl HeadlessEngine {
    #[must_use]
    pub fn new(positions: Vec<Vec3>, face_count: u32) -> Self {
        let membership = vec![0; positions.len()];
        Self {
            mesh: RwLock::new(Mesh {
                spawn: positions.clone(),
                positions,
                membership,
                face_count,
                color_mask: SelectionSet::ALL,
                dirty: false,
            }),
        }
    }

    /// `n` x `n` vertices spanning the unit square on the XZ plane, two
    /// triangles per cell.
    #[must_use]
    pub fn grid(n: usize) -> Self {
        let n = n.max(2);
        let step = 1.0 / (n - 1) as f32;
        let positions = (0..n)
            .flat_map(|row| (0..n).map(move |col| Vec3::new(col as f32 * step, 0.0, row as f32 * step)))
            .collect();
        let cells = u32::try_from((n - 1) * (n - 1)).unwrap_or(u32::MAX / 2);
        Self::new(positions, cells * 2)
    }

    fn read(&self) -> RwLockReadGuard<'_, Mesh> {
        self.mesh.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Mesh> {
        self.mesh.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn positions(&self) -> Vec<Vec3> {
        self.read().positions.clone()
    }

    #[must_use]
    pub fn membership(&self, vertex: usize) -> SelectionSet {
        self.read()
            .membership
            .get(vertex)
            .map_or(SelectionSet::EMPTY, |bits| SelectionSet::from_bits(*bits))
    }

    /// Mask passed to the latest recolor request.
    #[must_use]
    pub fn color_mask(&self) -> SelectionSet {
        self.read().color_mask
    }

    fn apply(&self, mask: SelectionSet, mut f: impl FnMut(&mut Vec3)) {
        let mut mesh = self.write();
        let Mesh {
            positions,
            membership,
            ..
        } = &mut *mesh;
        for (position, bits) in positions.iter_mut().zip(membership.iter()) {
            if bits & mask.bits() != 0 {
                f(position);
            }
        }
    }
}

impl GeometryEngine for HeadlessEngine {
    fn selection_mask_under_sphere(&self, position: Vec3, radius: f32) -> SelectionSet {
        let mesh = self.read();
        let radius_sq = radius * radius;
        let bits = mesh
            .positions
            .iter()
            .zip(&mesh.membership)
            .filter(|(p, _)| p.distance_squared(position) <= radius_sq)
            .fold(0, |acc, (_, bits)| acc | bits);
        SelectionSet::from_bits(bits)
    }

    fn select_sphere(&self, position: Vec3, radius: f32, target: SelectionId, mode: SelectionMode) {
        let mut mesh = self.write();
        let radius_sq = radius * radius;
        let bit = 1u32 << target.index();
        let mut changed = 0usize;
        let Mesh {
            positions,
            membership,
            dirty,
            ..
        } = &mut *mesh;
        for (p, bits) in positions.iter().zip(membership.iter_mut()) {
            if p.distance_squared(position) > radius_sq {
                continue;
            }
            let before = *bits;
            match mode {
                SelectionMode::Add => *bits |= bit,
                SelectionMode::Subtract => *bits &= !bit,
                SelectionMode::Toggle => *bits ^= bit,
            }
            if *bits != before {
                changed += 1;
            }
        }
        if changed > 0 {
            *dirty = true;
            debug!(selection = target.value(), changed, "sphere selection updated");
        }
    }

    fn translate_selection(&self, translate: Vec3, mask: SelectionSet) {
        self.apply(mask, |p| *p += translate);
    }

    fn transform_selection(
        &self,
        translate: Vec3,
        scale: f32,
        rotate: Quat,
        pivot: Vec3,
        mask: SelectionSet,
    ) {
        self.apply(mask, |p| *p = rotate * ((*p - pivot) * scale) + pivot + translate);
    }

    fn selection_centroid(&self, mask: SelectionSet) -> Vec3 {
        let mesh = self.read();
        let (sum, count) = mesh
            .positions
            .iter()
            .zip(&mesh.membership)
            .filter(|(_, bits)| *bits & mask.bits() != 0)
            .fold((Vec3::ZERO, 0u32), |(sum, count), (p, _)| (sum + *p, count + 1));
        if count == 0 {
            Vec3::ZERO
        } else {
            sum / count as f32
        }
    }

    fn clear_selections(&self, mask: SelectionSet) {
        let mut mesh = self.write();
        let mut changed = false;
        for bits in &mut mesh.membership {
            if *bits & mask.bits() != 0 {
                *bits &= !mask.bits();
                changed = true;
            }
        }
        mesh.dirty |= changed;
    }

    fn recolor_by_visibility(&self, mask: SelectionSet) {
        self.write().color_mask = mask;
    }

    fn reset_all_vertices(&self) {
        let mut mesh = self.write();
        let Mesh {
            positions, spawn, ..
        } = &mut *mesh;
        positions.copy_from_slice(spawn.as_slice());
    }

    fn release_selection(&self, id: SelectionId) {
        let bit = 1u32 << id.index();
        let mut mesh = self.write();
        let mut changed = false;
        for bits in &mut mesh.membership {
            if *bits & bit != 0 {
                *bits &= !bit;
                changed = true;
            }
        }
        mesh.dirty |= changed;
    }

    fn readback(&self) -> EngineReadback {
        let mut mesh = self.write();
        let mut readback = EngineReadback {
            vertex_count: u32::try_from(mesh.positions.len()).unwrap_or(u32::MAX),
            face_count: mesh.face_count,
            dirty: mesh.dirty,
            ..EngineReadback::default()
        };
        for bits in &mesh.membership {
            if *bits != 0 {
                readback.selected_vertices += 1;
            }
            for (slot, size) in readback.selection_sizes.iter_mut().enumerate() {
                if *bits & (1u32 << slot) != 0 {
                    *size += 1;
                }
            }
        }
        mesh.dirty = false;
        readback
    }
}
