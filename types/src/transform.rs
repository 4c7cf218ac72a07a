//! Per-gesture transform parameters.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// What a rotation/scale pivots about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PivotMode {
    /// Pivot about the mesh origin. Currently resolved the same way as
    /// [`PivotMode::Hand`]: the hand position supplied in the delta.
    Mesh,
    #[default]
    Hand,
    /// Pivot about the centroid of the vertices being transformed.
    Selection,
}

/// Transform accumulated by a hand (or both hands jointly) since the last tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformDelta {
    pub translate: Vec3,
    pub rotate: Quat,
    pub scale: f32,
    pub pivot_mode: PivotMode,
    /// World position of the hand when the delta was sampled.
    pub pivot: Vec3,
}

impl Default for TransformDelta {
    fn default() -> Self {
        Self {
            translate: Vec3::ZERO,
            rotate: Quat::IDENTITY,
            scale: 1.0,
            pivot_mode: PivotMode::default(),
            pivot: Vec3::ZERO,
        }
    }
}

impl TransformDelta {
    #[must_use]
    pub fn translation(translate: Vec3) -> Self {
        Self {
            translate,
            ..Self::default()
        }
    }

    /// True iff the rotation is exactly identity and the scale exactly 1.
    ///
    /// Exact comparison: any deviation, however small, takes the pivot path.
    #[must_use]
    pub fn is_pure_translation(&self) -> bool {
        self.rotate == Quat::IDENTITY && self.scale == 1.0
    }

}
