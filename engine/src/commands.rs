//! Commands emitted by the coordinator and executed by the worker.
//!
//! A command is an immutable value. Once pushed it is owned by the queue
//! until the worker executes it or a newer command supersedes it.

use grasp_types::{Hand, Quat, SelectionId, SelectionMode, SelectionSet, TransformDelta, Vec3};

/// Point a rotation/scale pivots about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pivot {
    /// A fixed world-space point (the hand position).
    Point(Vec3),
    /// Centroid of the vertices addressed by the command's mask, computed by
    /// the worker right before the transform runs.
    SelectionCentroid,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineCommand {
    SelectSphere {
        hand: Hand,
        position: Vec3,
        radius: f32,
        target: SelectionId,
        mode: SelectionMode,
    },
    TranslateSelection {
        translate: Vec3,
        mask: SelectionSet,
    },
    TransformSelection {
        translate: Vec3,
        scale: f32,
        rotate: Quat,
        pivot: Pivot,
        mask: SelectionSet,
    },
    ClearSelections {
        mask: SelectionSet,
    },
    RecolorByVisibility {
        mask: SelectionSet,
    },
    ResetAllVertices,
    /// Drop all membership of a selection that was removed from the registry.
    ReleaseSelection {
        id: SelectionId,
    },
}

/// Identity of the target a command acts on. Two pending commands with the
/// same key are redundant: the newer one supersedes the older.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoalesceKey {
    Transform(SelectionSet),
    Select {
        hand: Hand,
        target: SelectionId,
        mode: SelectionMode,
    },
    Recolor,
}

impl EngineCommand {
    /// Build the cheapest command that applies `delta` to `mask` about `pivot`.
    #[must_use]
    pub fn from_delta(delta: &TransformDelta, pivot: Pivot, mask: SelectionSet) -> Self {
        if delta.is_pure_translation() {
            EngineCommand::TranslateSelection {
                translate: delta.translate,
                mask,
            }
        } else {
            EngineCommand::TransformSelection {
                translate: delta.translate,
                scale: delta.scale,
                rotate: delta.rotate,
                pivot,
                mask,
            }
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            EngineCommand::SelectSphere { .. } => "select_sphere",
            EngineCommand::TranslateSelection { .. } => "translate_selection",
            EngineCommand::TransformSelection { .. } => "transform_selection",
            EngineCommand::ClearSelections { .. } => "clear_selections",
            EngineCommand::RecolorByVisibility { .. } => "recolor_by_visibility",
            EngineCommand::ResetAllVertices => "reset_all_vertices",
            EngineCommand::ReleaseSelection { .. } => "release_selection",
        }
    }

    /// `None` marks a barrier: never coalesced, never reordered.
    #[must_use]
    pub const fn coalesce_key(&self) -> Option<CoalesceKey> {
        match *self {
            EngineCommand::SelectSphere {
                hand, target, mode, ..
            } => Some(CoalesceKey::Select { hand, target, mode }),
            EngineCommand::TranslateSelection { mask, .. }
            | EngineCommand::TransformSelection { mask, .. } => Some(CoalesceKey::Transform(mask)),
            EngineCommand::RecolorByVisibility { .. } => Some(CoalesceKey::Recolor),
            EngineCommand::ClearSelections { .. }
            | EngineCommand::ResetAllVertices
            | EngineCommand::ReleaseSelection { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_barrier(&self) -> bool {
        self.coalesce_key().is_none()
    }

    /// Replace `stale` (a not-yet-started command with the same key) by `self`.
    ///
    /// Transforms merge into one motion equal to running `stale` and then
    /// `self`. Returns `None` when no single command reproduces that, and
    /// both have to stay queued. Everything else simply takes the newer value.
    #[must_use]
    pub fn supersede(self, stale: &EngineCommand) -> Option<EngineCommand> {
        match (stale.motion(), self.motion()) {
            (Some((older, mask)), Some((newer, _))) => {
                older.then(newer).map(|motion| motion.into_command(mask))
            }
            _ => Some(self),
        }
    }

    /// Whether this pending transform can run after `other` instead of before
    /// it with the same result.
    ///
    /// Selects change membership and never commute. Two motions commute when
    /// both are pure translations, or when their masks share no selection.
    #[must_use]
    pub fn reorders_past(&self, other: &EngineCommand) -> bool {
        match (self.motion(), other.motion()) {
            (Some((ours, our_mask)), Some((theirs, their_mask))) => {
                (ours.pivot.is_none() && theirs.pivot.is_none())
                    || (our_mask & their_mask).is_empty()
            }
            (_, None) => matches!(other, EngineCommand::RecolorByVisibility { .. }),
            (None, Some(_)) => false,
        }
    }

    fn motion(&self) -> Option<(Motion, SelectionSet)> {
        match *self {
            EngineCommand::TranslateSelection { translate, mask } => Some((
                Motion {
                    translate,
                    rotate: Quat::IDENTITY,
                    scale: 1.0,
                    pivot: None,
                },
                mask,
            )),
            EngineCommand::TransformSelection {
                translate,
                scale,
                rotate,
                pivot,
                mask,
            } => Some((
                Motion {
                    translate,
                    rotate,
                    scale,
                    pivot: Some(pivot),
                },
                mask,
            )),
            _ => None,
        }
    }
}

/// `p -> rotate * (scale * (p - c)) + c + translate` about pivot `c`.
///
/// `pivot: None` is a pure translation, which is the same motion about any
/// pivot.
#[derive(Debug, Clone, Copy)]
struct Motion {
    translate: Vec3,
    rotate: Quat,
    scale: f32,
    pivot: Option<Pivot>,
}

impl Motion {
    /// One motion equal to `self` followed by `later`.
    ///
    /// A fixed point cannot be combined with a selection centroid: the
    /// centroid seen by the second motion depends on geometry the producer
    /// does not know.
    fn then(self, later: Motion) -> Option<Motion> {
        let rotate = later.rotate * self.rotate;
        let scale = self.scale * later.scale;
        let (pivot, translate) = match (self.pivot, later.pivot) {
            (None, None) => (None, self.translate + later.translate),
            // An affine motion carries the centroid of the vertices it moves
            // along with them, so the later centroid is the earlier one
            // shifted by the earlier translation.
            (Some(Pivot::SelectionCentroid), Some(Pivot::SelectionCentroid) | None)
            | (None, Some(Pivot::SelectionCentroid)) => (
                Some(Pivot::SelectionCentroid),
                self.translate + later.translate,
            ),
            (Some(Pivot::Point(first)), Some(Pivot::Point(second))) => (
                Some(Pivot::Point(second)),
                self.point_translate(&later, first, second, rotate, scale),
            ),
            // A pure translation is the same motion about the other pivot.
            (Some(Pivot::Point(point)), None) | (None, Some(Pivot::Point(point))) => (
                Some(Pivot::Point(point)),
                self.point_translate(&later, point, point, rotate, scale),
            ),
            (Some(Pivot::Point(_)), Some(Pivot::SelectionCentroid))
            | (Some(Pivot::SelectionCentroid), Some(Pivot::Point(_))) => return None,
        };
        Some(Motion {
            translate,
            rotate,
            scale,
            pivot,
        })
    }

    /// Translation of the combined motion about `second`, where `self` pivots
    /// about `first` and `later` about `second`.
    fn point_translate(
        &self,
        later: &Motion,
        first: Vec3,
        second: Vec3,
        rotate: Quat,
        scale: f32,
    ) -> Vec3 {
        later.rotate * ((first + self.translate - second) * later.scale) + later.translate
            - rotate * ((first - second) * scale)
    }

    fn into_command(self, mask: SelectionSet) -> EngineCommand {
        match self.pivot {
            Some(pivot) if !(self.rotate == Quat::IDENTITY && self.scale == 1.0) => {
                EngineCommand::TransformSelection {
                    translate: self.translate,
                    scale: self.scale,
                    rotate: self.rotate,
                    pivot,
                    mask,
                }
            }
            _ => EngineCommand::TranslateSelection {
                translate: self.translate,
                mask,
            },
        }
    }
}
