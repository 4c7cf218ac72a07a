//! Per-tick input snapshot produced by the controller layer.
//!
//! Everything here is read-only for the duration of a tick. The coordinator
//! never writes back into an [`InputFrame`].

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{SelectionId, SelectionSet, TransformDelta};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hand {
    Left,
    #[default]
    Right,
}

impl Hand {
    pub const BOTH: [Hand; 2] = [Hand::Left, Hand::Right];

    #[must_use]
    pub const fn other(self) -> Hand {
        match self {
            Hand::Left => Hand::Right,
            Hand::Right => Hand::Left,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Hand::Left => "left",
            Hand::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolType {
    #[default]
    Default,
    Select,
}

/// How a brush stroke changes the active selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    Add,
    Subtract,
    Toggle,
}

impl SelectionMode {
    /// Swap `Add` and `Subtract`; every other mode is returned unchanged.
    #[must_use]
    pub const fn alternate(self) -> SelectionMode {
        match self {
            SelectionMode::Add => SelectionMode::Subtract,
            SelectionMode::Subtract => SelectionMode::Add,
            other => other,
        }
    }

    /// The mode a hand actually selects with, given its alternate-mode button.
    #[must_use]
    pub const fn effective(self, alternate: bool) -> SelectionMode {
        if alternate { self.alternate() } else { self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandGestureState {
    pub transforming: bool,
    pub transforming_prev: bool,
    pub selecting: bool,
    pub selecting_prev: bool,
    pub brush_position: Vec3,
    pub brush_radius_world: f32,
    pub brush_radius_local: f32,
    pub alternate_select_mode: bool,
    pub delta: TransformDelta,
}

impl Default for HandGestureState {
    fn default() -> Self {
        Self {
            transforming: false,
            transforming_prev: false,
            selecting: false,
            selecting_prev: false,
            brush_position: Vec3::ZERO,
            brush_radius_world: 0.1,
            brush_radius_local: 0.1,
            alternate_select_mode: false,
            delta: TransformDelta::default(),
        }
    }
}

impl HandGestureState {
    /// Transform gesture began this tick.
    #[must_use]
    pub const fn transform_started(&self) -> bool {
        self.transforming && !self.transforming_prev
    }

    /// Transform gesture ended this tick.
    #[must_use]
    pub const fn transform_ended(&self) -> bool {
        !self.transforming && self.transforming_prev
    }

    #[must_use]
    pub const fn select_started(&self) -> bool {
        self.selecting && !self.selecting_prev
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedInputState {
    pub active_tool: ToolType,
    pub active_selection_id: SelectionId,
    pub active_selection_mode: SelectionMode,
    pub primary_hand: Hand,
    pub visible_selection_mask: SelectionSet,
    pub visible_mask_changed: bool,
    pub joint_delta: TransformDelta,
    /// Selections whose vertices should be emptied this tick.
    pub clear_selection_mask: SelectionSet,
    pub reset_vertices: bool,
    /// Start a fresh selection when a stroke begins on a non-empty one.
    pub new_selection_on_draw: bool,
}

impl Default for SharedInputState {
    fn default() -> Self {
        Self {
            active_tool: ToolType::Select,
            active_selection_id: SelectionId::FIRST,
            active_selection_mode: SelectionMode::Add,
            primary_hand: Hand::Right,
            visible_selection_mask: SelectionSet::ALL,
            visible_mask_changed: false,
            joint_delta: TransformDelta::default(),
            clear_selection_mask: SelectionSet::EMPTY,
            reset_vertices: false,
            new_selection_on_draw: false,
        }
    }
}

/// Everything the coordinator reads for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputFrame {
    pub left: HandGestureState,
    pub right: HandGestureState,
    pub shared: SharedInputState,
}

impl InputFrame {
    #[must_use]
    pub const fn hand(&self, hand: Hand) -> &HandGestureState {
        match hand {
            Hand::Left => &self.left,
            Hand::Right => &self.right,
        }
    }

    #[must_use]
    pub fn is_primary(&self, hand: Hand) -> bool {
        hand == self.shared.primary_hand
    }

    #[must_use]
    pub const fn any_transforming(&self) -> bool {
        self.left.transforming || self.right.transforming
    }

    #[must_use]
    pub const fn both_transforming(&self) -> bool {
        self.left.transforming && self.right.transforming
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternate_swaps_add_and_subtract_only() {
        assert_eq!(SelectionMode::Add.alternate(), SelectionMode::Subtract);
        assert_eq!(SelectionMode::Subtract.alternate(), SelectionMode::Add);
        assert_eq!(SelectionMode::Toggle.alternate(), SelectionMode::Toggle);
    }

    #[test]
    fn alternate_is_involutive() {
        for mode in [SelectionMode::Add, SelectionMode::Subtract, SelectionMode::Toggle] {
            assert_eq!(mode.alternate().alternate(), mode);
        }
    }

    #[test]
    fn effective_mode_respects_flag() {
        assert_eq!(SelectionMode::Add.effective(false), SelectionMode::Add);
        assert_eq!(SelectionMode::Add.effective(true), SelectionMode::Subtract);
    }

    #[test]
    fn gesture_edges() {
        let started = HandGestureState {
            transforming: true,
            ..HandGestureState::default()
        };
        assert!(started.transform_started());
        assert!(!started.transform_ended());

        let held = HandGestureState {
            transforming: true,
            transforming_prev: true,
            ..HandGestureState::default()
        };
        assert!(!held.transform_started());

        let released = HandGestureState {
            transforming_prev: true,
            ..HandGestureState::default()
        };
        assert!(released.transform_ended());
    }

    #[test]
    fn primary_hand_lookup() {
        let mut frame = InputFrame::default();
        frame.shared.primary_hand = Hand::Left;
        assert!(frame.is_primary(Hand::Left));
        assert!(!frame.is_primary(Hand::Right));
        assert_eq!(Hand::Left.other(), Hand::Right);
    }

    #[test]
    fn frame_parses_from_sparse_json() {
        let frame: InputFrame = serde_json::from_str(
            r#"{"left":{"transforming":true},"shared":{"primary_hand":"left","active_selection_id":2}}"#,
        )
        .unwrap();
        assert!(frame.left.transforming);
        assert_eq!(frame.shared.primary_hand, Hand::Left);
        assert_eq!(frame.shared.active_selection_id.value(), 2);
        assert_eq!(frame.shared.active_tool, ToolType::Select);
    }
}
