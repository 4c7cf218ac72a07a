//! Per-tick decision layer: which selections each hand selects or transforms.
//!
//! # Gesture lifecycle (per hand, independent)
//!
//! ```text
//!            rising edge              still held
//!   Idle ─────────────────▶ Started ────────────▶ Active
//!    ▲                         │                    │
//!    └─────── falling edge ────┴────────────────────┘
//! ```
//!
//! The target mask is resolved only on the rising edge and then held for the
//! whole gesture, so the target cannot slide if the brush wanders off it
//! mid-drag. The falling edge clears it.
//!
//! # Two hands
//!
//! The primary hand is resolved first. A non-primary hand starts from the
//! other hand's mask, so when both start on the same tick it mirrors the
//! primary's finalized value. If both hands end up on the same mask (or only
//! one hand is transforming) a single joint transform is issued; otherwise
//! each hand transforms its own mask with its own delta.

use std::thread::{self, ThreadId};

use tracing::debug;

use grasp_types::{
    Hand, HandGestureState, InputFrame, PivotMode, SelectionId, SelectionSet, SharedInputState,
    ToolType, TransformDelta,
};

use crate::brush::BrushProbe;
use crate::commands::{EngineCommand, Pivot};

// ============================================================================
// Per-hand gesture state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GesturePhase {
    #[default]
    Idle,
    /// Rising edge seen this tick; the target mask was just resolved.
    Started,
    Active,
}

impl GesturePhase {
    #[must_use]
    pub fn advance(self, gesture: &HandGestureState) -> GesturePhase {
        if gesture.transform_started() {
            GesturePhase::Started
        } else if gesture.transform_ended() {
            GesturePhase::Idle
        } else {
            match self {
                GesturePhase::Started if gesture.transforming => GesturePhase::Active,
                phase => phase,
            }
        }
    }

    #[must_use]
    pub const fn is_transforming(self) -> bool {
        matches!(self, GesturePhase::Started | GesturePhase::Active)
    }
}

/// Gesture phase plus the mask held for the current gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandLock {
    pub phase: GesturePhase,
    pub mask: SelectionSet,
}

/// The only state carried from one tick to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoordinatorState {
    pub left: HandLock,
    pub right: HandLock,
}

impl CoordinatorState {
    #[must_use]
    pub const fn hand(&self, hand: Hand) -> &HandLock {
        match hand {
            Hand::Left => &self.left,
            Hand::Right => &self.right,
        }
    }

    pub fn hand_mut(&mut self, hand: Hand) -> &mut HandLock {
        match hand {
            Hand::Left => &mut self.left,
            Hand::Right => &mut self.right,
        }
    }

    #[must_use]
    pub const fn locked_mask(&self, hand: Hand) -> SelectionSet {
        self.hand(hand).mask
    }
}

// ============================================================================
// Target resolution
// ============================================================================

/// Order in which hands are resolved on a tick: primary first.
#[must_use]
pub const fn resolution_order(primary: Hand) -> [Hand; 2] {
    [primary, primary.other()]
}

/// Mask for a hand whose transform gesture just started.
///
/// A non-empty brush hit always wins. Otherwise the primary hand targets the
/// active selection and the other hand mirrors whatever the other hand holds.
#[must_use]
pub fn resolve_hand_mask(
    other_hand_mask: SelectionSet,
    is_primary: bool,
    active_selection: SelectionId,
    brush_hit: SelectionSet,
) -> SelectionSet {
    if brush_hit.any() {
        brush_hit
    } else if is_primary {
        SelectionSet::single(active_selection)
    } else {
        other_hand_mask
    }
}

/// Advance both hands' gesture phases and resolve masks on rising edges.
///
/// Falling edges clear the held mask regardless of the active tool. Masks are
/// only resolved while the Select tool is active and some hand is transforming.
#[must_use]
pub fn resolve_transform_masks(
    mut state: CoordinatorState,
    frame: &InputFrame,
    probe: &BrushProbe<'_>,
) -> CoordinatorState {
    for hand in Hand::BOTH {
        let gesture = frame.hand(hand);
        let lock = state.hand_mut(hand);
        lock.phase = lock.phase.advance(gesture);
        if gesture.transform_ended() {
            lock.mask = SelectionSet::EMPTY;
        }
    }

    if frame.shared.active_tool != ToolType::Select || !frame.any_transforming() {
        return state;
    }

    for hand in resolution_order(frame.shared.primary_hand) {
        let gesture = frame.hand(hand);
        if !gesture.transform_started() {
            continue;
        }
        let brush_hit = probe.query(gesture.brush_position, gesture.brush_radius_world);
        let mask = resolve_hand_mask(
            state.locked_mask(hand.other()),
            frame.is_primary(hand),
            frame.shared.active_selection_id,
            brush_hit,
        );
        debug!(hand = hand.as_str(), %mask, %brush_hit, "transform target locked");
        state.hand_mut(hand).mask = mask;
    }
    state
}

// ============================================================================
// Dispatch
// ============================================================================

/// How this tick's transforms are split between the hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformDispatch {
    None,
    /// One command with the joint delta.
    Joint { mask: SelectionSet },
    /// One command per hand, each with its own delta.
    Independent {
        left: SelectionSet,
        right: SelectionSet,
    },
}

#[must_use]
pub fn plan_dispatch(state: &CoordinatorState, frame: &InputFrame) -> TransformDispatch {
    if frame.shared.active_tool != ToolType::Select || !frame.any_transforming() {
        return TransformDispatch::None;
    }
    if !frame.both_transforming() {
        let hand = if frame.left.transforming {
            &state.left
        } else {
            &state.right
        };
        return TransformDispatch::Joint { mask: hand.mask };
    }
    if state.left.mask == state.right.mask {
        TransformDispatch::Joint {
            mask: state.left.mask,
        }
    } else {
        TransformDispatch::Independent {
            left: state.left.mask,
            right: state.right.mask,
        }
    }
}

/// Turn a dispatch plan into transform commands. Empty masks emit nothing.
#[must_use]
pub fn dispatch(plan: TransformDispatch, frame: &InputFrame) -> Vec<EngineCommand> {
    match plan {
        TransformDispatch::None => Vec::new(),
        TransformDispatch::Joint { mask } => {
            apply_transform(&frame.shared.joint_delta, mask).into_iter().collect()
        }
        TransformDispatch::Independent { left, right } => [
            apply_transform(&frame.left.delta, left),
            apply_transform(&frame.right.delta, right),
        ]
        .into_iter()
        .flatten()
        .collect(),
    }
}

/// Command applying `delta` to `mask`, or `None` for an empty mask.
#[must_use]
pub fn apply_transform(delta: &TransformDelta, mask: SelectionSet) -> Option<EngineCommand> {
    if mask.is_empty() {
        return None;
    }
    let pivot = match delta.pivot_mode {
        // Mesh-origin pivoting is not supported; the hand serves as pivot.
        PivotMode::Mesh | PivotMode::Hand => Pivot::Point(delta.pivot),
        PivotMode::Selection => Pivot::SelectionCentroid,
    };
    Some(EngineCommand::from_delta(delta, pivot, mask))
}

/// Sphere-select for a hand that is brushing this tick.
#[must_use]
pub fn resolve_selection(hand: Hand, frame: &InputFrame) -> Option<EngineCommand> {
    let gesture = frame.hand(hand);
    if !gesture.selecting {
        return None;
    }
    Some(EngineCommand::SelectSphere {
        hand,
        position: gesture.brush_position,
        radius: gesture.brush_radius_local,
        target: frame.shared.active_selection_id,
        mode: frame
            .shared
            .active_selection_mode
            .effective(gesture.alternate_select_mode),
    })
}

/// Clear / repaint / reset requests, passed through unchanged.
#[must_use]
pub fn apply_ui_commands(shared: &SharedInputState) -> Vec<EngineCommand> {
    let mut commands = Vec::new();
    if shared.clear_selection_mask.any() {
        commands.push(EngineCommand::ClearSelections {
            mask: shared.clear_selection_mask,
        });
    }
    if shared.visible_mask_changed {
        commands.push(EngineCommand::RecolorByVisibility {
            mask: shared.visible_selection_mask,
        });
    }
    if shared.reset_vertices {
        commands.push(EngineCommand::ResetAllVertices);
    }
    commands
}

// ============================================================================
// TransformCoordinator
// ============================================================================

/// Owns [`CoordinatorState`] across ticks for a single producer thread.
#[derive(Debug, Default)]
pub struct TransformCoordinator {
    state: CoordinatorState,
    owner: Option<ThreadId>,
}

impl TransformCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an arbitrary prior state.
    #[must_use]
    pub fn with_state(state: CoordinatorState) -> Self {
        Self { state, owner: None }
    }

    #[must_use]
    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Resolve one tick. Commands come out in execution order: UI requests,
    /// then brush selection (left, right), then transforms.
    ///
    /// The first call binds the coordinator to the calling thread; ticking it
    /// from any other thread afterwards panics.
    pub fn tick(&mut self, frame: &InputFrame, probe: &BrushProbe<'_>) -> Vec<EngineCommand> {
        self.assert_single_writer();

        let mut commands = apply_ui_commands(&frame.shared);
        commands.extend(Hand::BOTH.into_iter().filter_map(|hand| resolve_selection(hand, frame)));

        self.state = resolve_transform_masks(self.state, frame, probe);
        let plan = plan_dispatch(&self.state, frame);
        commands.extend(dispatch(plan, frame));

        if !commands.is_empty() {
            debug!(count = commands.len(), ?plan, "coordinator tick");
        }
        commands
    }

    fn assert_single_writer(&mut self) {
        let current = thread::current().id();
        let owner = *self.owner.get_or_insert(current);
        assert_eq!(
            owner, current,
            "coordinator state is single-writer: ticked from a second thread"
        );
    }
}
