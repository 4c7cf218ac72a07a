//! Producer → worker command queue with latest-wins backpressure.
//!
//! # Policy
//!
//! - `push` never blocks the producer beyond a short critical section.
//! - A command with a [`CoalesceKey`] supersedes the newest pending command
//!   with the same key: the stale one is removed and the merged command is
//!   appended (see [`EngineCommand::supersede`]).
//! - Transforms only merge when the result equals running both in order.
//!   A pivot mix with no closed form, or a select or overlapping transform
//!   queued in between, keeps both commands.
//! - Barriers (`ClearSelections`, `ResetAllVertices`, `ReleaseSelection`) are
//!   never merged, and merging never reaches back past the newest pending
//!   barrier, so nothing is reordered across one.
//! - Over capacity, the oldest non-barrier command is dropped. Barriers are
//!   never dropped, so the queue may exceed capacity when it holds only
//!   barriers.
//!
//! Commands the worker has already popped are "started" and are no longer
//! visible to superseding.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::warn;

use crate::commands::{CoalesceKey, EngineCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Replaced a pending command for the same target.
    Superseded,
    /// Queued, but the oldest coalescible command was dropped to make room.
    DroppedOldest,
}

#[derive(Debug, Default)]
struct Pending {
    commands: VecDeque<EngineCommand>,
    closed: bool,
}

#[derive(Debug)]
struct Shared {
    pending: Mutex<Pending>,
    notify: Notify,
    capacity: usize,
}

/// Cloneable handle; all clones share one queue.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    shared: Arc<Shared>,
}

impl CommandQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                pending: Mutex::new(Pending::default()),
                notify: Notify::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        // Pending is a plain container; a panic mid-push leaves it consistent.
        self.shared
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, command: EngineCommand) -> PushOutcome {
        let outcome = {
            let mut pending = self.lock();
            Self::push_locked(&mut pending.commands, command, self.shared.capacity)
        };
        self.shared.notify.notify_one();
        outcome
    }

    /// Push several commands under one lock, preserving their order.
    pub fn extend(&self, commands: impl IntoIterator<Item = EngineCommand>) -> usize {
        let mut pushed = 0;
        {
            let mut pending = self.lock();
            for command in commands {
                Self::push_locked(&mut pending.commands, command, self.shared.capacity);
                pushed += 1;
            }
        }
        if pushed > 0 {
            self.shared.notify.notify_one();
        }
        pushed
    }

    fn push_locked(
        commands: &mut VecDeque<EngineCommand>,
        command: EngineCommand,
        capacity: usize,
    ) -> PushOutcome {
        if let Some(key) = command.coalesce_key() {
            let window_start = commands
                .iter()
                .rposition(EngineCommand::is_barrier)
                .map_or(0, |barrier| barrier + 1);
            let stale = commands
                .iter()
                .skip(window_start)
                .rposition(|pending| pending.coalesce_key() == Some(key))
                .map(|offset| window_start + offset);
            if let Some(index) = stale
                && Self::can_move_to_back(commands, index)
                && let Some(merged) = command.supersede(&commands[index])
            {
                commands.remove(index);
                commands.push_back(merged);
                return PushOutcome::Superseded;
            }
        }

        let mut outcome = PushOutcome::Queued;
        if commands.len() >= capacity {
            if let Some(oldest) = commands.iter().position(|c| !c.is_barrier()) {
                if let Some(dropped) = commands.remove(oldest) {
                    warn!(kind = dropped.kind(), capacity, "command queue full, dropping oldest");
                    outcome = PushOutcome::DroppedOldest;
                }
            }
        }
        commands.push_back(command);
        outcome
    }

    /// A merged transform runs at the back of the queue, so the stale one
    /// must commute with everything queued after it. Other commands are
    /// simply replaced.
    fn can_move_to_back(commands: &VecDeque<EngineCommand>, index: usize) -> bool {
        let stale = &commands[index];
        !matches!(stale.coalesce_key(), Some(CoalesceKey::Transform(_)))
            || commands
                .range(index + 1..)
                .all(|between| stale.reorders_past(between))
    }

    /// Take the next command, if any. The command counts as started.
    pub fn pop(&self) -> Option<EngineCommand> {
        self.lock().commands.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().commands.is_empty()
    }

    /// Copy of the pending commands in execution order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<EngineCommand> {
        self.lock().commands.iter().copied().collect()
    }

    /// Wait until something is pushed or the queue is closed.
    ///
    /// A push made while nobody is waiting is remembered, so a push that
    /// lands between `pop` returning `None` and this call is not missed.
    pub async fn notified(&self) {
        self.shared.notify.notified().await;
    }

    /// Stop the worker after it drains what is already queued.
    pub fn close(&self) {
        self.lock().closed = true;
        self.shared.notify.notify_one();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grasp_types::{Hand, Quat, SelectionId, SelectionMode, SelectionSet, Vec3};

    use crate::commands::Pivot;
    use crate::geometry::{GeometryEngine, GeometryEngineClient};
    use crate::headless::HeadlessEngine;

    fn translate(x: f32, bits: u32) -> EngineCommand {
        EngineCommand::TranslateSelection {
            translate: Vec3::new(x, 0.0, 0.0),
            mask: SelectionSet::from_bits(bits),
        }
    }

    fn scale(factor: f32, pivot: Pivot, bits: u32) -> EngineCommand {
        EngineCommand::TransformSelection {
            translate: Vec3::ZERO,
            scale: factor,
            rotate: Quat::IDENTITY,
            pivot,
            mask: SelectionSet::from_bits(bits),
        }
    }

    fn select(hand: Hand, x: f32) -> EngineCommand {
        EngineCommand::SelectSphere {
            hand,
            position: Vec3::new(x, 0.0, 0.0),
            radius: 0.1,
            target: SelectionId::FIRST,
            mode: SelectionMode::Add,
        }
    }

    #[test]
    fn fifo_for_distinct_targets() {
        let queue = CommandQueue::new(8);
        assert_eq!(queue.push(translate(1.0, 0b01)), PushOutcome::Queued);
        assert_eq!(queue.push(translate(1.0, 0b10)), PushOutcome::Queued);
        assert_eq!(queue.pop(), Some(translate(1.0, 0b01)));
        assert_eq!(queue.pop(), Some(translate(1.0, 0b10)));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn same_target_supersedes_and_folds_motion() {
        let queue = CommandQueue::new(8);
        let recolor = EngineCommand::RecolorByVisibility {
            mask: SelectionSet::from_bits(0b01),
        };
        queue.push(translate(1.0, 0b01));
        queue.push(recolor);
        assert_eq!(queue.push(translate(2.0, 0b01)), PushOutcome::Superseded);

        assert_eq!(queue.snapshot(), vec![recolor, translate(3.0, 0b01)]);
    }

    #[test]
    fn select_between_transforms_blocks_folding() {
        let queue = CommandQueue::new(8);
        queue.push(translate(1.0, 0b01));
        queue.push(select(Hand::Left, 0.0));
        assert_eq!(queue.push(translate(2.0, 0b01)), PushOutcome::Queued);
        assert_eq!(
            queue.snapshot(),
            vec![
                translate(1.0, 0b01),
                select(Hand::Left, 0.0),
                translate(2.0, 0b01),
            ]
        );
    }

    #[test]
    fn disjoint_hands_keep_folding() {
        let queue = CommandQueue::new(8);
        queue.push(scale(2.0, Pivot::SelectionCentroid, 0b01));
        queue.push(scale(2.0, Pivot::SelectionCentroid, 0b10));
        assert_eq!(
            queue.push(scale(3.0, Pivot::SelectionCentroid, 0b01)),
            PushOutcome::Superseded
        );
        assert_eq!(
            queue.snapshot(),
            vec![
                scale(2.0, Pivot::SelectionCentroid, 0b10),
                scale(6.0, Pivot::SelectionCentroid, 0b01),
            ]
        );

        let overlapping = CommandQueue::new(8);
        overlapping.push(scale(2.0, Pivot::SelectionCentroid, 0b01));
        overlapping.push(scale(2.0, Pivot::SelectionCentroid, 0b11));
        assert_eq!(
            overlapping.push(scale(3.0, Pivot::SelectionCentroid, 0b01)),
            PushOutcome::Queued
        );
        assert_eq!(overlapping.len(), 3);
    }

    #[test]
    fn select_latest_wins_per_hand() {
        let queue = CommandQueue::new(8);
        queue.push(select(Hand::Left, 0.0));
        queue.push(select(Hand::Right, 0.0));
        queue.push(select(Hand::Left, 5.0));
        assert_eq!(
            queue.snapshot(),
            vec![select(Hand::Right, 0.0), select(Hand::Left, 5.0)]
        );
    }

    #[test]
    fn started_commands_are_not_superseded() {
        let queue = CommandQueue::new(8);
        queue.push(translate(1.0, 0b01));
        assert_eq!(queue.pop(), Some(translate(1.0, 0b01)));
        assert_eq!(queue.push(translate(2.0, 0b01)), PushOutcome::Queued);
        assert_eq!(queue.snapshot(), vec![translate(2.0, 0b01)]);
    }

    #[test]
    fn barriers_fence_coalescing() {
        let queue = CommandQueue::new(8);
        queue.push(translate(1.0, 0b01));
        queue.push(EngineCommand::ResetAllVertices);
        assert_eq!(queue.push(translate(2.0, 0b01)), PushOutcome::Queued);
        assert_eq!(
            queue.snapshot(),
            vec![
                translate(1.0, 0b01),
                EngineCommand::ResetAllVertices,
                translate(2.0, 0b01),
            ]
        );
    }

    #[test]
    fn barriers_are_never_merged() {
        let queue = CommandQueue::new(8);
        let release = EngineCommand::ReleaseSelection {
            id: SelectionId::LAST,
        };
        queue.push(release);
        queue.push(release);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn overflow_drops_oldest_coalescible_but_keeps_barriers() {
        let queue = CommandQueue::new(2);
        queue.push(EngineCommand::ResetAllVertices);
        queue.push(translate(1.0, 0b01));
        assert_eq!(queue.push(translate(1.0, 0b10)), PushOutcome::DroppedOldest);
        assert_eq!(
            queue.snapshot(),
            vec![EngineCommand::ResetAllVertices, translate(1.0, 0b10)]
        );

        let barriers_only = CommandQueue::new(1);
        barriers_only.push(EngineCommand::ResetAllVertices);
        assert_eq!(
            barriers_only.push(EngineCommand::ResetAllVertices),
            PushOutcome::Queued
        );
        assert_eq!(barriers_only.len(), 2);
    }

    #[test]
    fn mixed_pivots_stay_queued() {
        let queue = CommandQueue::new(4);
        queue.push(scale(2.0, Pivot::Point(Vec3::X), 1));
        assert_eq!(
            queue.push(scale(3.0, Pivot::SelectionCentroid, 1)),
            PushOutcome::Queued
        );
        // The newest pending transform is the merge candidate.
        assert_eq!(
            queue.push(scale(0.5, Pivot::SelectionCentroid, 1)),
            PushOutcome::Superseded
        );
        assert_eq!(
            queue.snapshot(),
            vec![
                scale(2.0, Pivot::Point(Vec3::X), 1),
                scale(1.5, Pivot::SelectionCentroid, 1),
            ]
        );
    }

    /// Positions after running `commands` one by one, and after running
    /// whatever the queue keeps of them, on identical meshes.
    fn sequential_and_queued(commands: &[EngineCommand]) -> (Vec<Vec3>, Vec<Vec3>, usize) {
        let mesh = || {
            let engine = HeadlessEngine::new(
                vec![
                    Vec3::X,
                    Vec3::new(0.0, 1.0, 2.0),
                    Vec3::new(-1.0, 0.5, 0.0),
                    Vec3::new(3.0, 0.0, 0.0),
                ],
                0,
            );
            for position in &engine.positions()[..3] {
                engine.select_sphere(*position, 0.01, SelectionId::FIRST, SelectionMode::Add);
            }
            engine.select_sphere(Vec3::new(3.0, 0.0, 0.0), 0.01, SelectionId::LAST, SelectionMode::Add);
            Arc::new(engine)
        };

        let sequential = mesh();
        let client = GeometryEngineClient::new(Arc::clone(&sequential));
        for command in commands {
            client.execute(command);
        }

        let queue = CommandQueue::new(16);
        queue.extend(commands.iter().copied());
        let kept = queue.len();
        let queued = mesh();
        let client = GeometryEngineClient::new(Arc::clone(&queued));
        while let Some(command) = queue.pop() {
            client.execute(&command);
        }

        (sequential.positions(), queued.positions(), kept)
    }

    fn assert_same_motion(commands: &[EngineCommand], expected_kept: usize) {
        let (sequential, queued, kept) = sequential_and_queued(commands);
        assert_eq!(kept, expected_kept, "{commands:?}");
        for (a, b) in sequential.iter().zip(&queued) {
            assert!(a.abs_diff_eq(*b, 1e-4), "{a} vs {b} for {commands:?}");
        }
    }

    #[test]
    fn translation_then_scale_matches_sequential_run() {
        let commands = [translate(1.0, 1), scale(2.0, Pivot::Point(Vec3::ZERO), 1)];
        let (sequential, queued, kept) = sequential_and_queued(&commands);
        assert_eq!(kept, 1);
        assert!(sequential[0].abs_diff_eq(Vec3::new(4.0, 0.0, 0.0), 1e-5));
        assert!(queued[0].abs_diff_eq(Vec3::new(4.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn folded_motions_match_sequential_run() {
        let turn = |angle: f32, pivot: Pivot, translate: Vec3| EngineCommand::TransformSelection {
            translate,
            scale: 1.25,
            rotate: Quat::from_rotation_y(angle),
            pivot,
            mask: SelectionSet::from_bits(1),
        };
        let a = Vec3::new(0.5, -1.0, 2.0);
        let b = Vec3::new(-2.0, 0.0, 1.0);

        assert_same_motion(
            &[
                turn(0.3, Pivot::Point(a), Vec3::Y),
                turn(-1.1, Pivot::Point(b), Vec3::new(0.2, 0.0, -0.4)),
            ],
            1,
        );
        assert_same_motion(
            &[
                turn(0.7, Pivot::SelectionCentroid, Vec3::X),
                turn(0.4, Pivot::SelectionCentroid, Vec3::Z),
            ],
            1,
        );
        assert_same_motion(
            &[translate(2.0, 1), turn(0.9, Pivot::SelectionCentroid, Vec3::ZERO)],
            1,
        );
        assert_same_motion(
            &[turn(0.9, Pivot::Point(a), Vec3::ZERO), translate(-1.0, 1)],
            1,
        );
        assert_same_motion(
            &[
                turn(0.5, Pivot::Point(a), Vec3::ZERO),
                turn(0.5, Pivot::SelectionCentroid, Vec3::ZERO),
            ],
            2,
        );
        assert_same_motion(
            &[
                turn(0.5, Pivot::SelectionCentroid, Vec3::ZERO),
                translate(1.0, 1 << 31),
                turn(0.5, Pivot::SelectionCentroid, Vec3::Y),
            ],
            2,
        );
    }

    #[test]
    fn extend_preserves_order() {
        let queue = CommandQueue::new(8);
        let pushed = queue.extend([
            EngineCommand::ClearSelections {
                mask: SelectionSet::from_bits(1),
            },
            translate(1.0, 0b01),
        ]);
        assert_eq!(pushed, 2);
        assert!(queue.pop().unwrap().is_barrier());
        assert_eq!(queue.pop(), Some(translate(1.0, 0b01)));
    }

    #[tokio::test]
    async fn push_before_wait_is_not_lost() {
        let queue = CommandQueue::new(4);
        queue.push(translate(1.0, 1));
        tokio::time::timeout(std::time::Duration::from_secs(1), queue.notified())
            .await
            .expect("stored permit wakes the waiter");
    }

    #[test]
    fn close_is_sticky() {
        let queue = CommandQueue::new(4);
        assert!(!queue.is_closed());
        queue.close();
        assert!(queue.is_closed());
    }
}
