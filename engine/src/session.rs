//! Producer-side glue for one mesh.
//!
//! A [`Session`] owns the selection registry and the transform coordinator,
//! feeds each tick's commands into the shared [`CommandQueue`], and folds
//! worker readbacks back into the registry.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use grasp_config::GraspConfig;
use grasp_types::{InputFrame, SelectionId};

use crate::brush::BrushProbe;
use crate::commands::EngineCommand;
use crate::coordinator::TransformCoordinator;
use crate::geometry::{EngineReadback, GeometryEngine};
use crate::queue::CommandQueue;
use crate::registry::{ClearOutcome, RegistryFull, SelectionRegistry, SelectionSummary};
use crate::worker::{WorkerHandle, spawn_worker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub queue_capacity: usize,
    pub initial_selections: usize,
    pub new_selection_on_draw: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            queue_capacity: grasp_config::DEFAULT_QUEUE_CAPACITY,
            initial_selections: 1,
            new_selection_on_draw: false,
        }
    }
}

impl From<&GraspConfig> for SessionOptions {
    fn from(config: &GraspConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity(),
            initial_selections: config.initial_selections(),
            new_selection_on_draw: config.new_selection_on_draw(),
        }
    }
}

pub struct Session<E: GeometryEngine> {
    engine: Arc<E>,
    registry: SelectionRegistry,
    coordinator: TransformCoordinator,
    queue: CommandQueue,
    readback: watch::Receiver<EngineReadback>,
    new_selection_on_draw: bool,
}

impl<E: GeometryEngine + 'static> Session<E> {
    /// Create a session and spawn its worker on the current tokio runtime.
    pub fn spawn(engine: Arc<E>, options: SessionOptions) -> (Self, WorkerHandle) {
        let queue = CommandQueue::new(options.queue_capacity);
        let (worker, readback) = spawn_worker(Arc::clone(&engine), queue.clone());
        info!(
            capacity = queue.capacity(),
            selections = options.initial_selections,
            "session started"
        );
        (Self::new(engine, options, queue, readback), worker)
    }
}

impl<E: GeometryEngine> Session<E> {
    /// Assemble a session around an existing queue and readback channel.
    ///
    /// The registry starts from the readback currently held by the channel,
    /// so mesh totals are known before the first command runs.
    pub fn new(
        engine: Arc<E>,
        options: SessionOptions,
        queue: CommandQueue,
        mut readback: watch::Receiver<EngineReadback>,
    ) -> Self {
        let mut registry = SelectionRegistry::with_selections(options.initial_selections);
        registry.seed(&readback.borrow_and_update());
        Self {
            engine,
            registry,
            coordinator: TransformCoordinator::new(),
            queue,
            readback,
            new_selection_on_draw: options.new_selection_on_draw,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &SelectionRegistry {
        &self.registry
    }

    #[must_use]
    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    #[must_use]
    pub fn summary(&self) -> SelectionSummary {
        self.registry.summary()
    }

    /// Pull the latest worker readback into the registry, if a new one was
    /// published since the last call.
    pub fn sync_readback(&mut self) -> bool {
        if !self.readback.has_changed().unwrap_or(false) {
            return false;
        }
        let latest = *self.readback.borrow_and_update();
        self.registry.refresh(&latest)
    }

    /// Resolve one input frame and queue the resulting commands. Returns the
    /// number of commands pushed.
    pub fn tick(&mut self, mut frame: InputFrame) -> usize {
        self.sync_readback();

        let draw_started = frame.left.select_started() || frame.right.select_started();
        let on_draw = self.new_selection_on_draw || frame.shared.new_selection_on_draw;
        if on_draw && draw_started && self.registry.vertex_count(self.registry.active()) > 0 {
            match self.registry.try_add() {
                Ok(id) => debug!(%id, "new selection on draw"),
                Err(err) => debug!(%err, "new selection on draw skipped"),
            }
        }

        self.registry.stamp(&mut frame.shared);
        let probe = BrushProbe::new(&*self.engine, frame.shared.visible_selection_mask);
        let commands = self.coordinator.tick(&frame, &probe);
        self.queue.extend(commands)
    }

    pub fn add_selection(&mut self) -> Result<SelectionId, RegistryFull> {
        self.registry.try_add()
    }

    /// Remove the top selection. On success the engine is told to drop the
    /// id's membership after everything already queued has run.
    pub fn remove_selection(&mut self, id: SelectionId) -> bool {
        let removed = self.registry.remove(id);
        if removed {
            self.queue.push(EngineCommand::ReleaseSelection { id });
        }
        removed
    }

    pub fn toggle_visibility(&mut self, id: SelectionId) -> bool {
        self.registry.toggle_visibility(id)
    }

    pub fn set_active(&mut self, id: SelectionId) -> bool {
        self.registry.set_active(id)
    }

    pub fn clear_or_remove(&mut self, id: SelectionId) -> ClearOutcome {
        let outcome = self.registry.clear_or_remove(id);
        if outcome == ClearOutcome::Removed {
            self.queue.push(EngineCommand::ReleaseSelection { id });
        }
        outcome
    }
}
