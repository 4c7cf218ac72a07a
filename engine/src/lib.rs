//! Producer/worker pipeline that turns per-tick hand input into commands for
//! a geometry engine.
//!
//! The producer side ([`Session`], [`TransformCoordinator`]) runs on the input
//! thread and never blocks on geometry work. Commands flow through a
//! [`CommandQueue`] to a worker task that applies them to a
//! [`GeometryEngine`].

mod brush;
mod commands;
mod coordinator;
mod geometry;
mod headless;
mod queue;
mod registry;
mod session;
mod worker;

pub use brush::BrushProbe;
pub use commands::{CoalesceKey, EngineCommand, Pivot};
pub use coordinator::{
    CoordinatorState, GesturePhase, HandLock, TransformCoordinator, TransformDispatch,
    apply_transform, apply_ui_commands, dispatch, plan_dispatch, resolution_order,
    resolve_hand_mask, resolve_selection, resolve_transform_masks,
};
pub use geometry::{EngineReadback, GeometryEngine, GeometryEngineClient};
pub use headless::HeadlessEngine;
pub use queue::{CommandQueue, PushOutcome};
pub use registry::{ClearOutcome, RegistryFull, Selection, SelectionRegistry, SelectionSummary};
pub use session::{Session, SessionOptions};
pub use worker::{WorkerError, WorkerHandle, spawn_worker};

pub use grasp_types as types;
