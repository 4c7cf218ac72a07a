//! Core domain types for Grasp.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies:
//! selection ids and masks, per-hand gesture input, and transform deltas.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod input;
mod selection;
mod transform;

pub use input::{Hand, HandGestureState, InputFrame, SelectionMode, SharedInputState, ToolType};
pub use selection::{InvalidSelectionId, MAX_SELECTIONS, SelectionId, SelectionSet};
pub use transform::{PivotMode, TransformDelta};

// Re-exported so downstream crates agree on one math crate version.
pub use glam::{Quat, Vec3};
