//! Recorded input steps, one JSON object per line.

use std::io::BufRead;

use anyhow::{Context, Result};
use serde::Deserialize;

use grasp_engine::types::{InputFrame, SelectionId};
use grasp_engine::{ClearOutcome, GeometryEngine, Session};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ReplayStep {
    Frame(InputFrame),
    AddSelection,
    RemoveSelection { id: SelectionId },
    ToggleVisibility { id: SelectionId },
    SetActive { id: SelectionId },
    ClearOrRemove { id: SelectionId },
}

impl ReplayStep {
    /// Apply to the session. Returns the number of commands queued by a
    /// frame; UI operations report zero.
    pub fn apply<E: GeometryEngine>(self, session: &mut Session<E>) -> usize {
        match self {
            ReplayStep::Frame(frame) => return session.tick(frame),
            ReplayStep::AddSelection => match session.add_selection() {
                Ok(id) => tracing::info!(%id, "replay: added selection"),
                Err(err) => tracing::warn!("replay: {err}"),
            },
            ReplayStep::RemoveSelection { id } => {
                if !session.remove_selection(id) {
                    tracing::warn!(%id, "replay: selection not removable");
                }
            }
            ReplayStep::ToggleVisibility { id } => {
                session.toggle_visibility(id);
            }
            ReplayStep::SetActive { id } => {
                if !session.set_active(id) {
                    tracing::warn!(%id, "replay: no such selection");
                }
            }
            ReplayStep::ClearOrRemove { id } => {
                if session.clear_or_remove(id) == ClearOutcome::Ignored {
                    tracing::warn!(%id, "replay: clear ignored");
                }
            }
        }
        0
    }
}

/// Parse every step up front so a malformed file fails before anything runs.
pub fn read_steps(reader: impl BufRead) -> Result<Vec<ReplayStep>> {
    let mut steps = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("reading line {line_no}"))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let step = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid replay step on line {line_no}"))?;
        steps.push(step);
    }
    Ok(steps)
}
