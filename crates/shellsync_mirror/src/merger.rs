//! Update merger.
//!
//! Merging is total: every update that passed the gate produces a new state.

use shellsync_protocol::{AppState, AppUpdate};

/// Applies an accepted update to the mirrored state.
///
/// - `FullState` replaces everything.
/// - `FieldChanged` replaces one field and advances `rev`.
/// - `SideEffect` advances `rev` only; its payload never enters state.
pub fn merge(mut state: AppState, update: &AppUpdate) -> AppState {
    match update {
        AppUpdate::FullState(snapshot) => snapshot.clone(),
        AppUpdate::FieldChanged { rev, value } => {
            state.set_field(value.clone());
            state.rev = *rev;
            state
        }
        AppUpdate::SideEffect { rev, .. } => {
            state.rev = *rev;
            state
        }
    }
}
