//! # shellsync protocol
//!
//! State model and update types shared by the engine and the client mirror.
//!
//! This crate provides:
//! - `Revision`, the engine-issued total order over state changes
//! - `AppState` and its independently-updatable fields
//! - `AppUpdate`, the revisioned update stream (snapshots, field deltas,
//!   side effects)
//! - `Secret` payloads that never appear in snapshots
//! - `AppAction`, the fire-and-forget command channel
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod action;
mod field;
mod revision;
mod secret;
mod state;
mod update;

pub use action::AppAction;
pub use field::{FieldValue, StateField};
pub use revision::Revision;
pub use secret::{Secret, SecretSlot};
pub use state::{
    AppState, AuthState, BusyState, ChatMessage, ChatSummary, ChatViewState, MemberInfo,
    MessageDeliveryState, MyProfileState, Router, Screen,
};
pub use update::{AppUpdate, SecretPayload, UpdateKind};
