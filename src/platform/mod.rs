//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Input events (keyboard, touch buttons, device tilt)
//! - The browser shell driving a session (wasm32 only)

pub mod input;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use input::{Action, InputSource, InputTracker, actions_for_key};
