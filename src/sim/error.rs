//! Simulation errors

use thiserror::Error;

use super::state::GamePhase;
use crate::physics::BodyHandle;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimError {
    #[error("no player in phase {0:?}; start a session first")]
    NoPlayer(GamePhase),
    #[error("physics body {handle:?} for the {role} is missing from the world")]
    MissingBody {
        role: &'static str,
        handle: BodyHandle,
    },
}
