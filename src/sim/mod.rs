//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (spawn order)
//! - No rendering or platform dependencies

pub mod culling;
pub mod error;
pub mod fx;
pub mod generator;
pub mod hazard;
pub mod player;
pub mod snapshot;
pub mod state;
pub mod tick;

pub use culling::CullingManager;
pub use error::SimError;
pub use fx::{Camera, Particles};
pub use generator::{LevelGenerator, MAX_SPAWN_PIECES, Spawn};
pub use hazard::HazardTracker;
pub use player::{ControlOutcome, PlayerController};
pub use snapshot::{EntityView, PlayerView, Snapshot};
pub use state::{
    AdOutcome, ControllerState, DeathCause, Entity, EntityKind, EntitySpec, GameEvent, GamePhase,
    MotionDescriptor, Particle, PlayerBody,
};
pub use tick::{Session, TickInput};
