//! Lava Climb - An endless vertical platformer core
//!
//! Core modules:
//! - `sim`: Session loop, level generation, culling, player controller, hazard
//! - `physics`: Physics adapter contract and its rapier2d backend
//! - `platform`: Input resolution and the browser shell
//! - `persistence`: Key-value stores for progression and preferences
//! - `tuning`: Data-driven game balance

pub mod highscores;
pub mod persistence;
pub mod physics;
pub mod platform;
pub mod progression;
pub mod settings;
pub mod sim;
pub mod tuning;

pub use highscores::HeightRecords;
pub use progression::Progression;
pub use settings::{QualityPreset, Settings};
pub use tuning::{Difficulty, DifficultyProfile, Tuning};

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz, one physics "frame")
    pub const SIM_DT_MS: f32 = 1000.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 5;
    /// Longest wall-clock delta a single frame may feed the accumulator
    pub const MAX_FRAME_MS: f32 = 100.0;

    /// Default viewport dimensions (world units == CSS pixels)
    pub const VIEWPORT_WIDTH: f32 = 800.0;
    pub const VIEWPORT_HEIGHT: f32 = 1000.0;

    /// Player defaults
    pub const PLAYER_RADIUS: f32 = 18.0;
    /// Distance from the bottom of the viewport to the player spawn
    pub const PLAYER_SPAWN_OFFSET: f32 = 100.0;

    /// Platform slab thickness
    pub const PLATFORM_HEIGHT: f32 = 25.0;
    /// Pillar width (climbable wall)
    pub const PILLAR_WIDTH: f32 = 40.0;
    /// Collectible coin radius
    pub const COIN_RADIUS: f32 = 8.0;
    /// Enemy radius
    pub const ENEMY_RADIUS: f32 = 14.0;
    /// Start floor thickness (its top sits at the viewport bottom)
    pub const FLOOR_HEIGHT: f32 = 200.0;
    /// Side wall thickness (walls sit just outside the viewport)
    pub const WALL_THICKNESS: f32 = 100.0;
    /// Side wall height; walls are re-centred on the player every tick
    pub const WALL_HEIGHT: f32 = 10_000.0;

    /// World units per displayed height unit
    pub const HEIGHT_UNIT: f32 = 10.0;
}

/// Height (in display units) of a world y coordinate above the spawn line
#[inline]
pub fn height_at(y: f32, viewport_height: f32) -> u32 {
    let h = ((viewport_height - consts::PLAYER_SPAWN_OFFSET - y) / consts::HEIGHT_UNIT).floor();
    if h.is_finite() && h > 0.0 { h as u32 } else { 0 }
}

/// True if both components are finite
#[inline]
pub fn is_finite_vec(v: Vec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}
