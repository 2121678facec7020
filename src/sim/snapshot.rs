//! Read-only view of a session for renderers and UI
//!
//! Built on demand; serializes to JSON for the browser shell.

use glam::Vec2;
use serde::Serialize;

use super::state::{ControllerState, Entity, EntityKind, GamePhase, Particle, PlayerBody};
use crate::tuning::Difficulty;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerView {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub state: ControllerState,
    pub facing: f32,
    pub invincible: bool,
    /// Active skin color (#rrggbb)
    pub color: &'static str,
}

impl PlayerView {
    pub fn new(player: &PlayerBody, color: &'static str) -> Self {
        Self {
            position: player.position,
            velocity: player.velocity,
            radius: player.radius,
            state: player.state,
            facing: player.facing,
            invincible: player.is_invincible(),
            color,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityView {
    pub id: u32,
    pub kind: EntityKind,
    pub center: Vec2,
    pub half_extents: Vec2,
    pub moving: bool,
}

impl From<&Entity> for EntityView {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id,
            kind: entity.kind,
            center: entity.center,
            half_extents: entity.half_extents(),
            moving: !entity.is_static(),
        }
    }
}

/// Everything needed to draw one frame and the HUD
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub phase: GamePhase,
    pub difficulty: Difficulty,
    pub viewport: Vec2,
    /// World y of the viewport's top edge
    pub camera_top: f32,
    /// Horizontal screen shake offset
    pub shake_offset: f32,
    pub hazard_y: f32,
    pub player: Option<PlayerView>,
    pub height: u32,
    pub max_height: u32,
    pub best_height: u32,
    pub run_coins: u64,
    pub coins: u64,
    pub revives_left: u32,
    /// Ticks left on the revive ad countdown
    pub revive_ticks_left: u32,
    pub pass_level: u32,
    pub pass_progress: f32,
    pub entities: Vec<EntityView>,
    pub particles: Vec<Particle>,
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Entities overlapping the camera view
    pub fn visible_entities(&self) -> impl Iterator<Item = &EntityView> {
        let top = self.camera_top;
        let bottom = self.camera_top + self.viewport.y;
        self.entities
            .iter()
            .filter(move |e| e.center.y + e.half_extents.y >= top && e.center.y - e.half_extents.y <= bottom)
    }
}
