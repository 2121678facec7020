//! Rising lava plane

use serde::{Deserialize, Serialize};

use super::state::DeathCause;
use crate::tuning::HazardTuning;

/// Tracks the lava surface (`y` only ever decreases, apart from revives)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HazardTracker {
    y: f32,
    rise_speed: f32,
    tuning: HazardTuning,
}

impl HazardTracker {
    pub fn new(start_y: f32, rise_speed: f32, tuning: HazardTuning) -> Self {
        Self {
            y: start_y,
            rise_speed: rise_speed.max(0.0),
            tuning,
        }
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    /// Speed multiplier for the best height reached this run
    pub fn ramp(&self, max_height: u32) -> f32 {
        let ramp_height = self.tuning.ramp_height.max(1.0);
        (1.0 + max_height as f32 / ramp_height).min(self.tuning.max_ramp.max(1.0))
    }

    /// Rise one tick; returns the distance risen
    pub fn advance(&mut self, max_height: u32) -> f32 {
        let rise = self.rise_speed * self.ramp(max_height);
        self.y -= rise;
        rise
    }

    /// Lethal check for the player center
    pub fn check(&self, player_y: f32) -> Option<DeathCause> {
        if player_y > self.y + self.tuning.abyss_distance {
            Some(DeathCause::Abyss)
        } else if player_y > self.y {
            Some(DeathCause::Lava)
        } else {
            None
        }
    }

    /// Revive breathing room
    pub fn push_back(&mut self) {
        self.y += self.tuning.revive_buffer;
    }
}
