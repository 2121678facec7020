//! Data-driven game balance
//!
//! Every gameplay constant that a designer might want to tweak lives here.
//! `Tuning::default()` is the shipped balance; a JSON override can be loaded
//! with [`Tuning::from_json`]. Durations are in simulation ticks (60 Hz).

use serde::{Deserialize, Serialize};

/// Difficulty tier selected on the start screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" | "med" | "normal" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

/// Per-difficulty generation and hazard parameters (immutable for a session)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyProfile {
    /// Base lava rise per tick (world units)
    pub hazard_rise_speed: f32,
    /// Nominal platform width before the random width factor
    pub platform_width: f32,
    /// Vertical spacing between consecutive generated pieces
    pub gap_height: f32,
    /// Chance a platform is lethal (after `hazard_min_index`)
    pub hazard_chance: f64,
    /// Chance a piece is a tall climbable pillar
    pub pillar_chance: f64,
    /// Chance a piece moves (from stage 1 on)
    pub moving_chance: f64,
    /// Chance a safe platform carries a patrolling enemy (after `enemy_min_index`)
    pub enemy_chance: f64,
}

impl DifficultyProfile {
    pub const EASY: Self = Self {
        hazard_rise_speed: 0.25,
        platform_width: 200.0,
        gap_height: 110.0,
        hazard_chance: 0.0,
        pillar_chance: 0.25,
        moving_chance: 0.1,
        enemy_chance: 0.0,
    };

    pub const MEDIUM: Self = Self {
        hazard_rise_speed: 0.35,
        platform_width: 170.0,
        gap_height: 120.0,
        hazard_chance: 0.04,
        pillar_chance: 0.25,
        moving_chance: 0.25,
        enemy_chance: 0.05,
    };

    pub const HARD: Self = Self {
        hazard_rise_speed: 0.55,
        platform_width: 140.0,
        gap_height: 135.0,
        hazard_chance: 0.1,
        pillar_chance: 0.25,
        moving_chance: 0.5,
        enemy_chance: 0.1,
    };
}

/// How horizontal input turns into velocity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HorizontalModel {
    /// Exponential approach toward the target, friction decay when idle
    #[default]
    Smoothed,
    /// Velocity snaps to the target (friction decay when idle)
    Instant,
}

/// Player controller constants (velocities are world units per tick)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    pub radius: f32,
    pub move_speed: f32,
    pub max_horizontal_velocity: f32,
    pub horizontal_model: HorizontalModel,
    /// Fraction of the remaining gap to the target closed per tick
    pub accel_smoothing: f32,
    /// Velocity multiplier per tick with no direction held
    pub friction: f32,
    pub jump_velocity: f32,
    pub jump_debounce_ticks: u32,
    pub climb_speed: f32,
    pub ground_probe_margin: f32,
    pub ground_probe_offsets: [f32; 3],
    pub wall_probe_margin: f32,
    pub dash_speed_multiplier: f32,
    pub dash_burst_x: f32,
    pub dash_burst_y: f32,
    pub dash_duration_ticks: u32,
    pub dash_cooldown_ticks: u32,
    pub invincibility_ticks: u32,
    /// Dash destroys hazards and enemies inside the viewport
    pub dash_clears_hazards: bool,
    pub dash_bonus_coins: u64,
    pub dash_bonus_xp: u32,
    /// Tilt angle (degrees) that maps to full horizontal speed
    pub tilt_full_angle: f32,
    pub friction_air: f32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            radius: crate::consts::PLAYER_RADIUS,
            move_speed: 6.5,
            max_horizontal_velocity: 8.0,
            horizontal_model: HorizontalModel::Smoothed,
            accel_smoothing: 0.25,
            friction: 0.8,
            jump_velocity: -13.0,
            jump_debounce_ticks: 12,
            climb_speed: 5.0,
            ground_probe_margin: 15.0,
            ground_probe_offsets: [-15.0, 0.0, 15.0],
            wall_probe_margin: 10.0,
            dash_speed_multiplier: 1.6,
            dash_burst_x: 12.0,
            dash_burst_y: -9.0,
            dash_duration_ticks: 15,
            dash_cooldown_ticks: 90,
            invincibility_ticks: 30,
            dash_clears_hazards: true,
            dash_bonus_coins: 2,
            dash_bonus_xp: 10,
            tilt_full_angle: 30.0,
            friction_air: 0.01,
        }
    }
}

/// Level generation constants shared by all difficulties
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorTuning {
    /// Platform width factor range (applied to `platform_width`)
    pub width_factor: (f32, f32),
    pub pillar_height: (f32, f32),
    /// Minimum vertical distance above the frontier for a new piece
    pub min_spacing: f32,
    /// Maximum vertical distance above the frontier (still reachable)
    pub max_reach: f32,
    pub hazard_min_index: u32,
    pub enemy_min_index: u32,
    pub coin_chance: f64,
    pub coin_lift: f32,
    /// Pieces per progression stage
    pub stage_length: u32,
    pub moving_min_stage: u32,
    pub sine_amplitude: (f32, f32),
    pub sine_speed: (f32, f32),
    pub linear_speed: (f32, f32),
    pub enemy_speed: (f32, f32),
    /// First generated platform sits this far above the viewport bottom
    pub initial_offset: f32,
    /// Extra platforms beyond one screen height in the initial run
    pub initial_extra: u32,
}

impl Default for GeneratorTuning {
    fn default() -> Self {
        Self {
            width_factor: (0.8, 1.2),
            pillar_height: (180.0, 300.0),
            min_spacing: 40.0,
            max_reach: 220.0,
            hazard_min_index: 15,
            enemy_min_index: 30,
            coin_chance: 0.15,
            coin_lift: 40.0,
            stage_length: 25,
            moving_min_stage: 1,
            sine_amplitude: (40.0, 120.0),
            sine_speed: (0.02, 0.05),
            linear_speed: (1.0, 2.5),
            enemy_speed: (0.8, 1.8),
            initial_offset: 160.0,
            initial_extra: 2,
        }
    }
}

/// Culling window and live-geometry cap
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CullingTuning {
    /// Keep geometry this far below the lava
    pub hazard_buffer: f32,
    /// Keep geometry this far below the player
    pub look_behind: f32,
    /// Generate while the player is within this distance of the frontier
    pub lookahead: f32,
    /// Maximum tracked entities
    pub entity_cap: usize,
}

impl Default for CullingTuning {
    fn default() -> Self {
        Self {
            hazard_buffer: 200.0,
            look_behind: 1200.0,
            lookahead: 600.0,
            entity_cap: 64,
        }
    }
}

/// Rising hazard constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardTuning {
    /// Lava starts this far below the viewport bottom
    pub start_offset: f32,
    /// Height (display units) over which the rise speed gains +1x
    pub ramp_height: f32,
    pub max_ramp: f32,
    /// Fallback death distance below the lava
    pub abyss_distance: f32,
    /// Lava push-back on revive
    pub revive_buffer: f32,
}

impl Default for HazardTuning {
    fn default() -> Self {
        Self {
            start_offset: 400.0,
            ramp_height: 2000.0,
            max_ramp: 3.0,
            abyss_distance: 600.0,
            revive_buffer: 600.0,
        }
    }
}

/// Session lifecycle and reward constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTuning {
    pub revives_per_session: u32,
    /// Ad countdown before a requested revive is granted anyway
    pub revive_delay_ticks: u32,
    /// Player is lifted this far on revive
    pub revive_lift: f32,
    /// Minimum clearance between the revived player and the lava
    pub revive_safety: f32,
    pub revive_platform_width: f32,
    pub coin_reward: u64,
    pub coin_xp: u32,
    pub height_xp: u32,
    pub death_shake: f32,
    pub revive_shake: f32,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            revives_per_session: 1,
            revive_delay_ticks: 5 * 60,
            revive_lift: 300.0,
            revive_safety: 300.0,
            revive_platform_width: 160.0,
            coin_reward: 5,
            coin_xp: 20,
            height_xp: 1,
            death_shake: 35.0,
            revive_shake: 10.0,
        }
    }
}

/// Complete balance sheet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub viewport_width: f32,
    pub viewport_height: f32,
    /// Gravity (world units per tick squared)
    pub gravity: f32,
    pub player: PlayerTuning,
    pub generator: GeneratorTuning,
    pub culling: CullingTuning,
    pub hazard: HazardTuning,
    pub session: SessionTuning,
    pub easy: DifficultyProfile,
    pub medium: DifficultyProfile,
    pub hard: DifficultyProfile,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            viewport_width: crate::consts::VIEWPORT_WIDTH,
            viewport_height: crate::consts::VIEWPORT_HEIGHT,
            gravity: 0.35,
            player: PlayerTuning::default(),
            generator: GeneratorTuning::default(),
            culling: CullingTuning::default(),
            hazard: HazardTuning::default(),
            session: SessionTuning::default(),
            easy: DifficultyProfile::EASY,
            medium: DifficultyProfile::MEDIUM,
            hard: DifficultyProfile::HARD,
        }
    }
}

impl Tuning {
    /// Parse a (possibly partial) JSON override; missing fields keep defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Profile for a difficulty tier
    pub fn profile(&self, difficulty: Difficulty) -> DifficultyProfile {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }

    /// Platforms pre-generated at session start (one screen plus a margin)
    pub fn initial_platform_count(&self, profile: &DifficultyProfile) -> u32 {
        let screen = (self.viewport_height / profile.gap_height).ceil().max(1.0) as u32;
        screen + self.generator.initial_extra
    }

    /// Resize the viewport (e.g. on window resize before a session starts)
    pub fn with_viewport(mut self, width: f32, height: f32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let tuning = Tuning::from_json(r#"{ "gravity": 0.5, "player": { "move_speed": 7.0 } }"#)
            .expect("valid json");
        assert_eq!(tuning.gravity, 0.5);
        assert_eq!(tuning.player.move_speed, 7.0);
        assert_eq!(tuning.player.jump_velocity, -13.0);
        assert_eq!(tuning.medium.gap_height, 120.0);
    }

    #[test]
    fn test_medium_profile_values() {
        let tuning = Tuning::default();
        let medium = tuning.profile(Difficulty::Medium);
        assert_eq!(medium.gap_height, 120.0);
        assert_eq!(medium.hazard_rise_speed, 0.35);
    }

    #[test]
    fn test_initial_run_fills_a_screen() {
        let tuning = Tuning::default();
        for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            let profile = tuning.profile(difficulty);
            let count = tuning.initial_platform_count(&profile);
            assert!(count as f32 * profile.gap_height >= tuning.viewport_height);
            assert!((count as usize) < tuning.culling.entity_cap);
        }
    }

    #[test]
    fn test_difficulty_from_str() {
        assert_eq!(Difficulty::from_str("HARD"), Some(Difficulty::Hard));
        assert_eq!(Difficulty::from_str("med"), Some(Difficulty::Medium));
        assert_eq!(Difficulty::from_str("impossible"), None);
    }
}
