//! Session state and core simulation types

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::physics::{BodyHandle, Shape, TagMask};
use crate::tuning::Difficulty;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GamePhase {
    /// No run yet (start screen)
    #[default]
    NotStarted,
    /// Active climbing
    Playing,
    /// Dead, waiting for a revive or end decision
    GameOver,
    /// Revive requested, ad countdown running
    Reviving,
    /// Run finished and persisted
    Ended,
}

/// What the player ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathCause {
    /// Sank below the rising lava
    Lava,
    /// Fell far below the lava line
    Abyss,
    /// Touched a lethal platform
    Hazard,
    /// Touched a patrolling enemy
    Enemy,
}

impl DeathCause {
    pub fn message(&self) -> &'static str {
        match self {
            DeathCause::Lava => "CONSUMED BY LAVA",
            DeathCause::Abyss => "FELL INTO THE ABYSS",
            DeathCause::Hazard => "BURNED BY A HAZARD",
            DeathCause::Enemy => "CAUGHT BY A CRAWLER",
        }
    }
}

/// Result reported by the ad shell for a revive request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdOutcome {
    Watched,
    /// The ad could not be shown; the revive is granted anyway
    Failed,
}

/// Controller state, recomputed every tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ControllerState {
    Grounded,
    #[default]
    Airborne,
    WallClimbing,
    Dashing,
}

/// Side effects for the shell (UI, audio, analytics)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GameEvent {
    Started { difficulty: Difficulty },
    Jumped,
    Dashed { cleared: u32 },
    CoinCollected { total: u64 },
    /// New personal best passed mid-run
    HeightMilestone { height: u32 },
    PassLevelUp { level: u32 },
    Died { cause: DeathCause, height: u32 },
    ReviveRequested { ticks: u32 },
    Revived { revives_left: u32 },
    /// Run over; `rank` is the height-record position if it qualified
    Ended { height: u32, coins: u64, rank: Option<usize> },
}

/// Kind of tracked world geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Platform,
    /// Tall climbable obstacle
    Pillar,
    /// Lethal platform
    Hazard,
    Coin,
    Enemy,
    Wall,
    Floor,
}

impl EntityKind {
    /// Physics label for this kind
    pub fn tag(&self) -> TagMask {
        match self {
            EntityKind::Platform => TagMask::PLATFORM,
            EntityKind::Pillar => TagMask::PILLAR,
            EntityKind::Hazard => TagMask::HAZARD,
            EntityKind::Coin => TagMask::COIN,
            EntityKind::Enemy => TagMask::ENEMY,
            EntityKind::Wall => TagMask::WALL,
            EntityKind::Floor => TagMask::FLOOR,
        }
    }

    /// Sensors report contacts but never block the player
    pub fn is_sensor(&self) -> bool {
        matches!(self, EntityKind::Coin | EntityKind::Enemy)
    }

    pub fn is_lethal(&self) -> bool {
        matches!(self, EntityKind::Hazard | EntityKind::Enemy)
    }
}

/// Horizontal motion of moving geometry, advanced once per tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MotionDescriptor {
    /// `x = origin_x + amplitude * sin(phase)`, phase += speed
    Sine {
        origin_x: f32,
        amplitude: f32,
        speed: f32,
        phase: f32,
    },
    /// Back-and-forth sweep; `speed` sign is the current direction
    Linear { min_x: f32, max_x: f32, speed: f32 },
}

impl MotionDescriptor {
    /// Advance one tick and return the new x
    pub fn step(&mut self, x: f32) -> f32 {
        match self {
            MotionDescriptor::Sine {
                origin_x,
                amplitude,
                speed,
                phase,
            } => {
                *phase = (*phase + *speed) % std::f32::consts::TAU;
                *origin_x + *amplitude * phase.sin()
            }
            MotionDescriptor::Linear { min_x, max_x, speed } => {
                let next = x + *speed;
                if next >= *max_x {
                    *speed = -speed.abs();
                    *max_x
                } else if next <= *min_x {
                    *speed = speed.abs();
                    *min_x
                } else {
                    next
                }
            }
        }
    }

    /// Furthest x this motion can reach either side of its range
    pub fn bounds(&self) -> (f32, f32) {
        match *self {
            MotionDescriptor::Sine {
                origin_x,
                amplitude,
                ..
            } => (origin_x - amplitude.abs(), origin_x + amplitude.abs()),
            MotionDescriptor::Linear { min_x, max_x, .. } => (min_x, max_x),
        }
    }
}

/// Geometry description produced by the generator, before it has a body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntitySpec {
    pub kind: EntityKind,
    pub center: Vec2,
    pub shape: Shape,
    pub motion: Option<MotionDescriptor>,
}

impl EntitySpec {
    pub fn new(kind: EntityKind, center: Vec2, shape: Shape) -> Self {
        Self {
            kind,
            center,
            shape,
            motion: None,
        }
    }

    pub fn with_motion(mut self, motion: MotionDescriptor) -> Self {
        self.motion = Some(motion);
        self
    }

    pub fn top(&self) -> f32 {
        self.center.y - self.shape.half_extents().y
    }

    pub fn bottom(&self) -> f32 {
        self.center.y + self.shape.half_extents().y
    }
}

/// Tracked world geometry backed by a physics body
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: u32,
    pub kind: EntityKind,
    pub center: Vec2,
    pub shape: Shape,
    pub motion: Option<MotionDescriptor>,
    /// Generator index that produced this piece
    pub spawn_index: u32,
    pub body: BodyHandle,
}

impl Entity {
    pub fn is_static(&self) -> bool {
        self.motion.is_none()
    }

    pub fn is_sensor(&self) -> bool {
        self.kind.is_sensor()
    }

    pub fn half_extents(&self) -> Vec2 {
        self.shape.half_extents()
    }

    /// Top edge (smallest y)
    pub fn top(&self) -> f32 {
        self.center.y - self.half_extents().y
    }

    pub fn bottom(&self) -> f32 {
        self.center.y + self.half_extents().y
    }
}

/// The player's controllable body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerBody {
    pub body: BodyHandle,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub state: ControllerState,
    pub grounded: bool,
    pub climbing: bool,
    /// +1 facing right, -1 facing left
    pub facing: f32,
    pub dash_ticks: u32,
    pub dash_cooldown_ticks: u32,
    pub invincible_ticks: u32,
    pub jump_debounce_ticks: u32,
    /// Restored when the physics state goes non-finite
    pub last_finite_position: Vec2,
}

impl PlayerBody {
    pub fn new(body: BodyHandle, position: Vec2, radius: f32) -> Self {
        Self {
            body,
            position,
            velocity: Vec2::ZERO,
            radius,
            state: ControllerState::Airborne,
            grounded: false,
            climbing: false,
            facing: 1.0,
            dash_ticks: 0,
            dash_cooldown_ticks: 0,
            invincible_ticks: 0,
            jump_debounce_ticks: 0,
            last_finite_position: position,
        }
    }

    pub fn is_invincible(&self) -> bool {
        self.invincible_ticks > 0
    }

    pub fn bottom(&self) -> f32 {
        self.position.y + self.radius
    }
}

/// A particle for visual effects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    /// 0xRRGGBB
    pub color: u32,
    /// 0-1, decreases over time
    pub life: f32,
}

/// Particle colors
pub mod colors {
    pub const COIN: u32 = 0xffcc00;
    pub const REVIVE: u32 = 0x00ff88;
    pub const DASH: u32 = 0x00ccff;
    pub const DEATH: u32 = 0xff4400;
}
