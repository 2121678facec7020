//! Physics adapter
//!
//! The session only talks to physics through [`PhysicsWorld`]: create and
//! remove bodies, move them, toggle static, query rays and overlaps against a
//! tag-filtered body set, and integrate one step. [`RapierWorld`] wraps
//! rapier2d behind that contract; any engine that honours it can replace it.

pub mod rapier;

use bitflags::bitflags;
use glam::Vec2;
use serde::{Deserialize, Serialize};

pub use rapier::RapierWorld;

bitflags! {
    /// Semantic body labels; queries filter on any of the set bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TagMask: u16 {
        const PLAYER = 1 << 0;
        const PLATFORM = 1 << 1;
        const PILLAR = 1 << 2;
        const HAZARD = 1 << 3;
        const COIN = 1 << 4;
        const ENEMY = 1 << 5;
        const WALL = 1 << 6;
        const FLOOR = 1 << 7;

        /// Anything the player can stand on
        const GROUND = Self::PLATFORM.bits() | Self::PILLAR.bits() | Self::FLOOR.bits();
        /// Anything the player can climb
        const CLIMBABLE = Self::PLATFORM.bits() | Self::PILLAR.bits() | Self::WALL.bits();
        /// Contact ends the run
        const LETHAL = Self::HAZARD.bits() | Self::ENEMY.bits();
    }
}

/// Collision shape, centred on the body position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// Axis-aligned box with half extents
    Rect { half: Vec2 },
    Circle { radius: f32 },
}

impl Shape {
    pub fn rect(width: f32, height: f32) -> Self {
        Shape::Rect {
            half: Vec2::new(width * 0.5, height * 0.5),
        }
    }

    pub fn circle(radius: f32) -> Self {
        Shape::Circle { radius }
    }

    /// Half extents of the bounding box
    pub fn half_extents(&self) -> Vec2 {
        match *self {
            Shape::Rect { half } => half,
            Shape::Circle { radius } => Vec2::splat(radius),
        }
    }
}

/// Opaque body identifier; never reused within a world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyHandle(pub u32);

/// Body creation parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyParams {
    /// Single semantic label
    pub tag: TagMask,
    /// Static bodies ignore gravity and are never pushed
    pub is_static: bool,
    /// Sensors report overlaps but never block
    pub is_sensor: bool,
    /// Fractional velocity loss per step
    pub friction_air: f32,
}

impl BodyParams {
    pub fn solid(tag: TagMask) -> Self {
        Self {
            tag,
            is_static: true,
            is_sensor: false,
            friction_air: 0.0,
        }
    }

    pub fn sensor(tag: TagMask) -> Self {
        Self {
            tag,
            is_static: true,
            is_sensor: true,
            friction_air: 0.0,
        }
    }

    pub fn dynamic(tag: TagMask, friction_air: f32) -> Self {
        Self {
            tag,
            is_static: false,
            is_sensor: false,
            friction_air,
        }
    }
}

/// A ray query result, ordered by `fraction`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub body: BodyHandle,
    pub tag: TagMask,
    /// Fraction along the query segment (0 = start)
    pub fraction: f32,
    pub point: Vec2,
}

/// An overlap query result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collision {
    pub body: BodyHandle,
    pub tag: TagMask,
    /// Pushes the queried body away from `body`
    pub normal: Vec2,
    /// Overlap depth (0 for touching contacts)
    pub depth: f32,
}

/// The contract the game core consumes from a physics engine
pub trait PhysicsWorld {
    /// Create a body (not yet simulated until added)
    fn create_body(&mut self, shape: Shape, params: BodyParams, position: Vec2) -> BodyHandle;
    fn add_to_world(&mut self, handle: BodyHandle);
    /// Remove and drop a body; unknown handles are ignored
    fn remove_from_world(&mut self, handle: BodyHandle);
    fn contains(&self, handle: BodyHandle) -> bool;

    fn position(&self, handle: BodyHandle) -> Option<Vec2>;
    fn velocity(&self, handle: BodyHandle) -> Option<Vec2>;
    fn set_position(&mut self, handle: BodyHandle, position: Vec2);
    fn set_velocity(&mut self, handle: BodyHandle, velocity: Vec2);
    fn set_static(&mut self, handle: BodyHandle, is_static: bool);

    /// Bodies matching `filter` intersected by the segment, nearest first
    fn query_ray(&self, filter: TagMask, from: Vec2, to: Vec2) -> Vec<RayHit>;
    /// Bodies matching `filter` touching or overlapping `handle`
    fn query_overlap(&self, handle: BodyHandle, filter: TagMask) -> Vec<Collision>;

    /// Advance the simulation by `delta_ms`
    fn integrate(&mut self, delta_ms: f32);
    /// Bodies currently in the world
    fn body_count(&self) -> usize;
}
