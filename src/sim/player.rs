//! Player controller
//!
//! Turns the resolved input into velocity changes on the player body. The
//! controller state is derived every tick from ray probes and countdowns:
//!
//! ```text
//! Dashing       dash_ticks > 0
//! WallClimbing  touching a climbable surface with climb held
//! Grounded      any ground probe hits
//! Airborne      otherwise
//! ```

use glam::Vec2;

use super::state::{ControllerState, PlayerBody};
use super::tick::TickInput;
use crate::is_finite_vec;
use crate::physics::{PhysicsWorld, TagMask};
use crate::tuning::{HorizontalModel, PlayerTuning};

/// What the controller did this tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlOutcome {
    pub jumped: bool,
    pub dashed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PlayerController {
    tuning: PlayerTuning,
}

impl PlayerController {
    pub fn new(tuning: PlayerTuning) -> Self {
        Self { tuning }
    }

    pub fn tuning(&self) -> &PlayerTuning {
        &self.tuning
    }

    /// Pull position/velocity from physics and repair non-finite state.
    /// Returns true if a repair was needed.
    pub fn sync<W: PhysicsWorld>(&self, player: &mut PlayerBody, world: &mut W) -> bool {
        let position = world.position(player.body).unwrap_or(player.position);
        let velocity = world.velocity(player.body).unwrap_or(player.velocity);

        let mut repaired = false;
        if !is_finite_vec(velocity) {
            log::warn!("Player velocity went non-finite ({velocity:?}), zeroing");
            world.set_velocity(player.body, Vec2::ZERO);
            player.velocity = Vec2::ZERO;
            repaired = true;
        } else {
            player.velocity = velocity;
        }

        if !is_finite_vec(position) {
            log::warn!(
                "Player position went non-finite ({position:?}), restoring {:?}",
                player.last_finite_position
            );
            world.set_position(player.body, player.last_finite_position);
            world.set_velocity(player.body, Vec2::ZERO);
            player.position = player.last_finite_position;
            player.velocity = Vec2::ZERO;
            repaired = true;
        } else {
            player.position = position;
            player.last_finite_position = position;
        }
        repaired
    }

    /// Any of the downward probes touches ground
    pub fn probe_ground<W: PhysicsWorld>(&self, player: &PlayerBody, world: &W) -> bool {
        let reach = player.radius + self.tuning.ground_probe_margin;
        self.tuning.ground_probe_offsets.iter().any(|&dx| {
            let from = player.position + Vec2::new(dx, 0.0);
            let to = from + Vec2::new(0.0, reach);
            !world.query_ray(TagMask::GROUND, from, to).is_empty()
        })
    }

    /// Either side probe touches a climbable surface
    pub fn probe_wall<W: PhysicsWorld>(&self, player: &PlayerBody, world: &W) -> bool {
        let reach = player.radius + self.tuning.wall_probe_margin;
        [-reach, reach].iter().any(|&dx| {
            let to = player.position + Vec2::new(dx, 0.0);
            !world.query_ray(TagMask::CLIMBABLE, player.position, to).is_empty()
        })
    }

    /// Tick countdowns down by one
    pub fn tick_timers(&self, player: &mut PlayerBody) {
        player.dash_ticks = player.dash_ticks.saturating_sub(1);
        player.dash_cooldown_ticks = player.dash_cooldown_ticks.saturating_sub(1);
        player.invincible_ticks = player.invincible_ticks.saturating_sub(1);
        player.jump_debounce_ticks = player.jump_debounce_ticks.saturating_sub(1);
    }

    fn horizontal(&self, player: &PlayerBody, direction: f32, dashing: bool) -> f32 {
        let t = &self.tuning;
        let (speed, cap) = if dashing {
            (
                t.move_speed * t.dash_speed_multiplier,
                t.max_horizontal_velocity * t.dash_speed_multiplier,
            )
        } else {
            (t.move_speed, t.max_horizontal_velocity)
        };

        let vx = player.velocity.x;
        let next = if direction != 0.0 {
            let target = direction * speed;
            match t.horizontal_model {
                HorizontalModel::Smoothed => vx + (target - vx) * t.accel_smoothing,
                HorizontalModel::Instant => target,
            }
        } else {
            vx * t.friction
        };
        next.clamp(-cap, cap)
    }

    /// Apply one tick of control. Expects `sync` and `tick_timers` to have run.
    pub fn update<W: PhysicsWorld>(
        &self,
        player: &mut PlayerBody,
        world: &mut W,
        input: &TickInput,
    ) -> ControlOutcome {
        let t = &self.tuning;
        let mut outcome = ControlOutcome::default();
        let direction = if input.direction.is_finite() {
            input.direction.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        if direction != 0.0 {
            player.facing = direction.signum();
        }

        player.grounded = self.probe_ground(player, world);
        let touching_wall = self.probe_wall(player, world);

        let mut velocity = player.velocity;

        // Dash
        if input.dash && player.dash_cooldown_ticks == 0 {
            velocity = Vec2::new(player.facing * t.dash_burst_x, t.dash_burst_y);
            player.dash_ticks = t.dash_duration_ticks;
            player.dash_cooldown_ticks = t.dash_cooldown_ticks;
            player.invincible_ticks = player.invincible_ticks.max(t.invincibility_ticks);
            outcome.dashed = true;
            log::debug!("Dash (facing {})", player.facing);
        } else {
            velocity.x = self.horizontal(player, direction, player.dash_ticks > 0);
        }

        // Jump
        if input.jump && player.grounded && player.jump_debounce_ticks == 0 {
            velocity.y = t.jump_velocity;
            player.jump_debounce_ticks = t.jump_debounce_ticks;
            outcome.jumped = true;
        }

        // Wall climb
        player.climbing = touching_wall && input.climb;
        if player.climbing {
            velocity.y = -t.climb_speed;
        }

        player.state = if player.dash_ticks > 0 {
            ControllerState::Dashing
        } else if player.climbing {
            ControllerState::WallClimbing
        } else if player.grounded {
            ControllerState::Grounded
        } else {
            ControllerState::Airborne
        };

        player.velocity = velocity;
        world.set_velocity(player.body, velocity);
        outcome
    }
}
