//! Procedural level generation
//!
//! Produces one piece of geometry at a time above the current frontier (the
//! top edge of the highest generated piece). Pieces are plain platforms,
//! tall climbable pillars, or lethal hazard platforms; safe platforms may
//! carry a coin or a patrolling enemy. All randomness comes from a seeded
//! `Pcg32`, so a seed reproduces the same climb.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::state::{EntityKind, EntitySpec, MotionDescriptor};
use crate::consts::{COIN_RADIUS, ENEMY_RADIUS, PILLAR_WIDTH, PLATFORM_HEIGHT};
use crate::physics::Shape;
use crate::tuning::{DifficultyProfile, GeneratorTuning};

/// Most entities a single `generate_next` can produce
pub const MAX_SPAWN_PIECES: usize = 3;

/// One generation step: a primary piece plus optional extras
#[derive(Debug, Clone, PartialEq)]
pub struct Spawn {
    pub primary: EntitySpec,
    pub coin: Option<EntitySpec>,
    pub enemy: Option<EntitySpec>,
}

impl Spawn {
    fn new(primary: EntitySpec) -> Self {
        Self {
            primary,
            coin: None,
            enemy: None,
        }
    }

    /// Top edge of the primary piece (the new frontier)
    pub fn top(&self) -> f32 {
        self.primary.top()
    }

    /// The y the primary was placed at: a pillar's bottom edge, otherwise
    /// its centre
    pub fn placement_y(&self) -> f32 {
        match self.primary.kind {
            EntityKind::Pillar => self.primary.bottom(),
            _ => self.primary.center.y,
        }
    }

    /// All pieces, primary first
    pub fn pieces(&self) -> impl Iterator<Item = &EntitySpec> {
        std::iter::once(&self.primary)
            .chain(self.coin.iter())
            .chain(self.enemy.iter())
    }
}

/// Uniform sample from `[lo, hi)`; a degenerate range yields `lo`
fn sample(rng: &mut Pcg32, (lo, hi): (f32, f32)) -> f32 {
    if hi > lo { rng.random_range(lo..hi) } else { lo }
}

/// Bernoulli trial that tolerates out-of-range probabilities
fn chance(rng: &mut Pcg32, p: f64) -> bool {
    rng.random::<f64>() < p
}

/// Seeded generator of climbable geometry
#[derive(Debug, Clone)]
pub struct LevelGenerator {
    rng: Pcg32,
    tuning: GeneratorTuning,
    viewport_width: f32,
    player_radius: f32,
}

impl LevelGenerator {
    pub fn new(seed: u64, tuning: GeneratorTuning, viewport_width: f32, player_radius: f32) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
            tuning,
            viewport_width,
            player_radius,
        }
    }

    pub fn tuning(&self) -> &GeneratorTuning {
        &self.tuning
    }

    /// Progression stage for a spawn index
    pub fn stage(&self, index: u32) -> u32 {
        index / self.tuning.stage_length.max(1)
    }

    /// Generate the next piece above `frontier_y`.
    ///
    /// Returns `None` when the candidate would overlap the frontier or sit
    /// out of reach above it; the caller retries on a later tick.
    pub fn generate_next(
        &mut self,
        frontier_y: f32,
        index: u32,
        profile: &DifficultyProfile,
    ) -> Option<Spawn> {
        if !frontier_y.is_finite() {
            log::trace!("Generation skipped: no frontier");
            return None;
        }
        let y = frontier_y - profile.gap_height;
        if y > frontier_y - self.tuning.min_spacing {
            log::trace!("Generation skipped: y={y} overlaps frontier {frontier_y}");
            return None;
        }
        if y < frontier_y - self.tuning.max_reach {
            log::trace!("Generation skipped: y={y} out of reach of frontier {frontier_y}");
            return None;
        }

        let spawn = if chance(&mut self.rng, profile.pillar_chance) {
            self.pillar(y, index, profile)
        } else {
            self.platform(y, index, profile, true)
        };
        Some(spawn)
    }

    /// A guaranteed plain platform centred at `y` (initial run)
    pub fn initial_platform(&mut self, y: f32, index: u32, profile: &DifficultyProfile) -> Spawn {
        self.platform(y, index, profile, false)
    }

    /// Pillar whose bottom edge sits at `y`
    fn pillar(&mut self, y: f32, index: u32, profile: &DifficultyProfile) -> Spawn {
        let width = PILLAR_WIDTH.min(self.viewport_width);
        let height = sample(&mut self.rng, self.tuning.pillar_height);
        let margin = self.player_radius * 2.0 + 14.0;
        let x = sample(&mut self.rng, (margin, self.viewport_width - margin))
            .max(width * 0.5)
            .min(self.viewport_width - width * 0.5);

        let mut spec = EntitySpec::new(
            EntityKind::Pillar,
            Vec2::new(x, y - height * 0.5),
            Shape::rect(width, height),
        );

        if self.moves(index, profile) {
            let reach = sample(&mut self.rng, self.tuning.sine_amplitude);
            let min_x = (x - reach).max(width * 0.5);
            let max_x = (x + reach).min(self.viewport_width - width * 0.5);
            if max_x > min_x {
                let mut speed = sample(&mut self.rng, self.tuning.linear_speed);
                if self.rng.random::<bool>() {
                    speed = -speed;
                }
                spec = spec.with_motion(MotionDescriptor::Linear { min_x, max_x, speed });
            }
        }

        Spawn::new(spec)
    }

    /// Platform centred at `y`
    fn platform(
        &mut self,
        y: f32,
        index: u32,
        profile: &DifficultyProfile,
        allow_features: bool,
    ) -> Spawn {
        let width = (profile.platform_width * sample(&mut self.rng, self.tuning.width_factor))
            .max(PLATFORM_HEIGHT)
            .min(self.viewport_width);
        let half_w = width * 0.5;
        let mut x = sample(&mut self.rng, (half_w, self.viewport_width - half_w));

        let is_hazard = allow_features
            && index > self.tuning.hazard_min_index
            && chance(&mut self.rng, profile.hazard_chance);
        let kind = if is_hazard {
            EntityKind::Hazard
        } else {
            EntityKind::Platform
        };

        let mut motion = None;
        if allow_features && self.moves(index, profile) {
            let room = (self.viewport_width - width) * 0.5;
            let amplitude = sample(&mut self.rng, self.tuning.sine_amplitude).min(room);
            if amplitude > 0.0 {
                // Keep the whole sweep on screen
                x = x
                    .max(half_w + amplitude)
                    .min(self.viewport_width - half_w - amplitude);
                let speed = sample(&mut self.rng, self.tuning.sine_speed);
                motion = Some(MotionDescriptor::Sine {
                    origin_x: x,
                    amplitude,
                    speed,
                    phase: 0.0,
                });
            }
        }

        let mut primary = EntitySpec::new(kind, Vec2::new(x, y), Shape::rect(width, PLATFORM_HEIGHT));
        primary.motion = motion;
        let mut spawn = Spawn::new(primary);

        if is_hazard {
            return spawn;
        }

        if chance(&mut self.rng, self.tuning.coin_chance) {
            let mut coin = EntitySpec::new(
                EntityKind::Coin,
                Vec2::new(x, y - self.tuning.coin_lift),
                Shape::circle(COIN_RADIUS),
            );
            // Rides along with its platform
            coin.motion = motion;
            spawn.coin = Some(coin);
        }

        // Enemies only patrol platforms that hold still
        if allow_features
            && motion.is_none()
            && index >= self.tuning.enemy_min_index
            && width > ENEMY_RADIUS * 4.0
            && chance(&mut self.rng, profile.enemy_chance)
        {
            let min_x = x - half_w + ENEMY_RADIUS;
            let max_x = x + half_w - ENEMY_RADIUS;
            let speed = sample(&mut self.rng, self.tuning.enemy_speed);
            let enemy = EntitySpec::new(
                EntityKind::Enemy,
                Vec2::new(x, y - PLATFORM_HEIGHT * 0.5 - ENEMY_RADIUS),
                Shape::circle(ENEMY_RADIUS),
            )
            .with_motion(MotionDescriptor::Linear { min_x, max_x, speed });
            spawn.enemy = Some(enemy);
        }

        spawn
    }

    fn moves(&mut self, index: u32, profile: &DifficultyProfile) -> bool {
        self.stage(index) >= self.tuning.moving_min_stage
            && chance(&mut self.rng, profile.moving_chance)
    }
}
