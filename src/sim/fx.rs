//! Camera follow, screen shake and particles
//!
//! Purely cosmetic: nothing here feeds back into gameplay. Uses its own RNG so
//! visual randomness never perturbs level generation.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::state::Particle;

/// Fraction of the distance to the target covered per tick
pub const CAMERA_SMOOTHING: f32 = 0.15;
/// Player sits this far below the viewport centre
pub const CAMERA_LEAD: f32 = 100.0;
/// Shake multiplier per tick
pub const SHAKE_DECAY: f32 = 0.9;
pub const PARTICLE_GRAVITY: f32 = 0.12;
/// Life lost per tick (particles live 40 ticks)
pub const PARTICLE_FADE: f32 = 0.025;

/// Burst sizes
pub const COIN_BURST: usize = 10;
pub const REVIVE_BURST: usize = 50;
pub const DASH_BURST: usize = 20;
pub const DEATH_BURST: usize = 30;

/// Smooth-follow camera with decaying shake
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// World y of the viewport's top edge
    pub top: f32,
    /// Shake amplitude (world units)
    pub shake: f32,
    viewport_height: f32,
}

impl Camera {
    pub fn new(viewport_height: f32) -> Self {
        Self {
            top: 0.0,
            shake: 0.0,
            viewport_height,
        }
    }

    /// Viewport top that frames `player_y`
    pub fn target(&self, player_y: f32) -> f32 {
        player_y - self.viewport_height * 0.5 - CAMERA_LEAD
    }

    pub fn snap_to(&mut self, player_y: f32) {
        self.top = self.target(player_y);
    }

    pub fn follow(&mut self, player_y: f32) {
        if !player_y.is_finite() {
            return;
        }
        self.top += (self.target(player_y) - self.top) * CAMERA_SMOOTHING;
    }

    /// Set shake to at least `amount`
    pub fn add_shake(&mut self, amount: f32) {
        self.shake = self.shake.max(amount);
    }

    pub fn decay(&mut self) {
        self.shake *= SHAKE_DECAY;
        if self.shake < 0.01 {
            self.shake = 0.0;
        }
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.viewport_height
    }

    /// True if any part of `[top, bottom]` is on screen
    pub fn sees(&self, top: f32, bottom: f32) -> bool {
        bottom >= self.top && top <= self.bottom()
    }
}

/// Particle pool with a hard cap
#[derive(Debug, Clone)]
pub struct Particles {
    rng: Pcg32,
    particles: Vec<Particle>,
    max: usize,
}

impl Particles {
    pub fn new(seed: u64, max: usize) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
            particles: Vec::new(),
            max,
        }
    }

    pub fn as_slice(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    pub fn set_max(&mut self, max: usize) {
        self.max = max;
        self.particles.truncate(max);
    }

    /// Spray `count` particles from `pos`
    pub fn burst(&mut self, pos: Vec2, color: u32, count: usize) {
        let room = self.max.saturating_sub(self.particles.len());
        for _ in 0..count.min(room) {
            let vel = Vec2::new(
                (self.rng.random::<f32>() - 0.5) * 15.0,
                (self.rng.random::<f32>() - 1.0) * 12.0,
            );
            self.particles.push(Particle {
                pos,
                vel,
                color,
                life: 1.0,
            });
        }
    }

    pub fn update(&mut self) {
        for p in &mut self.particles {
            p.pos += p.vel;
            p.vel.y += PARTICLE_GRAVITY;
            p.life -= PARTICLE_FADE;
        }
        self.particles.retain(|p| p.life > 0.0);
    }

    /// Random horizontal offset for the current shake
    pub fn shake_offset(&mut self, shake: f32) -> f32 {
        if shake <= 0.0 {
            return 0.0;
        }
        (self.rng.random::<f32>() - 0.5) * shake
    }
}
