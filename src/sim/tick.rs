//! Session and fixed timestep tick
//!
//! A [`Session`] owns the physics world, the tracked geometry, the player and
//! every per-run counter. The shell feeds it wall-clock frames; the session
//! turns them into fixed 60 Hz ticks that run in a fixed order:
//!
//! 1. move kinematic geometry
//! 2. integrate physics
//! 3. sanitize the player and run the controller
//! 4. height and XP
//! 5. lava rise and lava/abyss death
//! 6. coin and lethal contacts
//! 7. cull and generate
//! 8. camera, shake and particles (these also run outside Playing)

use glam::Vec2;

use super::culling::CullingManager;
use super::error::SimError;
use super::fx::{self, Camera, Particles};
use super::generator::{LevelGenerator, Spawn};
use super::hazard::HazardTracker;
use super::player::PlayerController;
use super::snapshot::{EntityView, PlayerView, Snapshot};
use super::state::{
    AdOutcome, DeathCause, Entity, EntityKind, EntitySpec, GameEvent, GamePhase, PlayerBody,
    colors,
};
use crate::consts::*;
use crate::highscores::{HeightRecord, HeightRecords, now_ms};
use crate::persistence::KeyValueStore;
use crate::physics::{BodyHandle, BodyParams, PhysicsWorld, RapierWorld, Shape, TagMask};
use crate::progression::{Progression, find_skin};
use crate::settings::Settings;
use crate::tuning::{Difficulty, DifficultyProfile, Tuning};
use crate::height_at;

/// Logical input for a single tick (deterministic)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickInput {
    /// Horizontal steering in [-1, 1] (keys give ±1, tilt is analog)
    pub direction: f32,
    pub jump: bool,
    pub climb: bool,
    pub dash: bool,
}

/// Seed offset for the cosmetic RNG
const FX_SEED_SALT: u64 = 0x9e37_79b9_7f4a_7c15;
/// Undrained events kept; older ones are dropped first
pub const MAX_PENDING_EVENTS: usize = 256;

/// One player's game: lifecycle, world and progression
pub struct Session<W: PhysicsWorld = RapierWorld> {
    tuning: Tuning,
    settings: Settings,
    world_factory: fn(Vec2) -> W,
    world: W,
    seed: u64,
    runs: u64,

    phase: GamePhase,
    difficulty: Difficulty,
    profile: DifficultyProfile,

    player: Option<PlayerBody>,
    /// Tracked geometry in spawn order (culled)
    entities: Vec<Entity>,
    /// Side walls, re-centred on the player every tick (never culled)
    walls: Vec<Entity>,
    generator: LevelGenerator,
    culling: CullingManager,
    controller: PlayerController,
    hazard: HazardTracker,
    camera: Camera,
    particles: Particles,
    shake_offset: f32,

    /// Top edge of the highest generated piece
    frontier_y: f32,
    next_spawn_index: u32,
    next_entity_id: u32,

    height: u32,
    max_height: u32,
    best_at_start: u32,
    announced_best: bool,
    run_coins: u64,
    revives_left: u32,
    revive_ticks_left: u32,

    time_ticks: u64,
    accumulator_ms: f32,
    events: Vec<GameEvent>,

    progression: Progression,
    /// Progression changed since the last write
    progression_dirty: bool,
    records: HeightRecords,
    store: Box<dyn KeyValueStore>,
}

impl Session<RapierWorld> {
    /// Session on rapier2d physics
    pub fn new(tuning: Tuning, store: Box<dyn KeyValueStore>, seed: u64) -> Self {
        Self::with_world(tuning, store, seed, RapierWorld::new)
    }
}

impl<W: PhysicsWorld> Session<W> {
    /// Session on any physics backend; `world_factory` receives the gravity
    pub fn with_world(
        tuning: Tuning,
        store: Box<dyn KeyValueStore>,
        seed: u64,
        world_factory: fn(Vec2) -> W,
    ) -> Self {
        let settings = Settings::load(store.as_ref());
        let progression = Progression::load(store.as_ref());
        let records = HeightRecords::load(store.as_ref());
        let difficulty = Difficulty::default();
        let profile = tuning.profile(difficulty);

        Self {
            world: world_factory(Vec2::new(0.0, tuning.gravity)),
            world_factory,
            seed,
            runs: 0,
            phase: GamePhase::NotStarted,
            difficulty,
            profile,
            player: None,
            entities: Vec::new(),
            walls: Vec::new(),
            generator: LevelGenerator::new(
                seed,
                tuning.generator.clone(),
                tuning.viewport_width,
                tuning.player.radius,
            ),
            culling: CullingManager::new(tuning.culling.clone()),
            controller: PlayerController::new(tuning.player.clone()),
            hazard: HazardTracker::new(
                tuning.viewport_height + tuning.hazard.start_offset,
                profile.hazard_rise_speed,
                tuning.hazard.clone(),
            ),
            camera: Camera::new(tuning.viewport_height),
            particles: Particles::new(seed ^ FX_SEED_SALT, settings.max_particles()),
            shake_offset: 0.0,
            frontier_y: f32::INFINITY,
            next_spawn_index: 0,
            next_entity_id: 1,
            height: 0,
            max_height: 0,
            best_at_start: progression.best_height,
            announced_best: false,
            run_coins: 0,
            revives_left: 0,
            revive_ticks_left: 0,
            time_ticks: 0,
            accumulator_ms: 0.0,
            events: Vec::new(),
            settings,
            progression,
            progression_dirty: false,
            records,
            store,
            tuning,
        }
    }

    // === Lifecycle ===

    /// Build a fresh world and begin climbing
    pub fn start(&mut self, difficulty: Difficulty) {
        self.events.clear();
        if matches!(self.phase, GamePhase::GameOver | GamePhase::Reviving) {
            self.finish_run();
        }

        let run_seed = self.seed.wrapping_add(self.runs);
        self.runs += 1;
        let width = self.tuning.viewport_width;
        let height = self.tuning.viewport_height;

        self.difficulty = difficulty;
        self.profile = self.tuning.profile(difficulty);
        self.world = (self.world_factory)(Vec2::new(0.0, self.tuning.gravity));
        self.entities.clear();
        self.walls.clear();
        self.generator = LevelGenerator::new(
            run_seed,
            self.tuning.generator.clone(),
            width,
            self.tuning.player.radius,
        );
        self.hazard = HazardTracker::new(
            height + self.tuning.hazard.start_offset,
            self.profile.hazard_rise_speed,
            self.tuning.hazard.clone(),
        );
        self.particles.clear();
        self.frontier_y = f32::INFINITY;
        self.next_spawn_index = 0;
        self.next_entity_id = 1;
        self.height = 0;
        self.max_height = 0;
        self.best_at_start = self.progression.best_height;
        self.announced_best = false;
        self.run_coins = 0;
        self.revives_left = self.tuning.session.revives_per_session;
        self.revive_ticks_left = 0;
        self.accumulator_ms = 0.0;

        // Player
        let radius = self.tuning.player.radius;
        let spawn = Vec2::new(width * 0.5, height - PLAYER_SPAWN_OFFSET);
        let body = self.world.create_body(
            Shape::circle(radius),
            BodyParams::dynamic(TagMask::PLAYER, self.tuning.player.friction_air),
            spawn,
        );
        self.world.add_to_world(body);
        self.player = Some(PlayerBody::new(body, spawn, radius));

        // Floor: top edge at the viewport bottom
        let floor = EntitySpec::new(
            EntityKind::Floor,
            Vec2::new(width * 0.5, height + FLOOR_HEIGHT * 0.5),
            Shape::rect(width * 10.0, FLOOR_HEIGHT),
        );
        self.add_entity(floor, 0);
        self.frontier_y = height;

        // Side walls just outside the viewport
        for x in [-WALL_THICKNESS * 0.5, width + WALL_THICKNESS * 0.5] {
            let spec = EntitySpec::new(
                EntityKind::Wall,
                Vec2::new(x, spawn.y),
                Shape::rect(WALL_THICKNESS, WALL_HEIGHT),
            );
            let wall = self.make_entity(spec, 0);
            self.walls.push(wall);
        }

        // Initial run
        let profile = self.profile;
        let count = self.tuning.initial_platform_count(&profile);
        let first_y = height - self.tuning.generator.initial_offset;
        for i in 0..count {
            let y = first_y - i as f32 * profile.gap_height;
            let index = self.next_spawn_index;
            let piece = self.generator.initial_platform(y, index, &profile);
            self.add_spawn(piece);
        }

        self.camera = Camera::new(height);
        self.camera.snap_to(spawn.y);
        self.phase = GamePhase::Playing;
        self.emit(GameEvent::Started { difficulty });
        log::info!(
            "Session started: {} (seed {run_seed}, {} entities)",
            difficulty.as_str(),
            self.entities.len()
        );
    }

    /// Kill the player. Only acts while Playing.
    pub fn trigger_death(&mut self, cause: DeathCause) {
        if self.phase != GamePhase::Playing {
            log::debug!("Ignoring death ({cause:?}) in phase {:?}", self.phase);
            return;
        }
        self.phase = GamePhase::GameOver;

        if let Some(player) = &self.player {
            self.world.set_velocity(player.body, Vec2::ZERO);
            self.particles
                .burst(player.position, colors::DEATH, fx::DEATH_BURST);
        }
        self.shake(self.tuning.session.death_shake);

        if self.progression.record_height(self.max_height) {
            log::info!("New best height: {}", self.max_height);
        }
        self.progression_dirty = true;

        self.emit(GameEvent::Died {
            cause,
            height: self.max_height,
        });
        log::info!("{} at height {}", cause.message(), self.max_height);
    }

    /// Ask for a revive (starts the ad countdown). Returns false if unavailable.
    pub fn request_revive(&mut self) -> bool {
        if self.phase != GamePhase::GameOver {
            log::debug!("Revive requested in phase {:?}", self.phase);
            return false;
        }
        if self.revives_left == 0 {
            log::debug!("Revive requested with none left");
            return false;
        }
        self.phase = GamePhase::Reviving;
        self.revive_ticks_left = self.tuning.session.revive_delay_ticks;
        self.emit(GameEvent::ReviveRequested {
            ticks: self.revive_ticks_left,
        });
        true
    }

    /// Ad finished (or failed). Stale completions are ignored.
    pub fn complete_revive(&mut self, outcome: AdOutcome) -> bool {
        if self.phase != GamePhase::Reviving {
            log::debug!("Ignoring stale revive completion in phase {:?}", self.phase);
            return false;
        }
        if outcome == AdOutcome::Failed {
            log::warn!("Revive ad failed to show, granting revive anyway");
        }
        self.revive();
        true
    }

    /// Give up after dying: record the run and persist progression
    pub fn end_session(&mut self) -> bool {
        if !matches!(self.phase, GamePhase::GameOver | GamePhase::Reviving) {
            log::debug!("end_session in phase {:?}", self.phase);
            return false;
        }
        self.finish_run();
        true
    }

    fn finish_run(&mut self) {
        let rank = self.records.add(HeightRecord {
            height: self.max_height,
            coins: self.run_coins,
            difficulty: self.difficulty,
            timestamp: now_ms(),
        });
        self.records.save(self.store.as_mut());
        self.progression.record_height(self.max_height);
        self.save_progression();

        self.phase = GamePhase::Ended;
        self.revive_ticks_left = 0;
        self.emit(GameEvent::Ended {
            height: self.max_height,
            coins: self.run_coins,
            rank,
        });
        log::info!(
            "Run ended: height {} coins {} rank {:?}",
            self.max_height,
            self.run_coins,
            rank
        );
    }

    fn revive(&mut self) {
        let Some(player) = self.player.as_mut() else {
            log::warn!("Revive without a player");
            return;
        };
        let session = &self.tuning.session;
        let width = self.tuning.viewport_width;

        self.revives_left = self.revives_left.saturating_sub(1);
        self.revive_ticks_left = 0;
        self.hazard.push_back();

        let y = (player.position.y - session.revive_lift).min(self.hazard.y() - session.revive_safety);
        let pos = Vec2::new(width * 0.5, y);
        self.world.set_position(player.body, pos);
        self.world.set_velocity(player.body, Vec2::ZERO);
        player.position = pos;
        player.velocity = Vec2::ZERO;
        player.last_finite_position = pos;
        player.dash_ticks = 0;
        player.climbing = false;

        // Safe platform with its top touching the player's bottom
        let radius = player.radius;
        let platform = EntitySpec::new(
            EntityKind::Platform,
            Vec2::new(pos.x, pos.y + radius + PLATFORM_HEIGHT * 0.5),
            Shape::rect(session.revive_platform_width, PLATFORM_HEIGHT),
        );

        // Clear lethal geometry nearby and anything the player or platform would sit inside
        let clear = session.revive_lift;
        let player_box = (pos, Vec2::splat(radius));
        let platform_box = (platform.center, platform.shape.half_extents());
        let world = &mut self.world;
        self.entities.retain(|e| {
            let half = e.half_extents();
            let near = (e.center - pos).abs().cmple(half + Vec2::splat(clear)).all();
            let blocks = e.kind != EntityKind::Floor
                && [player_box, platform_box].iter().any(|&(c, h)| {
                    (e.center - c).abs().cmplt(half + h).all()
                });
            let drop = (e.kind.is_lethal() && near) || blocks;
            if drop {
                world.remove_from_world(e.body);
            }
            !drop
        });

        let frontier = self.frontier_y;
        self.culling
            .make_room(&mut self.entities, &mut self.world, 1, frontier);
        let top = platform.top();
        let index = self.next_spawn_index;
        self.add_entity(platform, index);
        self.frontier_y = self.frontier_y.min(top);

        self.phase = GamePhase::Playing;
        self.shake(self.tuning.session.revive_shake);
        self.particles.burst(pos, colors::REVIVE, fx::REVIVE_BURST);
        self.emit(GameEvent::Revived {
            revives_left: self.revives_left,
        });
        log::info!(
            "Revived at y={y:.0} (lava {:.0}, {} left)",
            self.hazard.y(),
            self.revives_left
        );
    }

    // === Frame loop ===

    /// Feed wall-clock time; runs up to `MAX_SUBSTEPS` fixed ticks.
    /// Returns the number of ticks run.
    pub fn frame(&mut self, elapsed_ms: f32, input: &TickInput) -> u32 {
        let elapsed = if elapsed_ms.is_finite() {
            elapsed_ms.clamp(0.0, MAX_FRAME_MS)
        } else {
            0.0
        };
        self.accumulator_ms += elapsed;

        let mut substeps = 0;
        while self.accumulator_ms >= SIM_DT_MS && substeps < MAX_SUBSTEPS {
            if let Err(e) = self.tick(input) {
                log::error!("Tick {} failed: {e}", self.time_ticks);
            }
            self.accumulator_ms -= SIM_DT_MS;
            substeps += 1;
        }
        if substeps == MAX_SUBSTEPS {
            // Drop the backlog rather than spiral
            self.accumulator_ms = self.accumulator_ms.min(SIM_DT_MS);
        }
        self.flush_progression();
        substeps
    }

    /// Advance exactly one fixed tick
    pub fn tick(&mut self, input: &TickInput) -> Result<(), SimError> {
        self.time_ticks += 1;
        let result = match self.phase {
            GamePhase::Playing => self.tick_playing(input),
            GamePhase::Reviving => {
                self.revive_ticks_left = self.revive_ticks_left.saturating_sub(1);
                if self.revive_ticks_left == 0 {
                    log::debug!("Revive countdown elapsed");
                    self.revive();
                }
                Ok(())
            }
            GamePhase::NotStarted | GamePhase::GameOver | GamePhase::Ended => Ok(()),
        };
        self.tick_fx();
        result
    }

    fn tick_playing(&mut self, input: &TickInput) -> Result<(), SimError> {
        // Kinematic geometry
        for entity in &mut self.entities {
            if let Some(motion) = entity.motion.as_mut() {
                entity.center.x = motion.step(entity.center.x);
                self.world.set_position(entity.body, entity.center);
            }
        }

        self.world.integrate(SIM_DT_MS);

        // Controller
        let player = self
            .player
            .as_mut()
            .ok_or(SimError::NoPlayer(self.phase))?;
        if !self.world.contains(player.body) {
            return Err(SimError::MissingBody {
                role: "player",
                handle: player.body,
            });
        }
        self.controller.sync(player, &mut self.world);
        self.controller.tick_timers(player);
        let outcome = self.controller.update(player, &mut self.world, input);
        let player_pos = player.position;

        if outcome.jumped {
            self.emit(GameEvent::Jumped);
        }
        if outcome.dashed {
            self.on_dash(player_pos);
        }

        // Height and XP
        self.height = height_at(player_pos.y, self.tuning.viewport_height);
        if self.height > self.max_height {
            let gained = self.height - self.max_height;
            self.max_height = self.height;
            self.award_xp(gained.saturating_mul(self.tuning.session.height_xp));
            if !self.announced_best && self.best_at_start > 0 && self.max_height > self.best_at_start
            {
                self.announced_best = true;
                self.emit(GameEvent::HeightMilestone {
                    height: self.max_height,
                });
            }
        }

        // Lava
        self.hazard.advance(self.max_height);
        if let Some(cause) = self.hazard.check(player_pos.y) {
            self.trigger_death(cause);
            return Ok(());
        }

        // Contacts
        if let Some(cause) = self.resolve_contacts() {
            self.trigger_death(cause);
            return Ok(());
        }

        // Cull and generate
        let frontier = self.frontier_y;
        self.culling.cull(
            &mut self.entities,
            &mut self.world,
            self.hazard.y(),
            player_pos.y,
            frontier,
        );
        while self.phase == GamePhase::Playing
            && self
                .culling
                .should_generate(self.entities.len(), player_pos.y, self.frontier_y)
        {
            let profile = self.profile;
            match self
                .generator
                .generate_next(self.frontier_y, self.next_spawn_index, &profile)
            {
                Some(spawn) => self.add_spawn(spawn),
                None => break,
            }
        }

        // Walls follow the player
        for wall in &mut self.walls {
            wall.center.y = player_pos.y;
            self.world.set_position(wall.body, wall.center);
        }

        Ok(())
    }

    /// Coins and lethal touches; returns a death cause if one applies
    fn resolve_contacts(&mut self) -> Option<DeathCause> {
        let player = self.player.as_ref()?;
        let invincible = player.is_invincible();
        let contacts = self
            .world
            .query_overlap(player.body, TagMask::COIN | TagMask::LETHAL);

        let mut death = None;
        for contact in contacts {
            if contact.tag.contains(TagMask::COIN) {
                self.collect_coin(contact.body);
            } else if death.is_none() && !invincible {
                death = if contact.tag.contains(TagMask::ENEMY) {
                    Some(DeathCause::Enemy)
                } else {
                    Some(DeathCause::Hazard)
                };
            }
        }
        death
    }

    /// Award a coin once; unknown or already collected bodies are ignored
    pub fn collect_coin(&mut self, body: BodyHandle) -> bool {
        let Some(i) = self
            .entities
            .iter()
            .position(|e| e.body == body && e.kind == EntityKind::Coin)
        else {
            return false;
        };
        let coin = self.entities.remove(i);
        self.world.remove_from_world(coin.body);

        let reward = self.tuning.session.coin_reward;
        self.run_coins += reward;
        self.progression.add_coins(reward);
        self.award_xp(self.tuning.session.coin_xp);
        self.progression_dirty = true;

        self.particles.burst(coin.center, colors::COIN, fx::COIN_BURST);
        self.emit(GameEvent::CoinCollected {
            total: self.progression.coins,
        });
        true
    }

    fn on_dash(&mut self, pos: Vec2) {
        self.particles.burst(pos, colors::DASH, fx::DASH_BURST);

        let mut cleared = 0u32;
        if self.tuning.player.dash_clears_hazards {
            let camera = &self.camera;
            let world = &mut self.world;
            self.entities.retain(|e| {
                let hit = e.kind.is_lethal() && camera.sees(e.top(), e.bottom());
                if hit {
                    world.remove_from_world(e.body);
                    cleared += 1;
                }
                !hit
            });
        }
        if cleared > 0 {
            let coins = self.tuning.player.dash_bonus_coins * cleared as u64;
            self.run_coins += coins;
            self.progression.add_coins(coins);
            self.progression_dirty = true;
            self.award_xp(self.tuning.player.dash_bonus_xp.saturating_mul(cleared));
            log::debug!("Dash cleared {cleared} hazards");
        }
        self.emit(GameEvent::Dashed { cleared });
    }

    fn award_xp(&mut self, amount: u32) {
        if amount == 0 {
            return;
        }
        self.progression_dirty = true;
        if self.progression.add_xp(amount) > 0 {
            let level = self.progression.pass_level();
            log::info!("Battle pass level {level}");
            self.emit(GameEvent::PassLevelUp { level });
        }
    }

    fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
        if self.events.len() > MAX_PENDING_EVENTS {
            let excess = self.events.len() - MAX_PENDING_EVENTS;
            self.events.drain(..excess);
        }
    }

    fn tick_fx(&mut self) {
        if let Some(player) = &self.player {
            self.camera.follow(player.position.y);
        }
        self.camera.decay();
        self.shake_offset = self.particles.shake_offset(self.camera.shake);
        self.particles.update();
    }

    fn shake(&mut self, amount: f32) {
        if self.settings.effective_screen_shake() {
            self.camera.add_shake(amount);
        }
    }

    // === Geometry ===

    fn make_entity(&mut self, spec: EntitySpec, spawn_index: u32) -> Entity {
        let tag = spec.kind.tag();
        let params = if spec.kind.is_sensor() {
            BodyParams::sensor(tag)
        } else {
            BodyParams::solid(tag)
        };
        let body = self.world.create_body(spec.shape, params, spec.center);
        self.world.add_to_world(body);
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        Entity {
            id,
            kind: spec.kind,
            center: spec.center,
            shape: spec.shape,
            motion: spec.motion,
            spawn_index,
            body,
        }
    }

    fn add_entity(&mut self, spec: EntitySpec, spawn_index: u32) {
        let entity = self.make_entity(spec, spawn_index);
        self.entities.push(entity);
    }

    fn add_spawn(&mut self, spawn: Spawn) {
        let index = self.next_spawn_index;
        self.next_spawn_index += 1;
        self.frontier_y = self.frontier_y.min(spawn.top());
        for spec in spawn.pieces() {
            self.add_entity(*spec, index);
        }
    }

    // === Accessors ===

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn player(&self) -> Option<&PlayerBody> {
        self.player.as_ref()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn walls(&self) -> &[Entity] {
        &self.walls
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn hazard_y(&self) -> f32 {
        self.hazard.y()
    }

    pub fn frontier_y(&self) -> f32 {
        self.frontier_y
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn max_height(&self) -> u32 {
        self.max_height
    }

    pub fn run_coins(&self) -> u64 {
        self.run_coins
    }

    pub fn revives_left(&self) -> u32 {
        self.revives_left
    }

    pub fn revive_ticks_left(&self) -> u32 {
        self.revive_ticks_left
    }

    pub fn time_ticks(&self) -> u64 {
        self.time_ticks
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn progression(&self) -> &Progression {
        &self.progression
    }

    /// Shop and battle-pass actions; call `save_progression` afterwards
    pub fn progression_mut(&mut self) -> &mut Progression {
        &mut self.progression
    }

    /// Write progression now (shop and pass actions)
    pub fn save_progression(&mut self) {
        self.progression.save(self.store.as_mut());
        self.progression_dirty = false;
    }

    /// Write progression if a tick changed it. `frame` calls this after its
    /// ticks; shells driving `tick` directly call it themselves.
    pub fn flush_progression(&mut self) {
        if self.progression_dirty {
            self.save_progression();
        }
    }

    pub fn records(&self) -> &HeightRecords {
        &self.records
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.particles.set_max(settings.max_particles());
        settings.save(self.store.as_mut());
        self.settings = settings;
    }

    /// Take all events since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> Snapshot {
        let color = find_skin(self.progression.active_skin())
            .map(|s| s.color)
            .unwrap_or("#9d00ff");
        Snapshot {
            tick: self.time_ticks,
            phase: self.phase,
            difficulty: self.difficulty,
            viewport: Vec2::new(self.tuning.viewport_width, self.tuning.viewport_height),
            camera_top: self.camera.top,
            shake_offset: self.shake_offset,
            hazard_y: self.hazard.y(),
            player: self.player.as_ref().map(|p| PlayerView::new(p, color)),
            height: self.height,
            max_height: self.max_height,
            best_height: self.progression.best_height,
            run_coins: self.run_coins,
            coins: self.progression.coins,
            revives_left: self.revives_left,
            revive_ticks_left: self.revive_ticks_left,
            pass_level: self.progression.pass_level(),
            pass_progress: self.progression.pass_progress(),
            entities: self
                .entities
                .iter()
                .chain(self.walls.iter())
                .map(EntityView::from)
                .collect(),
            particles: self.particles.as_slice().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemoryStore, StorageError};
    use crate::sim::state::ControllerState;
    use proptest::prelude::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn session(seed: u64) -> Session {
        Session::new(Tuning::default(), Box::new(MemoryStore::new()), seed)
    }

    fn started(difficulty: Difficulty) -> Session {
        let mut s = session(42);
        s.start(difficulty);
        s
    }

    fn idle(s: &mut Session, ticks: u32) {
        for _ in 0..ticks {
            s.tick(&TickInput::default()).unwrap();
        }
    }

    /// Coin placed on top of the player
    fn coin_on_player(s: &mut Session) -> BodyHandle {
        let pos = s.player().unwrap().position;
        let spec = EntitySpec::new(EntityKind::Coin, pos, Shape::circle(COIN_RADIUS));
        s.add_entity(spec, 0);
        s.entities().last().unwrap().body
    }

    #[test]
    fn test_start_builds_world() {
        let s = started(Difficulty::Medium);
        let tuning = Tuning::default();
        let profile = tuning.profile(Difficulty::Medium);
        assert_eq!(s.phase(), GamePhase::Playing);
        let platforms = s
            .entities()
            .iter()
            .filter(|e| e.kind == EntityKind::Platform)
            .count();
        assert_eq!(platforms as u32, tuning.initial_platform_count(&profile));
        assert!(s.entities().iter().any(|e| e.kind == EntityKind::Floor));
        assert_eq!(s.walls().len(), 2);
        assert!(s.frontier_y() < 0.0);
        assert_eq!(s.hazard_y(), 1400.0);
        // Every tracked body is in the world (+ player)
        assert_eq!(s.world().body_count(), s.entities().len() + s.walls().len() + 1);
    }

    #[test]
    fn test_player_falls_onto_floor() {
        let mut s = started(Difficulty::Medium);
        s.tick(&TickInput::default()).unwrap();
        let vy = s.player().unwrap().velocity.y;
        assert!(vy > 0.3 && vy < 0.36, "vy = {vy}");

        idle(&mut s, 60);
        let player = s.player().unwrap();
        assert!((player.position.y - (1000.0 - 18.0)).abs() < 1.0);
        assert_eq!(player.state, ControllerState::Grounded);
    }

    #[test]
    fn test_medium_scenario_right_held() {
        let mut s = started(Difficulty::Medium);
        let right = TickInput {
            direction: 1.0,
            ..Default::default()
        };
        let mut peak: f32 = 0.0;
        for _ in 0..50 {
            s.tick(&right).unwrap();
            peak = peak.max(s.player().unwrap().velocity.x);
        }
        assert!(peak <= 8.0);
        let vx = s.player().unwrap().velocity.x;
        assert!((vx - 6.5).abs() < 0.5, "vx = {vx}");
    }

    #[test]
    fn test_death_is_idempotent() {
        let mut s = session(1);
        s.trigger_death(DeathCause::Lava);
        assert_eq!(s.phase(), GamePhase::NotStarted);

        s.start(Difficulty::Easy);
        s.drain_events();
        s.trigger_death(DeathCause::Lava);
        s.trigger_death(DeathCause::Hazard);
        assert_eq!(s.phase(), GamePhase::GameOver);
        let deaths = s
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::Died { .. }))
            .count();
        assert_eq!(deaths, 1);
    }

    #[test]
    fn test_idle_player_is_consumed_by_lava() {
        let mut s = started(Difficulty::Hard);
        idle(&mut s, 5000);
        assert_eq!(s.phase(), GamePhase::GameOver);
        assert!(s.drain_events().iter().any(|e| matches!(
            e,
            GameEvent::Died {
                cause: DeathCause::Lava,
                ..
            }
        )));
    }

    #[test]
    fn test_coin_awarded_once() {
        let mut s = started(Difficulty::Medium);
        let coins_before = s.progression().coins;
        let body = coin_on_player(&mut s);

        s.tick(&TickInput::default()).unwrap();
        assert_eq!(s.progression().coins, coins_before + 5);
        assert_eq!(s.run_coins(), 5);
        assert!(!s.world().contains(body));

        assert!(!s.collect_coin(body));
        s.tick(&TickInput::default()).unwrap();
        assert_eq!(s.progression().coins, coins_before + 5);
        assert!(s.progression().pass_xp() >= 20);
    }

    /// Counts writes while sharing its contents with the test
    struct CountingStore {
        inner: Rc<RefCell<MemoryStore>>,
        sets: Rc<Cell<usize>>,
    }

    impl KeyValueStore for CountingStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.borrow().get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
            self.sets.set(self.sets.get() + 1);
            self.inner.borrow_mut().set(key, value)
        }
    }

    /// Lethal entity of `kind` centred on the player
    fn lethal_on_player(s: &mut Session, kind: EntityKind) {
        let pos = s.player().unwrap().position;
        let shape = match kind {
            EntityKind::Enemy => Shape::circle(ENEMY_RADIUS),
            _ => Shape::rect(120.0, 120.0),
        };
        s.add_entity(EntitySpec::new(kind, pos, shape), 0);
    }

    fn total_xp(p: &Progression) -> u32 {
        p.pass_level() * crate::progression::XP_PER_LEVEL + p.pass_xp()
    }

    fn death_cause(events: &[GameEvent]) -> Option<DeathCause> {
        events.iter().find_map(|e| match e {
            GameEvent::Died { cause, .. } => Some(*cause),
            _ => None,
        })
    }

    #[test]
    fn test_coin_pickup_writes_once_at_frame_boundary() {
        let shared = Rc::new(RefCell::new(MemoryStore::new()));
        let sets = Rc::new(Cell::new(0));
        let store = CountingStore {
            inner: Rc::clone(&shared),
            sets: Rc::clone(&sets),
        };
        let mut s = Session::new(Tuning::default(), Box::new(store), 42);
        s.start(Difficulty::Medium);
        idle(&mut s, 60);
        sets.set(0);

        coin_on_player(&mut s);
        s.tick(&TickInput::default()).unwrap();
        assert_eq!(s.run_coins(), 5);
        assert_eq!(sets.get(), 0);

        // Zero elapsed time runs no ticks but still flushes
        assert_eq!(s.frame(0.0, &TickInput::default()), 0);
        let written = sets.get();
        assert!(written > 0);
        assert_eq!(Progression::load(&*shared.borrow()).coins, s.progression().coins);

        s.frame(0.0, &TickInput::default());
        assert_eq!(sets.get(), written);
    }

    #[test]
    fn test_death_best_height_flushed_by_frame() {
        let shared = Rc::new(RefCell::new(MemoryStore::new()));
        let sets = Rc::new(Cell::new(0));
        let store = CountingStore {
            inner: Rc::clone(&shared),
            sets: Rc::clone(&sets),
        };
        let mut s = Session::new(Tuning::default(), Box::new(store), 42);
        s.start(Difficulty::Medium);
        idle(&mut s, 60);
        sets.set(0);

        s.trigger_death(DeathCause::Lava);
        assert_eq!(sets.get(), 0);
        s.flush_progression();
        assert!(sets.get() > 0);
        assert_eq!(
            Progression::load(&*shared.borrow()).best_height,
            s.progression().best_height
        );
    }

    #[test]
    fn test_hazard_contact_kills() {
        let mut s = started(Difficulty::Medium);
        idle(&mut s, 60);
        s.drain_events();
        lethal_on_player(&mut s, EntityKind::Hazard);

        s.tick(&TickInput::default()).unwrap();
        assert_eq!(s.phase(), GamePhase::GameOver);
        assert_eq!(death_cause(&s.drain_events()), Some(DeathCause::Hazard));
    }

    #[test]
    fn test_enemy_contact_kills() {
        let mut s = started(Difficulty::Medium);
        idle(&mut s, 60);
        s.drain_events();
        lethal_on_player(&mut s, EntityKind::Enemy);

        s.tick(&TickInput::default()).unwrap();
        assert_eq!(s.phase(), GamePhase::GameOver);
        assert_eq!(death_cause(&s.drain_events()), Some(DeathCause::Enemy));
    }

    #[test]
    fn test_invincibility_suppresses_lethal_contact_until_expiry() {
        let mut s = started(Difficulty::Medium);
        idle(&mut s, 60);
        s.drain_events();
        s.player.as_mut().unwrap().invincible_ticks = 3;
        lethal_on_player(&mut s, EntityKind::Enemy);

        // The countdown runs before contacts: two safe ticks, then the third kills
        for _ in 0..2 {
            s.tick(&TickInput::default()).unwrap();
            assert_eq!(s.phase(), GamePhase::Playing);
        }
        assert_eq!(death_cause(&s.drain_events()), None);

        s.tick(&TickInput::default()).unwrap();
        assert_eq!(s.phase(), GamePhase::GameOver);
        assert_eq!(death_cause(&s.drain_events()), Some(DeathCause::Enemy));
    }

    #[test]
    fn test_invincible_player_survives_hazard() {
        let mut s = started(Difficulty::Medium);
        idle(&mut s, 60);
        s.player.as_mut().unwrap().invincible_ticks = 10;
        lethal_on_player(&mut s, EntityKind::Hazard);

        s.tick(&TickInput::default()).unwrap();
        assert_eq!(s.phase(), GamePhase::Playing);
        assert!(s.entities().iter().any(|e| e.kind == EntityKind::Hazard));
    }

    #[test]
    fn test_dash_clears_visible_hazards() {
        let mut s = started(Difficulty::Medium);
        idle(&mut s, 60);
        s.drain_events();
        let player_x = s.player().unwrap().position.x;
        let top = s.camera().top;

        let near = EntitySpec::new(
            EntityKind::Hazard,
            Vec2::new(player_x, top + 40.0),
            Shape::rect(20.0, 20.0),
        );
        let far = EntitySpec::new(
            EntityKind::Hazard,
            Vec2::new(player_x, top - 5000.0),
            Shape::rect(20.0, 20.0),
        );
        s.add_entity(near, 0);
        let near_body = s.entities().last().unwrap().body;
        s.add_entity(far, 0);
        let far_body = s.entities().last().unwrap().body;

        let camera = s.camera().clone();
        let visible = s
            .entities()
            .iter()
            .filter(|e| e.kind.is_lethal() && camera.sees(e.top(), e.bottom()))
            .count() as u32;
        assert!(visible >= 1);
        let xp_before = total_xp(s.progression());
        let coins_before = s.progression().coins;

        let dash = TickInput {
            dash: true,
            ..Default::default()
        };
        s.tick(&dash).unwrap();

        let events = s.drain_events();
        assert!(events.contains(&GameEvent::Dashed { cleared: visible }));
        assert!(!s.world().contains(near_body));
        assert!(s.world().contains(far_body));
        assert!(
            !s.entities()
                .iter()
                .any(|e| e.kind.is_lethal() && camera.sees(e.top(), e.bottom()))
        );

        let bonus = 2 * visible as u64;
        assert_eq!(s.run_coins(), bonus);
        assert_eq!(s.progression().coins, coins_before + bonus);
        assert!(total_xp(s.progression()) >= xp_before + 10 * visible);
    }

    #[test]
    fn test_event_queue_is_capped() {
        let mut s = started(Difficulty::Easy);
        for _ in 0..1000 {
            s.emit(GameEvent::Jumped);
        }
        s.emit(GameEvent::Dashed { cleared: 0 });
        let events = s.drain_events();
        assert_eq!(events.len(), MAX_PENDING_EVENTS);
        assert_eq!(events.last(), Some(&GameEvent::Dashed { cleared: 0 }));
        assert!(!events.iter().any(|e| matches!(e, GameEvent::Started { .. })));
    }

    #[test]
    fn test_restart_discards_undrained_events() {
        let mut s = started(Difficulty::Easy);
        idle(&mut s, 30);
        s.emit(GameEvent::Jumped);
        s.start(Difficulty::Hard);
        assert_eq!(
            s.drain_events(),
            vec![GameEvent::Started {
                difficulty: Difficulty::Hard
            }]
        );

        // A finished run still reports its end after the clear
        s.trigger_death(DeathCause::Lava);
        s.start(Difficulty::Easy);
        let events = s.drain_events();
        assert!(matches!(events.first(), Some(GameEvent::Ended { .. })));
        assert!(matches!(events.last(), Some(GameEvent::Started { .. })));
    }

    #[test]
    fn test_revive_places_player_on_safe_platform() {
        let mut s = started(Difficulty::Medium);
        idle(&mut s, 30);
        s.trigger_death(DeathCause::Lava);
        let lava_before = s.hazard_y();
        let y_before = s.player().unwrap().position.y;
        let frontier_before = s.frontier_y();

        assert!(s.request_revive());
        assert_eq!(s.phase(), GamePhase::Reviving);
        assert!(s.complete_revive(AdOutcome::Watched));
        assert_eq!(s.phase(), GamePhase::Playing);
        assert_eq!(s.revives_left(), 0);
        assert_eq!(s.hazard_y(), lava_before + 600.0);

        let player = s.player().unwrap().clone();
        assert!(player.position.y <= y_before - 300.0 + 1e-3);
        assert!(player.position.y <= s.hazard_y() - 300.0 + 1e-3);
        assert_eq!(player.position.x, 400.0);
        assert!(s.frontier_y() <= frontier_before);

        let controller = PlayerController::new(Tuning::default().player);
        assert!(controller.probe_ground(&player, s.world()));

        // Survives the next tick standing on it
        s.tick(&TickInput::default()).unwrap();
        assert_eq!(s.phase(), GamePhase::Playing);
        assert_eq!(s.player().unwrap().state, ControllerState::Grounded);

        // No revives left
        s.trigger_death(DeathCause::Abyss);
        assert!(!s.request_revive());
    }

    #[test]
    fn test_revive_countdown_and_failed_ad() {
        let mut s = started(Difficulty::Easy);
        s.trigger_death(DeathCause::Lava);
        assert!(s.request_revive());
        idle(&mut s, 299);
        assert_eq!(s.phase(), GamePhase::Reviving);
        idle(&mut s, 1);
        assert_eq!(s.phase(), GamePhase::Playing);

        // Stale completion after the countdown already revived
        assert!(!s.complete_revive(AdOutcome::Watched));

        let mut s = started(Difficulty::Easy);
        s.trigger_death(DeathCause::Lava);
        s.request_revive();
        assert!(s.complete_revive(AdOutcome::Failed));
        assert_eq!(s.phase(), GamePhase::Playing);
    }

    #[test]
    fn test_end_session_records_run() {
        let mut s = started(Difficulty::Medium);
        s.max_height = 37;
        s.trigger_death(DeathCause::Lava);
        assert_eq!(s.progression().best_height, 37);
        assert!(s.end_session());
        assert_eq!(s.phase(), GamePhase::Ended);
        assert_eq!(s.records().top_height(), Some(37));
        assert!(!s.end_session());
        assert!(s.drain_events().iter().any(|e| matches!(
            e,
            GameEvent::Ended {
                height: 37,
                rank: Some(1),
                ..
            }
        )));

        // Restart from Ended
        s.start(Difficulty::Hard);
        assert_eq!(s.phase(), GamePhase::Playing);
        assert_eq!(s.max_height(), 0);
    }

    #[test]
    fn test_frame_clamps_and_caps_substeps() {
        let mut s = started(Difficulty::Medium);
        assert_eq!(s.frame(10.0, &TickInput::default()), 0);
        assert_eq!(s.frame(10.0, &TickInput::default()), 1);
        assert_eq!(s.frame(10_000.0, &TickInput::default()), MAX_SUBSTEPS);
        assert_eq!(s.frame(f32::NAN, &TickInput::default()), 1);
        assert_eq!(s.time_ticks(), 1 + MAX_SUBSTEPS as u64 + 1);
    }

    #[test]
    fn test_tick_before_start_is_harmless() {
        let mut s = session(3);
        assert!(s.tick(&TickInput::default()).is_ok());
        assert!(s.snapshot().player.is_none());
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut s = started(Difficulty::Medium);
        idle(&mut s, 5);
        let snapshot = s.snapshot();
        assert_eq!(snapshot.phase, GamePhase::Playing);
        assert!(snapshot.visible_entities().count() > 0);
        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"Playing\""));
    }

    /// Drive the player straight up (invincible) and check the long-run invariants
    fn climb_and_check(seed: u64, difficulty: Difficulty, ticks: u32) -> Result<(), TestCaseError> {
        let mut s = session(seed);
        s.start(difficulty);
        let cap = s.tuning().culling.entity_cap;
        let mut target = s.player().unwrap().position;
        let mut last_frontier = s.frontier_y();
        let mut last_hazard = s.hazard_y();

        for _ in 0..ticks {
            target.y -= 3.0;
            {
                let player = s.player.as_mut().unwrap();
                player.invincible_ticks = 10;
                s.world.set_position(player.body, target);
                s.world.set_velocity(player.body, Vec2::ZERO);
            }
            s.tick(&TickInput::default()).unwrap();

            prop_assert_eq!(s.phase(), GamePhase::Playing);
            prop_assert!(s.entities().len() <= cap);
            prop_assert!(s.frontier_y() <= last_frontier);
            prop_assert!(s.hazard_y() <= last_hazard);
            prop_assert_eq!(
                s.world().body_count(),
                s.entities().len() + s.walls().len() + 1
            );
            last_frontier = s.frontier_y();
            last_hazard = s.hazard_y();
        }
        // Generation kept ahead of the climb
        prop_assert!(s.frontier_y() < target.y);
        Ok(())
    }

    #[test]
    fn test_bounded_geometry_over_long_climb() {
        climb_and_check(2024, Difficulty::Hard, 100_000).unwrap();
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_climb_invariants(seed in any::<u64>(), tier in 0usize..3) {
            let difficulty = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard][tier];
            climb_and_check(seed, difficulty, 3_000)?;
        }
    }
}
