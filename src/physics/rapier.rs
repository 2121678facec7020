//! rapier2d physics backend
//!
//! Wraps a rapier2d pipeline behind [`PhysicsWorld`]. The game measures
//! distances in pixels and velocities per 60 Hz tick; rapier integrates in
//! seconds, so velocities, damping and gravity are scaled at this boundary and
//! `integrate(SIM_DT_MS)` advances exactly one tick.
//!
//! Each body carries one collider. Its tag becomes the collider's collision
//! group membership, and ray/overlap queries filter through
//! [`InteractionGroups`] built from the requested [`TagMask`].

use std::collections::BTreeMap;

use glam::Vec2;
use rapier2d::parry::query;
use rapier2d::prelude::*;

use super::{BodyHandle, BodyParams, Collision, PhysicsWorld, RayHit, Shape, TagMask};
use crate::consts::SIM_DT_MS;

/// Gap under which two shapes count as touching for overlap queries
pub const CONTACT_SKIN: f32 = 0.5;
/// Pixels per rapier length unit (scales the solver tolerances)
const PIXELS_PER_METER: Real = 100.0;
/// Game ticks per simulated second
const TICK_RATE: Real = 1000.0 / SIM_DT_MS;

fn to_na(v: Vec2) -> Vector<Real> {
    vector![v.x, v.y]
}

fn from_na(v: &Vector<Real>) -> Vec2 {
    Vec2::new(v.x, v.y)
}

fn shared_shape(shape: Shape) -> SharedShape {
    match shape {
        Shape::Rect { half } => SharedShape::cuboid(half.x, half.y),
        Shape::Circle { radius } => SharedShape::ball(radius),
    }
}

/// A body is a member of its own tag and interacts with every tag
fn body_groups(tag: TagMask) -> InteractionGroups {
    InteractionGroups::new(Group::from_bits_truncate(tag.bits().into()), Group::ALL)
}

/// Accepts any body carrying one of the `filter` tags
fn query_groups(filter: TagMask) -> InteractionGroups {
    InteractionGroups::new(Group::ALL, Group::from_bits_truncate(filter.bits().into()))
}

/// Rapier damping that removes `friction_air` of the velocity per tick
fn damping_for(friction_air: f32) -> Real {
    let f = friction_air.clamp(0.0, 0.99);
    TICK_RATE * f / (1.0 - f)
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    /// Created but not simulated yet
    Pending { position: Vec2, velocity: Vec2 },
    Live {
        body: RigidBodyHandle,
        collider: ColliderHandle,
    },
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    shape: Shape,
    params: BodyParams,
    slot: Slot,
}

/// [`PhysicsWorld`] over a rapier2d simulation
pub struct RapierWorld {
    gravity: Vector<Real>,
    integration_params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    /// Ordered by handle so queries report in spawn order
    entries: BTreeMap<BodyHandle, Entry>,
    next_handle: u32,
}

impl RapierWorld {
    /// `gravity` is in pixels per tick squared
    pub fn new(gravity: Vec2) -> Self {
        Self {
            gravity: to_na(gravity * TICK_RATE * TICK_RATE),
            integration_params: IntegrationParameters {
                length_unit: PIXELS_PER_METER,
                ..IntegrationParameters::default()
            },
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            entries: BTreeMap::new(),
            next_handle: 1,
        }
    }

    /// Insert the rapier body and collider for a pending entry
    fn spawn(&mut self, handle: BodyHandle, entry: &Entry, position: Vec2, velocity: Vec2) -> Slot {
        let params = entry.params;
        let builder = if params.is_static {
            RigidBodyBuilder::fixed()
        } else {
            RigidBodyBuilder::dynamic()
                .linvel(to_na(velocity * TICK_RATE))
                .linear_damping(damping_for(params.friction_air))
                .lock_rotations()
                .can_sleep(false)
                .ccd_enabled(true)
        };
        let body = self.rigid_body_set.insert(
            builder
                .translation(to_na(position))
                .user_data(handle.0 as u128)
                .build(),
        );

        let mut collider = ColliderBuilder::new(shared_shape(entry.shape))
            .sensor(params.is_sensor)
            .collision_groups(body_groups(params.tag))
            .restitution(0.0)
            .user_data(handle.0 as u128);
        if !params.is_static {
            // Slides along surfaces; horizontal speed belongs to the controller
            collider = collider
                .friction(0.0)
                .friction_combine_rule(CoefficientCombineRule::Min);
        }
        let collider =
            self.collider_set
                .insert_with_parent(collider.build(), body, &mut self.rigid_body_set);

        Slot::Live { body, collider }
    }

    /// Live colliders whose tag passes `groups`, in handle order
    fn live_colliders(
        &self,
        groups: InteractionGroups,
    ) -> impl Iterator<Item = (BodyHandle, TagMask, &Collider)> + '_ {
        self.entries.iter().filter_map(move |(&handle, entry)| match entry.slot {
            Slot::Live { collider, .. } => self
                .collider_set
                .get(collider)
                .filter(|co| co.collision_groups().test(groups))
                .map(|co| (handle, entry.params.tag, co)),
            Slot::Pending { .. } => None,
        })
    }

    fn live_collider(&self, handle: BodyHandle) -> Option<&Collider> {
        match self.entries.get(&handle)?.slot {
            Slot::Live { collider, .. } => self.collider_set.get(collider),
            Slot::Pending { .. } => None,
        }
    }
}

impl Default for RapierWorld {
    fn default() -> Self {
        Self::new(Vec2::new(0.0, 0.35))
    }
}

impl PhysicsWorld for RapierWorld {
    fn create_body(&mut self, shape: Shape, params: BodyParams, position: Vec2) -> BodyHandle {
        let handle = BodyHandle(self.next_handle);
        self.next_handle += 1;
        self.entries.insert(
            handle,
            Entry {
                shape,
                params,
                slot: Slot::Pending {
                    position,
                    velocity: Vec2::ZERO,
                },
            },
        );
        handle
    }

    fn add_to_world(&mut self, handle: BodyHandle) {
        let Some(entry) = self.entries.get(&handle).copied() else {
            return;
        };
        if let Slot::Pending { position, velocity } = entry.slot {
            let slot = self.spawn(handle, &entry, position, velocity);
            if let Some(entry) = self.entries.get_mut(&handle) {
                entry.slot = slot;
            }
        }
    }

    fn remove_from_world(&mut self, handle: BodyHandle) {
        let Some(entry) = self.entries.remove(&handle) else {
            return;
        };
        if let Slot::Live { body, .. } = entry.slot {
            self.rigid_body_set.remove(
                body,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            );
        }
    }

    fn contains(&self, handle: BodyHandle) -> bool {
        self.entries
            .get(&handle)
            .is_some_and(|e| matches!(e.slot, Slot::Live { .. }))
    }

    fn position(&self, handle: BodyHandle) -> Option<Vec2> {
        match self.entries.get(&handle)?.slot {
            Slot::Pending { position, .. } => Some(position),
            Slot::Live { body, .. } => self
                .rigid_body_set
                .get(body)
                .map(|rb| from_na(rb.translation())),
        }
    }

    fn velocity(&self, handle: BodyHandle) -> Option<Vec2> {
        match self.entries.get(&handle)?.slot {
            Slot::Pending { velocity, .. } => Some(velocity),
            Slot::Live { body, .. } => self
                .rigid_body_set
                .get(body)
                .map(|rb| from_na(rb.linvel()) / TICK_RATE),
        }
    }

    fn set_position(&mut self, handle: BodyHandle, position: Vec2) {
        let Some(entry) = self.entries.get_mut(&handle) else {
            return;
        };
        match &mut entry.slot {
            Slot::Pending { position: p, .. } => *p = position,
            Slot::Live { body, collider } => {
                if let Some(rb) = self.rigid_body_set.get_mut(*body) {
                    rb.set_translation(to_na(position), true);
                }
                // Queries see the move before the next step
                if let Some(co) = self.collider_set.get_mut(*collider) {
                    co.set_translation(to_na(position));
                }
            }
        }
    }

    fn set_velocity(&mut self, handle: BodyHandle, velocity: Vec2) {
        let Some(entry) = self.entries.get_mut(&handle) else {
            return;
        };
        match &mut entry.slot {
            Slot::Pending { velocity: v, .. } => *v = velocity,
            Slot::Live { body, .. } => {
                if let Some(rb) = self.rigid_body_set.get_mut(*body) {
                    rb.set_linvel(to_na(velocity * TICK_RATE), true);
                }
            }
        }
    }

    fn set_static(&mut self, handle: BodyHandle, is_static: bool) {
        let Some(entry) = self.entries.get_mut(&handle) else {
            return;
        };
        entry.params.is_static = is_static;
        let friction_air = entry.params.friction_air;
        let Slot::Live { body, .. } = entry.slot else {
            return;
        };
        let Some(rb) = self.rigid_body_set.get_mut(body) else {
            return;
        };
        if is_static {
            rb.set_body_type(RigidBodyType::Fixed, true);
            rb.set_linvel(vector![0.0, 0.0], false);
        } else {
            rb.set_body_type(RigidBodyType::Dynamic, true);
            rb.set_linear_damping(damping_for(friction_air));
            rb.lock_rotations(true, true);
        }
    }

    fn query_ray(&self, filter: TagMask, from: Vec2, to: Vec2) -> Vec<RayHit> {
        let dir = to - from;
        let degenerate = dir.length_squared() < f32::EPSILON;
        let ray = Ray::new(point![from.x, from.y], to_na(dir));

        let mut hits: Vec<RayHit> = self
            .live_colliders(query_groups(filter))
            .filter_map(|(body, tag, co)| {
                let hit = if degenerate {
                    co.shape()
                        .contains_point(co.position(), &ray.origin)
                        .then_some(0.0)
                } else {
                    co.shape().cast_ray(co.position(), &ray, 1.0, true)
                };
                let fraction = hit?;
                Some(RayHit {
                    body,
                    tag,
                    fraction,
                    point: from + dir * fraction,
                })
            })
            .collect();
        hits.sort_by(|a, b| a.fraction.total_cmp(&b.fraction).then(a.body.cmp(&b.body)));
        hits
    }

    fn query_overlap(&self, handle: BodyHandle, filter: TagMask) -> Vec<Collision> {
        let Some(me) = self.live_collider(handle) else {
            return Vec::new();
        };
        self.live_colliders(query_groups(filter))
            .filter(|&(body, ..)| body != handle)
            .filter_map(|(body, tag, co)| {
                let contact =
                    query::contact(me.position(), me.shape(), co.position(), co.shape(), CONTACT_SKIN)
                        .ok()
                        .flatten()?;
                Some(Collision {
                    body,
                    tag,
                    normal: -from_na(&contact.normal1),
                    depth: (-contact.dist).max(0.0),
                })
            })
            .collect()
    }

    fn integrate(&mut self, delta_ms: f32) {
        if !delta_ms.is_finite() || delta_ms <= 0.0 {
            return;
        }
        self.integration_params.dt = delta_ms / 1000.0;
        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );
    }

    fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_with_slab() -> (RapierWorld, BodyHandle) {
        let mut world = RapierWorld::new(Vec2::new(0.0, 0.5));
        let slab = world.create_body(
            Shape::rect(200.0, 20.0),
            BodyParams::solid(TagMask::PLATFORM),
            Vec2::new(0.0, 100.0),
        );
        world.add_to_world(slab);
        (world, slab)
    }

    fn ball(world: &mut RapierWorld, position: Vec2, friction_air: f32) -> BodyHandle {
        let handle = world.create_body(
            Shape::circle(10.0),
            BodyParams::dynamic(TagMask::PLAYER, friction_air),
            position,
        );
        world.add_to_world(handle);
        handle
    }

    #[test]
    fn test_gravity_is_per_tick() {
        let mut world = RapierWorld::new(Vec2::new(0.0, 0.5));
        let ball = ball(&mut world, Vec2::ZERO, 0.0);
        world.integrate(SIM_DT_MS);
        let v = world.velocity(ball).unwrap();
        assert!(v.x.abs() < 1e-4 && (v.y - 0.5).abs() < 1e-3, "v = {v:?}");
        let y = world.position(ball).unwrap().y;
        assert!(y > 0.0 && y <= 0.5 + 1e-3, "y = {y}");
    }

    #[test]
    fn test_air_friction_is_per_tick() {
        let mut world = RapierWorld::new(Vec2::ZERO);
        let ball = ball(&mut world, Vec2::ZERO, 0.1);
        world.set_velocity(ball, Vec2::new(10.0, 0.0));
        world.integrate(SIM_DT_MS);
        let vx = world.velocity(ball).unwrap().x;
        assert!((vx - 9.0).abs() < 0.15, "vx = {vx}");
    }

    #[test]
    fn test_body_not_added_is_not_simulated() {
        let mut world = RapierWorld::default();
        let ball = world.create_body(
            Shape::circle(10.0),
            BodyParams::dynamic(TagMask::PLAYER, 0.0),
            Vec2::ZERO,
        );
        world.integrate(SIM_DT_MS);
        assert_eq!(world.position(ball), Some(Vec2::ZERO));
        assert!(!world.contains(ball));
        assert_eq!(world.body_count(), 0);

        world.add_to_world(ball);
        assert!(world.contains(ball));
        assert_eq!(world.body_count(), 1);
    }

    #[test]
    fn test_falling_body_comes_to_rest_on_slab() {
        let (mut world, slab) = world_with_slab();
        let ball = ball(&mut world, Vec2::ZERO, 0.0);

        for _ in 0..200 {
            world.integrate(SIM_DT_MS);
        }

        let pos = world.position(ball).unwrap();
        // Slab top is at y = 90
        assert!((pos.y - 80.0).abs() < 1.0, "rested at {pos:?}");
        assert!(world.velocity(ball).unwrap().length() < 0.1);
        let contacts = world.query_overlap(ball, TagMask::PLATFORM);
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].body, slab);
        assert!(contacts[0].normal.y < -0.9);
    }

    #[test]
    fn test_sensor_does_not_block() {
        let mut world = RapierWorld::new(Vec2::new(0.0, 0.5));
        let coin = world.create_body(
            Shape::circle(8.0),
            BodyParams::sensor(TagMask::COIN),
            Vec2::new(0.0, 30.0),
        );
        world.add_to_world(coin);
        let ball = ball(&mut world, Vec2::ZERO, 0.0);

        let overlaps = world.query_overlap(ball, TagMask::COIN);
        assert!(overlaps.is_empty());

        for _ in 0..12 {
            world.integrate(SIM_DT_MS);
        }
        assert_eq!(world.query_overlap(ball, TagMask::COIN).len(), 1);

        for _ in 0..18 {
            world.integrate(SIM_DT_MS);
        }
        assert!(world.position(ball).unwrap().y > 60.0);
    }

    #[test]
    fn test_ray_filter_and_ordering() {
        let (mut world, slab) = world_with_slab();
        let hazard = world.create_body(
            Shape::rect(200.0, 20.0),
            BodyParams::solid(TagMask::HAZARD),
            Vec2::new(0.0, 50.0),
        );
        world.add_to_world(hazard);

        let from = Vec2::new(0.0, 0.0);
        let to = Vec2::new(0.0, 200.0);
        let ground = world.query_ray(TagMask::GROUND, from, to);
        assert_eq!(ground.len(), 1);
        assert_eq!(ground[0].body, slab);
        assert!((ground[0].point.y - 90.0).abs() < 1e-3);

        let all = world.query_ray(TagMask::GROUND | TagMask::HAZARD, from, to);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].body, hazard);
        assert!(all[0].fraction < all[1].fraction);

        // Too short to reach
        assert!(world.query_ray(TagMask::GROUND, from, Vec2::new(0.0, 80.0)).is_empty());
    }

    #[test]
    fn test_moved_body_is_queried_at_new_position() {
        let (mut world, slab) = world_with_slab();
        world.set_position(slab, Vec2::new(500.0, 100.0));
        assert!(
            world
                .query_ray(TagMask::GROUND, Vec2::ZERO, Vec2::new(0.0, 200.0))
                .is_empty()
        );
        let hits = world.query_ray(
            TagMask::GROUND,
            Vec2::new(500.0, 0.0),
            Vec2::new(500.0, 200.0),
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(world.position(slab), Some(Vec2::new(500.0, 100.0)));
    }

    #[test]
    fn test_removed_body_is_forgotten() {
        let (mut world, slab) = world_with_slab();
        world.remove_from_world(slab);
        assert!(!world.contains(slab));
        assert!(world.position(slab).is_none());
        assert_eq!(world.body_count(), 0);
        assert!(
            world
                .query_ray(TagMask::GROUND, Vec2::ZERO, Vec2::new(0.0, 200.0))
                .is_empty()
        );
        // Removing twice is harmless
        world.remove_from_world(slab);
    }
}
