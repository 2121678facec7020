//! Geometry culling and generation pacing
//!
//! Geometry far below both the lava and the player can never matter again, so
//! it is dropped together with its physics body. Generation runs only while
//! the player is close to the frontier and the live set has room for a full
//! spawn.

use super::generator::MAX_SPAWN_PIECES;
use super::state::Entity;
use crate::physics::PhysicsWorld;
use crate::tuning::CullingTuning;

#[derive(Debug, Clone, Default)]
pub struct CullingManager {
    tuning: CullingTuning,
}

impl CullingManager {
    pub fn new(tuning: CullingTuning) -> Self {
        Self { tuning }
    }

    pub fn tuning(&self) -> &CullingTuning {
        &self.tuning
    }

    /// Entities whose top edge is below this line are dropped
    pub fn cut_line(&self, hazard_y: f32, player_y: f32) -> f32 {
        (hazard_y + self.tuning.hazard_buffer).min(player_y + self.tuning.look_behind)
    }

    /// Remove geometry below the cut line. The frontier piece always survives.
    /// Returns the number of entities removed.
    pub fn cull<W: PhysicsWorld>(
        &self,
        entities: &mut Vec<Entity>,
        world: &mut W,
        hazard_y: f32,
        player_y: f32,
        frontier_y: f32,
    ) -> usize {
        let cut = self.cut_line(hazard_y, player_y);
        if cut.is_nan() {
            return 0;
        }
        let before = entities.len();
        entities.retain(|e| {
            let keep = e.top() <= cut || e.top() <= frontier_y;
            if !keep {
                world.remove_from_world(e.body);
            }
            keep
        });
        let removed = before - entities.len();
        if removed > 0 {
            log::trace!("Culled {removed} entities below y={cut}");
        }
        removed
    }

    /// True while another spawn fits under the cap and the player is near the frontier
    pub fn should_generate(&self, live: usize, player_y: f32, frontier_y: f32) -> bool {
        live + MAX_SPAWN_PIECES <= self.tuning.entity_cap
            && player_y < frontier_y + self.tuning.lookahead
    }

    /// Drop the oldest non-frontier entities until `room` more fit under the cap
    pub fn make_room<W: PhysicsWorld>(
        &self,
        entities: &mut Vec<Entity>,
        world: &mut W,
        room: usize,
        frontier_y: f32,
    ) {
        while entities.len() + room > self.tuning.entity_cap {
            let Some(i) = entities.iter().position(|e| e.top() > frontier_y) else {
                break;
            };
            let entity = entities.remove(i);
            world.remove_from_world(entity.body);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{BodyParams, RapierWorld, Shape};
    use crate::sim::state::EntityKind;
    use glam::Vec2;

    fn platform(world: &mut RapierWorld, id: u32, y: f32) -> Entity {
        let shape = Shape::rect(100.0, 20.0);
        let center = Vec2::new(400.0, y);
        let body = world.create_body(shape, BodyParams::solid(EntityKind::Platform.tag()), center);
        world.add_to_world(body);
        Entity {
            id,
            kind: EntityKind::Platform,
            center,
            shape,
            motion: None,
            spawn_index: id,
            body,
        }
    }

    #[test]
    fn test_cut_line_uses_nearest_of_lava_and_player() {
        let culling = CullingManager::default();
        assert_eq!(culling.cut_line(1000.0, 0.0), 1200.0);
        assert_eq!(culling.cut_line(5000.0, 0.0), 1200.0);
    }

    #[test]
    fn test_cull_removes_bodies_below_cut() {
        let culling = CullingManager::default();
        let mut world = RapierWorld::default();
        let mut entities: Vec<Entity> = [0.0, 500.0, 1300.0, 2000.0]
            .iter()
            .enumerate()
            .map(|(i, &y)| platform(&mut world, i as u32, y))
            .collect();
        let doomed = entities[3].body;

        let removed = culling.cull(&mut entities, &mut world, 1000.0, 0.0, -10.0);
        assert_eq!(removed, 2);
        assert_eq!(entities.len(), 2);
        assert!(!world.contains(doomed));
        assert_eq!(world.body_count(), 2);
    }

    #[test]
    fn test_frontier_piece_survives() {
        let culling = CullingManager::default();
        let mut world = RapierWorld::default();
        let mut entities = vec![platform(&mut world, 0, 3000.0)];
        let frontier = entities[0].top();
        assert_eq!(culling.cull(&mut entities, &mut world, 0.0, 0.0, frontier), 0);
    }

    #[test]
    fn test_generation_respects_cap_and_lookahead() {
        let culling = CullingManager::default();
        assert!(culling.should_generate(0, 0.0, 0.0));
        assert!(culling.should_generate(61, 0.0, 0.0));
        assert!(!culling.should_generate(62, 0.0, 0.0));
        assert!(!culling.should_generate(0, 700.0, 0.0));
    }

    #[test]
    fn test_make_room_drops_oldest() {
        let culling = CullingManager::new(CullingTuning {
            entity_cap: 3,
            ..Default::default()
        });
        let mut world = RapierWorld::default();
        let mut entities: Vec<Entity> = (0..3)
            .map(|i| platform(&mut world, i, 1000.0 - i as f32 * 100.0))
            .collect();
        let frontier = entities[2].top();
        culling.make_room(&mut entities, &mut world, 1, frontier);
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].id, 1);
    }
}
