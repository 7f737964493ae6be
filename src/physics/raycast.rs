//! Ray queries against the simulation, reported per entity.

use glam::Vec3;

use crate::ecs::components::physics::Tags;

use super::engine::{groups, PhysicsEngine, RawRayHit};
use super::RigidBodySystem;

/// Filters for [`RigidBodySystem::raycast_first`] and [`RigidBodySystem::raycast_all`].
pub struct RaycastOptions<'a> {
    /// Group bits the ray belongs to.
    pub filter_collision_group: u32,
    /// Groups the ray can hit.
    pub filter_collision_mask: u32,
    /// Keep only entities carrying at least one of these tags.
    pub filter_tags: Vec<String>,
    /// Keep only entities this returns `true` for.
    pub filter_callback: Option<&'a dyn Fn(hecs::Entity) -> bool>,
    /// Order `raycast_all` results by distance from the start point.
    pub sort: bool,
}

impl Default for RaycastOptions<'_> {
    fn default() -> Self {
        Self {
            filter_collision_group: groups::ALL,
            filter_collision_mask: groups::ALL,
            filter_tags: Vec::new(),
            filter_callback: None,
            sort: false,
        }
    }
}

impl RaycastOptions<'_> {
    fn needs_entity_filter(&self) -> bool {
        !self.filter_tags.is_empty() || self.filter_callback.is_some()
    }

    fn accepts(&self, world: &hecs::World, entity: hecs::Entity) -> bool {
        if !self.filter_tags.is_empty() {
            let tagged = world
                .get::<&Tags>(entity)
                .is_ok_and(|tags| tags.has_any(&self.filter_tags));
            if !tagged {
                return false;
            }
        }
        self.filter_callback.map_or(true, |keep| keep(entity))
    }
}

/// A ray hit on an entity's body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastResult {
    pub entity: hecs::Entity,
    /// World-space hit position.
    pub point: Vec3,
    /// World-space surface normal at the hit.
    pub normal: Vec3,
    /// Position of the hit along the ray, `0` at the start and `1` at the end.
    pub hit_fraction: f32,
}

impl RaycastResult {
    fn from_raw(hit: &RawRayHit) -> Option<Self> {
        Some(Self {
            entity: hit.user_data.and_then(hecs::Entity::from_bits)?,
            point: hit.point,
            normal: hit.normal,
            hit_fraction: hit.fraction,
        })
    }
}

impl<E: PhysicsEngine> RigidBodySystem<E> {
    /// The hit closest to `start` on the segment `start..end`.
    pub fn raycast_first(
        &self,
        world: &hecs::World,
        start: Vec3,
        end: Vec3,
        options: &RaycastOptions<'_>,
    ) -> Option<RaycastResult> {
        let engine = self.engine()?;
        let (group, mask) = (options.filter_collision_group, options.filter_collision_mask);

        if !options.needs_entity_filter() {
            return engine
                .ray_test_closest(start, end, group, mask)
                .as_ref()
                .and_then(RaycastResult::from_raw);
        }

        engine
            .ray_test_all(start, end, group, mask)
            .iter()
            .filter_map(RaycastResult::from_raw)
            .filter(|hit| options.accepts(world, hit.entity))
            .min_by(|a, b| a.hit_fraction.total_cmp(&b.hit_fraction))
    }

    /// Every hit on the segment `start..end`.
    pub fn raycast_all(
        &self,
        world: &hecs::World,
        start: Vec3,
        end: Vec3,
        options: &RaycastOptions<'_>,
    ) -> Vec<RaycastResult> {
        let Some(engine) = self.engine() else {
            return Vec::new();
        };

        let mut hits: Vec<RaycastResult> = engine
            .ray_test_all(
                start,
                end,
                options.filter_collision_group,
                options.filter_collision_mask,
            )
            .iter()
            .filter_map(RaycastResult::from_raw)
            .filter(|hit| options.accepts(world, hit.entity))
            .collect();

        if options.sort {
            hits.sort_by(|a, b| a.hit_fraction.total_cmp(&b.hit_fraction));
        }
        hits
    }
}
