//! Rigid-body bridge between a hecs scene and a physics engine.
//!
//! # Architecture
//!
//! [`RigidBodySystem::update`] runs once per application frame:
//!
//! 1. Create, recreate, or destroy engine bodies to match the components
//! 2. Push gravity to the engine if it changed
//! 3. Copy kinematic entity transforms into the engine
//! 4. Step the engine; every internal sub-step dispatches collision events
//! 5. Copy awake dynamic body transforms back onto their entities
//! 6. Rewind the contact pools
//!
//! Everything runs on the caller's thread. Collision events fire from inside
//! step 4, before any transform is read back.

pub mod contact;
#[cfg(feature = "cpu-engine")]
pub mod cpu;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod events;
pub mod pool;
pub mod raycast;
#[cfg(test)]
pub(crate) mod testing;
pub mod tracker;

use std::collections::{HashMap, HashSet};

use glam::{Quat, Vec3};
use tracing::{debug, info, warn};

use crate::ecs::components::physics::{Collider, ColliderShape, RigidBody, RigidBodyType};
use crate::ecs::systems::transform::{resolve_world_pose, set_world_pose};

use self::contact::{ContactPools, SingleContactResult};
use self::dispatcher::CollisionDispatcher;
use self::engine::{flags, groups, BodyDesc, BodyHandle, EngineError, PhysicsEngine, RawManifold};
use self::error::{PhysicsError, Result};

/// Gravity components closer than this to the engine's value are not pushed.
const GRAVITY_EPSILON: f32 = 1e-5;

/// Configuration for the physics simulation.
#[derive(Debug, Clone)]
pub struct PhysicsConfig {
    /// Gravity vector. Default: (0, -9.81, 0).
    pub gravity: Vec3,
    /// Fixed timestep for physics updates in seconds. Default: 1/60.
    pub fixed_timestep: f32,
    /// Maximum number of sub-steps per frame. Default: 10.
    pub max_substeps: u32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            fixed_timestep: 1.0 / 60.0,
            max_substeps: 10,
        }
    }
}

/// Everything about a body that requires recreating it when changed.
#[derive(Debug, Clone, PartialEq)]
struct BodyParams {
    body_type: RigidBodyType,
    mass: f32,
    shape: ColliderShape,
    trigger: bool,
    linear_damping: f32,
    angular_damping: f32,
    friction: f32,
    restitution: f32,
    rolling_friction: f32,
    group: u32,
    mask: u32,
}

impl BodyParams {
    /// A collider without a rigid body is a trigger volume that follows its entity.
    fn new(collider: &Collider, rigid_body: Option<&RigidBody>) -> Option<Self> {
        if !collider.enabled {
            return None;
        }
        let (trigger_group, trigger_mask) = groups::trigger();
        let Some(rb) = rigid_body else {
            let defaults = RigidBody::new_kinematic();
            return Some(Self {
                body_type: RigidBodyType::Kinematic,
                mass: 0.0,
                shape: collider.shape.clone(),
                trigger: true,
                linear_damping: defaults.linear_damping,
                angular_damping: defaults.angular_damping,
                friction: defaults.friction,
                restitution: defaults.restitution,
                rolling_friction: defaults.rolling_friction,
                group: trigger_group,
                mask: trigger_mask,
            });
        };
        if !rb.enabled {
            return None;
        }

        let (group, mask) = if collider.is_trigger {
            (trigger_group, trigger_mask)
        } else {
            (rb.group, rb.mask)
        };
        Some(Self {
            body_type: rb.body_type,
            mass: rb.effective_mass(),
            shape: collider.shape.clone(),
            trigger: collider.is_trigger,
            linear_damping: rb.linear_damping,
            angular_damping: rb.angular_damping,
            friction: rb.friction,
            restitution: rb.restitution,
            rolling_friction: rb.rolling_friction,
            group,
            mask,
        })
    }

    fn flags(&self) -> u32 {
        let mut bits = match self.body_type {
            RigidBodyType::Static => flags::STATIC_OBJECT,
            RigidBodyType::Kinematic => flags::KINEMATIC_OBJECT,
            RigidBodyType::Dynamic => 0,
        };
        if self.trigger {
            bits |= flags::NORESPONSE_OBJECT;
        }
        bits
    }

    fn desc(&self, entity: hecs::Entity, position: Vec3, rotation: Quat) -> BodyDesc {
        BodyDesc {
            shape: self.shape.clone(),
            mass: self.mass,
            position,
            rotation,
            linear_damping: self.linear_damping,
            angular_damping: self.angular_damping,
            friction: self.friction,
            restitution: self.restitution,
            rolling_friction: self.rolling_friction,
            group: self.group,
            mask: self.mask,
            flags: self.flags(),
            user_data: Some(entity.to_bits().get()),
        }
    }
}

/// Where a new body starts: the entity's current world pose, or the origin for
/// an entity with no transform at all.
fn initial_pose(world: &hecs::World, entity: hecs::Entity, entry: &BodyEntry) -> (Vec3, Quat) {
    resolve_world_pose(world, entity)
        .map(|(position, rotation)| entry.body_pose(position, rotation))
        .unwrap_or((Vec3::ZERO, Quat::IDENTITY))
}

/// A live engine body and how it sits relative to its entity.
#[derive(Debug)]
struct BodyEntry {
    handle: BodyHandle,
    params: BodyParams,
    offset: Vec3,
    offset_rotation: Quat,
}

impl BodyEntry {
    /// Entity pose to body pose.
    fn body_pose(&self, position: Vec3, rotation: Quat) -> (Vec3, Quat) {
        (
            position + rotation * self.offset,
            (rotation * self.offset_rotation).normalize(),
        )
    }

    /// Body pose to entity pose: un-rotate, then un-translate.
    fn entity_pose(&self, position: Vec3, rotation: Quat) -> (Vec3, Quat) {
        let rotation = (rotation * self.offset_rotation.inverse()).normalize();
        (position - rotation * self.offset, rotation)
    }
}

/// Steps the engine and keeps hecs entities and engine bodies in sync.
pub struct RigidBodySystem<E: PhysicsEngine> {
    config: PhysicsConfig,
    engine: Option<E>,
    bodies: HashMap<hecs::Entity, BodyEntry>,
    seen: HashSet<hecs::Entity>,
    dispatcher: CollisionDispatcher,
    pools: ContactPools,
}

impl<E: PhysicsEngine> RigidBodySystem<E> {
    /// Create a system around an engine that is already up.
    pub fn new(config: PhysicsConfig, engine: E) -> Self {
        Self {
            engine: Some(engine),
            ..Self::inert(config)
        }
    }

    /// Create a system by loading the engine.
    ///
    /// If loading fails the system stays inert: `update` does nothing and no
    /// events are ever fired.
    pub fn init<F>(config: PhysicsConfig, load: F) -> Self
    where
        F: FnOnce() -> std::result::Result<E, EngineError>,
    {
        match load() {
            Ok(engine) => {
                info!("physics engine initialized");
                Self::new(config, engine)
            }
            Err(err) => {
                warn!("physics disabled: {err}");
                Self::inert(config)
            }
        }
    }

    fn inert(config: PhysicsConfig) -> Self {
        Self {
            config,
            engine: None,
            bodies: HashMap::new(),
            seen: HashSet::new(),
            dispatcher: CollisionDispatcher::new(),
            pools: ContactPools::new(),
        }
    }

    /// Whether the engine is up and `update` will step it.
    pub fn is_running(&self) -> bool {
        self.engine.is_some()
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut PhysicsConfig {
        &mut self.config
    }

    /// Set the gravity pushed to the engine on the next update.
    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.config.gravity = gravity;
    }

    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut E> {
        self.engine.as_mut()
    }

    pub fn dispatcher(&self) -> &CollisionDispatcher {
        &self.dispatcher
    }

    pub fn pools(&self) -> &ContactPools {
        &self.pools
    }

    /// Engine handle of the entity's body, if it has one.
    pub fn body_handle(&self, entity: hecs::Entity) -> Option<BodyHandle> {
        self.bodies.get(&entity).map(|entry| entry.handle)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Install the global contact listener, fired once per raw contact point.
    pub fn on_contact<F>(&mut self, listener: F)
    where
        F: FnMut(&SingleContactResult) + 'static,
    {
        self.dispatcher
            .set_global_contact_listener(Some(Box::new(listener)));
    }

    pub fn clear_contact_listener(&mut self) {
        self.dispatcher.set_global_contact_listener(None);
    }

    /// Bring engine bodies in line with the `Collider`/`RigidBody` components.
    ///
    /// New or re-enabled components get a body; bodies of despawned entities or
    /// disabled components are removed; a change of type, mass, shape, or any
    /// other creation parameter destroys and recreates the body.
    pub fn sync_bodies(&mut self, world: &hecs::World) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };

        self.seen.clear();
        let mut query = world.query::<(&Collider, Option<&RigidBody>)>();
        for (entity, (collider, rigid_body)) in query.iter() {
            let Some(params) = BodyParams::new(collider, rigid_body) else {
                continue;
            };
            self.seen.insert(entity);

            let known = self.bodies.get(&entity).is_some_and(|e| e.params == params);
            if let Some(rb) = rigid_body.filter(|rb| rb.body_type == RigidBodyType::Dynamic) {
                if params.mass == 0.0 && !known {
                    warn!(?entity, mass = rb.mass, "dynamic body without usable mass, treating as static");
                }
            }

            if let Some(entry) = self.bodies.get_mut(&entity) {
                entry.offset = collider.offset;
                entry.offset_rotation = collider.offset_rotation;
                if entry.params == params {
                    continue;
                }
                debug!(?entity, "recreating rigid body");
                engine.remove_body(entry.handle);
                let (position, rotation) = initial_pose(world, entity, entry);
                entry.handle = engine.add_body(&params.desc(entity, position, rotation));
                entry.params = params;
                continue;
            }

            debug!(?entity, "creating rigid body");
            let mut entry = BodyEntry {
                handle: BodyHandle(u32::MAX),
                params,
                offset: collider.offset,
                offset_rotation: collider.offset_rotation,
            };
            let (position, rotation) = initial_pose(world, entity, &entry);
            entry.handle = engine.add_body(&entry.params.desc(entity, position, rotation));
            self.bodies.insert(entity, entry);
        }

        let seen = &self.seen;
        self.bodies.retain(|entity, entry| {
            let keep = seen.contains(entity);
            if !keep {
                debug!(?entity, "destroying rigid body");
                engine.remove_body(entry.handle);
            }
            keep
        });
    }

    /// Advance the simulation by `delta_time` seconds of wall time.
    ///
    /// Returns the number of fixed sub-steps the engine ran. Does nothing if
    /// the engine is not running.
    ///
    /// Run [`transform_system`](crate::ecs::systems::transform_system) before
    /// this so listeners and raycasts see fresh `GlobalTransform`s. Body poses
    /// themselves are resolved from the `Transform` chain and do not depend on it.
    pub fn update(&mut self, world: &mut hecs::World, delta_time: f32) -> u32 {
        if self.engine.is_none() {
            return 0;
        }
        self.sync_bodies(world);

        let Some(engine) = self.engine.as_mut() else {
            return 0;
        };

        // 1. Gravity
        if !engine
            .gravity()
            .abs_diff_eq(self.config.gravity, GRAVITY_EPSILON)
        {
            engine.set_gravity(self.config.gravity);
        }

        // 2. Kinematic bodies follow their entities
        for (entity, entry) in &self.bodies {
            if entry.params.body_type != RigidBodyType::Kinematic {
                continue;
            }
            if let Some((position, rotation)) = resolve_world_pose(world, *entity) {
                let (position, rotation) = entry.body_pose(position, rotation);
                engine.set_motion_state(entry.handle, position, rotation);
            }
        }

        // 3. Step, dispatching collisions after every internal tick
        let dispatcher = &mut self.dispatcher;
        let pools = &mut self.pools;
        let substeps = engine.step_simulation(
            delta_time,
            self.config.max_substeps,
            self.config.fixed_timestep,
            &mut |manifolds: &[RawManifold]| dispatcher.check_for_collisions(manifolds, pools, &mut *world),
        );

        // 4. Awake dynamic bodies drive their entities
        for (entity, entry) in &self.bodies {
            if entry.params.body_type != RigidBodyType::Dynamic || !engine.is_active(entry.handle) {
                continue;
            }
            if let Some((position, rotation)) = engine.motion_state(entry.handle) {
                let (position, rotation) = entry.entity_pose(position, rotation);
                set_world_pose(world, *entity, position, rotation);
            }
        }

        // 5. Pools
        self.pools.free_all();

        substeps
    }

    fn engine_and_body(&mut self, entity: hecs::Entity) -> Result<(&mut E, BodyHandle)> {
        let handle = self.bodies.get(&entity).map(|entry| entry.handle);
        let engine = self.engine.as_mut().ok_or(PhysicsError::EngineUnavailable)?;
        let handle = handle.ok_or(PhysicsError::NoBody(entity))?;
        Ok((engine, handle))
    }

    /// Apply a force at a point relative to the body's center.
    pub fn apply_force(&mut self, entity: hecs::Entity, force: Vec3, relative_point: Vec3) -> Result<()> {
        let (engine, handle) = self.engine_and_body(entity)?;
        engine.activate(handle);
        engine.apply_force(handle, force, relative_point);
        Ok(())
    }

    /// Apply an impulse at a point relative to the body's center.
    pub fn apply_impulse(&mut self, entity: hecs::Entity, impulse: Vec3, relative_point: Vec3) -> Result<()> {
        let (engine, handle) = self.engine_and_body(entity)?;
        engine.activate(handle);
        engine.apply_impulse(handle, impulse, relative_point);
        Ok(())
    }

    pub fn apply_torque(&mut self, entity: hecs::Entity, torque: Vec3) -> Result<()> {
        let (engine, handle) = self.engine_and_body(entity)?;
        engine.activate(handle);
        engine.apply_torque(handle, torque);
        Ok(())
    }

    pub fn linear_velocity(&mut self, entity: hecs::Entity) -> Result<Vec3> {
        let (engine, handle) = self.engine_and_body(entity)?;
        Ok(engine.linear_velocity(handle).unwrap_or(Vec3::ZERO))
    }

    pub fn set_linear_velocity(&mut self, entity: hecs::Entity, velocity: Vec3) -> Result<()> {
        let (engine, handle) = self.engine_and_body(entity)?;
        engine.activate(handle);
        engine.set_linear_velocity(handle, velocity);
        Ok(())
    }

    /// Wake the entity's body.
    pub fn activate(&mut self, entity: hecs::Entity) -> Result<()> {
        let (engine, handle) = self.engine_and_body(entity)?;
        engine.activate(handle);
        Ok(())
    }

    /// Move an entity and its body to a new pose immediately.
    pub fn teleport(
        &mut self,
        world: &mut hecs::World,
        entity: hecs::Entity,
        position: Vec3,
        rotation: Quat,
    ) -> Result<()> {
        let (offset, offset_rotation) = match self.bodies.get(&entity) {
            Some(entry) => (entry.offset, entry.offset_rotation),
            None => return Err(PhysicsError::NoBody(entity)),
        };
        set_world_pose(world, entity, position, rotation);

        let (engine, handle) = self.engine_and_body(entity)?;
        let body_rotation = (rotation * offset_rotation).normalize();
        engine.set_motion_state(handle, position + rotation * offset, body_rotation);
        engine.activate(handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::ecs::components::events::CollisionHandlers;
    use crate::ecs::components::transform::{GlobalTransform, Parent, Transform};
    use crate::ecs::systems::transform::world_pose;
    use crate::physics::events::CollisionEventKind;
    use crate::physics::testing::ScriptedEngine;

    type Log = Arc<Mutex<Vec<(hecs::Entity, CollisionEventKind)>>>;

    fn recording_handlers(log: &Log, kinds: &[CollisionEventKind]) -> CollisionHandlers {
        let mut handlers = CollisionHandlers::new();
        for kind in kinds {
            let sink = log.clone();
            let kind = *kind;
            handlers.on(kind, move |event| {
                sink.lock().unwrap().push((event.other(), kind));
            });
        }
        handlers
    }

    fn spawn_body(world: &mut hecs::World, position: Vec3, rb: RigidBody) -> hecs::Entity {
        world.spawn((
            Transform::from_position(position),
            GlobalTransform::from_pose(position, Quat::IDENTITY),
            rb,
            Collider::sphere(0.5),
        ))
    }

    fn system() -> RigidBodySystem<ScriptedEngine> {
        RigidBodySystem::new(PhysicsConfig::default(), ScriptedEngine::new())
    }

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn test_physics_config_default() {
        let config = PhysicsConfig::default();
        assert_eq!(config.gravity, Vec3::new(0.0, -9.81, 0.0));
        assert!((config.fixed_timestep - 1.0 / 60.0).abs() < 1e-7);
        assert_eq!(config.max_substeps, 10);
    }

    #[test]
    fn test_engine_unavailable_is_inert() {
        let mut world = hecs::World::new();
        spawn_body(&mut world, Vec3::ZERO, RigidBody::new_dynamic(1.0));

        let mut physics: RigidBodySystem<ScriptedEngine> =
            RigidBodySystem::init(PhysicsConfig::default(), || {
                Err(EngineError::Unavailable("no native runtime".into()))
            });

        assert!(!physics.is_running());
        assert_eq!(physics.update(&mut world, DT), 0);
        assert_eq!(physics.body_count(), 0);
        assert!(matches!(
            physics.apply_impulse(hecs::Entity::DANGLING, Vec3::X, Vec3::ZERO),
            Err(PhysicsError::EngineUnavailable)
        ));
    }

    #[test]
    fn test_gravity_pushed_only_on_change() {
        let mut world = hecs::World::new();
        let mut physics = system();

        physics.update(&mut world, DT);
        assert_eq!(physics.engine().unwrap().gravity_sets, 0);

        // Differs in the sixth decimal only.
        physics.set_gravity(Vec3::new(0.0, -9.810004, 0.0));
        physics.update(&mut world, DT);
        assert_eq!(physics.engine().unwrap().gravity_sets, 0);

        physics.set_gravity(Vec3::new(0.0, -1.62, 0.0));
        physics.update(&mut world, DT);
        physics.update(&mut world, DT);
        assert_eq!(physics.engine().unwrap().gravity_sets, 1);
        assert_eq!(physics.engine().unwrap().gravity(), Vec3::new(0.0, -1.62, 0.0));
    }

    #[test]
    fn test_body_lifecycle() {
        let mut world = hecs::World::new();
        let mut physics = system();
        let entity = spawn_body(&mut world, Vec3::ZERO, RigidBody::new_dynamic(1.0));

        physics.update(&mut world, DT);
        let first = physics.body_handle(entity).unwrap();
        assert_eq!(physics.engine().unwrap().live_bodies(), 1);

        // Unchanged components keep the body.
        physics.update(&mut world, DT);
        assert_eq!(physics.body_handle(entity), Some(first));

        // Type change recreates.
        *world.get::<&mut RigidBody>(entity).unwrap() = RigidBody::new_kinematic();
        physics.update(&mut world, DT);
        let second = physics.body_handle(entity).unwrap();
        assert_ne!(first, second);
        assert_eq!(physics.engine().unwrap().live_bodies(), 1);
        assert!(physics.engine().unwrap().body(second).unwrap().desc.flags & flags::KINEMATIC_OBJECT != 0);

        // Disabling removes.
        world.get::<&mut RigidBody>(entity).unwrap().enabled = false;
        physics.update(&mut world, DT);
        assert_eq!(physics.body_handle(entity), None);
        assert_eq!(physics.engine().unwrap().live_bodies(), 0);

        // Re-enabling and then despawning.
        world.get::<&mut RigidBody>(entity).unwrap().enabled = true;
        physics.update(&mut world, DT);
        assert_eq!(physics.body_count(), 1);
        world.despawn(entity).unwrap();
        physics.update(&mut world, DT);
        assert_eq!(physics.body_count(), 0);
        assert_eq!(physics.engine().unwrap().live_bodies(), 0);
    }

    #[test]
    fn test_mass_clamped_for_non_dynamic() {
        let mut world = hecs::World::new();
        let mut physics = system();
        let zero_mass = spawn_body(&mut world, Vec3::ZERO, RigidBody::new_dynamic(0.0));
        let mut heavy_static = RigidBody::new_static();
        heavy_static.mass = 50.0;
        let fixed = spawn_body(&mut world, Vec3::X, heavy_static);

        physics.update(&mut world, DT);
        let engine = physics.engine().unwrap();
        for entity in [zero_mass, fixed] {
            let handle = physics.body_handle(entity).unwrap();
            assert_eq!(engine.body(handle).unwrap().desc.mass, 0.0);
        }
    }

    #[test]
    fn test_collider_without_rigid_body_is_trigger() {
        let mut world = hecs::World::new();
        let mut physics = system();
        let entity = world.spawn((Transform::identity(), GlobalTransform::default(), Collider::sphere(1.0)));

        physics.update(&mut world, DT);
        let handle = physics.body_handle(entity).unwrap();
        let desc = &physics.engine().unwrap().body(handle).unwrap().desc;
        assert!(desc.flags & flags::NORESPONSE_OBJECT != 0);
        assert_eq!(desc.group, groups::TRIGGER);
        assert_eq!(desc.mass, 0.0);
    }

    #[test]
    fn test_kinematic_push_applies_offset() {
        let mut world = hecs::World::new();
        let mut physics = system();
        let mut collider = Collider::sphere(0.5);
        collider.offset = Vec3::new(0.0, 1.0, 0.0);
        let rotation = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let transform = Transform {
            position: Vec3::new(3.0, 0.0, 0.0),
            rotation,
            // Scale never reaches the engine.
            scale: Vec3::splat(2.0),
        };
        let entity = world.spawn((
            transform,
            GlobalTransform(transform.to_matrix()),
            RigidBody::new_kinematic(),
            collider,
        ));

        physics.update(&mut world, DT);

        let handle = physics.body_handle(entity).unwrap();
        let (position, body_rotation) = physics.engine().unwrap().motion_state(handle).unwrap();
        let eps = 1e-5;
        // Local +Y rotated 90 degrees about Z points along -X.
        assert!((position - Vec3::new(2.0, 0.0, 0.0)).length() < eps, "got {:?}", position);
        assert!((body_rotation.dot(rotation).abs() - 1.0).abs() < eps);
    }

    #[test]
    fn test_dynamic_pull_removes_offset_and_skips_sleeping() {
        let mut world = hecs::World::new();
        let mut physics = system();
        let mut collider = Collider::sphere(0.5);
        collider.offset = Vec3::new(0.0, 0.5, 0.0);
        let entity = world.spawn((
            Transform::identity(),
            GlobalTransform::default(),
            RigidBody::new_dynamic(1.0),
            collider,
        ));
        physics.update(&mut world, DT);
        let handle = physics.body_handle(entity).unwrap();

        let engine = physics.engine_mut().unwrap();
        engine.set_motion_state(handle, Vec3::new(1.0, 5.5, 0.0), Quat::IDENTITY);
        physics.update(&mut world, DT);

        let eps = 1e-5;
        let (position, _) = world_pose(&world, entity).unwrap();
        assert!((position - Vec3::new(1.0, 5.0, 0.0)).length() < eps, "got {:?}", position);
        assert!((world.get::<&Transform>(entity).unwrap().position - position).length() < eps);

        // Sleeping bodies are left alone.
        let engine = physics.engine_mut().unwrap();
        engine.set_motion_state(handle, Vec3::new(9.0, 9.0, 9.0), Quat::IDENTITY);
        engine.set_active(handle, false);
        physics.update(&mut world, DT);
        let (position, _) = world_pose(&world, entity).unwrap();
        assert!((position - Vec3::new(1.0, 5.0, 0.0)).length() < eps);
    }

    #[test]
    fn test_collision_scenario_through_world() {
        use CollisionEventKind::*;
        let mut world = hecs::World::new();
        let mut physics = system();
        let log: Log = Arc::new(Mutex::new(Vec::new()));

        let a = spawn_body(&mut world, Vec3::new(-2.0, 0.0, 0.0), RigidBody::new_dynamic(1.0));
        let b = spawn_body(&mut world, Vec3::new(2.0, 0.0, 0.0), RigidBody::new_dynamic(1.0));
        world
            .insert_one(a, recording_handlers(&log, &[Contact, CollisionStart, CollisionEnd]))
            .unwrap();

        physics.update(&mut world, DT);
        assert!(log.lock().unwrap().is_empty());

        for _ in 0..4 {
            physics.engine_mut().unwrap().push_tick(&[(a, b)]);
            physics.update(&mut world, DT);
        }
        physics.update(&mut world, DT);

        let kinds: Vec<_> = log.lock().unwrap().iter().map(|(_, k)| *k).collect();
        assert_eq!(
            kinds,
            vec![CollisionStart, Contact, Contact, Contact, Contact, CollisionEnd]
        );
        assert!(log.lock().unwrap().iter().all(|(other, _)| *other == b));
        assert_eq!(physics.pools().points.in_use(), 0);
        assert!(physics.dispatcher().tracker().is_empty());
    }

    #[test]
    fn test_trigger_scenario_through_world() {
        use CollisionEventKind::*;
        let mut world = hecs::World::new();
        let mut physics = system();
        let log: Log = Arc::new(Mutex::new(Vec::new()));

        let all = [Contact, CollisionStart, CollisionEnd, TriggerEnter, TriggerLeave];
        let volume = world.spawn((
            Transform::identity(),
            GlobalTransform::default(),
            Collider::sphere(2.0),
            recording_handlers(&log, &all),
        ));
        let body = spawn_body(&mut world, Vec3::ZERO, RigidBody::new_dynamic(1.0));
        world.insert_one(body, recording_handlers(&log, &all)).unwrap();

        for _ in 0..3 {
            physics.engine_mut().unwrap().push_tick(&[(volume, body)]);
            physics.update(&mut world, DT);
        }
        physics.update(&mut world, DT);

        let log = log.lock().unwrap();
        let count = |kind| log.iter().filter(|(_, k)| *k == kind).count();
        assert_eq!(count(TriggerEnter), 2);
        assert_eq!(count(TriggerLeave), 2);
        assert_eq!(count(Contact) + count(CollisionStart) + count(CollisionEnd), 0);
    }

    #[test]
    fn test_global_contact_listener() {
        let mut world = hecs::World::new();
        let mut physics = system();
        let a = spawn_body(&mut world, Vec3::ZERO, RigidBody::new_dynamic(1.0));
        let b = spawn_body(&mut world, Vec3::X, RigidBody::new_static());

        let seen = std::rc::Rc::new(std::cell::Cell::new(0));
        let counter = seen.clone();
        physics.on_contact(move |result| {
            assert!(result.a.is_some() && result.b.is_some());
            counter.set(counter.get() + 1);
        });

        physics.update(&mut world, DT);
        physics.engine_mut().unwrap().push_tick(&[(a, b)]);
        physics.update(&mut world, DT);
        assert_eq!(seen.get(), 1);

        physics.clear_contact_listener();
        physics.engine_mut().unwrap().push_tick(&[(a, b)]);
        physics.update(&mut world, DT);
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn test_body_control_errors() {
        let mut world = hecs::World::new();
        let mut physics = system();
        let bare = world.spawn((Transform::identity(),));
        let entity = spawn_body(&mut world, Vec3::ZERO, RigidBody::new_dynamic(1.0));
        physics.update(&mut world, DT);

        assert!(matches!(
            physics.apply_force(bare, Vec3::X, Vec3::ZERO),
            Err(PhysicsError::NoBody(e)) if e == bare
        ));

        physics.set_linear_velocity(entity, Vec3::new(0.0, 2.0, 0.0)).unwrap();
        assert_eq!(physics.linear_velocity(entity).unwrap(), Vec3::new(0.0, 2.0, 0.0));

        physics
            .teleport(&mut world, entity, Vec3::new(0.0, 7.0, 0.0), Quat::IDENTITY)
            .unwrap();
        let handle = physics.body_handle(entity).unwrap();
        let (position, _) = physics.engine().unwrap().motion_state(handle).unwrap();
        assert_eq!(position, Vec3::new(0.0, 7.0, 0.0));
        assert_eq!(world_pose(&world, entity).unwrap().0, Vec3::new(0.0, 7.0, 0.0));
    }

    #[test]
    fn test_body_starts_at_transform_without_global() {
        let mut world = hecs::World::new();
        let mut physics = system();
        let start = Vec3::new(5.0, 0.0, 0.0);
        let loose = world.spawn((
            Transform::from_position(start),
            RigidBody::new_dynamic(1.0),
            Collider::sphere(0.5),
        ));
        // A child whose GlobalTransform has not been refreshed yet.
        let parent = world.spawn((Transform::from_position(Vec3::new(0.0, 3.0, 0.0)),));
        let child = world.spawn((
            Transform::from_position(Vec3::X),
            GlobalTransform::default(),
            Parent(parent),
            RigidBody::new_dynamic(1.0),
            Collider::sphere(0.5),
        ));

        physics.update(&mut world, DT);

        let engine = physics.engine().unwrap();
        let loose_body = engine.body(physics.body_handle(loose).unwrap()).unwrap();
        assert_eq!(loose_body.desc.position, start);
        assert_eq!(world.get::<&Transform>(loose).unwrap().position, start);

        let eps = 1e-5;
        let child_body = engine.body(physics.body_handle(child).unwrap()).unwrap();
        assert!((child_body.desc.position - Vec3::new(1.0, 3.0, 0.0)).length() < eps);
        assert!((world.get::<&Transform>(child).unwrap().position - Vec3::X).length() < eps);
    }

    #[test]
    fn test_contact_toggling_within_one_frame() {
        use CollisionEventKind::*;
        let mut world = hecs::World::new();
        let mut physics = system();
        let log: Log = Arc::new(Mutex::new(Vec::new()));

        let a = spawn_body(&mut world, Vec3::ZERO, RigidBody::new_dynamic(1.0));
        let b = spawn_body(&mut world, Vec3::X, RigidBody::new_dynamic(1.0));
        world
            .insert_one(a, recording_handlers(&log, &[Contact, CollisionStart, CollisionEnd]))
            .unwrap();

        let engine = physics.engine_mut().unwrap();
        engine.push_tick(&[(a, b)]);
        engine.push_tick(&[]);
        engine.push_tick(&[(a, b)]);

        // Half a step of slack keeps float rounding from dropping the third tick.
        assert_eq!(physics.update(&mut world, 3.5 * DT), 3);
        let kinds: Vec<_> = log.lock().unwrap().iter().map(|(_, k)| *k).collect();
        assert_eq!(
            kinds,
            vec![CollisionStart, Contact, CollisionEnd, CollisionStart, Contact]
        );
        assert!(physics.dispatcher().tracker().is_touching(a, b));
        assert_eq!(physics.pools().points.in_use(), 0);

        assert_eq!(physics.update(&mut world, DT), 1);
        assert_eq!(log.lock().unwrap().last().map(|(_, k)| *k), Some(CollisionEnd));
        assert!(physics.dispatcher().tracker().is_empty());
    }

    #[test]
    fn test_disabled_collider_has_no_body() {
        let mut world = hecs::World::new();
        let mut physics = system();
        let mut collider = Collider::sphere(1.0);
        collider.enabled = false;
        let volume = world.spawn((Transform::identity(), GlobalTransform::default(), collider));
        let solid = spawn_body(&mut world, Vec3::X, RigidBody::new_static());

        physics.update(&mut world, DT);
        assert_eq!(physics.body_handle(volume), None);
        assert!(physics.body_handle(solid).is_some());

        world.get::<&mut Collider>(volume).unwrap().enabled = true;
        world.get::<&mut Collider>(solid).unwrap().enabled = false;
        physics.update(&mut world, DT);
        assert!(physics.body_handle(volume).is_some());
        assert_eq!(physics.body_handle(solid), None);
        assert_eq!(physics.engine().unwrap().live_bodies(), 1);
    }

    #[test]
    fn test_init_bubbles_loader_error() {
        use anyhow::Context;

        fn load_runtime() -> std::result::Result<ScriptedEngine, EngineError> {
            let missing: anyhow::Result<()> = Err(anyhow::anyhow!("libphysics.so not found"));
            missing.context("loading physics runtime")?;
            Ok(ScriptedEngine::new())
        }

        let err = load_runtime().unwrap_err();
        assert!(matches!(err, EngineError::Other(_)));
        assert_eq!(err.to_string(), "loading physics runtime");

        let mut world = hecs::World::new();
        spawn_body(&mut world, Vec3::ZERO, RigidBody::new_dynamic(1.0));
        let mut physics = RigidBodySystem::init(PhysicsConfig::default(), load_runtime);
        assert!(!physics.is_running());
        assert_eq!(physics.update(&mut world, DT), 0);
        assert_eq!(physics.body_count(), 0);
    }

    #[cfg(feature = "cpu-engine")]
    #[test]
    fn test_ball_dropped_on_ground_with_cpu_engine() {
        use crate::physics::cpu::CpuEngine;
        use CollisionEventKind::*;

        let mut world = hecs::World::new();
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let ground = world.spawn((
            Transform::from_position(Vec3::new(0.0, -0.5, 0.0)),
            GlobalTransform(glam::Mat4::from_translation(Vec3::new(0.0, -0.5, 0.0))),
            RigidBody::new_static(),
            Collider::cuboid(Vec3::new(10.0, 0.5, 10.0)),
        ));
        let ball = spawn_body(&mut world, Vec3::new(0.0, 2.0, 0.0), RigidBody::new_dynamic(1.0));
        world
            .insert_one(ball, recording_handlers(&log, &[CollisionStart, CollisionEnd]))
            .unwrap();

        let mut physics = RigidBodySystem::init(PhysicsConfig::default(), || Ok(CpuEngine::default()));
        for _ in 0..120 {
            physics.update(&mut world, DT);
        }

        let (position, _) = world_pose(&world, ball).unwrap();
        assert!((position.y - 0.5).abs() < 0.05, "y = {}", position.y);
        assert!(world.get::<&Transform>(ball).unwrap().position.y < 1.0);

        let log = log.lock().unwrap();
        assert!(!log.is_empty());
        assert_eq!(log[0], (ground, CollisionStart));
        assert!(physics.dispatcher().tracker().is_touching(ball, ground));
    }
}
