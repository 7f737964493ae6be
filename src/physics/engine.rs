//! Seam to the rigid-body engine that performs the actual simulation.
//!
//! The bridge only sees body descriptors going in and contact manifolds,
//! transforms, and ray hits coming out.

use glam::{Quat, Vec3};

use crate::ecs::components::physics::ColliderShape;

/// Collision flags carried by every engine body.
pub mod flags {
    pub const STATIC_OBJECT: u32 = 1;
    pub const KINEMATIC_OBJECT: u32 = 2;
    /// The body reports overlaps but takes no part in collision response.
    pub const NORESPONSE_OBJECT: u32 = 4;
}

/// Collision group and mask bits.
pub mod groups {
    use crate::ecs::components::physics::RigidBodyType;

    pub const NONE: u32 = 0;
    pub const DEFAULT: u32 = 1;
    pub const DYNAMIC: u32 = 1;
    pub const STATIC: u32 = 2;
    pub const KINEMATIC: u32 = 4;
    pub const ENGINE_1: u32 = 8;
    pub const TRIGGER: u32 = 16;
    pub const USER_1: u32 = 32;
    pub const USER_2: u32 = 64;
    pub const USER_3: u32 = 128;

    pub const ALL: u32 = 0xffff;
    pub const NOT_STATIC: u32 = ALL ^ STATIC;
    pub const NOT_STATIC_KINEMATIC: u32 = ALL ^ (STATIC | KINEMATIC);

    /// Default `(group, mask)` for a body of the given type.
    pub fn defaults_for(body_type: RigidBodyType) -> (u32, u32) {
        match body_type {
            RigidBodyType::Dynamic => (DYNAMIC, ALL),
            RigidBodyType::Kinematic => (KINEMATIC, ALL),
            RigidBodyType::Static => (STATIC, NOT_STATIC),
        }
    }

    /// Default `(group, mask)` for a trigger volume.
    pub const fn trigger() -> (u32, u32) {
        (TRIGGER, NOT_STATIC ^ TRIGGER)
    }

    /// Bullet-style pair filter.
    #[inline]
    pub fn interacts(group_a: u32, mask_a: u32, group_b: u32, mask_b: u32) -> bool {
        (group_a & mask_b) != 0 && (group_b & mask_a) != 0
    }
}

/// Opaque handle to a body owned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub u32);

/// Everything the engine needs to create a body.
#[derive(Debug, Clone)]
pub struct BodyDesc {
    pub shape: ColliderShape,
    /// Zero means infinite mass.
    pub mass: f32,
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub friction: f32,
    pub restitution: f32,
    pub rolling_friction: f32,
    pub group: u32,
    pub mask: u32,
    /// Combination of [`flags`] bits.
    pub flags: u32,
    /// Opaque back-reference to the owner, usually `hecs::Entity::to_bits`.
    pub user_data: Option<u64>,
}

/// One side of a manifold as the engine reports it.
#[derive(Debug, Clone, Copy)]
pub struct RawBody {
    pub handle: BodyHandle,
    pub user_data: Option<u64>,
    pub flags: u32,
}

impl RawBody {
    pub fn is_no_response(&self) -> bool {
        self.flags & flags::NORESPONSE_OBJECT != 0
    }
}

/// A single contact point as the engine reports it.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawContactPoint {
    pub local_point_a: Vec3,
    pub local_point_b: Vec3,
    pub position_world_on_a: Vec3,
    pub position_world_on_b: Vec3,
    pub normal_world_on_b: Vec3,
    pub applied_impulse: f32,
}

/// All current contact points between exactly two bodies.
#[derive(Debug, Clone)]
pub struct RawManifold {
    pub body_a: RawBody,
    pub body_b: RawBody,
    pub points: Vec<RawContactPoint>,
}

/// A ray hit as the engine reports it.
#[derive(Debug, Clone, Copy)]
pub struct RawRayHit {
    pub handle: BodyHandle,
    pub user_data: Option<u64>,
    pub point: Vec3,
    pub normal: Vec3,
    /// Position of the hit along the segment, in `[0, 1]`.
    pub fraction: f32,
}

/// Failure to bring up the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("physics engine unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The external rigid-body engine.
///
/// Implementations are single-threaded. `step_simulation` calls `on_tick`
/// synchronously after each internal sub-step; since the callback is handed in
/// while the engine is mutably borrowed, it cannot re-enter the engine.
pub trait PhysicsEngine {
    fn gravity(&self) -> Vec3;
    fn set_gravity(&mut self, gravity: Vec3);

    fn add_body(&mut self, desc: &BodyDesc) -> BodyHandle;
    fn remove_body(&mut self, handle: BodyHandle);

    /// Overwrite a body's motion state. Returns `false` if the body has none.
    fn set_motion_state(&mut self, handle: BodyHandle, position: Vec3, rotation: Quat) -> bool;
    /// The body's current world transform, if it has a motion state.
    fn motion_state(&self, handle: BodyHandle) -> Option<(Vec3, Quat)>;
    /// Whether the body is awake.
    fn is_active(&self, handle: BodyHandle) -> bool;
    fn activate(&mut self, handle: BodyHandle);

    fn apply_force(&mut self, handle: BodyHandle, force: Vec3, relative_point: Vec3);
    fn apply_impulse(&mut self, handle: BodyHandle, impulse: Vec3, relative_point: Vec3);
    fn apply_torque(&mut self, handle: BodyHandle, torque: Vec3);
    fn linear_velocity(&self, handle: BodyHandle) -> Option<Vec3>;
    fn set_linear_velocity(&mut self, handle: BodyHandle, velocity: Vec3);

    /// Advance by `time_step` seconds in fixed increments of `fixed_time_step`,
    /// running at most `max_sub_steps` increments. Returns the number run.
    fn step_simulation(
        &mut self,
        time_step: f32,
        max_sub_steps: u32,
        fixed_time_step: f32,
        on_tick: &mut dyn FnMut(&[RawManifold]),
    ) -> u32;

    /// Closest body hit by the segment `from..to` that passes the filter.
    fn ray_test_closest(&self, from: Vec3, to: Vec3, group: u32, mask: u32) -> Option<RawRayHit>;
    /// Every body hit by the segment `from..to`, in engine order.
    fn ray_test_all(&self, from: Vec3, to: Vec3, group: u32, mask: u32) -> Vec<RawRayHit>;
}
