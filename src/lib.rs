//! Rein rigid-body bridge
//!
//! Fixed-step rigid-body simulation for hecs scenes, with per-entity
//! collision and trigger events.
//!
//! # Architecture
//!
//! 1. **ecs** - Components (transforms, rigid bodies, colliders, handlers) and
//!    the transform system
//! 2. **physics** - [`RigidBodySystem`] steps a [`PhysicsEngine`], keeps
//!    entities and bodies in sync, and turns contact manifolds into events
//! 3. **physics::cpu** - Reference engine for spheres and boxes
//!    (feature = "cpu-engine")
//!
//! ```no_run
//! use rein_rigidbody::prelude::*;
//! use rein_rigidbody::physics::cpu::CpuEngine;
//!
//! let mut world = rein_rigidbody::hecs::World::new();
//! let ball = world.spawn((
//!     Transform::from_position(Vec3::new(0.0, 5.0, 0.0)),
//!     GlobalTransform::default(),
//!     RigidBody::new_dynamic(1.0),
//!     Collider::sphere(0.5),
//!     CollisionHandlers::new().with(CollisionEventKind::CollisionStart, |event| {
//!         println!("hit {:?}", event.other());
//!     }),
//! ));
//!
//! let mut physics = RigidBodySystem::init(PhysicsConfig::default(), || Ok(CpuEngine::default()));
//! transform_system(&mut world);
//! physics.update(&mut world, 1.0 / 60.0);
//! # let _ = ball;
//! ```

pub mod ecs;
pub mod physics;

pub mod prelude {
    pub use crate::ecs::prelude::*;
    pub use crate::physics::contact::{ContactPoint, ContactView, SingleContactResult};
    pub use crate::physics::engine::{groups, PhysicsEngine};
    pub use crate::physics::error::PhysicsError;
    pub use crate::physics::events::{CollisionEvent, CollisionEventKind, EventTarget};
    pub use crate::physics::raycast::{RaycastOptions, RaycastResult};
    pub use crate::physics::{PhysicsConfig, RigidBodySystem};
    pub use glam::{Quat, Vec3};
}

pub use physics::engine::{EngineError, PhysicsEngine};
pub use physics::error::PhysicsError;
pub use physics::{PhysicsConfig, RigidBodySystem};

// Re-export glam and hecs for convenience
pub use glam;
pub use hecs;
