//! Physics components for ECS entities.

use glam::{Quat, Vec3};

use crate::physics::engine::groups;

/// Rigid body type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigidBodyType {
    /// Affected by forces and collisions.
    Dynamic,
    /// Immovable.
    Static,
    /// Position controlled by the entity transform, but affects dynamic bodies.
    Kinematic,
}

/// Rigid body component.
///
/// The simulation owns a matching engine body while `enabled` is true and the
/// entity also carries a [`Collider`].
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub body_type: RigidBodyType,
    /// Ignored unless `body_type` is `Dynamic`.
    pub mass: f32,
    /// Linear damping factor (default: 0.0).
    pub linear_damping: f32,
    /// Angular damping factor (default: 0.0).
    pub angular_damping: f32,
    /// Friction coefficient (default: 0.5).
    pub friction: f32,
    /// Coefficient of restitution (default: 0.0).
    pub restitution: f32,
    /// Rolling friction coefficient (default: 0.0).
    pub rolling_friction: f32,
    /// Collision group bits this body belongs to.
    pub group: u32,
    /// Collision group bits this body collides with.
    pub mask: u32,
    pub enabled: bool,
}

impl RigidBody {
    fn with_type(body_type: RigidBodyType, mass: f32) -> Self {
        let (group, mask) = groups::defaults_for(body_type);
        Self {
            body_type,
            mass,
            linear_damping: 0.0,
            angular_damping: 0.0,
            friction: 0.5,
            restitution: 0.0,
            rolling_friction: 0.0,
            group,
            mask,
            enabled: true,
        }
    }

    /// Create a new dynamic rigid body with the given mass.
    pub fn new_dynamic(mass: f32) -> Self {
        Self::with_type(RigidBodyType::Dynamic, mass)
    }

    /// Create a new static rigid body.
    pub fn new_static() -> Self {
        Self::with_type(RigidBodyType::Static, 0.0)
    }

    /// Create a new kinematic rigid body.
    pub fn new_kinematic() -> Self {
        Self::with_type(RigidBodyType::Kinematic, 0.0)
    }

    /// Mass handed to the engine. Zero means infinite.
    ///
    /// Static and kinematic bodies are always infinite; a dynamic body with a
    /// non-positive or non-finite mass is clamped to infinite as well.
    pub fn effective_mass(&self) -> f32 {
        match self.body_type {
            RigidBodyType::Dynamic if self.mass.is_finite() && self.mass > 0.0 => self.mass,
            _ => 0.0,
        }
    }
}

/// Collider shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ColliderShape {
    Sphere { radius: f32 },
    Box { half_extents: Vec3 },
}

/// Collision shape component.
#[derive(Debug, Clone)]
pub struct Collider {
    pub shape: ColliderShape,
    /// Linear offset of the shape from the entity's origin.
    pub offset: Vec3,
    /// Angular offset of the shape relative to the entity's rotation.
    pub offset_rotation: Quat,
    /// If true, generates trigger events but no physics response.
    pub is_trigger: bool,
    /// A disabled collider has no engine body, with or without a `RigidBody`.
    pub enabled: bool,
}

impl Collider {
    pub fn sphere(radius: f32) -> Self {
        Self {
            shape: ColliderShape::Sphere { radius },
            ..Self::default()
        }
    }

    pub fn cuboid(half_extents: Vec3) -> Self {
        Self {
            shape: ColliderShape::Box { half_extents },
            ..Self::default()
        }
    }

    /// Turn this collider into a trigger volume.
    pub fn trigger(mut self) -> Self {
        self.is_trigger = true;
        self
    }
}

impl Default for Collider {
    fn default() -> Self {
        Self {
            shape: ColliderShape::Sphere { radius: 0.5 },
            offset: Vec3::ZERO,
            offset_rotation: Quat::IDENTITY,
            is_trigger: false,
            enabled: true,
        }
    }
}

/// Free-form labels used to filter raycasts.
#[derive(Debug, Clone, Default)]
pub struct Tags(pub Vec<String>);

impl Tags {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tags.into_iter().map(Into::into).collect())
    }

    pub fn has(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    /// True if any of `tags` is present.
    pub fn has_any(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| self.has(t))
    }
}
