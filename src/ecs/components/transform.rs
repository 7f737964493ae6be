//! Transform components for ECS entities.
//!
//! Rigid bodies only read and write a pose (position + rotation). Scale stays
//! on the local `Transform` and never reaches the physics engine.

use glam::{Mat4, Quat, Vec3};

/// Local-space transform, relative to the `Parent` if there is one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub fn identity() -> Self {
        Self::from_position(Vec3::ZERO)
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// translation * rotation * scale
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// World-space matrix. Refreshed by `transform_system` and `set_world_pose`.
#[derive(Debug, Clone, Copy)]
pub struct GlobalTransform(pub Mat4);

impl GlobalTransform {
    /// Unscaled world matrix for a pose.
    pub fn from_pose(position: Vec3, rotation: Quat) -> Self {
        Self(Mat4::from_rotation_translation(rotation, position))
    }

    pub fn position(&self) -> Vec3 {
        self.0.w_axis.truncate()
    }

    /// World rotation with any scale stripped out.
    pub fn rotation(&self) -> Quat {
        let (_, rotation, _) = self.0.to_scale_rotation_translation();
        rotation.normalize()
    }

    pub fn pose(&self) -> (Vec3, Quat) {
        (self.position(), self.rotation())
    }
}

impl Default for GlobalTransform {
    fn default() -> Self {
        Self(Mat4::IDENTITY)
    }
}

/// Reference to a parent entity.
pub struct Parent(pub hecs::Entity);

/// List of child entities.
pub struct Children(pub Vec<hecs::Entity>);
