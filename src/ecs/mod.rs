//! Entity Component System integration with hecs.

pub mod components;
pub mod systems;

pub mod prelude {
    pub use super::components::*;
    pub use super::systems::{resolve_world_pose, set_world_pose, transform_system, world_pose};
}
