//! ECS systems (transform propagation and pose setters).

pub mod transform;

pub use transform::{resolve_world_pose, set_world_pose, transform_system, world_pose};
