//! ECS components (transform, physics, collision listeners).

pub mod events;
pub mod physics;
pub mod transform;

pub use events::*;
pub use physics::*;
pub use transform::*;
