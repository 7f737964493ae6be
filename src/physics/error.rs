//! Errors surfaced by the rigid-body system's public operations.

/// Failure of an operation that targets a single body.
#[derive(Debug, thiserror::Error)]
pub enum PhysicsError {
    #[error("physics engine is not running")]
    EngineUnavailable,
    #[error("entity {0:?} has no rigid body in the simulation")]
    NoBody(hecs::Entity),
}

pub type Result<T, E = PhysicsError> = std::result::Result<T, E>;
