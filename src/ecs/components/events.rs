//! Per-entity collision listeners.

use crate::physics::events::{CollisionEvent, CollisionEventKind};

type Handler = Box<dyn FnMut(&CollisionEvent<'_>) + Send + Sync>;

/// Collision and trigger listeners attached to an entity.
///
/// Handlers run synchronously from inside the physics step and receive pooled
/// contact data that is only valid for the duration of the call.
#[derive(Default)]
pub struct CollisionHandlers {
    handlers: Vec<(CollisionEventKind, Handler)>,
}

impl CollisionHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `kind`.
    pub fn on<F>(&mut self, kind: CollisionEventKind, handler: F) -> &mut Self
    where
        F: FnMut(&CollisionEvent<'_>) + Send + Sync + 'static,
    {
        self.handlers.push((kind, Box::new(handler)));
        self
    }

    /// Builder form of [`on`](Self::on).
    pub fn with<F>(mut self, kind: CollisionEventKind, handler: F) -> Self
    where
        F: FnMut(&CollisionEvent<'_>) + Send + Sync + 'static,
    {
        self.on(kind, handler);
        self
    }

    /// Remove every handler registered for `kind`.
    pub fn off(&mut self, kind: CollisionEventKind) {
        self.handlers.retain(|(k, _)| *k != kind);
    }

    pub fn has_listener(&self, kind: CollisionEventKind) -> bool {
        self.handlers.iter().any(|(k, _)| *k == kind)
    }

    /// Invoke every handler registered for the event's kind.
    pub fn fire(&mut self, event: &CollisionEvent<'_>) {
        let kind = event.kind();
        for (_, handler) in self.handlers.iter_mut().filter(|(k, _)| *k == kind) {
            handler(event);
        }
    }
}

impl std::fmt::Debug for CollisionHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<_> = self.handlers.iter().map(|(k, _)| *k).collect();
        f.debug_struct("CollisionHandlers")
            .field("kinds", &kinds)
            .finish()
    }
}
