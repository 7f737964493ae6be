//! Collision and trigger events delivered to entities.

use crate::ecs::components::events::CollisionHandlers;

use super::contact::ContactView;

/// The event kinds an entity can listen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionEventKind {
    /// Every tick a solid pair touches.
    Contact,
    /// First tick a solid pair touches.
    CollisionStart,
    /// First tick a solid pair no longer touches.
    CollisionEnd,
    /// First tick a trigger pair overlaps.
    TriggerEnter,
    /// First tick a trigger pair no longer overlaps.
    TriggerLeave,
}

impl CollisionEventKind {
    pub const SOLID: [CollisionEventKind; 3] = [
        CollisionEventKind::Contact,
        CollisionEventKind::CollisionStart,
        CollisionEventKind::CollisionEnd,
    ];

    pub const TRIGGER: [CollisionEventKind; 2] = [
        CollisionEventKind::TriggerEnter,
        CollisionEventKind::TriggerLeave,
    ];
}

/// An event fired on one entity, naming the entity on the other side.
#[derive(Debug, Clone, Copy)]
pub enum CollisionEvent<'a> {
    Contact(ContactView<'a>),
    CollisionStart(ContactView<'a>),
    CollisionEnd { other: hecs::Entity },
    TriggerEnter { other: hecs::Entity },
    TriggerLeave { other: hecs::Entity },
}

impl CollisionEvent<'_> {
    pub fn kind(&self) -> CollisionEventKind {
        match self {
            CollisionEvent::Contact(_) => CollisionEventKind::Contact,
            CollisionEvent::CollisionStart(_) => CollisionEventKind::CollisionStart,
            CollisionEvent::CollisionEnd { .. } => CollisionEventKind::CollisionEnd,
            CollisionEvent::TriggerEnter { .. } => CollisionEventKind::TriggerEnter,
            CollisionEvent::TriggerLeave { .. } => CollisionEventKind::TriggerLeave,
        }
    }

    pub fn other(&self) -> hecs::Entity {
        match self {
            CollisionEvent::Contact(view) | CollisionEvent::CollisionStart(view) => view.other(),
            CollisionEvent::CollisionEnd { other }
            | CollisionEvent::TriggerEnter { other }
            | CollisionEvent::TriggerLeave { other } => *other,
        }
    }
}

/// Whatever owns the listeners for collision events.
pub trait EventTarget {
    /// Whether `entity` has at least one listener for `kind`.
    fn has_listener(&self, entity: hecs::Entity, kind: CollisionEventKind) -> bool;

    /// Deliver `event` to `entity`. Unknown entities are ignored.
    fn fire(&mut self, entity: hecs::Entity, event: &CollisionEvent<'_>);

    fn has_any_listener(&self, entity: hecs::Entity, kinds: &[CollisionEventKind]) -> bool {
        kinds.iter().any(|kind| self.has_listener(entity, *kind))
    }
}

impl EventTarget for hecs::World {
    fn has_listener(&self, entity: hecs::Entity, kind: CollisionEventKind) -> bool {
        self.get::<&CollisionHandlers>(entity)
            .map(|handlers| handlers.has_listener(kind))
            .unwrap_or(false)
    }

    fn fire(&mut self, entity: hecs::Entity, event: &CollisionEvent<'_>) {
        if let Ok(mut handlers) = self.get::<&mut CollisionHandlers>(entity) {
            handlers.fire(event);
        }
    }
}
