//! Begin/end bookkeeping for touching pairs.
//!
//! The persistent map remembers who was touching whom as of the last tick; the
//! frame map is rebuilt every tick. Diffing the two after a tick yields the
//! pairs that separated.

use std::collections::HashMap;

/// How a pair was classified when it was first stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairKind {
    /// Both bodies respond to collisions.
    Solid,
    /// At least one body is a trigger volume.
    Trigger,
}

/// The bodies currently believed to touch `entity`.
#[derive(Debug, Clone)]
pub struct CollisionRecord {
    pub entity: hecs::Entity,
    pub others: Vec<(hecs::Entity, PairKind)>,
}

impl CollisionRecord {
    fn new(entity: hecs::Entity) -> Self {
        Self {
            entity,
            others: Vec::new(),
        }
    }

    pub fn contains(&self, other: hecs::Entity) -> bool {
        self.others.iter().any(|(e, _)| *e == other)
    }
}

/// Persistent and per-tick collision maps keyed by entity.
#[derive(Debug, Default)]
pub struct CollisionTracker {
    persistent: HashMap<hecs::Entity, CollisionRecord>,
    frame: HashMap<hecs::Entity, CollisionRecord>,
}

impl CollisionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new tick: forget who touched whom during the previous one.
    pub fn begin_tick(&mut self) {
        self.frame.clear();
    }

    /// Record that `entity` touches `other` this tick.
    ///
    /// Returns `true` if the pair was not already touching, i.e. a start or
    /// enter event is due. Calling it again for the same pair within a tick
    /// returns `false`.
    pub fn store_collision(
        &mut self,
        entity: hecs::Entity,
        other: hecs::Entity,
        kind: PairKind,
    ) -> bool {
        let record = self
            .persistent
            .entry(entity)
            .or_insert_with(|| CollisionRecord::new(entity));
        let is_new = !record.contains(other);
        if is_new {
            record.others.push((other, kind));
        }

        let frame = self
            .frame
            .entry(entity)
            .or_insert_with(|| CollisionRecord::new(entity));
        frame.others.push((other, kind));

        is_new
    }

    /// Drop every remembered pair that did not touch this tick.
    ///
    /// `on_end(entity, other, kind)` runs once per dropped pair. Records left
    /// with no pairs are deleted.
    pub fn clean_old_collisions<F>(&mut self, mut on_end: F)
    where
        F: FnMut(hecs::Entity, hecs::Entity, PairKind),
    {
        let frame = &self.frame;
        self.persistent.retain(|entity, record| {
            let frame_record = frame.get(entity);
            record.others.retain(|(other, kind)| {
                let touching = frame_record.is_some_and(|f| f.contains(*other));
                if !touching {
                    on_end(*entity, *other, *kind);
                }
                touching
            });
            !record.others.is_empty()
        });
    }

    /// Whether `entity` is remembered as touching `other`.
    pub fn is_touching(&self, entity: hecs::Entity, other: hecs::Entity) -> bool {
        self.persistent
            .get(&entity)
            .is_some_and(|record| record.contains(other))
    }

    pub fn record(&self, entity: hecs::Entity) -> Option<&CollisionRecord> {
        self.persistent.get(&entity)
    }

    /// Number of entities with at least one remembered pair.
    pub fn len(&self) -> usize {
        self.persistent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persistent.is_empty()
    }

    /// Forget everything, firing nothing.
    pub fn clear(&mut self) {
        self.persistent.clear();
        self.frame.clear();
    }
}
