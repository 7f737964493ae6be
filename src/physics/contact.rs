//! Pooled contact data handed to collision listeners.

use glam::Vec3;

use super::engine::RawContactPoint;
use super::pool::{Handle, Pool};

/// Initial pool sizes. Pools grow on demand.
const POINT_POOL_SIZE: usize = 1;
const RESULT_POOL_SIZE: usize = 1;
const SINGLE_RESULT_POOL_SIZE: usize = 1;

/// One contact point, seen from the entity receiving the event.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContactPoint {
    /// Contact position in the receiving body's local space.
    pub local_point: Vec3,
    /// Contact position in the other body's local space.
    pub local_point_other: Vec3,
    /// Contact position on the receiving body, world space.
    pub point: Vec3,
    /// Contact position on the other body, world space.
    pub point_other: Vec3,
    /// Contact normal in world space, pointing from the other body toward this one.
    pub normal: Vec3,
    /// Impulse applied by the solver at this point.
    pub impulse: f32,
}

impl ContactPoint {
    /// Overwrite every field from the engine's point, with body A as the local side.
    pub fn set_from_raw(&mut self, raw: &RawContactPoint) {
        self.local_point = raw.local_point_a;
        self.local_point_other = raw.local_point_b;
        self.point = raw.position_world_on_a;
        self.point_other = raw.position_world_on_b;
        self.normal = raw.normal_world_on_b;
        self.impulse = raw.applied_impulse;
    }

    /// Overwrite every field from the engine's point, with body B as the local side.
    pub fn set_from_raw_reversed(&mut self, raw: &RawContactPoint) {
        self.local_point = raw.local_point_b;
        self.local_point_other = raw.local_point_a;
        self.point = raw.position_world_on_b;
        self.point_other = raw.position_world_on_a;
        self.normal = -raw.normal_world_on_b;
        self.impulse = raw.applied_impulse;
    }
}

/// All contact points between one entity and `other` for the current tick.
///
/// Points are stored as handles into the point pool, in engine order.
#[derive(Debug, Clone)]
pub struct ContactResult {
    pub other: Option<hecs::Entity>,
    pub contacts: Vec<Handle<ContactPoint>>,
}

impl Default for ContactResult {
    fn default() -> Self {
        Self {
            other: None,
            contacts: Vec::new(),
        }
    }
}

/// Payload of the global contact event: one raw contact between `a` and `b`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleContactResult {
    pub a: Option<hecs::Entity>,
    pub b: Option<hecs::Entity>,
    /// The contact with `a` as the local side.
    pub contact: ContactPoint,
}

/// The three pools the dispatcher draws from during a tick.
#[derive(Debug)]
pub struct ContactPools {
    pub points: Pool<ContactPoint>,
    pub results: Pool<ContactResult>,
    pub single_results: Pool<SingleContactResult>,
}

impl ContactPools {
    pub fn new() -> Self {
        Self {
            points: Pool::new(POINT_POOL_SIZE, ContactPoint::default),
            results: Pool::new(RESULT_POOL_SIZE, ContactResult::default),
            single_results: Pool::new(SINGLE_RESULT_POOL_SIZE, SingleContactResult::default),
        }
    }

    /// Take a result from the pool and reset the fields the dispatcher relies on.
    pub fn allocate_result(&mut self, other: hecs::Entity) -> Handle<ContactResult> {
        let handle = self.results.allocate();
        let result = &mut self.results[handle];
        result.other = Some(other);
        result.contacts.clear();
        handle
    }

    pub fn free_all(&mut self) {
        self.points.free_all();
        self.results.free_all();
        self.single_results.free_all();
    }
}

impl Default for ContactPools {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrowed view of a pooled [`ContactResult`], valid for one event call.
#[derive(Clone, Copy)]
pub struct ContactView<'a> {
    other: hecs::Entity,
    result: &'a ContactResult,
    points: &'a Pool<ContactPoint>,
}

impl<'a> ContactView<'a> {
    pub(crate) fn new(
        other: hecs::Entity,
        result: &'a ContactResult,
        points: &'a Pool<ContactPoint>,
    ) -> Self {
        Self {
            other,
            result,
            points,
        }
    }

    /// The entity on the other side of the contact.
    pub fn other(&self) -> hecs::Entity {
        self.other
    }

    pub fn len(&self) -> usize {
        self.result.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.result.contacts.is_empty()
    }

    /// Contact points in engine order.
    pub fn contacts(&self) -> impl Iterator<Item = &'a ContactPoint> + 'a {
        let (result, points) = (self.result, self.points);
        result.contacts.iter().map(move |h| &points[*h])
    }
}

impl std::fmt::Debug for ContactView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactView")
            .field("other", &self.other)
            .field("contacts", &self.contacts().collect::<Vec<_>>())
            .finish()
    }
}
