//! Turns the engine's contact manifolds into per-entity collision events.

use tracing::trace;

use super::contact::{ContactPools, ContactResult, ContactView, SingleContactResult};
use super::engine::{RawBody, RawManifold};
use super::events::{CollisionEvent, CollisionEventKind, EventTarget};
use super::pool::Handle;
use super::tracker::{CollisionTracker, PairKind};

/// Listener for the global contact event, fired once per raw contact point.
pub type GlobalContactListener = Box<dyn FnMut(&SingleContactResult)>;

/// Interprets manifolds for one tick and fires begin/persist/end events.
#[derive(Default)]
pub struct CollisionDispatcher {
    tracker: CollisionTracker,
    global_contact: Option<GlobalContactListener>,
}

fn owner(body: &RawBody) -> Option<hecs::Entity> {
    body.user_data.and_then(hecs::Entity::from_bits)
}

impl CollisionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_global_contact_listener(&mut self, listener: Option<GlobalContactListener>) {
        self.global_contact = listener;
    }

    pub fn has_global_contact_listener(&self) -> bool {
        self.global_contact.is_some()
    }

    pub fn tracker(&self) -> &CollisionTracker {
        &self.tracker
    }

    /// Forget every tracked pair without firing end events.
    pub fn reset(&mut self) {
        self.tracker.clear();
    }

    /// Process every manifold of one engine tick.
    ///
    /// Pairs that touched during the previous tick but are missing from
    /// `manifolds` receive their end events before this returns, and the
    /// contact pools are rewound.
    pub fn check_for_collisions<T: EventTarget + ?Sized>(
        &mut self,
        manifolds: &[RawManifold],
        pools: &mut ContactPools,
        target: &mut T,
    ) {
        self.tracker.begin_tick();

        for manifold in manifolds {
            let (Some(e0), Some(e1)) = (owner(&manifold.body_a), owner(&manifold.body_b)) else {
                trace!("skipping manifold without owning entities");
                continue;
            };
            if manifold.points.is_empty() {
                continue;
            }

            let (trigger_a, trigger_b) =
                (manifold.body_a.is_no_response(), manifold.body_b.is_no_response());
            if trigger_a && trigger_b {
                // Trigger volumes only report bodies that respond.
                trace!("skipping overlap between two triggers");
                continue;
            }
            if trigger_a || trigger_b {
                self.process_trigger(e0, e1, target);
            } else {
                self.process_contact(e0, e1, manifold, pools, target);
            }
        }

        self.tracker.clean_old_collisions(|entity, other, kind| {
            let event = match kind {
                PairKind::Trigger => CollisionEvent::TriggerLeave { other },
                PairKind::Solid => CollisionEvent::CollisionEnd { other },
            };
            target.fire(entity, &event);
        });

        pools.free_all();
    }

    fn process_trigger<T: EventTarget + ?Sized>(
        &mut self,
        e0: hecs::Entity,
        e1: hecs::Entity,
        target: &mut T,
    ) {
        for (entity, other) in [(e0, e1), (e1, e0)] {
            if !target.has_any_listener(entity, &CollisionEventKind::TRIGGER) {
                continue;
            }
            if self.tracker.store_collision(entity, other, PairKind::Trigger) {
                target.fire(entity, &CollisionEvent::TriggerEnter { other });
            }
        }
    }

    fn process_contact<T: EventTarget + ?Sized>(
        &mut self,
        e0: hecs::Entity,
        e1: hecs::Entity,
        manifold: &RawManifold,
        pools: &mut ContactPools,
        target: &mut T,
    ) {
        let e0_events = target.has_any_listener(e0, &CollisionEventKind::SOLID);
        let e1_events = target.has_any_listener(e1, &CollisionEventKind::SOLID);
        let global_events = self.global_contact.is_some();

        if !(e0_events || e1_events || global_events) {
            return;
        }

        let result0 = e0_events.then(|| pools.allocate_result(e1));
        let result1 = e1_events.then(|| pools.allocate_result(e0));

        for raw in &manifold.points {
            if e0_events || global_events {
                let point = pools.points.allocate();
                pools.points[point].set_from_raw(raw);
                if let Some(r) = result0 {
                    pools.results[r].contacts.push(point);
                }

                if let Some(listener) = self.global_contact.as_mut() {
                    let single = pools.single_results.allocate();
                    let slot = &mut pools.single_results[single];
                    slot.a = Some(e0);
                    slot.b = Some(e1);
                    slot.contact = pools.points[point];
                    listener(&pools.single_results[single]);
                }
            }

            if let Some(r) = result1 {
                let point = pools.points.allocate();
                pools.points[point].set_from_raw_reversed(raw);
                pools.results[r].contacts.push(point);
            }
        }

        if let Some(r) = result0 {
            self.fire_contact(e0, e1, r, pools, target);
        }
        if let Some(r) = result1 {
            self.fire_contact(e1, e0, r, pools, target);
        }
    }

    fn fire_contact<T: EventTarget + ?Sized>(
        &mut self,
        entity: hecs::Entity,
        other: hecs::Entity,
        result: Handle<ContactResult>,
        pools: &ContactPools,
        target: &mut T,
    ) {
        let is_new = self.tracker.store_collision(entity, other, PairKind::Solid);
        let view = ContactView::new(other, &pools.results[result], &pools.points);
        if is_new {
            target.fire(entity, &CollisionEvent::CollisionStart(view));
        }
        target.fire(entity, &CollisionEvent::Contact(view));
    }
}

impl std::fmt::Debug for CollisionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollisionDispatcher")
            .field("tracker", &self.tracker)
            .field("global_contact", &self.global_contact.is_some())
            .finish()
    }
}
