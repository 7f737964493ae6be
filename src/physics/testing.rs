//! Engine double that plays back a script of touching pairs.

use std::collections::VecDeque;

use glam::{Quat, Vec3};

use super::engine::{
    BodyDesc, BodyHandle, PhysicsEngine, RawBody, RawContactPoint, RawManifold, RawRayHit,
};

#[derive(Debug)]
pub(crate) struct ScriptedBody {
    pub desc: BodyDesc,
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub active: bool,
}

/// Bodies never move on their own. Each fixed tick pops one entry of the
/// script and reports a single-point manifold for every pair in it.
#[derive(Debug)]
pub(crate) struct ScriptedEngine {
    gravity: Vec3,
    pub gravity_sets: usize,
    bodies: Vec<Option<ScriptedBody>>,
    script: VecDeque<Vec<(hecs::Entity, hecs::Entity)>>,
    accumulator: f32,
    pub ray_hits: Vec<RawRayHit>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            gravity_sets: 0,
            bodies: Vec::new(),
            script: VecDeque::new(),
            accumulator: 0.0,
            ray_hits: Vec::new(),
        }
    }

    /// Queue the pairs that touch during the next unscripted tick.
    pub fn push_tick(&mut self, pairs: &[(hecs::Entity, hecs::Entity)]) {
        self.script.push_back(pairs.to_vec());
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&ScriptedBody> {
        self.bodies.get(handle.0 as usize).and_then(Option::as_ref)
    }

    fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut ScriptedBody> {
        self.bodies.get_mut(handle.0 as usize).and_then(Option::as_mut)
    }

    pub fn live_bodies(&self) -> usize {
        self.bodies.iter().flatten().count()
    }

    pub fn set_active(&mut self, handle: BodyHandle, active: bool) {
        if let Some(body) = self.body_mut(handle) {
            body.active = active;
        }
    }

    fn raw_body(&self, entity: hecs::Entity) -> Option<RawBody> {
        let bits = entity.to_bits().get();
        self.bodies.iter().enumerate().find_map(|(i, slot)| {
            let body = slot.as_ref()?;
            (body.desc.user_data == Some(bits)).then(|| RawBody {
                handle: BodyHandle(i as u32),
                user_data: body.desc.user_data,
                flags: body.desc.flags,
            })
        })
    }

    fn manifolds(&self, pairs: &[(hecs::Entity, hecs::Entity)]) -> Vec<RawManifold> {
        pairs
            .iter()
            .filter_map(|(a, b)| {
                Some(RawManifold {
                    body_a: self.raw_body(*a)?,
                    body_b: self.raw_body(*b)?,
                    points: vec![RawContactPoint {
                        normal_world_on_b: Vec3::Y,
                        applied_impulse: 1.0,
                        ..Default::default()
                    }],
                })
            })
            .collect()
    }
}

impl PhysicsEngine for ScriptedEngine {
    fn gravity(&self) -> Vec3 {
        self.gravity
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
        self.gravity_sets += 1;
    }

    fn add_body(&mut self, desc: &BodyDesc) -> BodyHandle {
        self.bodies.push(Some(ScriptedBody {
            desc: desc.clone(),
            position: desc.position,
            rotation: desc.rotation,
            velocity: Vec3::ZERO,
            active: true,
        }));
        BodyHandle(self.bodies.len() as u32 - 1)
    }

    fn remove_body(&mut self, handle: BodyHandle) {
        if let Some(slot) = self.bodies.get_mut(handle.0 as usize) {
            *slot = None;
        }
    }

    fn set_motion_state(&mut self, handle: BodyHandle, position: Vec3, rotation: Quat) -> bool {
        match self.body_mut(handle) {
            Some(body) => {
                body.position = position;
                body.rotation = rotation;
                true
            }
            None => false,
        }
    }

    fn motion_state(&self, handle: BodyHandle) -> Option<(Vec3, Quat)> {
        self.body(handle).map(|b| (b.position, b.rotation))
    }

    fn is_active(&self, handle: BodyHandle) -> bool {
        self.body(handle).is_some_and(|b| b.active)
    }

    fn activate(&mut self, handle: BodyHandle) {
        self.set_active(handle, true);
    }

    fn apply_force(&mut self, _handle: BodyHandle, _force: Vec3, _relative_point: Vec3) {}

    fn apply_impulse(&mut self, handle: BodyHandle, impulse: Vec3, _relative_point: Vec3) {
        if let Some(body) = self.body_mut(handle) {
            if body.desc.mass > 0.0 {
                body.velocity += impulse / body.desc.mass;
            }
        }
    }

    fn apply_torque(&mut self, _handle: BodyHandle, _torque: Vec3) {}

    fn linear_velocity(&self, handle: BodyHandle) -> Option<Vec3> {
        self.body(handle).map(|b| b.velocity)
    }

    fn set_linear_velocity(&mut self, handle: BodyHandle, velocity: Vec3) {
        if let Some(body) = self.body_mut(handle) {
            body.velocity = velocity;
        }
    }

    fn step_simulation(
        &mut self,
        time_step: f32,
        max_sub_steps: u32,
        fixed_time_step: f32,
        on_tick: &mut dyn FnMut(&[RawManifold]),
    ) -> u32 {
        self.accumulator += time_step;
        let mut steps = 0;
        while self.accumulator >= fixed_time_step && steps < max_sub_steps {
            self.accumulator -= fixed_time_step;
            let pairs = self.script.pop_front().unwrap_or_default();
            let manifolds = self.manifolds(&pairs);
            on_tick(&manifolds);
            steps += 1;
        }
        if steps == max_sub_steps {
            self.accumulator = 0.0;
        }
        steps
    }

    fn ray_test_closest(&self, from: Vec3, to: Vec3, group: u32, mask: u32) -> Option<RawRayHit> {
        self.ray_test_all(from, to, group, mask)
            .into_iter()
            .min_by(|a, b| a.fraction.total_cmp(&b.fraction))
    }

    fn ray_test_all(&self, _from: Vec3, _to: Vec3, _group: u32, mask: u32) -> Vec<RawRayHit> {
        self.ray_hits
            .iter()
            .filter(|hit| {
                self.body(hit.handle)
                    .is_some_and(|b| b.desc.group & mask != 0)
            })
            .copied()
            .collect()
    }
}
