//! Reference rigid-body engine running on the CPU.
//!
//! Supports sphere and box shapes. Each fixed tick:
//!
//! 1. Gravity and accumulated forces update velocities
//! 2. Broadphase finds overlapping bounds, narrowphase builds contacts
//! 3. Sequential impulses resolve contacts, skipping trigger volumes
//! 4. Positions integrate, resting bodies fall asleep
//! 5. The tick's manifolds are reported to the caller

pub mod body;
pub mod broadphase;
pub mod narrowphase;
pub mod shape;
pub mod solver;

use glam::{Quat, Vec3};
use tracing::trace;

use crate::physics::engine::{
    groups, BodyDesc, BodyHandle, PhysicsEngine, RawBody, RawContactPoint, RawManifold, RawRayHit,
};

use self::body::CpuBody;
use self::broadphase::SweepAndPrune;
use self::solver::PairManifold;

/// Tuning for [`CpuEngine`].
#[derive(Debug, Clone)]
pub struct CpuEngineConfig {
    /// Number of solver iterations per step. Default: 8.
    pub solver_iterations: u32,
}

impl Default for CpuEngineConfig {
    fn default() -> Self {
        Self {
            solver_iterations: 8,
        }
    }
}

/// Single-threaded engine that owns its bodies in a slot vector.
#[derive(Debug)]
pub struct CpuEngine {
    config: CpuEngineConfig,
    gravity: Vec3,
    bodies: Vec<Option<CpuBody>>,
    free_slots: Vec<u32>,
    broadphase: SweepAndPrune,
    manifolds: Vec<PairManifold>,
    raw_manifolds: Vec<RawManifold>,
    accumulator: f32,
}

impl Default for CpuEngine {
    fn default() -> Self {
        Self::new(CpuEngineConfig::default())
    }
}

impl CpuEngine {
    pub fn new(config: CpuEngineConfig) -> Self {
        Self {
            config,
            gravity: Vec3::ZERO,
            bodies: Vec::new(),
            free_slots: Vec::new(),
            broadphase: SweepAndPrune::new(),
            manifolds: Vec::new(),
            raw_manifolds: Vec::new(),
            accumulator: 0.0,
        }
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&CpuBody> {
        self.bodies.get(handle.0 as usize).and_then(Option::as_ref)
    }

    fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut CpuBody> {
        self.bodies.get_mut(handle.0 as usize).and_then(Option::as_mut)
    }

    /// Number of live bodies.
    pub fn body_count(&self) -> usize {
        self.bodies.len() - self.free_slots.len()
    }

    /// Advance the simulation by exactly one fixed tick.
    fn tick(&mut self, dt: f32) {
        body::apply_gravity(self.bodies.iter_mut().flatten(), self.gravity);
        body::integrate_velocities(self.bodies.iter_mut().flatten(), dt);

        // Collision detection
        self.manifolds.clear();
        for (a, b) in self.broadphase.find_pairs(&self.bodies) {
            let (Some(body_a), Some(body_b)) = (&self.bodies[a], &self.bodies[b]) else {
                continue;
            };
            if let Some(info) = narrowphase::detect_collision(
                &body_a.shape,
                body_a.position,
                body_a.rotation,
                &body_b.shape,
                body_b.position,
                body_b.rotation,
            ) {
                self.manifolds.push(solver::manifold(a, b, info));
            }
        }

        solver::wake_touching(&self.manifolds, &mut self.bodies);
        solver::solve_contacts(
            &mut self.manifolds,
            &mut self.bodies,
            self.config.solver_iterations,
            dt,
        );

        body::integrate_positions(self.bodies.iter_mut().flatten(), dt);
        body::update_sleep_states(self.bodies.iter_mut().flatten(), dt);
        body::clear_forces(self.bodies.iter_mut().flatten());

        self.build_raw_manifolds();
        trace!(manifolds = self.raw_manifolds.len(), "cpu engine tick");
    }

    fn build_raw_manifolds(&mut self) {
        self.raw_manifolds.clear();
        for manifold in &self.manifolds {
            let (Some(a), Some(b)) = (&self.bodies[manifold.a], &self.bodies[manifold.b]) else {
                continue;
            };
            let points = manifold
                .contacts
                .iter()
                .map(|contact| {
                    let on_a = contact.info.point_on_a();
                    let on_b = contact.info.point_on_b();
                    RawContactPoint {
                        local_point_a: a.to_local(on_a),
                        local_point_b: b.to_local(on_b),
                        position_world_on_a: on_a,
                        position_world_on_b: on_b,
                        // Points from B toward A.
                        normal_world_on_b: -contact.info.normal,
                        applied_impulse: contact.normal_impulse,
                    }
                })
                .collect();
            self.raw_manifolds.push(RawManifold {
                body_a: raw_body(manifold.a, a),
                body_b: raw_body(manifold.b, b),
                points,
            });
        }
    }

    fn ray_hits(&self, from: Vec3, to: Vec3, group: u32, mask: u32) -> impl Iterator<Item = RawRayHit> + '_ {
        self.bodies
            .iter()
            .enumerate()
            .filter_map(move |(index, slot)| {
                let body = slot.as_ref()?;
                if !groups::interacts(group, mask, body.group, body.mask) {
                    return None;
                }
                let hit = shape::ray_cast(&body.shape, body.position, body.rotation, from, to)?;
                Some(RawRayHit {
                    handle: BodyHandle(index as u32),
                    user_data: body.user_data,
                    point: from.lerp(to, hit.fraction),
                    normal: hit.normal,
                    fraction: hit.fraction,
                })
            })
    }
}

fn raw_body(index: usize, body: &CpuBody) -> RawBody {
    RawBody {
        handle: BodyHandle(index as u32),
        user_data: body.user_data,
        flags: body.flags,
    }
}

impl PhysicsEngine for CpuEngine {
    fn gravity(&self) -> Vec3 {
        self.gravity
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    fn add_body(&mut self, desc: &BodyDesc) -> BodyHandle {
        let body = CpuBody::from_desc(desc);
        match self.free_slots.pop() {
            Some(slot) => {
                self.bodies[slot as usize] = Some(body);
                BodyHandle(slot)
            }
            None => {
                self.bodies.push(Some(body));
                BodyHandle(self.bodies.len() as u32 - 1)
            }
        }
    }

    fn remove_body(&mut self, handle: BodyHandle) {
        if let Some(slot) = self.bodies.get_mut(handle.0 as usize) {
            if slot.take().is_some() {
                self.free_slots.push(handle.0);
            }
        }
    }

    fn set_motion_state(&mut self, handle: BodyHandle, position: Vec3, rotation: Quat) -> bool {
        match self.body_mut(handle) {
            Some(body) => {
                body.position = position;
                body.rotation = rotation.normalize();
                true
            }
            None => false,
        }
    }

    fn motion_state(&self, handle: BodyHandle) -> Option<(Vec3, Quat)> {
        self.body(handle).map(|b| (b.position, b.rotation))
    }

    fn is_active(&self, handle: BodyHandle) -> bool {
        self.body(handle).is_some_and(CpuBody::is_active)
    }

    fn activate(&mut self, handle: BodyHandle) {
        if let Some(body) = self.body_mut(handle) {
            body.wake();
        }
    }

    fn apply_force(&mut self, handle: BodyHandle, force: Vec3, relative_point: Vec3) {
        if let Some(body) = self.body_mut(handle).filter(|b| b.is_dynamic()) {
            body.force_accumulator += force;
            body.torque_accumulator += relative_point.cross(force);
        }
    }

    fn apply_impulse(&mut self, handle: BodyHandle, impulse: Vec3, relative_point: Vec3) {
        if let Some(body) = self.body_mut(handle) {
            body.apply_impulse(impulse, relative_point);
        }
    }

    fn apply_torque(&mut self, handle: BodyHandle, torque: Vec3) {
        if let Some(body) = self.body_mut(handle).filter(|b| b.is_dynamic()) {
            body.torque_accumulator += torque;
        }
    }

    fn linear_velocity(&self, handle: BodyHandle) -> Option<Vec3> {
        self.body(handle).map(|b| b.linear_velocity)
    }

    fn set_linear_velocity(&mut self, handle: BodyHandle, velocity: Vec3) {
        if let Some(body) = self.body_mut(handle).filter(|b| b.is_dynamic()) {
            body.linear_velocity = velocity;
        }
    }

    fn step_simulation(
        &mut self,
        time_step: f32,
        max_sub_steps: u32,
        fixed_time_step: f32,
        on_tick: &mut dyn FnMut(&[RawManifold]),
    ) -> u32 {
        if fixed_time_step <= 0.0 {
            return 0;
        }
        self.accumulator += time_step;

        let mut steps = 0;
        while self.accumulator >= fixed_time_step && steps < max_sub_steps {
            self.tick(fixed_time_step);
            on_tick(&self.raw_manifolds);
            self.accumulator -= fixed_time_step;
            steps += 1;
        }

        // Clamp accumulator to prevent spiral of death
        if self.accumulator > fixed_time_step * max_sub_steps as f32 {
            self.accumulator = 0.0;
        }

        steps
    }

    fn ray_test_closest(&self, from: Vec3, to: Vec3, group: u32, mask: u32) -> Option<RawRayHit> {
        self.ray_hits(from, to, group, mask)
            .min_by(|a, b| a.fraction.total_cmp(&b.fraction))
    }

    fn ray_test_all(&self, from: Vec3, to: Vec3, group: u32, mask: u32) -> Vec<RawRayHit> {
        self.ray_hits(from, to, group, mask).collect()
    }
}
