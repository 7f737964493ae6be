//! Body storage and integration for the CPU engine.

use glam::{Mat3, Quat, Vec3};

use crate::ecs::components::physics::ColliderShape;
use crate::physics::engine::{flags, BodyDesc};

use super::shape;

/// Linear velocity threshold for sleep eligibility.
const LINEAR_SLEEP_THRESHOLD: f32 = 0.1;
/// Angular velocity threshold for sleep eligibility.
const ANGULAR_SLEEP_THRESHOLD: f32 = 0.05;
/// Time in seconds a body must be below thresholds before sleeping.
const SLEEP_TIME: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepState {
    Awake,
    Sleeping,
}

/// A body owned by [`super::CpuEngine`].
#[derive(Debug, Clone)]
pub struct CpuBody {
    pub shape: ColliderShape,
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub force_accumulator: Vec3,
    pub torque_accumulator: Vec3,
    /// Zero for static and kinematic bodies.
    pub inv_mass: f32,
    pub inv_inertia_local: Vec3,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub friction: f32,
    pub restitution: f32,
    pub rolling_friction: f32,
    pub group: u32,
    pub mask: u32,
    pub flags: u32,
    pub user_data: Option<u64>,
    pub sleep: SleepState,
    pub sleep_timer: f32,
    /// Kinematic position at the previous tick, used to derive its velocity.
    previous_position: Vec3,
}

impl CpuBody {
    pub fn from_desc(desc: &BodyDesc) -> Self {
        let dynamic = desc.flags & (flags::STATIC_OBJECT | flags::KINEMATIC_OBJECT) == 0;
        let (inv_mass, inv_inertia_local) = if dynamic && desc.mass > 0.0 {
            let inertia = shape::local_inertia(&desc.shape, desc.mass);
            let inv = Vec3::select(inertia.cmpgt(Vec3::ZERO), inertia.recip(), Vec3::ZERO);
            (1.0 / desc.mass, inv)
        } else {
            (0.0, Vec3::ZERO)
        };

        Self {
            shape: desc.shape.clone(),
            position: desc.position,
            rotation: desc.rotation.normalize(),
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            force_accumulator: Vec3::ZERO,
            torque_accumulator: Vec3::ZERO,
            inv_mass,
            inv_inertia_local,
            linear_damping: desc.linear_damping,
            angular_damping: desc.angular_damping,
            friction: desc.friction,
            restitution: desc.restitution,
            rolling_friction: desc.rolling_friction,
            group: desc.group,
            mask: desc.mask,
            flags: desc.flags,
            user_data: desc.user_data,
            sleep: SleepState::Awake,
            sleep_timer: 0.0,
            previous_position: desc.position,
        }
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.flags & flags::STATIC_OBJECT != 0
    }

    #[inline]
    pub fn is_kinematic(&self) -> bool {
        self.flags & flags::KINEMATIC_OBJECT != 0
    }

    /// Moves under forces and contacts.
    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.inv_mass > 0.0
    }

    #[inline]
    pub fn is_no_response(&self) -> bool {
        self.flags & flags::NORESPONSE_OBJECT != 0
    }

    /// Static bodies are never active; kinematic bodies always are.
    pub fn is_active(&self) -> bool {
        if self.is_static() {
            false
        } else if self.is_kinematic() {
            true
        } else {
            self.sleep == SleepState::Awake
        }
    }

    pub fn wake(&mut self) {
        self.sleep = SleepState::Awake;
        self.sleep_timer = 0.0;
    }

    /// Inverse inertia tensor in world space.
    pub fn inv_inertia_world(&self) -> Mat3 {
        let r = Mat3::from_quat(self.rotation);
        r * Mat3::from_diagonal(self.inv_inertia_local) * r.transpose()
    }

    /// Apply an impulse at `relative_point` from the center of mass.
    pub fn apply_impulse(&mut self, impulse: Vec3, relative_point: Vec3) {
        if !self.is_dynamic() {
            return;
        }
        self.linear_velocity += impulse * self.inv_mass;
        self.angular_velocity += self.inv_inertia_world() * relative_point.cross(impulse);
    }

    /// Velocity of the material point at `relative_point`.
    #[inline]
    pub fn velocity_at(&self, relative_point: Vec3) -> Vec3 {
        self.linear_velocity + self.angular_velocity.cross(relative_point)
    }

    /// Body-local coordinates of a world-space point.
    pub fn to_local(&self, point: Vec3) -> Vec3 {
        self.rotation.inverse() * (point - self.position)
    }
}

/// Accumulate gravity on awake dynamic bodies.
pub fn apply_gravity<'a>(bodies: impl Iterator<Item = &'a mut CpuBody>, gravity: Vec3) {
    for body in bodies {
        if body.is_dynamic() && body.sleep == SleepState::Awake {
            body.force_accumulator += gravity / body.inv_mass;
        }
    }
}

/// Integrate velocities using semi-implicit Euler: v += (F/m) * dt.
///
/// Kinematic bodies take the velocity implied by how far they were moved
/// since the last tick.
pub fn integrate_velocities<'a>(bodies: impl Iterator<Item = &'a mut CpuBody>, dt: f32) {
    for body in bodies {
        if body.is_kinematic() {
            body.linear_velocity = (body.position - body.previous_position) / dt;
            body.previous_position = body.position;
            continue;
        }
        if !body.is_dynamic() || body.sleep == SleepState::Sleeping {
            continue;
        }

        body.linear_velocity += body.force_accumulator * body.inv_mass * dt;
        body.angular_velocity += body.inv_inertia_world() * body.torque_accumulator * dt;

        // Damping is a fraction of velocity lost per second.
        body.linear_velocity *= (1.0 - body.linear_damping).clamp(0.0, 1.0).powf(dt);
        body.angular_velocity *= (1.0 - body.angular_damping).clamp(0.0, 1.0).powf(dt);
    }
}

/// Integrate positions: p += v * dt, q += 0.5 * omega * q * dt.
pub fn integrate_positions<'a>(bodies: impl Iterator<Item = &'a mut CpuBody>, dt: f32) {
    for body in bodies {
        if !body.is_dynamic() || body.sleep == SleepState::Sleeping {
            continue;
        }

        body.position += body.linear_velocity * dt;

        let omega = body.angular_velocity;
        if omega.length_squared() > 1e-10 {
            let omega_quat = Quat::from_xyzw(omega.x, omega.y, omega.z, 0.0);
            let q_dot = omega_quat * body.rotation * 0.5;
            body.rotation = Quat::from_xyzw(
                body.rotation.x + q_dot.x * dt,
                body.rotation.y + q_dot.y * dt,
                body.rotation.z + q_dot.z * dt,
                body.rotation.w + q_dot.w * dt,
            )
            .normalize();
        }
    }
}

/// Clear force and torque accumulators.
pub fn clear_forces<'a>(bodies: impl Iterator<Item = &'a mut CpuBody>) {
    for body in bodies {
        body.force_accumulator = Vec3::ZERO;
        body.torque_accumulator = Vec3::ZERO;
    }
}

/// Put dynamic bodies to sleep after `SLEEP_TIME` seconds below the
/// velocity thresholds. Sleeping bodies skip integration and gravity.
pub fn update_sleep_states<'a>(bodies: impl Iterator<Item = &'a mut CpuBody>, dt: f32) {
    for body in bodies {
        if !body.is_dynamic() || body.sleep == SleepState::Sleeping {
            continue;
        }

        let linear_speed = body.linear_velocity.length();
        let angular_speed = body.angular_velocity.length();

        if linear_speed < LINEAR_SLEEP_THRESHOLD && angular_speed < ANGULAR_SLEEP_THRESHOLD {
            body.sleep_timer += dt;
            if body.sleep_timer >= SLEEP_TIME {
                body.sleep = SleepState::Sleeping;
                body.linear_velocity = Vec3::ZERO;
                body.angular_velocity = Vec3::ZERO;
            }
        } else {
            body.sleep_timer = 0.0;
        }
    }
}
