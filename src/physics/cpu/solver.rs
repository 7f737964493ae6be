//! Sequential impulse constraint solver.

use glam::Vec3;

use super::body::CpuBody;
use super::narrowphase::ContactInfo;

/// Baumgarte stabilization parameter.
const BAUMGARTE_BETA: f32 = 0.2;
/// Penetration slop (allowed penetration before position correction).
const PENETRATION_SLOP: f32 = 0.005;
/// Squared speed above which a body wakes the sleeping body it touches.
const WAKE_SPEED_SQ: f32 = 0.01;

/// One contact point being solved, with its accumulated normal impulse.
#[derive(Debug, Clone, Copy)]
pub struct SolverContact {
    pub info: ContactInfo,
    pub normal_impulse: f32,
}

/// Contacts between the bodies in slots `a` and `b`, with `a < b`.
#[derive(Debug, Clone)]
pub struct PairManifold {
    pub a: usize,
    pub b: usize,
    pub contacts: Vec<SolverContact>,
}

/// Borrow two distinct slots mutably.
fn pair_mut(bodies: &mut [Option<CpuBody>], a: usize, b: usize) -> Option<(&mut CpuBody, &mut CpuBody)> {
    if a >= b || b >= bodies.len() {
        return None;
    }
    let (left, right) = bodies.split_at_mut(b);
    Some((left[a].as_mut()?, right[0].as_mut()?))
}

/// Wake sleeping dynamic bodies that something moving runs into.
pub fn wake_touching(manifolds: &[PairManifold], bodies: &mut [Option<CpuBody>]) {
    for manifold in manifolds {
        let Some((a, b)) = pair_mut(bodies, manifold.a, manifold.b) else {
            continue;
        };
        if a.is_no_response() || b.is_no_response() {
            continue;
        }
        let wake_a = wakes(a, b);
        let wake_b = wakes(b, a);
        if wake_a {
            a.wake();
        }
        if wake_b {
            b.wake();
        }
    }
}

fn wakes(sleeper: &CpuBody, other: &CpuBody) -> bool {
    sleeper.is_dynamic()
        && !sleeper.is_active()
        && other.is_active()
        && other.linear_velocity.length_squared() > WAKE_SPEED_SQ
}

/// Solve contact constraints using sequential impulse iteration.
///
/// Pairs involving a trigger volume are left alone.
pub fn solve_contacts(
    manifolds: &mut [PairManifold],
    bodies: &mut [Option<CpuBody>],
    solver_iterations: u32,
    dt: f32,
) {
    for _ in 0..solver_iterations {
        for manifold in manifolds.iter_mut() {
            let Some((a, b)) = pair_mut(bodies, manifold.a, manifold.b) else {
                continue;
            };
            if a.is_no_response() || b.is_no_response() {
                continue;
            }
            solve_manifold(&mut manifold.contacts, a, b, dt);
        }
    }

    for manifold in manifolds.iter() {
        if let Some((a, b)) = pair_mut(bodies, manifold.a, manifold.b) {
            if !(a.is_no_response() || b.is_no_response()) {
                apply_rolling_friction(a, b, dt);
            }
        }
    }
}

fn solve_manifold(contacts: &mut [SolverContact], a: &mut CpuBody, b: &mut CpuBody, dt: f32) {
    let a_moves = a.is_dynamic() && a.is_active();
    let b_moves = b.is_dynamic() && b.is_active();
    if !(a_moves || b_moves) {
        return;
    }

    let restitution = (a.restitution + b.restitution) * 0.5;
    let friction = (a.friction + b.friction) * 0.5;

    for contact in contacts.iter_mut() {
        let normal = contact.info.normal;
        let point = contact.info.point;

        let r_a = point - a.position;
        let r_b = point - b.position;

        let relative_velocity = b.velocity_at(r_b) - a.velocity_at(r_a);
        let contact_velocity = relative_velocity.dot(normal);

        // Normal impulse
        let r_a_cross_n = r_a.cross(normal);
        let r_b_cross_n = r_b.cross(normal);
        let inv_mass_sum = a.inv_mass
            + b.inv_mass
            + (a.inv_inertia_world() * r_a_cross_n).dot(r_a_cross_n)
            + (b.inv_inertia_world() * r_b_cross_n).dot(r_b_cross_n);

        if inv_mass_sum <= 0.0 {
            continue;
        }

        // Baumgarte position correction
        let bias = BAUMGARTE_BETA / dt * (contact.info.penetration - PENETRATION_SLOP).max(0.0);

        let j_normal = (-(1.0 + restitution) * contact_velocity + bias) / inv_mass_sum;

        // Clamp accumulated normal impulse
        let old_impulse = contact.normal_impulse;
        contact.normal_impulse = (old_impulse + j_normal).max(0.0);
        let j_normal = contact.normal_impulse - old_impulse;

        let impulse = normal * j_normal;
        a.apply_impulse(-impulse, r_a);
        b.apply_impulse(impulse, r_b);

        // Friction, from the velocities after the normal impulse
        let relative_velocity = b.velocity_at(r_b) - a.velocity_at(r_a);
        let tangent_velocity = relative_velocity - normal * relative_velocity.dot(normal);
        let tangent_len = tangent_velocity.length();
        if tangent_len <= 1e-6 {
            continue;
        }

        let tangent = tangent_velocity / tangent_len;
        let r_a_cross_t = r_a.cross(tangent);
        let r_b_cross_t = r_b.cross(tangent);
        let inv_mass_t = a.inv_mass
            + b.inv_mass
            + (a.inv_inertia_world() * r_a_cross_t).dot(r_a_cross_t)
            + (b.inv_inertia_world() * r_b_cross_t).dot(r_b_cross_t);

        if inv_mass_t > 0.0 {
            let j_tangent = -tangent_len / inv_mass_t;

            // Coulomb friction: |Jt| <= mu * |Jn|
            let max_friction = friction * contact.normal_impulse;
            let j_tangent = j_tangent.clamp(-max_friction, max_friction);

            let friction_impulse = tangent * j_tangent;
            a.apply_impulse(-friction_impulse, r_a);
            b.apply_impulse(friction_impulse, r_b);
        }
    }
}

/// Bleed off spin of bodies rolling on each other.
fn apply_rolling_friction(a: &mut CpuBody, b: &mut CpuBody, dt: f32) {
    let rolling = a.rolling_friction.max(b.rolling_friction);
    if rolling <= 0.0 {
        return;
    }
    let factor = (1.0 - rolling * dt).max(0.0);
    for body in [a, b] {
        if body.is_dynamic() {
            body.angular_velocity *= factor;
        }
    }
}

/// Fresh solver contacts for a pair.
pub fn manifold(a: usize, b: usize, info: ContactInfo) -> PairManifold {
    PairManifold {
        a,
        b,
        contacts: vec![SolverContact {
            info,
            normal_impulse: 0.0,
        }],
    }
}

/// Total impulse pushing the pair apart.
pub fn total_impulse(manifold: &PairManifold) -> f32 {
    manifold.contacts.iter().map(|c| c.normal_impulse).sum()
}
