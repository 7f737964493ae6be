//! Shape queries in world space: bounds, mass properties, and ray casts.

use glam::{Mat3, Quat, Vec3};

use crate::ecs::components::physics::ColliderShape;

/// Axis-aligned bounding box for broadphase collision detection.
#[derive(Debug, Clone, Copy)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Test whether two AABBs overlap.
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }
}

/// World-space bounds of a shape at the given pose.
pub fn compute_aabb(shape: &ColliderShape, position: Vec3, rotation: Quat) -> Aabb {
    let extent = match shape {
        ColliderShape::Sphere { radius } => Vec3::splat(*radius),
        ColliderShape::Box { half_extents } => {
            // Project the local box axes onto each world axis.
            let m = Mat3::from_quat(rotation);
            m.x_axis.abs() * half_extents.x
                + m.y_axis.abs() * half_extents.y
                + m.z_axis.abs() * half_extents.z
        }
    };
    Aabb {
        min: position - extent,
        max: position + extent,
    }
}

/// Diagonal of the local inertia tensor for a solid body of `mass`.
pub fn local_inertia(shape: &ColliderShape, mass: f32) -> Vec3 {
    match shape {
        ColliderShape::Sphere { radius } => Vec3::splat(0.4 * mass * radius * radius),
        ColliderShape::Box { half_extents } => {
            let sq = *half_extents * *half_extents;
            Vec3::new(sq.y + sq.z, sq.x + sq.z, sq.x + sq.y) * (mass / 3.0)
        }
    }
}

/// Where a segment first enters a shape.
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    /// Position along the segment, in `[0, 1]`.
    pub fraction: f32,
    pub normal: Vec3,
}

/// Cast the segment `from..to` against a posed shape.
///
/// Segments that start inside the shape do not hit it.
pub fn ray_cast(
    shape: &ColliderShape,
    position: Vec3,
    rotation: Quat,
    from: Vec3,
    to: Vec3,
) -> Option<RayHit> {
    match shape {
        ColliderShape::Sphere { radius } => ray_sphere(position, *radius, from, to),
        ColliderShape::Box { half_extents } => {
            ray_box(*half_extents, position, rotation, from, to)
        }
    }
}

fn ray_sphere(center: Vec3, radius: f32, from: Vec3, to: Vec3) -> Option<RayHit> {
    let d = to - from;
    let f = from - center;
    let a = d.length_squared();
    if a < 1e-12 {
        return None;
    }
    let b = 2.0 * f.dot(d);
    let c = f.length_squared() - radius * radius;
    let discriminant = b * b - 4.0 * a * c;
    if c <= 0.0 || discriminant < 0.0 {
        return None;
    }

    let t = (-b - discriminant.sqrt()) / (2.0 * a);
    if !(0.0..=1.0).contains(&t) {
        return None;
    }
    let normal = (from + d * t - center).normalize_or_zero();
    Some(RayHit {
        fraction: t,
        normal,
    })
}

/// Slab test in the box's local frame.
fn ray_box(half_extents: Vec3, position: Vec3, rotation: Quat, from: Vec3, to: Vec3) -> Option<RayHit> {
    let inv = rotation.inverse();
    let origin = inv * (from - position);
    let dir = inv * (to - from);

    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut normal = Vec3::ZERO;

    for axis in 0..3 {
        let h = half_extents[axis];
        if dir[axis].abs() < 1e-12 {
            if origin[axis].abs() > h {
                return None;
            }
            continue;
        }

        let inv_d = 1.0 / dir[axis];
        let mut t0 = (-h - origin[axis]) * inv_d;
        let mut t1 = (h - origin[axis]) * inv_d;
        // Entering through the face whose normal opposes the ray.
        let mut face = Vec3::ZERO;
        face[axis] = -dir[axis].signum();
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        if t0 > t_enter {
            t_enter = t0;
            normal = face;
        }
        t_exit = t_exit.min(t1);
        if t_enter > t_exit {
            return None;
        }
    }

    if !(0.0..=1.0).contains(&t_enter) {
        return None;
    }
    Some(RayHit {
        fraction: t_enter,
        normal: rotation * normal,
    })
}
