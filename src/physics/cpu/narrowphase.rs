//! Narrowphase collision detection: specialized sphere and box tests.

use glam::{Mat3, Quat, Vec3};

use crate::ecs::components::physics::ColliderShape;

/// Result of a narrowphase test.
#[derive(Debug, Clone, Copy)]
pub struct ContactInfo {
    /// Unit normal pointing from A toward B.
    pub normal: Vec3,
    /// Depth of overlap along the normal.
    pub penetration: f32,
    /// World-space point midway between the two surfaces.
    pub point: Vec3,
}

impl ContactInfo {
    fn flipped(self) -> Self {
        Self {
            normal: -self.normal,
            ..self
        }
    }

    /// Deepest point of A inside B.
    pub fn point_on_a(&self) -> Vec3 {
        self.point + self.normal * (self.penetration * 0.5)
    }

    /// Deepest point of B inside A.
    pub fn point_on_b(&self) -> Vec3 {
        self.point - self.normal * (self.penetration * 0.5)
    }
}

/// Specialized sphere-sphere intersection test.
pub fn sphere_sphere(
    radius_a: f32,
    center_a: Vec3,
    radius_b: f32,
    center_b: Vec3,
) -> Option<ContactInfo> {
    let diff = center_b - center_a;
    let dist_sq = diff.length_squared();
    let min_dist = radius_a + radius_b;

    if dist_sq >= min_dist * min_dist {
        return None;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > 1e-6 { diff / dist } else { Vec3::Y };

    let penetration = min_dist - dist;
    let point = center_a + normal * (radius_a - penetration * 0.5);

    Some(ContactInfo {
        normal,
        penetration,
        point,
    })
}

/// Sphere against an oriented box.
pub fn sphere_box(
    radius: f32,
    center: Vec3,
    half_extents: Vec3,
    box_position: Vec3,
    box_rotation: Quat,
) -> Option<ContactInfo> {
    let local = box_rotation.inverse() * (center - box_position);
    let closest = local.clamp(-half_extents, half_extents);
    let delta = local - closest;
    let dist_sq = delta.length_squared();

    if dist_sq > 1e-12 {
        if dist_sq >= radius * radius {
            return None;
        }
        let dist = dist_sq.sqrt();
        // Box surface toward the sphere center; the normal points sphere -> box.
        let normal = box_rotation * (-delta / dist);
        let penetration = radius - dist;
        let surface = box_position + box_rotation * closest;
        return Some(ContactInfo {
            normal,
            penetration,
            point: surface + normal * (penetration * 0.5),
        });
    }

    // Center inside the box: push out through the nearest face.
    let depth = half_extents - local.abs();
    let axis = if depth.x <= depth.y && depth.x <= depth.z {
        0
    } else if depth.y <= depth.z {
        1
    } else {
        2
    };
    let mut face = Vec3::ZERO;
    face[axis] = if local[axis] >= 0.0 { 1.0 } else { -1.0 };
    let normal = box_rotation * -face;
    let penetration = depth[axis] + radius;
    Some(ContactInfo {
        normal,
        penetration,
        point: center - normal * (radius - penetration * 0.5),
    })
}

/// SAT (Separating Axis Theorem) test for box-box collision.
pub fn sat_box_box(
    half_a: Vec3,
    position_a: Vec3,
    rotation_a: Quat,
    half_b: Vec3,
    position_b: Vec3,
    rotation_b: Quat,
) -> Option<ContactInfo> {
    let ra = Mat3::from_quat(rotation_a);
    let rb = Mat3::from_quat(rotation_b);
    let axes_a = [ra.x_axis, ra.y_axis, ra.z_axis];
    let axes_b = [rb.x_axis, rb.y_axis, rb.z_axis];

    let half_a_arr = half_a.to_array();
    let half_b_arr = half_b.to_array();

    let t = position_b - position_a;

    let mut min_overlap = f32::MAX;
    let mut best_axis = Vec3::ZERO;

    // 3 face normals from each box, then 9 edge-edge cross products
    let face_axes = axes_a.iter().chain(axes_b.iter()).copied();
    let edge_axes = axes_a
        .iter()
        .flat_map(|a| axes_b.iter().map(move |b| a.cross(*b)))
        .filter_map(|axis| {
            let len = axis.length();
            // Parallel edges
            (len >= 1e-6).then(|| axis / len)
        });

    for axis in face_axes.chain(edge_axes) {
        let overlap = sat_test_axis(axis, &axes_a, &half_a_arr, &axes_b, &half_b_arr, t)?;
        if overlap < min_overlap {
            min_overlap = overlap;
            best_axis = axis;
        }
    }

    // Ensure normal points from A to B
    if best_axis.dot(t) < 0.0 {
        best_axis = -best_axis;
    }

    // Support extent of A along the normal, expressed in A's frame.
    let local_axis = ra.transpose() * best_axis;
    let point = position_a + best_axis * (half_a.dot(local_axis.abs()) - min_overlap * 0.5);

    Some(ContactInfo {
        normal: best_axis,
        penetration: min_overlap,
        point,
    })
}

/// Test a single SAT axis. Returns Some(overlap) if overlapping, None if separating.
fn sat_test_axis(
    axis: Vec3,
    axes_a: &[Vec3; 3],
    half_a: &[f32; 3],
    axes_b: &[Vec3; 3],
    half_b: &[f32; 3],
    t: Vec3,
) -> Option<f32> {
    let proj_a: f32 = (0..3).map(|i| half_a[i] * axes_a[i].dot(axis).abs()).sum();
    let proj_b: f32 = (0..3).map(|i| half_b[i] * axes_b[i].dot(axis).abs()).sum();

    let dist = t.dot(axis).abs();
    let overlap = proj_a + proj_b - dist;

    (overlap > 0.0).then_some(overlap)
}

/// Detect collision between two posed shapes.
pub fn detect_collision(
    shape_a: &ColliderShape,
    position_a: Vec3,
    rotation_a: Quat,
    shape_b: &ColliderShape,
    position_b: Vec3,
    rotation_b: Quat,
) -> Option<ContactInfo> {
    match (shape_a, shape_b) {
        (ColliderShape::Sphere { radius: ra }, ColliderShape::Sphere { radius: rb }) => {
            sphere_sphere(*ra, position_a, *rb, position_b)
        }
        (ColliderShape::Sphere { radius }, ColliderShape::Box { half_extents }) => {
            sphere_box(*radius, position_a, *half_extents, position_b, rotation_b)
        }
        (ColliderShape::Box { half_extents }, ColliderShape::Sphere { radius }) => {
            sphere_box(*radius, position_b, *half_extents, position_a, rotation_a)
                .map(ContactInfo::flipped)
        }
        (ColliderShape::Box { half_extents: ha }, ColliderShape::Box { half_extents: hb }) => {
            sat_box_box(*ha, position_a, rotation_a, *hb, position_b, rotation_b)
        }
    }
}
