//! Broadphase collision detection using AABB overlap tests.

use crate::physics::engine::groups;

use super::body::CpuBody;
use super::shape::{self, Aabb};

/// Whether the pair should be tested at all.
///
/// Bodies must accept each other's groups. Pairs where neither side moves on
/// its own are skipped unless one of them is a trigger volume.
pub fn should_collide(a: &CpuBody, b: &CpuBody) -> bool {
    if !groups::interacts(a.group, a.mask, b.group, b.mask) {
        return false;
    }
    a.is_dynamic() || b.is_dynamic() || a.is_no_response() || b.is_no_response()
}

/// Sweep-and-prune broadphase (currently O(n^2) pair-wise AABB test).
#[derive(Debug, Default)]
pub struct SweepAndPrune {
    entries: Vec<(usize, Aabb)>,
}

impl SweepAndPrune {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find every pair of slot indices whose bounds overlap and that pass
    /// [`should_collide`]. Pairs are ordered `(lower, higher)`.
    pub fn find_pairs(&mut self, bodies: &[Option<CpuBody>]) -> Vec<(usize, usize)> {
        self.entries.clear();
        for (index, body) in bodies.iter().enumerate() {
            if let Some(body) = body {
                let aabb = shape::compute_aabb(&body.shape, body.position, body.rotation);
                self.entries.push((index, aabb));
            }
        }

        let mut pairs = Vec::new();

        // O(n^2) brute force - sufficient for small numbers of bodies
        for i in 0..self.entries.len() {
            for j in (i + 1)..self.entries.len() {
                let (index_a, aabb_a) = &self.entries[i];
                let (index_b, aabb_b) = &self.entries[j];

                let (Some(a), Some(b)) = (&bodies[*index_a], &bodies[*index_b]) else {
                    continue;
                };
                if !should_collide(a, b) {
                    continue;
                }

                if aabb_a.overlaps(aabb_b) {
                    pairs.push((*index_a, *index_b));
                }
            }
        }

        pairs
    }
}
