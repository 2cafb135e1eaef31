/// Ray: half-line used for picking and ray-cast queries.
///
/// The octree only needs `intersects()` to prune subtrees; any finer
/// per-item test (triangles, spheres...) is done by the caller's filter.

use glam::Vec3;
use super::aabb::AABB;

/// A ray in 3D space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Origin of the ray
    pub origin: Vec3,
    /// Direction of the ray (normalized by `new`)
    pub direction: Vec3,
}

impl Ray {
    /// Creates a new ray, normalizing `direction`.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Returns the point at parameter `t` along the ray.
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Slab test against an AABB.
    ///
    /// Returns the entry/exit parameters `(t_min, t_max)` if the ray hits,
    /// with `t_min` clamped to 0 when the origin is inside the box.
    /// Axis-parallel rays are handled per axis without dividing by zero.
    pub fn intersect_aabb(&self, aabb: &AABB) -> Option<(f32, f32)> {
        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;

        for axis in 0..3 {
            let origin = self.origin[axis];
            let direction = self.direction[axis];

            if direction.abs() < f32::EPSILON {
                // Parallel to this slab: must already be between its faces
                if origin < aabb.min[axis] || origin > aabb.max[axis] {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / direction;
            let mut t0 = (aabb.min[axis] - origin) * inv;
            let mut t1 = (aabb.max[axis] - origin) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }

            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_max < t_min {
                return None;
            }
        }

        if t_max < 0.0 {
            return None;
        }

        Some((t_min.max(0.0), t_max))
    }

    /// Whether the ray hits the AABB at all.
    pub fn intersects(&self, aabb: &AABB) -> bool {
        self.intersect_aabb(aabb).is_some()
    }
}

#[cfg(test)]
#[path = "ray_tests.rs"]
mod tests;
