/// Frustum: six clipping planes for visibility queries.
///
/// Each plane is represented as a Vec4 (A, B, C, D) where:
/// - (A, B, C) is the inward-pointing normal
/// - D is the signed distance
/// - A point P is inside the frustum if dot(plane, P_homogeneous) >= 0 for all planes
///
/// The caller is responsible for computing the frustum. `from_view_projection()`
/// is provided as a utility; `from_planes()` accepts planes computed by other means.

use glam::{Mat4, Vec3, Vec4};
use super::aabb::{Containment, AABB};

/// Frustum plane indices
pub const PLANE_LEFT: usize = 0;
pub const PLANE_RIGHT: usize = 1;
pub const PLANE_BOTTOM: usize = 2;
pub const PLANE_TOP: usize = 3;
pub const PLANE_NEAR: usize = 4;
pub const PLANE_FAR: usize = 5;

/// Six frustum planes for culling.
///
/// Each plane is (A, B, C, D) where Ax + By + Cz + D = 0.
/// Normal (A, B, C) points inward (toward the visible volume).
/// Works with both perspective and orthographic projections.
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    /// Frustum planes: left, right, bottom, top, near, far
    pub planes: [Vec4; 6],
}

impl Frustum {
    /// Build a frustum from six inward-facing planes (left, right, bottom, top, near, far).
    ///
    /// Planes are normalized so distances are in world units.
    pub fn from_planes(mut planes: [Vec4; 6]) -> Self {
        for plane in &mut planes {
            let normal_len = Vec3::new(plane.x, plane.y, plane.z).length();
            if normal_len > 0.0 {
                *plane /= normal_len;
            }
        }

        Self { planes }
    }

    /// Extract frustum planes from a view-projection matrix.
    ///
    /// Uses the Gribb & Hartmann method. Works for both perspective
    /// and orthographic projections.
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let (x, y, z, w) = (vp.row(0), vp.row(1), vp.row(2), vp.row(3));

        // Same order as the PLANE_* indices
        Self::from_planes([w + x, w - x, w + y, w - y, w + z, w - z])
    }

    /// Test if an AABB intersects this frustum.
    ///
    /// Returns `true` unless `contains_aabb` would report `Disjoint`.
    /// May return false positives (conservative), never false negatives.
    pub fn intersects_aabb(&self, aabb: &AABB) -> bool {
        self.contains_aabb(aabb) != Containment::Disjoint
    }

    /// Classify an AABB against the frustum (3-way test).
    ///
    /// Tests both the positive vertex (p-vertex) and negative vertex (n-vertex)
    /// against each plane:
    /// - If the p-vertex is outside any plane → `Disjoint` (early out)
    /// - If the n-vertex is outside any plane → at least `Intersects`
    /// - If all n-vertices are inside all planes → `Contains`
    ///
    /// Used by the octree for hierarchical culling.
    pub fn contains_aabb(&self, aabb: &AABB) -> Containment {
        let mut all_inside = true;

        for plane in &self.planes {
            let normal = Vec3::new(plane.x, plane.y, plane.z);

            // Positive vertex: corner most in the direction of the normal
            let p_vertex = Vec3::new(
                if normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );

            // If the p-vertex is outside → entire AABB is outside
            if normal.dot(p_vertex) + plane.w < 0.0 {
                return Containment::Disjoint;
            }

            // Negative vertex: corner least in the direction of the normal
            let n_vertex = Vec3::new(
                if normal.x >= 0.0 { aabb.min.x } else { aabb.max.x },
                if normal.y >= 0.0 { aabb.min.y } else { aabb.max.y },
                if normal.z >= 0.0 { aabb.min.z } else { aabb.max.z },
            );

            // If the n-vertex is outside → AABB straddles this plane
            if normal.dot(n_vertex) + plane.w < 0.0 {
                all_inside = false;
            }
        }

        if all_inside { Containment::Contains } else { Containment::Intersects }
    }

    /// Classify a point against the frustum.
    ///
    /// Only `Disjoint` or `Contains` are ever returned.
    pub fn contains_point(&self, point: Vec3) -> Containment {
        for plane in &self.planes {
            if Vec3::new(plane.x, plane.y, plane.z).dot(point) + plane.w < 0.0 {
                return Containment::Disjoint;
            }
        }
        Containment::Contains
    }
}

#[cfg(test)]
#[path = "frustum_tests.rs"]
mod tests;
