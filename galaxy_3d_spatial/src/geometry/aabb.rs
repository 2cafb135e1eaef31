/// AABB: axis-aligned bounding box and three-way containment.
///
/// The octree stores one AABB per node and per item. Node boxes are always
/// derived from their parent with `octant()`, which builds each child from the
/// parent's own corners and center, so a child never extends past its parent
/// because of rounding.

use glam::{Mat4, Vec3};

/// Result of a 3-way containment classification.
///
/// Shared by box/box, frustum/box and frustum/point tests:
/// - `Disjoint` → no overlap at all (skip the subtree)
/// - `Intersects` → partial overlap (test contents individually)
/// - `Contains` → the tested volume is entirely inside (take everything)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    /// No overlap
    Disjoint,
    /// Partial overlap
    Intersects,
    /// Fully contained
    Contains,
}

/// Axis-Aligned Bounding Box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    /// Minimum corner (x, y, z)
    pub min: Vec3,
    /// Maximum corner (x, y, z)
    pub max: Vec3,
}

impl AABB {
    /// Create an AABB from its two corners.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered on `center`, extending `half_extents` on each side.
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Compute the center point of this AABB.
    ///
    /// Halves each corner before adding, so the result stays finite for any
    /// finite box, even one spanning most of the f32 range.
    pub fn center(&self) -> Vec3 {
        self.min * 0.5 + self.max * 0.5
    }

    /// Full size of the box along each axis.
    pub fn dimensions(&self) -> Vec3 {
        self.max - self.min
    }

    /// Transform this AABB by a matrix, returning a new AABB.
    ///
    /// Uses the Arvo method: projects each matrix axis onto the AABB extents
    /// for an exact (tight) result without transforming all 8 corners.
    pub fn transformed(&self, matrix: &Mat4) -> AABB {
        let translation = matrix.col(3).truncate();
        let mut new_min = translation;
        let mut new_max = translation;

        for i in 0..3 {
            let axis = matrix.col(i).truncate();
            let a = axis * self.min[i];
            let b = axis * self.max[i];
            new_min += a.min(b);
            new_max += a.max(b);
        }

        AABB { min: new_min, max: new_max }
    }

    /// Test if this AABB fully contains another AABB.
    ///
    /// Returns `true` if `other` is entirely within `self` (faces may touch).
    /// This is the test deciding whether an item fits a node.
    pub fn contains(&self, other: &AABB) -> bool {
        self.min.x <= other.min.x && self.max.x >= other.max.x
        && self.min.y <= other.min.y && self.max.y >= other.max.y
        && self.min.z <= other.min.z && self.max.z >= other.max.z
    }

    /// Test if a point lies inside this AABB (boundary included).
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.min.x <= point.x && point.x <= self.max.x
        && self.min.y <= point.y && point.y <= self.max.y
        && self.min.z <= point.z && point.z <= self.max.z
    }

    /// Test if this AABB intersects (overlaps) another AABB.
    ///
    /// Returns `true` if the two AABBs overlap or touch.
    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x
        && self.min.y <= other.max.y && self.max.y >= other.min.y
        && self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Classify `other` relative to this AABB.
    pub fn containment(&self, other: &AABB) -> Containment {
        if !self.intersects(other) {
            Containment::Disjoint
        } else if self.contains(other) {
            Containment::Contains
        } else {
            Containment::Intersects
        }
    }

    /// Whether any coordinate is NaN.
    pub fn is_nan(&self) -> bool {
        self.min.is_nan() || self.max.is_nan()
    }

    /// Whether the box is usable for spatial indexing: every coordinate is
    /// finite and `min <= max` on every axis.
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min.cmple(self.max).all()
    }

    /// Compute the AABB of a specific octant (0–7).
    ///
    /// Octant bit layout: bit0 = X, bit1 = Y, bit2 = Z.
    /// - 0 = low, 1 = high for each axis.
    pub fn octant(&self, octant: u8) -> AABB {
        let center = self.center();
        AABB {
            min: Vec3::new(
                if octant & 1 == 0 { self.min.x } else { center.x },
                if octant & 2 == 0 { self.min.y } else { center.y },
                if octant & 4 == 0 { self.min.z } else { center.z },
            ),
            max: Vec3::new(
                if octant & 1 == 0 { center.x } else { self.max.x },
                if octant & 2 == 0 { center.y } else { self.max.y },
                if octant & 4 == 0 { center.z } else { self.max.z },
            ),
        }
    }

    /// Determine which octant of this AABB a point falls into.
    ///
    /// Bit layout: bit0 = X, bit1 = Y, bit2 = Z (0 = low, 1 = high).
    pub fn octant_of_point(&self, point: Vec3) -> u8 {
        let center = self.center();
        ((point.x >= center.x) as u8)
            | (((point.y >= center.y) as u8) << 1)
            | (((point.z >= center.z) as u8) << 2)
    }
}

#[cfg(test)]
#[path = "aabb_tests.rs"]
mod tests;
