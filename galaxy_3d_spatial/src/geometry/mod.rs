//! Geometry module: bounding volumes and the query shapes used against them.
//!
//! Plain value types with no ownership or lifetime concerns: the octree
//! copies them freely.

mod aabb;
mod frustum;
mod ray;

pub use aabb::{AABB, Containment};
pub use frustum::{
    Frustum,
    PLANE_LEFT, PLANE_RIGHT, PLANE_BOTTOM, PLANE_TOP, PLANE_NEAR, PLANE_FAR,
};
pub use ray::Ray;
