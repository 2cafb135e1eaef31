//! Dynamic bounding-volume octree.
//!
//! `Octree` is the handle callers use. Nodes split when a leaf overflows,
//! collapse back when a subtree turns sparse, and the root grows toward items
//! outside it and is trimmed when only one octant stays occupied. Retired
//! nodes, item shells and child arrays are recycled through a per-tree pool.

mod item;
mod node;
mod octree;
mod pool;

pub use item::{ItemKey, ItemRef};
pub use octree::{Octree, OctreeConfig};
pub use pool::{PoolStats, DEFAULT_POOL_CAPACITY};
