/// Recycles octree nodes, item shells and 8-slot child arrays.
///
/// Split/consolidate cycles retire and recreate nodes at a high rate. Each
/// category is a bounded LIFO stack: `get_*` pops and resets a cached object
/// (or allocates a fresh one), `return_*` pushes unless the stack is full, in
/// which case the object is simply dropped.
///
/// Recycling keeps the allocations behind a retired object alive (a node's
/// item list capacity, a boxed child array). Correctness never depends on a
/// hit: a zero-capacity pool behaves identically, only slower.

use crate::geometry::AABB;
use super::item::Item;
use super::node::{ChildArray, NodeKey, OctreeNode};

/// Default cap per category
pub const DEFAULT_POOL_CAPACITY: usize = 100;

/// Snapshot of the pool's caches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Retired nodes waiting for reuse
    pub cached_nodes: usize,
    /// Retired item shells waiting for reuse
    pub cached_items: usize,
    /// Retired child arrays waiting for reuse
    pub cached_child_arrays: usize,
    /// Cap per category
    pub capacity: usize,
}

pub(crate) struct OctreePool<T> {
    nodes: Vec<OctreeNode>,
    items: Vec<Item<T>>,
    child_arrays: Vec<ChildArray>,
    capacity: usize,
}

impl<T> OctreePool<T> {
    /// Create an empty pool holding at most `capacity` objects per category
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            nodes: Vec::new(),
            items: Vec::new(),
            child_arrays: Vec::new(),
            capacity,
        }
    }

    // ===== NODES =====

    /// Get a leaf node for `bounds`, recycled if possible
    pub(crate) fn get_node(&mut self, bounds: AABB, parent: Option<NodeKey>) -> OctreeNode {
        match self.nodes.pop() {
            Some(mut node) => {
                node.bounds = bounds;
                node.parent = parent;
                node
            }
            None => OctreeNode::new(bounds, parent),
        }
    }

    /// Retire a node. Its item list is cleared, its capacity kept.
    pub(crate) fn return_node(&mut self, mut node: OctreeNode) {
        debug_assert!(node.children.is_none(), "retired node still owns children");
        if self.nodes.len() >= self.capacity {
            return;
        }
        node.items.clear();
        node.parent = None;
        self.nodes.push(node);
    }

    // ===== ITEMS =====

    /// Get an item shell holding `payload`, recycled if possible
    pub(crate) fn get_item(&mut self, bounds: AABB, payload: T) -> Item<T> {
        match self.items.pop() {
            Some(mut item) => {
                item.bounds = bounds;
                item.payload = Some(payload);
                item.container = None;
                item.moved_from = None;
                item
            }
            None => Item::new(bounds, payload),
        }
    }

    /// Retire an item, handing its payload back to the caller
    pub(crate) fn return_item(&mut self, mut item: Item<T>) -> Option<T> {
        let payload = item.payload.take();
        if self.items.len() < self.capacity {
            item.container = None;
            item.moved_from = None;
            self.items.push(item);
        }
        payload
    }

    // ===== CHILD ARRAYS =====

    /// Get an 8-slot child array with every slot reset to the null key
    pub(crate) fn get_child_array(&mut self) -> ChildArray {
        match self.child_arrays.pop() {
            Some(mut children) => {
                children.fill(NodeKey::default());
                children
            }
            None => Box::new([NodeKey::default(); 8]),
        }
    }

    pub(crate) fn return_child_array(&mut self, children: ChildArray) {
        if self.child_arrays.len() < self.capacity {
            self.child_arrays.push(children);
        }
    }

    // ===== STATS =====

    pub(crate) fn cached_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn cached_items(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn cached_child_arrays(&self) -> usize {
        self.child_arrays.len()
    }

    pub(crate) fn stats(&self) -> PoolStats {
        PoolStats {
            cached_nodes: self.cached_nodes(),
            cached_items: self.cached_items(),
            cached_child_arrays: self.cached_child_arrays(),
            capacity: self.capacity,
        }
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
