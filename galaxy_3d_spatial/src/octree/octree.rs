/// Octree: dynamic bounding-volume octree over arbitrary payloads.
///
/// The handle owns the node store and the key of the current root. The root
/// changes identity when the tree grows toward an item outside its bounds and
/// when it is trimmed back to its only occupied child; callers never see this,
/// they only hold `ItemKey`s.
///
/// Single-writer: every operation runs to completion on the calling thread.
/// Callers needing shared access wrap the tree in their own lock.

use glam::Vec3;
use crate::error::Result;
use crate::geometry::{Frustum, Ray, AABB};
use crate::{engine_bail, engine_debug, engine_error};
use super::item::{ItemKey, ItemRef};
use super::node::{InsertOutcome, NodeKey, NodeStore};
use super::pool::{PoolStats, DEFAULT_POOL_CAPACITY};

/// Octree tuning, fixed for the lifetime of a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OctreeConfig {
    /// Items a leaf may hold before it splits (>= 1)
    pub max_items: usize,
    /// Cap of each pool cache (0 disables recycling)
    pub pool_capacity: usize,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            max_items: 8,
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

/// Dynamic octree.
///
/// # Example
///
/// ```
/// use galaxy_3d_spatial::galaxy3d::geometry::AABB;
/// use galaxy_3d_spatial::galaxy3d::octree::Octree;
/// use galaxy_3d_spatial::glam::Vec3;
///
/// let mut tree = Octree::new(AABB::new(Vec3::splat(-8.0), Vec3::splat(8.0)), 4).unwrap();
/// let key = tree.add_item(AABB::new(Vec3::ONE, Vec3::splat(2.0)), "crate").unwrap();
/// assert_eq!(tree.get(key), Some(&"crate"));
/// assert_eq!(tree.remove_item(key), Some("crate"));
/// assert!(tree.is_empty());
/// ```
pub struct Octree<T> {
    store: NodeStore<T>,
    root: NodeKey,
    /// Working buffer for `apply_pending_moves`, reused across calls
    pending: Vec<ItemKey>,
}

impl<T> Octree<T> {
    /// Create an empty tree covering `bounds`, with the default pool capacity.
    pub fn new(bounds: AABB, max_items: usize) -> Result<Self> {
        Self::with_config(bounds, OctreeConfig { max_items, ..OctreeConfig::default() })
    }

    /// Create an empty tree covering `bounds`.
    ///
    /// # Errors
    ///
    /// - `InvalidBounds` if `bounds` is not finite, inverted, or flat on an axis
    /// - `InvalidConfig` if `config.max_items` is 0
    pub fn with_config(bounds: AABB, config: OctreeConfig) -> Result<Self> {
        if !bounds.is_valid() || !bounds.dimensions().cmpgt(Vec3::ZERO).all() {
            engine_bail!("galaxy3d::Octree", InvalidBounds,
                "Root bounds {:?} must be finite with a positive extent on every axis", bounds);
        }
        if config.max_items == 0 {
            engine_bail!("galaxy3d::Octree", InvalidConfig,
                "max_items must be at least 1");
        }

        let mut store = NodeStore::new(config.max_items, config.pool_capacity);
        let root = store.create_node(bounds, None);

        engine_debug!("galaxy3d::Octree",
            "Octree created: bounds {:?}, max_items {}, pool capacity {}",
            bounds, config.max_items, config.pool_capacity);

        Ok(Self {
            store,
            root,
            pending: Vec::new(),
        })
    }

    // ===== MUTATION =====

    /// Insert a payload with its bounds, growing the root if needed.
    ///
    /// # Errors
    ///
    /// `InvalidBounds` if `bounds` holds a NaN or infinite value, is inverted,
    /// or lies so far out that the root would overflow f32 before covering it.
    /// The tree is left untouched.
    pub fn add_item(&mut self, bounds: AABB, payload: T) -> Result<ItemKey> {
        check_bounds(&bounds)?;
        self.check_reach(&bounds)?;

        let key = self.store.create_item(bounds, payload);
        if self.store.try_insert(self.root, key) == InsertOutcome::DidNotFit {
            self.root = self.store.grow(self.root, key);
        }

        self.debug_validate();
        Ok(key)
    }

    /// Remove an item, handing its payload back.
    ///
    /// Returns `None` (and does nothing) if the key is not tracked by this tree.
    pub fn remove_item(&mut self, key: ItemKey) -> Option<T> {
        if !self.store.items.contains_key(key) {
            return None;
        }

        let payload = self.store.remove(key);
        self.root = self.store.trim(self.root);

        self.debug_validate();
        payload
    }

    /// Remove the first item (depth-first) whose payload equals `payload`.
    pub fn remove_payload(&mut self, payload: &T) -> bool
    where
        T: PartialEq,
    {
        match self.store.find_first(self.root, &mut |candidate| candidate == payload) {
            Some(key) => self.remove_item(key).is_some(),
            None => false,
        }
    }

    /// Move an item now, restructuring the tree as needed.
    ///
    /// # Errors
    ///
    /// - `InvalidBounds` if `bounds` holds a NaN or infinite value, is inverted,
    ///   or is out of the root's finite reach (see `add_item`)
    /// - `UntrackedItem` if the key is not tracked by this tree
    pub fn move_item(&mut self, key: ItemKey, bounds: AABB) -> Result<()> {
        self.check_move(key, &bounds)?;

        self.store.items[key].bounds = bounds;
        self.root = self.store.relocate(key, self.root);
        self.root = self.store.trim(self.root);

        self.debug_validate();
        Ok(())
    }

    /// Record a move without restructuring; applied by `apply_pending_moves`.
    ///
    /// The new bounds are visible right away (`item_bounds`, ray-cast filters),
    /// but the item stays in its current node until the batched pass.
    ///
    /// # Errors
    ///
    /// Same as `move_item`.
    pub fn mark_item_moved(&mut self, key: ItemKey, bounds: AABB) -> Result<()> {
        self.check_move(key, &bounds)?;

        let item = &mut self.store.items[key];
        if item.moved_from.is_none() {
            item.moved_from = Some(item.bounds);
        }
        item.bounds = bounds;
        Ok(())
    }

    /// Apply every recorded move, returning how many items were moved.
    ///
    /// The root may have been trimmed since a move was recorded. A move whose
    /// bounds the current root can no longer reach is reverted to the item's
    /// previous bounds and logged as an error.
    pub fn apply_pending_moves(&mut self) -> usize {
        self.pending.clear();
        self.store.collect_pending(self.root, &mut self.pending);

        let mut moved = 0;
        for &key in &self.pending {
            let bounds = self.store.items[key].bounds;
            if self.store.can_reach(self.root, &bounds) {
                self.root = self.store.relocate(key, self.root);
                moved += 1;
                continue;
            }

            let item = &mut self.store.items[key];
            if let Some(previous) = item.moved_from.take() {
                item.bounds = previous;
            }
            engine_error!("galaxy3d::Octree",
                "Pending move of item {:?} to {:?} is out of reach, reverted", key, bounds);
        }
        self.root = self.store.trim(self.root);

        if moved > 0 {
            engine_debug!("galaxy3d::Octree", "Applied {} pending moves", moved);
        }

        self.debug_validate();
        moved
    }

    /// Remove every item. The root keeps its current bounds.
    pub fn clear(&mut self) {
        self.store.clear_node(self.root);
        self.pending.clear();
        self.debug_validate();
    }

    // ===== ITEM ACCESS =====

    pub fn get(&self, key: ItemKey) -> Option<&T> {
        self.store.items.get(key)?.payload.as_ref()
    }

    pub fn get_mut(&mut self, key: ItemKey) -> Option<&mut T> {
        self.store.items.get_mut(key)?.payload.as_mut()
    }

    /// Current bounds of an item (the new bounds for a pending move)
    pub fn item_bounds(&self, key: ItemKey) -> Option<AABB> {
        self.store.items.get(key).map(|item| item.bounds)
    }

    pub fn contains_item(&self, key: ItemKey) -> bool {
        self.store.items.contains_key(key)
    }

    pub fn is_pending_move(&self, key: ItemKey) -> bool {
        self.store.items.get(key).is_some_and(|item| item.is_pending_move())
    }

    // ===== QUERIES =====

    /// Payloads of every item whose bounds the frustum touches.
    pub fn contained_objects(&self, frustum: &Frustum) -> Vec<&T> {
        self.contained_objects_filtered(frustum, |_| true)
    }

    /// Like `contained_objects`, keeping only payloads accepted by `predicate`.
    pub fn contained_objects_filtered<P>(&self, frustum: &Frustum, mut predicate: P) -> Vec<&T>
    where
        P: FnMut(&T) -> bool,
    {
        let mut results = Vec::new();
        self.store.query_frustum(self.root, frustum, &mut |_, item| {
            if let Some(payload) = item.payload.as_ref() {
                if predicate(payload) {
                    results.push(payload);
                }
            }
        });
        results
    }

    /// Append the keys of every item whose bounds the frustum touches.
    pub fn query_frustum(&self, frustum: &Frustum, results: &mut Vec<ItemKey>) {
        self.store.query_frustum(self.root, frustum, &mut |key, _| results.push(key));
    }

    /// Payloads of every item, no geometry test.
    pub fn all_objects(&self) -> Vec<&T> {
        self.all_objects_filtered(|_| true)
    }

    pub fn all_objects_filtered<P>(&self, mut predicate: P) -> Vec<&T>
    where
        P: FnMut(&T) -> bool,
    {
        let mut results = Vec::with_capacity(self.len());
        self.store.visit_subtree(self.root, &mut |_, item| {
            if let Some(payload) = item.payload.as_ref() {
                if predicate(payload) {
                    results.push(payload);
                }
            }
        });
        results
    }

    /// Cast a ray through the tree.
    ///
    /// `filter` is called for every item whose bounds the ray intersects. It
    /// may run a finer test (e.g. per triangle), append any number of hit
    /// records to `hits`, and returns how many it appended. The total is
    /// returned.
    pub fn ray_cast<H, F>(&self, ray: &Ray, hits: &mut Vec<H>, mut filter: F) -> usize
    where
        F: FnMut(&Ray, ItemRef<'_, T>, &mut Vec<H>) -> usize,
    {
        self.store.ray_cast(self.root, ray, hits, &mut filter)
    }

    // ===== INTROSPECTION =====

    /// Number of items in the tree
    pub fn len(&self) -> usize {
        self.store.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.items.is_empty()
    }

    /// Bounds of the current root
    pub fn root_bounds(&self) -> AABB {
        self.store.nodes[self.root].bounds
    }

    pub fn max_items(&self) -> usize {
        self.store.max_items()
    }

    /// Number of live nodes, root included
    pub fn node_count(&self) -> usize {
        self.store.nodes.len()
    }

    /// Number of levels (1 for a lone root)
    pub fn depth(&self) -> usize {
        self.store.depth(self.root)
    }

    pub fn pending_move_count(&self) -> usize {
        self.store.items.values().filter(|item| item.is_pending_move()).count()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.store.pool.stats()
    }

    /// Walk the whole tree and check its structural invariants.
    ///
    /// Runs automatically after every mutation in debug builds.
    pub fn validate(&self) -> Result<()> {
        self.store.validate(self.root)
    }

    // ===== INTERNAL =====

    fn check_move(&self, key: ItemKey, bounds: &AABB) -> Result<()> {
        check_bounds(bounds)?;
        let tracked = self.store.items.get(key).is_some_and(|item| item.container.is_some());
        if !tracked {
            engine_bail!("galaxy3d::Octree", UntrackedItem,
                "Item {:?} is not tracked by this octree", key);
        }
        self.check_reach(bounds)
    }

    fn check_reach(&self, bounds: &AABB) -> Result<()> {
        if !self.store.can_reach(self.root, bounds) {
            engine_bail!("galaxy3d::Octree", InvalidBounds,
                "Item bounds {:?} are beyond any finite growth of root {:?}",
                bounds, self.root_bounds());
        }
        Ok(())
    }

    fn debug_validate(&self) {
        debug_assert_eq!(self.validate(), Ok(()));
    }
}

fn check_bounds(bounds: &AABB) -> Result<()> {
    if !bounds.is_valid() {
        engine_bail!("galaxy3d::Octree", InvalidBounds,
            "Item bounds {:?} must be finite with min <= max", bounds);
    }
    Ok(())
}

#[cfg(test)]
#[path = "octree_tests.rs"]
mod tests;
