/// OctreeNode: recursive spatial cell of the dynamic octree.
///
/// Single-node placement: each item is stored in exactly one node, the
/// deepest one whose AABB fully contains it. An item straddling a child
/// boundary stays in the parent. Unlike a static octree, nodes are created on
/// demand (a leaf splits when it holds more than `max_items`) and retired when
/// their subtree becomes sparse again.
///
/// Nodes and items live in two SlotMaps owned by `NodeStore`. Ownership flows
/// down through `children`; `parent` and `Item::container` are plain keys
/// used one hop at a time and never keep anything alive.
///
/// Every structural algorithm takes the node it operates on by key, so the
/// handle can swap its root (growth, trim) without invalidating anything.
///
/// Placement always follows `Item::placed_bounds`: an item with a pending move
/// keeps the position of its old bounds until the move is applied.

use glam::Vec3;
use slotmap::{new_key_type, SlotMap};
use crate::error::{Error, Result};
use crate::geometry::{Containment, Frustum, Ray, AABB};
use super::item::{Item, ItemKey, ItemRef};
use super::pool::OctreePool;

new_key_type! {
    /// Handle to a node inside a `NodeStore`
    pub(crate) struct NodeKey;
}

/// Fixed 8-slot child array, indexed by octant (bit0 = X, bit1 = Y, bit2 = Z)
pub(crate) type ChildArray = Box<[NodeKey; 8]>;

/// A single node in the octree.
pub(crate) struct OctreeNode {
    /// World-space AABB of this node
    pub(crate) bounds: AABB,
    /// Parent node (None for the root)
    pub(crate) parent: Option<NodeKey>,
    /// Items stored directly here (those that fit no single child)
    pub(crate) items: Vec<ItemKey>,
    /// None = leaf, otherwise exactly 8 children
    pub(crate) children: Option<ChildArray>,
}

impl OctreeNode {
    pub(crate) fn new(bounds: AABB, parent: Option<NodeKey>) -> Self {
        Self {
            bounds,
            parent,
            items: Vec::new(),
            children: None,
        }
    }
}

/// Where `try_insert` put an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InsertOutcome {
    /// Stored directly on the node that was asked
    InsertedHere,
    /// Stored somewhere below the node that was asked
    InsertedInChild,
    /// The item's bounds are not contained by the node
    DidNotFit,
}

/// Arena of nodes and items, plus the pool recycling them.
pub(crate) struct NodeStore<T> {
    pub(crate) nodes: SlotMap<NodeKey, OctreeNode>,
    pub(crate) items: SlotMap<ItemKey, Item<T>>,
    pub(crate) pool: OctreePool<T>,
    /// Split threshold, fixed for the whole tree
    max_items: usize,
}

impl<T> NodeStore<T> {
    pub(crate) fn new(max_items: usize, pool_capacity: usize) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            items: SlotMap::with_key(),
            pool: OctreePool::new(pool_capacity),
            max_items,
        }
    }

    pub(crate) fn max_items(&self) -> usize {
        self.max_items
    }

    // ===== ALLOCATION =====

    pub(crate) fn create_node(&mut self, bounds: AABB, parent: Option<NodeKey>) -> NodeKey {
        let node = self.pool.get_node(bounds, parent);
        self.nodes.insert(node)
    }

    /// Create an item that is not yet attached to any node.
    pub(crate) fn create_item(&mut self, bounds: AABB, payload: T) -> ItemKey {
        let item = self.pool.get_item(bounds, payload);
        self.items.insert(item)
    }

    /// Free an item slot and hand its payload back.
    pub(crate) fn retire_item(&mut self, item: ItemKey) -> Option<T> {
        let item = self.items.remove(item)?;
        self.pool.return_item(item)
    }

    /// Retire a node, its items and its whole subtree.
    fn retire_subtree(&mut self, key: NodeKey) {
        let Some(mut node) = self.nodes.remove(key) else {
            return;
        };

        for item in node.items.drain(..) {
            self.retire_item(item);
        }

        if let Some(children) = node.children.take() {
            for &child in children.iter() {
                self.retire_subtree(child);
            }
            self.pool.return_child_array(children);
        }

        self.pool.return_node(node);
    }

    // ===== ITEM LINKS =====

    fn attach(&mut self, node: NodeKey, item: ItemKey) {
        self.nodes[node].items.push(item);
        self.items[item].container = Some(node);
    }

    /// Unlink an item from its container, returning the former container.
    fn detach(&mut self, item: ItemKey) -> Option<NodeKey> {
        let container = self.items.get_mut(item)?.container.take()?;
        let items = &mut self.nodes[container].items;
        if let Some(pos) = items.iter().position(|&k| k == item) {
            items.swap_remove(pos);
        }
        Some(container)
    }

    // ===== INSERTION =====

    /// Insert an item into the deepest node of this subtree that fully contains it.
    ///
    /// Children are tried in octant order and the first one containing the
    /// item takes it. A leaf pushed over `max_items` splits, and every child
    /// left over the limit splits in turn. Growth is not handled here: an item
    /// outside `node` is reported as `DidNotFit` and left untouched.
    pub(crate) fn try_insert(&mut self, node: NodeKey, item: ItemKey) -> InsertOutcome {
        let bounds = self.items[item].placed_bounds();
        if !self.nodes[node].bounds.contains(&bounds) {
            return InsertOutcome::DidNotFit;
        }

        if let Some(children) = self.nodes[node].children.as_deref().copied() {
            if self.insert_into_children(&children, item) {
                return InsertOutcome::InsertedInChild;
            }
            // Straddles a boundary: stays in this node
            self.attach(node, item);
            return InsertOutcome::InsertedHere;
        }

        self.attach(node, item);
        self.split_if_overfull(node);
        if self.items[item].container == Some(node) {
            InsertOutcome::InsertedHere
        } else {
            InsertOutcome::InsertedInChild
        }
    }

    /// Hand an item to the first child that takes it.
    fn insert_into_children(&mut self, children: &[NodeKey; 8], item: ItemKey) -> bool {
        children
            .iter()
            .any(|&child| self.try_insert(child, item) != InsertOutcome::DidNotFit)
    }

    fn split_if_overfull(&mut self, node: NodeKey) {
        if self.nodes[node].items.len() > self.max_items && self.can_split(node) {
            self.split(node, None);
        }
    }

    /// Whether splitting `node` can separate its items.
    ///
    /// A node too small to halve in f32 cannot split. Neither can a node whose
    /// items all sit on one point: they would follow each other down forever.
    fn can_split(&self, node: NodeKey) -> bool {
        let n = &self.nodes[node];
        let center = n.bounds.center();
        if !(n.bounds.min.cmplt(center).all() && center.cmplt(n.bounds.max).all()) {
            return false;
        }

        let mut placed = n.items.iter().map(|&key| self.items[key].placed_bounds());
        match placed.next() {
            Some(first) if first.min == first.max => placed.any(|bounds| bounds != first),
            _ => true,
        }
    }

    /// Turn a leaf into an internal node with 8 octant children.
    ///
    /// `reuse` substitutes an existing node for one octant instead of creating
    /// it; root growth uses this to hang the old root under the new one, and
    /// the caller guarantees the node's bounds are exactly that octant.
    /// Items are re-inserted into the children, so a child left over the
    /// limit splits as well. Straddling items stay.
    fn split(&mut self, node: NodeKey, reuse: Option<(u8, NodeKey)>) {
        debug_assert!(self.nodes[node].children.is_none(), "split of an internal node");

        let bounds = self.nodes[node].bounds;
        let mut children = self.pool.get_child_array();

        for octant in 0..8u8 {
            children[octant as usize] = match reuse {
                Some((reuse_octant, existing)) if reuse_octant == octant => {
                    self.nodes[existing].parent = Some(node);
                    existing
                }
                _ => self.create_node(bounds.octant(octant), Some(node)),
            };
        }

        let keys: [NodeKey; 8] = *children;
        self.nodes[node].children = Some(children);

        let mut items = std::mem::take(&mut self.nodes[node].items);
        items.retain(|&item| !self.insert_into_children(&keys, item));

        crate::engine_trace!("galaxy3d::Octree",
            "Split node {:?} ({} straddling items kept)", bounds, items.len());

        self.nodes[node].items = items;
    }

    // ===== REMOVAL AND CONSOLIDATION =====

    /// Detach and retire an item, then consolidate around its former container.
    pub(crate) fn remove(&mut self, item: ItemKey) -> Option<T> {
        let container = self.detach(item);
        let payload = self.retire_item(item);
        if let Some(container) = container {
            self.consolidate_upward(container);
        }
        payload
    }

    /// Count the items of a subtree, stopping early once `limit` is reached.
    pub(crate) fn count_items_up_to(&self, node: NodeKey, limit: usize) -> usize {
        let node = &self.nodes[node];
        let mut count = node.items.len();

        if let Some(children) = &node.children {
            for &child in children.iter() {
                if count >= limit {
                    break;
                }
                count += self.count_items_up_to(child, limit - count);
            }
        }

        count.min(limit)
    }

    /// Walk from `start` up to the root, collapsing every internal node whose
    /// subtree holds fewer than `max_items` items.
    ///
    /// Subtree counts only grow going up, so the walk stops at the first
    /// internal node that is still dense enough.
    pub(crate) fn consolidate_upward(&mut self, start: NodeKey) {
        let mut cursor = Some(start);

        while let Some(key) = cursor {
            if self.nodes[key].children.is_some() {
                if self.count_items_up_to(key, self.max_items) >= self.max_items {
                    break;
                }
                self.collapse(key);
            }
            cursor = self.nodes[key].parent;
        }
    }

    /// Pull every descendant item up into `node` and retire all descendants.
    fn collapse(&mut self, node: NodeKey) {
        let Some(children) = self.nodes[node].children.take() else {
            return;
        };

        for &child in children.iter() {
            self.drain_subtree(child, node);
        }
        self.pool.return_child_array(children);

        crate::engine_trace!("galaxy3d::Octree",
            "Consolidated node {:?} ({} items)", self.nodes[node].bounds, self.nodes[node].items.len());
    }

    fn drain_subtree(&mut self, key: NodeKey, target: NodeKey) {
        let Some(mut node) = self.nodes.remove(key) else {
            return;
        };

        for item in node.items.drain(..) {
            self.nodes[target].items.push(item);
            self.items[item].container = Some(target);
        }

        if let Some(children) = node.children.take() {
            for &child in children.iter() {
                self.drain_subtree(child, target);
            }
            self.pool.return_child_array(children);
        }

        self.pool.return_node(node);
    }

    // ===== MOVES =====

    /// Re-home an item whose bounds have already been updated.
    ///
    /// Returns the root to adopt: `root` itself, or a grown root when no
    /// existing node can hold the new bounds.
    ///
    /// Growth must be reachable (see `can_reach`).
    pub(crate) fn relocate(&mut self, item: ItemKey, root: NodeKey) -> NodeKey {
        let bounds = self.items[item].bounds;
        self.items[item].moved_from = None;

        let Some(container) = self.items[item].container else {
            return root;
        };

        if self.nodes[container].bounds.contains(&bounds) {
            match self.nodes[container].children.as_deref().copied() {
                // Still fits: push down if a child now holds it entirely
                Some(children) => {
                    let fits_child = children
                        .iter()
                        .any(|&child| self.nodes[child].bounds.contains(&bounds));
                    if fits_child {
                        self.detach(item);
                        self.insert_into_children(&children, item);
                    }
                }
                // The leaf may have held coincident items that now separate
                None => self.split_if_overfull(container),
            }
            return root;
        }

        self.detach(item);

        let mut cursor = self.nodes[container].parent;
        while let Some(ancestor) = cursor {
            if self.try_insert(ancestor, item) != InsertOutcome::DidNotFit {
                self.consolidate_upward(container);
                return root;
            }
            cursor = self.nodes[ancestor].parent;
        }

        // Settle the old branch first: growth may rebuild the old root
        self.consolidate_upward(container);
        self.grow(root, item)
    }

    // ===== ROOT GROWTH AND TRIM =====

    /// Whether doubling `root` toward `bounds` reaches a box containing them
    /// before any coordinate overflows.
    ///
    /// Replays the exact steps `grow` would take, without touching the tree.
    pub(crate) fn can_reach(&self, root: NodeKey, bounds: &AABB) -> bool {
        let target = bounds.center();
        let mut reach = self.nodes[root].bounds;

        while !reach.contains(bounds) {
            let next = grown_toward(&reach, target);
            if !next.is_valid() || next == reach {
                return false;
            }
            reach = next;
        }
        true
    }

    /// Double the root toward an item that does not fit, until it does.
    ///
    /// Each step builds a box twice the size of the current root, placed so
    /// the current root becomes the octant facing away from the item, splits
    /// it reusing the current root for that octant, then retries the insert.
    /// When rounding keeps that octant from matching the old root exactly,
    /// the old root's items are re-inserted into fresh children instead.
    ///
    /// The caller checks `can_reach` first.
    pub(crate) fn grow(&mut self, root: NodeKey, item: ItemKey) -> NodeKey {
        let target = self.items[item].bounds.center();
        let mut root = root;

        loop {
            let old = self.nodes[root].bounds;
            let grown = grown_toward(&old, target);
            debug_assert!(grown.is_valid(), "root grown to non-finite bounds");

            let new_root = self.create_node(grown, None);
            let octant = grown.octant_of_point(old.center());
            if grown.octant(octant) == old {
                self.split(new_root, Some((octant, root)));
            } else {
                self.drain_subtree(root, new_root);
                self.split(new_root, None);
            }

            crate::engine_debug!("galaxy3d::Octree", "Root grown to {:?}", grown);

            root = new_root;
            if self.try_insert(root, item) != InsertOutcome::DidNotFit {
                return root;
            }
        }
    }

    /// Promote the only occupied child of an item-less root, repeatedly.
    ///
    /// Empty siblings and the old root are retired. Returns the root to adopt.
    pub(crate) fn trim(&mut self, root: NodeKey) -> NodeKey {
        let mut root = root;

        loop {
            let node = &self.nodes[root];
            if !node.items.is_empty() {
                break;
            }
            let Some(children) = node.children.as_deref().copied() else {
                break;
            };

            let survivor = {
                let mut occupied = children
                    .iter()
                    .copied()
                    .filter(|&child| self.count_items_up_to(child, 1) > 0);
                match (occupied.next(), occupied.next()) {
                    (Some(survivor), None) => survivor,
                    _ => break,
                }
            };

            if let Some(array) = self.nodes[root].children.take() {
                self.pool.return_child_array(array);
            }
            for child in children {
                if child != survivor {
                    self.retire_subtree(child);
                }
            }
            if let Some(old_root) = self.nodes.remove(root) {
                self.pool.return_node(old_root);
            }
            self.nodes[survivor].parent = None;

            crate::engine_debug!("galaxy3d::Octree",
                "Root trimmed to {:?}", self.nodes[survivor].bounds);

            root = survivor;
        }

        root
    }

    /// Retire every item and descendant of `node`, keeping the node itself.
    pub(crate) fn clear_node(&mut self, node: NodeKey) {
        let mut items = std::mem::take(&mut self.nodes[node].items);
        for item in items.drain(..) {
            self.retire_item(item);
        }
        self.nodes[node].items = items;

        if let Some(children) = self.nodes[node].children.take() {
            for &child in children.iter() {
                self.retire_subtree(child);
            }
            self.pool.return_child_array(children);
        }
    }

    // ===== TRAVERSAL =====

    /// Visit every item of a subtree (no geometry test).
    pub(crate) fn visit_subtree<'a, F>(&'a self, node: NodeKey, visit: &mut F)
    where
        F: FnMut(ItemKey, &'a Item<T>),
    {
        let node = &self.nodes[node];
        for &key in &node.items {
            visit(key, &self.items[key]);
        }

        if let Some(children) = &node.children {
            for &child in children.iter() {
                self.visit_subtree(child, visit);
            }
        }
    }

    /// Recursively query a subtree with a frustum.
    ///
    /// 3-way classification at each node:
    /// - `Disjoint` → skip entire subtree
    /// - `Contains` → collect all items from subtree without further testing
    /// - `Intersects` → test items individually, recurse into children
    pub(crate) fn query_frustum<'a, F>(&'a self, node: NodeKey, frustum: &Frustum, visit: &mut F)
    where
        F: FnMut(ItemKey, &'a Item<T>),
    {
        let n = &self.nodes[node];

        match frustum.contains_aabb(&n.bounds) {
            Containment::Disjoint => {}

            Containment::Contains => self.visit_subtree(node, visit),

            Containment::Intersects => {
                for &key in &n.items {
                    let item = &self.items[key];
                    if frustum.intersects_aabb(&item.bounds) {
                        visit(key, item);
                    }
                }

                if let Some(children) = &n.children {
                    for &child in children.iter() {
                        self.query_frustum(child, frustum, visit);
                    }
                }
            }
        }
    }

    /// Ray traversal: prune subtrees the ray misses, hand every hit item to
    /// `filter` and sum the hit counts it reports.
    pub(crate) fn ray_cast<H, F>(
        &self,
        node: NodeKey,
        ray: &Ray,
        hits: &mut Vec<H>,
        filter: &mut F,
    ) -> usize
    where
        F: FnMut(&Ray, ItemRef<'_, T>, &mut Vec<H>) -> usize,
    {
        let n = &self.nodes[node];
        if !ray.intersects(&n.bounds) {
            return 0;
        }

        let mut count = 0;
        for &key in &n.items {
            let item = &self.items[key];
            if !ray.intersects(&item.bounds) {
                continue;
            }
            if let Some(payload) = item.payload.as_ref() {
                count += filter(ray, ItemRef { key, bounds: &item.bounds, payload }, hits);
            }
        }

        if let Some(children) = &n.children {
            for &child in children.iter() {
                count += self.ray_cast(child, ray, hits, filter);
            }
        }

        count
    }

    /// Depth-first search for the first item whose payload matches.
    pub(crate) fn find_first<F>(&self, node: NodeKey, matches: &mut F) -> Option<ItemKey>
    where
        F: FnMut(&T) -> bool,
    {
        let n = &self.nodes[node];
        for &key in &n.items {
            if self.items[key].payload.as_ref().is_some_and(|payload| matches(payload)) {
                return Some(key);
            }
        }

        if let Some(children) = &n.children {
            for &child in children.iter() {
                if let Some(found) = self.find_first(child, matches) {
                    return Some(found);
                }
            }
        }

        None
    }

    /// Append every item flagged with a pending move.
    pub(crate) fn collect_pending(&self, node: NodeKey, out: &mut Vec<ItemKey>) {
        self.visit_subtree(node, &mut |key, item| {
            if item.is_pending_move() {
                out.push(key);
            }
        });
    }

    /// Number of levels below and including `node`.
    pub(crate) fn depth(&self, node: NodeKey) -> usize {
        match &self.nodes[node].children {
            None => 1,
            Some(children) => {
                1 + children.iter().map(|&child| self.depth(child)).max().unwrap_or(0)
            }
        }
    }

    // ===== VALIDATION =====

    /// Check every structural invariant of the tree rooted at `root`.
    ///
    /// Containment is checked against `placed_bounds`, so items with a
    /// pending move are checked where they actually sit.
    pub(crate) fn validate(&self, root: NodeKey) -> Result<()> {
        let mut node_count = 0;
        let mut item_count = 0;
        self.validate_node(root, None, &mut node_count, &mut item_count)?;

        if node_count != self.nodes.len() {
            return Err(Error::InvariantViolation(format!(
                "{} nodes reachable from the root, {} allocated", node_count, self.nodes.len()
            )));
        }
        if item_count != self.items.len() {
            return Err(Error::InvariantViolation(format!(
                "{} items reachable from the root, {} allocated", item_count, self.items.len()
            )));
        }
        Ok(())
    }

    fn validate_node(
        &self,
        key: NodeKey,
        parent: Option<NodeKey>,
        node_count: &mut usize,
        item_count: &mut usize,
    ) -> Result<()> {
        let node = self.nodes.get(key).ok_or_else(|| {
            Error::InvariantViolation(format!("dangling node key {:?}", key))
        })?;
        *node_count += 1;

        if node.parent != parent {
            return Err(Error::InvariantViolation(format!(
                "node {:?} has parent {:?}, expected {:?}", key, node.parent, parent
            )));
        }

        for &item_key in &node.items {
            let item = self.items.get(item_key).ok_or_else(|| {
                Error::InvariantViolation(format!("dangling item key {:?}", item_key))
            })?;
            *item_count += 1;

            if item.container != Some(key) {
                return Err(Error::InvariantViolation(format!(
                    "item {:?} stored in {:?} but points to {:?}", item_key, key, item.container
                )));
            }
            if item.payload.is_none() {
                return Err(Error::InvariantViolation(format!(
                    "item {:?} has no payload", item_key
                )));
            }
            let placed = item.placed_bounds();
            if !node.bounds.contains(&placed) {
                return Err(Error::InvariantViolation(format!(
                    "item {:?} {:?} escapes node {:?}", item_key, placed, node.bounds
                )));
            }
            if let Some(children) = &node.children {
                let fits_child = children.iter().any(|&child| {
                    self.nodes.get(child).is_some_and(|c| c.bounds.contains(&placed))
                });
                if fits_child {
                    return Err(Error::InvariantViolation(format!(
                        "item {:?} {:?} fits a child of {:?}", item_key, placed, node.bounds
                    )));
                }
            }
        }

        match &node.children {
            None => {
                if node.items.len() > self.max_items && self.can_split(key) {
                    return Err(Error::InvariantViolation(format!(
                        "leaf {:?} holds {} items, limit {}", node.bounds, node.items.len(), self.max_items
                    )));
                }
            }
            Some(children) => {
                for (octant, &child) in children.iter().enumerate() {
                    let child_node = self.nodes.get(child).ok_or_else(|| {
                        Error::InvariantViolation(format!("dangling child key {:?}", child))
                    })?;
                    if child_node.bounds != node.bounds.octant(octant as u8) {
                        return Err(Error::InvariantViolation(format!(
                            "child {:?} is not octant {} of {:?}", child_node.bounds, octant, node.bounds
                        )));
                    }
                    self.validate_node(child, Some(key), node_count, item_count)?;
                }
            }
        }

        Ok(())
    }
}

/// One growth step: a box twice the size of `bounds`, extended on each axis
/// toward `target`.
pub(crate) fn grown_toward(bounds: &AABB, target: Vec3) -> AABB {
    let size = bounds.dimensions();
    let toward = target - bounds.center();

    AABB::new(
        Vec3::new(
            if toward.x >= 0.0 { bounds.min.x } else { bounds.min.x - size.x },
            if toward.y >= 0.0 { bounds.min.y } else { bounds.min.y - size.y },
            if toward.z >= 0.0 { bounds.min.z } else { bounds.min.z - size.z },
        ),
        Vec3::new(
            if toward.x >= 0.0 { bounds.max.x + size.x } else { bounds.max.x },
            if toward.y >= 0.0 { bounds.max.y + size.y } else { bounds.max.y },
            if toward.z >= 0.0 { bounds.max.z + size.z } else { bounds.max.z },
        ),
    )
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
