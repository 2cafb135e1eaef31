/// Items: bounded payloads stored in the octree.
///
/// Items live in a SlotMap owned by the tree. Callers only ever hold an
/// `ItemKey`; the generation inside the key makes a removed item's key
/// permanently stale, so it can never alias a later item.

use slotmap::new_key_type;
use crate::geometry::AABB;
use super::node::NodeKey;

new_key_type! {
    /// Stable handle to an item stored in an `Octree`
    pub struct ItemKey;
}

/// An item stored in the tree.
///
/// `payload` is `None` only while the shell sits in the pool.
pub(crate) struct Item<T> {
    /// Current bounds (already updated for a pending move)
    pub(crate) bounds: AABB,
    /// Bounds the tree placed the item with, kept while a move is pending.
    /// Set by `mark_item_moved`, cleared when the move is applied.
    pub(crate) moved_from: Option<AABB>,
    /// User payload
    pub(crate) payload: Option<T>,
    /// Node whose item list holds this item (non-owning)
    pub(crate) container: Option<NodeKey>,
}

impl<T> Item<T> {
    pub(crate) fn new(bounds: AABB, payload: T) -> Self {
        Self {
            bounds,
            moved_from: None,
            payload: Some(payload),
            container: None,
        }
    }

    /// The bounds that decide where the item sits in the tree
    pub(crate) fn placed_bounds(&self) -> AABB {
        self.moved_from.unwrap_or(self.bounds)
    }

    pub(crate) fn is_pending_move(&self) -> bool {
        self.moved_from.is_some()
    }
}

/// Borrowed view of an item, handed to ray-cast filters.
#[derive(Debug)]
pub struct ItemRef<'a, T> {
    /// Key of the item
    pub key: ItemKey,
    /// Current bounds of the item
    pub bounds: &'a AABB,
    /// User payload
    pub payload: &'a T,
}

impl<T> Clone for ItemRef<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ItemRef<'_, T> {}
