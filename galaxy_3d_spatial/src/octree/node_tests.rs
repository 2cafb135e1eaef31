use glam::Vec3;
use super::*;

fn cube(center: Vec3, half: f32) -> AABB {
    AABB::from_center_half_extents(center, Vec3::splat(half))
}

fn point(x: f32, y: f32, z: f32) -> AABB {
    let p = Vec3::new(x, y, z);
    AABB::new(p, p)
}

/// Store with a [-8, 8]³ root
fn store(max_items: usize) -> (NodeStore<u32>, NodeKey) {
    let mut store = NodeStore::new(max_items, 16);
    let root = store.create_node(cube(Vec3::ZERO, 8.0), None);
    (store, root)
}

fn insert(store: &mut NodeStore<u32>, root: NodeKey, bounds: AABB, payload: u32) -> ItemKey {
    let key = store.create_item(bounds, payload);
    assert_ne!(store.try_insert(root, key), InsertOutcome::DidNotFit);
    key
}

// ============================================================================
// try_insert
// ============================================================================

#[test]
fn test_insert_into_leaf_root() {
    let (mut store, root) = store(4);
    let key = store.create_item(point(1.0, 1.0, 1.0), 1);

    assert_eq!(store.try_insert(root, key), InsertOutcome::InsertedHere);
    assert_eq!(store.items[key].container, Some(root));
    assert_eq!(store.nodes[root].items, vec![key]);
    assert!(store.validate(root).is_ok());
}

#[test]
fn test_insert_outside_does_not_fit() {
    let (mut store, root) = store(4);
    let key = store.create_item(point(20.0, 0.0, 0.0), 1);

    assert_eq!(store.try_insert(root, key), InsertOutcome::DidNotFit);
    assert!(store.items[key].container.is_none());
    assert!(store.nodes[root].items.is_empty());
}

#[test]
fn test_split_once_over_capacity() {
    let (mut store, root) = store(4);
    for (i, x) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
        insert(&mut store, root, point(x, x, x), i as u32);
    }
    assert!(store.nodes[root].children.is_none());

    let fifth = store.create_item(point(-1.0, -1.0, -1.0), 5);
    assert_eq!(store.try_insert(root, fifth), InsertOutcome::InsertedInChild);

    let children = store.nodes[root].children.as_deref().copied().unwrap();
    assert!(store.nodes[root].items.is_empty());
    // +X+Y+Z octant holds the four positive points, -X-Y-Z the fifth
    assert_eq!(store.nodes[children[7]].items.len(), 4);
    assert_eq!(store.nodes[children[0]].items, vec![fifth]);
    assert_eq!(store.node_count_for_test(), 9);
    assert!(store.validate(root).is_ok());
}

#[test]
fn test_straddling_item_stays_in_parent() {
    let (mut store, root) = store(1);
    insert(&mut store, root, point(4.0, 4.0, 4.0), 1);
    let straddler = insert(&mut store, root, cube(Vec3::ZERO, 1.0), 2);

    assert!(store.nodes[root].children.is_some());
    assert_eq!(store.items[straddler].container, Some(root));
    assert!(store.validate(root).is_ok());
}

#[test]
fn test_split_recurses_into_overfull_child() {
    // All five points land in the +X+Y+Z octant, which must split again
    let (mut store, root) = store(4);
    for (i, x) in [1.0, 2.0, 3.0, 5.0, 6.0].into_iter().enumerate() {
        insert(&mut store, root, point(x, x, x), i as u32);
    }

    assert_eq!(store.depth(root), 3);
    assert_eq!(store.node_count_for_test(), 17);
    let children = store.nodes[root].children.as_deref().copied().unwrap();
    let grandchildren = store.nodes[children[7]].children.as_deref().copied().unwrap();
    assert_eq!(store.nodes[grandchildren[0]].items.len(), 3);
    assert_eq!(store.nodes[grandchildren[7]].items.len(), 2);
    assert!(store.max_leaf_items(root) <= 4);
    assert!(store.validate(root).is_ok());
}

#[test]
fn test_clustered_points_split_until_separated() {
    let (mut store, root) = store(1);
    insert(&mut store, root, point(0.5, 0.5, 0.5), 1);
    insert(&mut store, root, point(0.51, 0.5, 0.5), 2);

    assert!(store.depth(root) > 5);
    assert_eq!(store.max_leaf_items(root), 1);
    assert!(store.validate(root).is_ok());
}

#[test]
fn test_coincident_points_do_not_split() {
    let (mut store, root) = store(1);
    insert(&mut store, root, point(7.0, 7.0, 7.0), 1);
    insert(&mut store, root, point(7.0, 7.0, 7.0), 2);
    insert(&mut store, root, point(7.0, 7.0, 7.0), 3);

    assert_eq!(store.depth(root), 1);
    assert_eq!(store.nodes[root].items.len(), 3);
    assert!(store.validate(root).is_ok());

    // A distinct item separates the group from it, one level down
    insert(&mut store, root, point(-7.0, -7.0, -7.0), 4);
    let children = store.nodes[root].children.as_deref().copied().unwrap();
    assert_eq!(store.nodes[children[7]].items.len(), 3);
    assert!(store.nodes[children[7]].children.is_none());
    assert_eq!(store.nodes[children[0]].items.len(), 1);
    assert!(store.validate(root).is_ok());
}

#[test]
fn test_node_too_small_to_halve_does_not_split() {
    let mut store = NodeStore::<u32>::new(1, 16);
    let bounds = AABB::new(Vec3::ONE, Vec3::splat(1.0 + f32::EPSILON));
    let root = store.create_node(bounds, None);

    insert(&mut store, root, AABB::new(Vec3::ONE, Vec3::ONE), 1);
    insert(&mut store, root, bounds, 2);

    assert!(store.nodes[root].children.is_none());
    assert_eq!(store.nodes[root].items.len(), 2);
    assert!(store.validate(root).is_ok());
}

// ============================================================================
// remove / consolidate
// ============================================================================

#[test]
fn test_remove_consolidates_sparse_subtree() {
    let (mut store, root) = store(4);
    let keys: Vec<_> = (0..5)
        .map(|i| insert(&mut store, root, point(i as f32 - 2.5, 1.0, 1.0), i))
        .collect();
    assert!(store.nodes[root].children.is_some());

    assert_eq!(store.remove(keys[0]), Some(0));
    assert_eq!(store.remove(keys[1]), Some(1));

    // 3 items left, below the threshold of 4
    assert!(store.nodes[root].children.is_none());
    assert_eq!(store.nodes[root].items.len(), 3);
    assert_eq!(store.node_count_for_test(), 1);
    assert!(store.validate(root).is_ok());
}

#[test]
fn test_remove_keeps_dense_subtree() {
    let (mut store, root) = store(2);
    let keys: Vec<_> = (0..6)
        .map(|i| insert(&mut store, root, point(-7.0 + i as f32 * 2.5, 1.0, 1.0), i))
        .collect();

    store.remove(keys[0]);
    assert!(store.nodes[root].children.is_some());
    assert!(store.validate(root).is_ok());
}

#[test]
fn test_remove_stale_key_returns_none() {
    let (mut store, root) = store(4);
    let key = insert(&mut store, root, point(1.0, 1.0, 1.0), 1);
    assert_eq!(store.remove(key), Some(1));
    assert_eq!(store.remove(key), None);
}

#[test]
fn test_count_items_up_to_stops_at_limit() {
    let (mut store, root) = store(2);
    for i in 0..10 {
        insert(&mut store, root, point(-7.0 + i as f32 * 1.5, -3.0, 2.0), i);
    }
    assert_eq!(store.count_items_up_to(root, 3), 3);
    assert_eq!(store.count_items_up_to(root, 100), 10);
}

// ============================================================================
// relocate
// ============================================================================

#[test]
fn test_relocate_within_container_pushes_down() {
    let (mut store, root) = store(1);
    insert(&mut store, root, point(4.0, 4.0, 4.0), 1);
    let mover = insert(&mut store, root, cube(Vec3::ZERO, 1.0), 2);
    assert_eq!(store.items[mover].container, Some(root));

    store.items[mover].bounds = point(-4.0, -4.0, -4.0);
    assert_eq!(store.relocate(mover, root), root);

    assert_ne!(store.items[mover].container, Some(root));
    assert!(store.validate(root).is_ok());
}

#[test]
fn test_relocate_to_sibling_via_ancestor() {
    let (mut store, root) = store(1);
    let a = insert(&mut store, root, point(4.0, 4.0, 4.0), 1);
    insert(&mut store, root, point(-4.0, -4.0, -4.0), 2);

    store.items[a].bounds = point(-4.0, 4.0, -4.0);
    assert_eq!(store.relocate(a, root), root);

    let container = store.items[a].container.unwrap();
    assert!(store.nodes[container].bounds.contains(&point(-4.0, 4.0, -4.0)));
    assert!(store.validate(root).is_ok());
}

#[test]
fn test_relocate_outside_root_grows() {
    let (mut store, root) = store(4);
    let key = insert(&mut store, root, point(1.0, 1.0, 1.0), 1);

    store.items[key].bounds = point(20.0, 0.0, 0.0);
    let new_root = store.relocate(key, root);

    assert_ne!(new_root, root);
    assert!(store.nodes[new_root].bounds.contains(&point(20.0, 0.0, 0.0)));
    assert!(store.validate(new_root).is_ok());
}

#[test]
fn test_relocate_clears_pending_flag() {
    let (mut store, root) = store(4);
    let key = insert(&mut store, root, point(1.0, 1.0, 1.0), 1);
    store.items[key].moved_from = Some(point(1.0, 1.0, 1.0));
    store.items[key].bounds = point(2.0, 2.0, 2.0);
    store.relocate(key, root);
    assert!(!store.items[key].is_pending_move());
    assert!(store.validate(root).is_ok());
}

#[test]
fn test_relocate_splits_leaf_when_coincident_items_separate() {
    let (mut store, root) = store(1);
    insert(&mut store, root, point(3.0, 3.0, 3.0), 1);
    let mover = insert(&mut store, root, point(3.0, 3.0, 3.0), 2);
    assert!(store.nodes[root].children.is_none());

    store.items[mover].bounds = point(-3.0, -3.0, -3.0);
    store.relocate(mover, root);

    assert!(store.nodes[root].children.is_some());
    assert_eq!(store.max_leaf_items(root), 1);
    assert!(store.validate(root).is_ok());
}

// ============================================================================
// grow / trim
// ============================================================================

#[test]
fn test_grow_doubles_toward_item() {
    let (mut store, root) = store(4);
    let key = store.create_item(point(10.0, 10.0, 10.0), 1);

    let new_root = store.grow(root, key);

    assert_eq!(store.nodes[new_root].bounds, AABB::new(Vec3::splat(-8.0), Vec3::splat(24.0)));
    // Old root is the low octant of the grown root
    let children = store.nodes[new_root].children.as_deref().copied().unwrap();
    assert_eq!(children[0], root);
    assert_eq!(store.nodes[root].parent, Some(new_root));
    assert!(store.validate(new_root).is_ok());
}

#[test]
fn test_grow_toward_negative_direction() {
    let (mut store, root) = store(4);
    let key = store.create_item(point(-10.0, 1.0, -10.0), 1);

    let new_root = store.grow(root, key);

    assert_eq!(
        store.nodes[new_root].bounds,
        AABB::new(Vec3::new(-24.0, -8.0, -24.0), Vec3::new(8.0, 24.0, 8.0))
    );
    let children = store.nodes[new_root].children.as_deref().copied().unwrap();
    // High X, low Y, high Z
    assert_eq!(children[0b101], root);
    assert!(store.validate(new_root).is_ok());
}

#[test]
fn test_grow_repeats_until_item_fits() {
    let (mut store, root) = store(4);
    let key = store.create_item(point(100.0, 100.0, 100.0), 1);

    let new_root = store.grow(root, key);

    assert!(store.nodes[new_root].bounds.contains(&point(100.0, 100.0, 100.0)));
    assert!(store.depth(new_root) >= 4);
    assert!(store.validate(new_root).is_ok());
}

#[test]
fn test_grow_rebuilds_when_old_root_is_off_grid() {
    // Doubling [-0.7, 0.2] upward puts the grown center one ulp off 0.2
    let mut store = NodeStore::<u32>::new(4, 16);
    let old = AABB::new(Vec3::splat(-0.7), Vec3::splat(0.2));
    let root = store.create_node(old, None);
    insert(&mut store, root, point(-0.5, -0.5, -0.5), 1);
    insert(&mut store, root, point(0.1, 0.1, 0.1), 2);
    let key = store.create_item(point(1.0, 1.0, 1.0), 3);

    let grown = grown_toward(&old, Vec3::ONE);
    assert_ne!(grown.octant(0), old);

    let new_root = store.grow(root, key);

    assert!(!store.nodes.contains_key(root));
    assert!(store.nodes[new_root].bounds.contains(&point(1.0, 1.0, 1.0)));
    assert_eq!(store.items.len(), 3);
    assert!(store.validate(new_root).is_ok());
}

#[test]
fn test_grow_reuses_old_root_on_exact_octant() {
    let (mut store, root) = store(4);
    let target = point(10.0, -10.0, 10.0);
    let grown = grown_toward(&store.nodes[root].bounds, target.center());
    let octant = grown.octant_of_point(Vec3::ZERO);
    assert_eq!(grown.octant(octant), store.nodes[root].bounds);

    let key = store.create_item(target, 1);
    let new_root = store.grow(root, key);

    let children = store.nodes[new_root].children.as_deref().copied().unwrap();
    assert_eq!(children[octant as usize], root);
}

#[test]
fn test_can_reach_rejects_overflowing_growth() {
    let (store, root) = store(4);
    assert!(store.can_reach(root, &point(1.0, 1.0, 1.0)));
    assert!(store.can_reach(root, &point(1.0e6, -1.0e6, 1.0e6)));
    assert!(store.can_reach(root, &point(1.0e38, 1.0e38, 1.0e38)));
    assert!(!store.can_reach(root, &point(3.0e38, 3.0e38, 3.0e38)));
    assert!(!store.can_reach(root, &AABB::new(Vec3::splat(-3.0e38), Vec3::splat(3.0e38))));
}

#[test]
fn test_trim_promotes_single_occupied_child() {
    // Threshold of 1 so removal leaves the grown root split
    let (mut store, root) = store(1);
    let key = store.create_item(point(10.0, 10.0, 10.0), 1);
    let grown = store.grow(root, key);
    insert(&mut store, grown, point(1.0, 1.0, 1.0), 2);

    store.remove(key);
    assert!(store.nodes[grown].children.is_some());

    let trimmed = store.trim(grown);
    assert_eq!(trimmed, root);
    assert!(store.nodes[root].parent.is_none());
    assert_eq!(store.node_count_for_test(), 1);
    assert!(store.validate(root).is_ok());
}

#[test]
fn test_trim_stops_at_root_with_items() {
    let (mut store, root) = store(1);
    insert(&mut store, root, point(4.0, 4.0, 4.0), 1);
    insert(&mut store, root, cube(Vec3::ZERO, 1.0), 2);
    assert_eq!(store.trim(root), root);
}

#[test]
fn test_trim_stops_with_two_occupied_children() {
    let (mut store, root) = store(1);
    insert(&mut store, root, point(4.0, 4.0, 4.0), 1);
    insert(&mut store, root, point(-4.0, -4.0, -4.0), 2);
    assert_eq!(store.trim(root), root);
}

// ============================================================================
// Traversal
// ============================================================================

#[test]
fn test_clear_node_keeps_root() {
    let (mut store, root) = store(2);
    for i in 0..12 {
        insert(&mut store, root, point(-7.0 + i as f32, 2.0, -2.0), i);
    }

    store.clear_node(root);

    assert!(store.items.is_empty());
    assert_eq!(store.node_count_for_test(), 1);
    assert!(store.nodes[root].children.is_none());
    assert!(store.validate(root).is_ok());
}

#[test]
fn test_find_first_and_collect_pending() {
    let (mut store, root) = store(2);
    let keys: Vec<_> = (0..6)
        .map(|i| insert(&mut store, root, point(-6.0 + i as f32 * 2.0, 1.0, 1.0), i))
        .collect();

    assert_eq!(store.find_first(root, &mut |p| *p == 4), Some(keys[4]));
    assert_eq!(store.find_first(root, &mut |p| *p == 99), None);

    store.items[keys[1]].moved_from = Some(store.items[keys[1]].bounds);
    store.items[keys[3]].moved_from = Some(store.items[keys[3]].bounds);
    let mut pending = Vec::new();
    store.collect_pending(root, &mut pending);
    pending.sort();
    let mut expected = vec![keys[1], keys[3]];
    expected.sort();
    assert_eq!(pending, expected);
}

#[test]
fn test_ray_cast_sums_filter_counts() {
    let (mut store, root) = store(2);
    for i in 0..4 {
        insert(&mut store, root, cube(Vec3::new(-6.0 + i as f32 * 4.0, 0.5, 0.5), 0.25), i);
    }
    insert(&mut store, root, cube(Vec3::new(0.0, -5.0, 0.0), 0.25), 100);

    let ray = Ray::new(Vec3::new(-10.0, 0.5, 0.5), Vec3::X);
    let mut hits = Vec::new();
    let count = store.ray_cast(root, &ray, &mut hits, &mut |_, item, hits: &mut Vec<u32>| {
        hits.push(*item.payload);
        1
    });

    assert_eq!(count, 4);
    hits.sort();
    assert_eq!(hits, vec![0, 1, 2, 3]);
}

// ============================================================================
// validate
// ============================================================================

#[test]
fn test_validate_detects_escaped_item() {
    let (mut store, root) = store(4);
    let key = insert(&mut store, root, point(1.0, 1.0, 1.0), 1);
    store.items[key].bounds = point(50.0, 0.0, 0.0);

    assert!(matches!(store.validate(root), Err(Error::InvariantViolation(_))));

    // A pending move keeps the item checked at its old placement
    store.items[key].moved_from = Some(point(1.0, 1.0, 1.0));
    assert!(store.validate(root).is_ok());
}

#[test]
fn test_validate_detects_overfull_leaf() {
    let (mut store, root) = store(1);
    let a = store.create_item(point(1.0, 1.0, 1.0), 1);
    let b = store.create_item(point(-1.0, -1.0, -1.0), 2);
    store.attach(root, a);
    store.attach(root, b);

    assert!(matches!(store.validate(root), Err(Error::InvariantViolation(_))));
}

#[test]
fn test_validate_detects_misaligned_child() {
    let (mut store, root) = store(1);
    insert(&mut store, root, point(4.0, 4.0, 4.0), 1);
    insert(&mut store, root, point(-4.0, -4.0, -4.0), 2);
    let children = store.nodes[root].children.as_deref().copied().unwrap();
    store.nodes[children[3]].bounds.max.x += 0.5;

    assert!(matches!(store.validate(root), Err(Error::InvariantViolation(_))));
}

#[test]
fn test_validate_detects_orphan_item() {
    let (mut store, root) = store(4);
    store.create_item(point(1.0, 1.0, 1.0), 1);
    assert!(matches!(store.validate(root), Err(Error::InvariantViolation(_))));
}

impl<T> NodeStore<T> {
    fn node_count_for_test(&self) -> usize {
        self.nodes.len()
    }

    fn max_leaf_items(&self, node: NodeKey) -> usize {
        let n = &self.nodes[node];
        match &n.children {
            None => n.items.len(),
            Some(children) => children.iter().map(|&child| self.max_leaf_items(child)).max().unwrap_or(0),
        }
    }
}
