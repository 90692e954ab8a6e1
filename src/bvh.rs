//! Bounding-volume hierarchy over id-keyed AABBs
//!
//! Backs the broad phase for agents and features. Leaves store the exact
//! AABB supplied by the caller; internally each entry is fattened by the
//! configured tolerance so small per-tick movements do not invalidate the
//! tree. The tree itself is rebuilt lazily: mutations mark it dirty and
//! the next query rebuilds once, so a bulk end-of-tick refresh costs a
//! single rebuild instead of one per entity.

use hashbrown::HashMap;
use parking_lot::{RwLock, RwLockUpgradableReadGuard, RwLockWriteGuard};
use smallvec::SmallVec;
use thiserror::Error;

use crate::entity::EntityId;
use crate::util::aabb::Aabb;
use crate::util::vec2::Vec2;

pub const DEFAULT_LEAF_SIZE: usize = 8;
pub const DEFAULT_TOLERANCE: f64 = 1.15;

/// Structural faults. These indicate a bookkeeping bug in the caller, not
/// a recoverable user error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BvhError {
    #[error("id {0} already has a leaf")]
    DuplicateLeaf(EntityId),
    #[error("id {0} has no leaf")]
    MissingLeaf(EntityId),
}

#[derive(Debug, Clone, Copy)]
struct Item {
    id: EntityId,
    /// Exact AABB as supplied by the caller
    tight: Aabb,
    /// Dilated AABB actually placed in the tree
    fat: Aabb,
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Branch { aabb: Aabb, left: u32, right: u32 },
    Leaf { aabb: Aabb, start: u32, len: u32 },
}

#[derive(Debug, Default)]
struct Tree {
    nodes: Vec<Node>,
    /// Item indices, grouped into contiguous leaf ranges
    order: Vec<u32>,
    dirty: bool,
}

/// Id-keyed BVH with fat leaves and deferred rebuilds
#[derive(Debug)]
pub struct Bvh {
    leaf_size: usize,
    tolerance: f64,
    items: Vec<Item>,
    slots: HashMap<EntityId, usize>,
    tree: RwLock<Tree>,
}

impl Bvh {
    /// `leaf_size` is clamped to at least 1, `tolerance` to at least 1.0
    pub fn new(leaf_size: usize, tolerance: f64) -> Self {
        Self {
            leaf_size: leaf_size.max(1),
            tolerance: tolerance.max(1.0),
            items: Vec::new(),
            slots: HashMap::new(),
            tree: RwLock::new(Tree::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Exact leaf AABB for `id`, as last supplied by insert/update
    pub fn get(&self, id: EntityId) -> Option<Aabb> {
        self.slots.get(&id).map(|&i| self.items[i].tight)
    }

    pub fn insert(&mut self, id: EntityId, aabb: Aabb) -> Result<(), BvhError> {
        if self.slots.contains_key(&id) {
            return Err(BvhError::DuplicateLeaf(id));
        }
        self.slots.insert(id, self.items.len());
        self.items.push(Item {
            id,
            tight: aabb,
            fat: self.fatten(aabb),
        });
        self.tree.get_mut().dirty = true;
        Ok(())
    }

    pub fn remove(&mut self, id: EntityId) -> Result<(), BvhError> {
        let idx = self.slots.remove(&id).ok_or(BvhError::MissingLeaf(id))?;
        self.items.swap_remove(idx);
        if idx < self.items.len() {
            self.slots.insert(self.items[idx].id, idx);
        }
        self.tree.get_mut().dirty = true;
        Ok(())
    }

    /// Replace the AABB for `id`. The tree is only invalidated when the
    /// new box escapes the stored fat box.
    pub fn update(&mut self, id: EntityId, aabb: Aabb) -> Result<(), BvhError> {
        let idx = *self.slots.get(&id).ok_or(BvhError::MissingLeaf(id))?;
        let fat = self.fatten(aabb);
        let item = &mut self.items[idx];
        item.tight = aabb;
        if !item.fat.contains(&aabb) {
            item.fat = fat;
            self.tree.get_mut().dirty = true;
        }
        Ok(())
    }

    /// Every id whose leaf may intersect `query`. Conservative: includes
    /// all true intersections, may include fat-box false positives. Order
    /// is unspecified.
    pub fn broad_phase(&self, query: &Aabb) -> Vec<EntityId> {
        if self.items.is_empty() {
            return Vec::new();
        }

        // Upgradable read: concurrent queries share the tree, the first
        // one after a mutation rebuilds it exactly once.
        let guard = self.tree.upgradable_read();
        let tree = if guard.dirty {
            let mut w = RwLockUpgradableReadGuard::upgrade(guard);
            w.rebuild(self.leaf_size, &self.items);
            RwLockWriteGuard::downgrade(w)
        } else {
            RwLockUpgradableReadGuard::downgrade(guard)
        };

        let mut hits = Vec::new();
        let mut stack: SmallVec<[u32; 32]> = SmallVec::new();
        stack.push(0);
        while let Some(i) = stack.pop() {
            match tree.nodes[i as usize] {
                Node::Branch { aabb, left, right } => {
                    if aabb.intersects(query) {
                        stack.push(left);
                        stack.push(right);
                    }
                }
                Node::Leaf { aabb, start, len } => {
                    if !aabb.intersects(query) {
                        continue;
                    }
                    for &item_idx in &tree.order[start as usize..(start + len) as usize] {
                        let item = &self.items[item_idx as usize];
                        if item.fat.intersects(query) {
                            hits.push(item.id);
                        }
                    }
                }
            }
        }
        hits
    }

    fn fatten(&self, aabb: Aabb) -> Aabb {
        if self.tolerance > 1.0 {
            aabb.dilated(self.tolerance)
        } else {
            aabb
        }
    }
}

impl Tree {
    fn rebuild(&mut self, leaf_size: usize, items: &[Item]) {
        self.nodes.clear();
        self.order.clear();
        self.order.extend(0..items.len() as u32);
        if !items.is_empty() {
            self.split(leaf_size, items, 0, items.len());
        }
        self.dirty = false;
    }

    /// Build the subtree for order[start..end]; returns its node index
    fn split(&mut self, leaf_size: usize, items: &[Item], start: usize, end: usize) -> u32 {
        let mut aabb = items[self.order[start] as usize].fat;
        for &i in &self.order[start + 1..end] {
            aabb = aabb.union(&items[i as usize].fat);
        }

        let idx = self.nodes.len() as u32;
        if end - start <= leaf_size {
            self.nodes.push(Node::Leaf {
                aabb,
                start: start as u32,
                len: (end - start) as u32,
            });
            return idx;
        }

        // Median split along the wider centroid axis
        let extent = aabb.max - aabb.min;
        let key: fn(Vec2) -> f64 = if extent.x >= extent.y { |c| c.x } else { |c| c.y };
        self.order[start..end].sort_unstable_by(|&i, &j| {
            key(items[i as usize].fat.center()).total_cmp(&key(items[j as usize].fat.center()))
        });
        let mid = (start + end) / 2;

        self.nodes.push(Node::Branch {
            aabb,
            left: 0,
            right: 0,
        });
        let left = self.split(leaf_size, items, start, mid);
        let right = self.split(leaf_size, items, mid, end);
        self.nodes[idx as usize] = Node::Branch { aabb, left, right };
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(x: f64, y: f64) -> Aabb {
        Aabb::around(Vec2::new(x, y), 0.5)
    }

    fn sorted(mut ids: Vec<EntityId>) -> Vec<EntityId> {
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_insert_and_query() {
        let mut bvh = Bvh::new(DEFAULT_LEAF_SIZE, 1.0);
        bvh.insert(1, unit_box(0.0, 0.0)).unwrap();
        bvh.insert(2, unit_box(10.0, 10.0)).unwrap();

        let hits = bvh.broad_phase(&unit_box(0.2, 0.2));
        assert_eq!(hits, vec![1]);
        assert_eq!(bvh.len(), 2);
    }

    #[test]
    fn test_query_empty() {
        let bvh = Bvh::new(DEFAULT_LEAF_SIZE, 1.0);
        assert!(bvh.broad_phase(&unit_box(0.0, 0.0)).is_empty());
    }

    #[test]
    fn test_duplicate_insert_fails() {
        let mut bvh = Bvh::new(DEFAULT_LEAF_SIZE, 1.0);
        bvh.insert(1, unit_box(0.0, 0.0)).unwrap();
        assert_eq!(
            bvh.insert(1, unit_box(1.0, 1.0)),
            Err(BvhError::DuplicateLeaf(1))
        );
    }

    #[test]
    fn test_remove() {
        let mut bvh = Bvh::new(DEFAULT_LEAF_SIZE, 1.0);
        bvh.insert(1, unit_box(0.0, 0.0)).unwrap();
        bvh.insert(2, unit_box(0.4, 0.0)).unwrap();
        bvh.remove(1).unwrap();

        assert_eq!(bvh.broad_phase(&unit_box(0.0, 0.0)), vec![2]);
        assert_eq!(bvh.remove(1), Err(BvhError::MissingLeaf(1)));
        assert!(!bvh.contains(1));
        assert!(bvh.contains(2));
    }

    #[test]
    fn test_update_moves_leaf() {
        let mut bvh = Bvh::new(DEFAULT_LEAF_SIZE, 1.0);
        bvh.insert(1, unit_box(0.0, 0.0)).unwrap();
        bvh.update(1, unit_box(50.0, 50.0)).unwrap();

        assert!(bvh.broad_phase(&unit_box(0.0, 0.0)).is_empty());
        assert_eq!(bvh.broad_phase(&unit_box(50.0, 50.0)), vec![1]);
        assert_eq!(bvh.get(1), Some(unit_box(50.0, 50.0)));
    }

    #[test]
    fn test_update_missing_fails() {
        let mut bvh = Bvh::new(DEFAULT_LEAF_SIZE, 1.0);
        assert_eq!(
            bvh.update(9, unit_box(0.0, 0.0)),
            Err(BvhError::MissingLeaf(9))
        );
    }

    #[test]
    fn test_get_returns_exact_box_despite_fattening() {
        let mut bvh = Bvh::new(DEFAULT_LEAF_SIZE, 1.5);
        let tight = unit_box(3.0, 3.0);
        bvh.insert(1, tight).unwrap();
        assert_eq!(bvh.get(1), Some(tight));
    }

    #[test]
    fn test_small_move_stays_within_fat_box() {
        let mut bvh = Bvh::new(DEFAULT_LEAF_SIZE, 1.5);
        bvh.insert(1, unit_box(0.0, 0.0)).unwrap();
        // Build the tree once
        assert_eq!(bvh.broad_phase(&unit_box(0.0, 0.0)), vec![1]);

        // A nudge within the fat box must stay queryable
        bvh.update(1, unit_box(0.1, 0.1)).unwrap();
        assert_eq!(bvh.broad_phase(&unit_box(0.1, 0.1)), vec![1]);
        assert_eq!(bvh.get(1), Some(unit_box(0.1, 0.1)));
    }

    #[test]
    fn test_broad_phase_matches_brute_force() {
        // Enough entries to force several levels of splits
        let mut bvh = Bvh::new(2, 1.15);
        let mut boxes = Vec::new();
        for i in 0..60u64 {
            // Deterministic scatter
            let x = ((i * 37) % 100) as f64;
            let y = ((i * 53) % 100) as f64;
            let b = Aabb::around(Vec2::new(x, y), 1.0 + (i % 3) as f64);
            bvh.insert(i, b).unwrap();
            boxes.push((i, b));
        }

        for (qx, qy, qr) in [(10.0, 10.0, 5.0), (50.0, 50.0, 20.0), (90.0, 5.0, 2.0)] {
            let query = Aabb::around(Vec2::new(qx, qy), qr);
            let hits = sorted(bvh.broad_phase(&query));
            for (id, b) in &boxes {
                if b.intersects(&query) {
                    assert!(hits.contains(id), "missing true positive {id}");
                }
            }
        }
    }

    #[test]
    fn test_rebuild_after_bulk_update() {
        let mut bvh = Bvh::new(4, 1.15);
        for i in 0..20u64 {
            bvh.insert(i, unit_box(i as f64 * 3.0, 0.0)).unwrap();
        }
        // Shift the whole population; single rebuild on next query
        for i in 0..20u64 {
            bvh.update(i, unit_box(i as f64 * 3.0, 100.0)).unwrap();
        }
        let hits = bvh.broad_phase(&Aabb::new(
            Vec2::new(-1.0, 99.0),
            Vec2::new(100.0, 101.0),
        ));
        assert_eq!(hits.len(), 20);
    }
}
