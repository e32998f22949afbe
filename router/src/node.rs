use crate::item::{Item, ItemId, KindMask, Line};
use crate::rules::{DEFAULT_CLEARANCE, RuleResolver};
use pns_common::db::indices::{BoardItemRef, NetId};
use pns_common::geom::rtree::SpatialIndex;
use pns_common::geom::{IPoint, Rect};
use std::cell::Cell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

/// Search radius used for collision queries until the host installs its own.
pub const DEFAULT_MAX_CLEARANCE: i64 = 4 * DEFAULT_CLEARANCE;

/// An item found by a collision query together with the clearance it violates.
#[derive(Clone, Debug)]
pub struct Obstacle {
    pub id: ItemId,
    pub item: Item,
    pub clearance: i64,
}

/// Difference between a branch and its parent.
#[derive(Clone, Debug, Default)]
pub struct ChangeSet {
    pub removed: Vec<(ItemId, Item)>,
    pub added: Vec<(ItemId, Item)>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// Branchable world snapshot.
///
/// A node owns only the items added on it. Everything else is looked up
/// through the parent chain, minus the ids this node (or a node between it
/// and the owner) has tombstoned. Branching never copies items and a branch
/// never mutates its parent, so dropping a branch is always a clean revert.
#[derive(Clone)]
pub struct Node {
    parent: Option<Rc<Node>>,
    depth: usize,
    items: HashMap<ItemId, Item>,
    removed: HashSet<ItemId>,
    index: SpatialIndex,
    joints: HashMap<IPoint, Vec<ItemId>>,
    by_parent: HashMap<BoardItemRef, ItemId>,
    rules: Option<Rc<dyn RuleResolver>>,
    max_clearance: i64,
    next_id: Rc<Cell<u32>>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("depth", &self.depth)
            .field("local_items", &self.items.len())
            .field("tombstones", &self.removed.len())
            .field("max_clearance", &self.max_clearance)
            .finish()
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl Node {
    pub fn new() -> Self {
        Self {
            parent: None,
            depth: 0,
            items: HashMap::new(),
            removed: HashSet::new(),
            index: SpatialIndex::new(),
            joints: HashMap::new(),
            by_parent: HashMap::new(),
            rules: None,
            max_clearance: DEFAULT_MAX_CLEARANCE,
            next_id: Rc::new(Cell::new(0)),
        }
    }

    /// Opens a trial branch on top of `this`.
    pub fn branch(this: &Rc<Node>) -> Node {
        Node {
            parent: Some(Rc::clone(this)),
            depth: this.depth + 1,
            items: HashMap::new(),
            removed: HashSet::new(),
            index: SpatialIndex::new(),
            joints: HashMap::new(),
            by_parent: HashMap::new(),
            rules: this.rules.clone(),
            max_clearance: this.max_clearance,
            next_id: Rc::clone(&this.next_id),
        }
    }

    /// Applies `child`'s additions and removals to `this`.
    ///
    /// # Panics
    /// If `child` was not branched from `this`, or if another branch of
    /// `this` is still alive.
    pub fn merge(this: &mut Rc<Node>, child: Node) {
        let direct = child.parent.as_ref().is_some_and(|p| Rc::ptr_eq(p, this));
        assert!(direct, "a node can only be merged into its direct parent");

        let Node {
            parent,
            items,
            removed,
            ..
        } = child;
        drop(parent);

        let Some(node) = Rc::get_mut(this) else {
            panic!("cannot merge into a node that still has other live branches");
        };

        let mut removed: Vec<ItemId> = removed.into_iter().collect();
        removed.sort();
        let mut added: Vec<(ItemId, Item)> = items.into_iter().collect();
        added.sort_by_key(|(id, _)| *id);
        log::debug!(
            "merge into depth {}: -{} +{} items",
            node.depth,
            removed.len(),
            added.len()
        );

        for id in removed {
            node.remove(id);
        }
        for (id, item) in added {
            node.insert_local(id, item);
        }
    }

    pub fn parent(&self) -> Option<&Rc<Node>> {
        self.parent.as_ref()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn set_rules(&mut self, rules: Rc<dyn RuleResolver>) {
        self.rules = Some(rules);
    }

    pub fn rules(&self) -> Option<&Rc<dyn RuleResolver>> {
        self.rules.as_ref()
    }

    pub fn set_max_clearance(&mut self, clearance: i64) {
        self.max_clearance = clearance;
    }

    pub fn max_clearance(&self) -> i64 {
        self.max_clearance
    }

    pub fn clearance(&self, a: &Item, b: &Item) -> i64 {
        match &self.rules {
            Some(r) => r.clearance(a, b),
            None => DEFAULT_CLEARANCE,
        }
    }

    pub fn net_clearance(&self, net: Option<NetId>) -> i64 {
        match &self.rules {
            Some(r) => r.net_clearance(net),
            None => DEFAULT_CLEARANCE,
        }
    }

    fn allocate_id(&self) -> ItemId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        ItemId(id)
    }

    /// Visible item with `id`, local or inherited.
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        if let Some(item) = self.items.get(&id) {
            return Some(item);
        }
        if self.removed.contains(&id) {
            return None;
        }
        self.parent.as_deref()?.item(id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.item(id).is_some()
    }

    fn levels(&self) -> impl Iterator<Item = &Node> {
        std::iter::successors(Some(self), |n| n.parent.as_deref())
    }

    /// All visible items ordered by id.
    pub fn items(&self) -> Vec<(ItemId, &Item)> {
        let mut out: Vec<(ItemId, &Item)> = self
            .levels()
            .flat_map(|level| level.items.keys().copied())
            .filter_map(|id| self.item(id).map(|item| (id, item)))
            .collect();
        out.sort_by_key(|(id, _)| *id);
        out.dedup_by_key(|(id, _)| *id);
        out
    }

    pub fn item_count(&self) -> usize {
        self.items().len()
    }

    pub fn net_items(&self, net: NetId) -> Vec<ItemId> {
        self.items()
            .into_iter()
            .filter(|(_, item)| item.net() == Some(net))
            .map(|(id, _)| id)
            .collect()
    }

    /// Visible items whose bounding box touches `area`.
    pub fn query_area(&self, area: Rect) -> Vec<ItemId> {
        let ids: BTreeSet<ItemId> = self
            .levels()
            .flat_map(|level| level.index.query(area))
            .map(ItemId)
            .filter(|&id| self.contains(id))
            .collect();
        ids.into_iter().collect()
    }

    /// Items terminating at `p`.
    pub fn joint_links(&self, p: IPoint) -> Vec<ItemId> {
        let ids: BTreeSet<ItemId> = self
            .levels()
            .filter_map(|level| level.joints.get(&p))
            .flatten()
            .copied()
            .filter(|&id| self.item(id).is_some_and(|item| item.anchors().contains(&p)))
            .collect();
        ids.into_iter().collect()
    }

    pub fn find_by_parent(&self, handle: BoardItemRef) -> Option<ItemId> {
        self.levels()
            .filter_map(|level| level.by_parent.get(&handle).copied())
            .find(|&id| self.item(id).is_some_and(|item| item.parent() == Some(handle)))
    }

    /// Visible item with the same geometry, layer and net as `item`.
    pub fn find_matching(&self, item: &Item) -> Option<ItemId> {
        let area = item.bbox()?;
        self.query_area(area).into_iter().find(|&id| {
            let Some(other) = self.item(id) else {
                return false;
            };
            match (item, other) {
                (Item::Segment(a), Item::Segment(b)) => a.same_geometry(b),
                (Item::Via(a), Item::Via(b)) => a.same_geometry(b),
                (Item::Solid(a), Item::Solid(b)) => a == b,
                _ => false,
            }
        })
    }

    /// Items of a kind in `mask` that violate clearance with `item`.
    /// Items of the same net are never reported.
    pub fn query_colliding(&self, item: &Item, mask: KindMask) -> Vec<Obstacle> {
        let Some(bbox) = item.bbox() else {
            return Vec::new();
        };
        self.query_area(bbox.inflate(self.max_clearance))
            .into_iter()
            .filter_map(|id| {
                let other = self.item(id)?;
                if !other.of_kind(mask) || other == item {
                    return None;
                }
                let clearance = self.clearance(item, other);
                item.collide(other, clearance).then(|| Obstacle {
                    id,
                    item: other.clone(),
                    clearance,
                })
            })
            .collect()
    }

    pub fn check_colliding(&self, item: &Item, mask: KindMask) -> Option<Obstacle> {
        self.query_colliding(item, mask).into_iter().next()
    }

    /// First obstacle met when travelling along `line`, with the distance
    /// along the line to the point where its clearance hull is entered.
    pub fn nearest_obstacle(&self, line: &Line, mask: KindMask) -> Option<(Obstacle, f64)> {
        let query = Item::Line(line.clone());
        self.query_colliding(&query, mask)
            .into_iter()
            .map(|obs| {
                let dist = obs
                    .item
                    .hulls(obs.clearance, line.width)
                    .iter()
                    .flat_map(|hull| line.chain().intersect(hull))
                    .map(|hit| line.chain().path_length(hit.p))
                    .fold(f64::INFINITY, f64::min);
                let dist = if dist.is_finite() { dist } else { 0.0 };
                (obs, dist)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.id.cmp(&b.0.id)))
    }

    fn insert_local(&mut self, id: ItemId, item: Item) {
        if let Some(b) = item.bbox() {
            self.index.insert(b, id.0);
        }
        for p in item.anchors() {
            self.joints.entry(p).or_default().push(id);
        }
        if let Some(handle) = item.parent() {
            self.by_parent.insert(handle, id);
        }
        self.items.insert(id, item);
    }

    fn remove_local(&mut self, id: ItemId) -> Option<Item> {
        let item = self.items.remove(&id)?;
        if let Some(b) = item.bbox() {
            self.index.remove(b, id.0);
        }
        for p in item.anchors() {
            if let Some(links) = self.joints.get_mut(&p) {
                links.retain(|&l| l != id);
                if links.is_empty() {
                    self.joints.remove(&p);
                }
            }
        }
        if let Some(handle) = item.parent() {
            if self.by_parent.get(&handle) == Some(&id) {
                self.by_parent.remove(&handle);
            }
        }
        Some(item)
    }

    /// Inserts a primitive item. Zero-length segments and exact duplicates
    /// of a visible item are ignored.
    ///
    /// # Panics
    /// When given a [`Line`]; lines go through [`Node::add_line`].
    pub fn add(&mut self, item: Item) -> Option<ItemId> {
        if let Item::Line(_) = item {
            panic!("lines must be added with Node::add_line");
        }
        if let Item::Segment(s) = &item {
            if s.is_degenerate() {
                return None;
            }
        }
        if self.find_matching(&item).is_some() {
            return None;
        }
        let id = self.allocate_id();
        self.insert_local(id, item);
        Some(id)
    }

    /// Removes a visible item; inherited items are tombstoned.
    pub fn remove(&mut self, id: ItemId) -> bool {
        if self.remove_local(id).is_some() {
            return true;
        }
        if self.contains(id) {
            self.removed.insert(id);
            return true;
        }
        false
    }

    /// Replaces a visible item by `item` and returns the new id.
    pub fn replace(&mut self, id: ItemId, item: Item) -> Option<ItemId> {
        self.remove(id);
        self.add(item)
    }

    /// Stores the segments and terminal via of `line`, linking them to it.
    /// Pieces that already exist are linked instead of duplicated.
    pub fn add_line(&mut self, line: &mut Line) {
        let mut links = Vec::new();
        for prim in line.primitives() {
            let id = match self.find_matching(&prim) {
                Some(id) => Some(id),
                None => self.add(prim),
            };
            links.extend(id);
        }
        line.set_links(links);
    }

    pub fn remove_line(&mut self, line: &Line) {
        for &id in line.links() {
            self.remove(id);
        }
    }

    pub fn replace_line(&mut self, old: &Line, new: &mut Line) {
        self.remove_line(old);
        self.add_line(new);
    }

    /// Sets the host handle of a local item.
    pub fn set_parent(&mut self, id: ItemId, handle: Option<BoardItemRef>) -> bool {
        let Some(mut item) = self.remove_local(id) else {
            return false;
        };
        item.set_parent(handle);
        self.insert_local(id, item);
        true
    }

    /// Items this node removed from its ancestors and items it added.
    pub fn changes(&self) -> ChangeSet {
        let mut removed: Vec<(ItemId, Item)> = match self.parent.as_deref() {
            Some(parent) => self
                .removed
                .iter()
                .filter_map(|&id| parent.item(id).map(|item| (id, item.clone())))
                .collect(),
            None => Vec::new(),
        };
        removed.sort_by_key(|(id, _)| *id);
        let mut added: Vec<(ItemId, Item)> =
            self.items.iter().map(|(&id, item)| (id, item.clone())).collect();
        added.sort_by_key(|(id, _)| *id);
        ChangeSet { removed, added }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Segment, Solid, Via, kind};
    use pns_common::geom::{LayerRange, LineChain, Seg};

    fn seg(x0: i64, y0: i64, x1: i64, y1: i64, net: u32) -> Item {
        Item::Segment(Segment::new(
            Seg::new(IPoint::new(x0, y0), IPoint::new(x1, y1)),
            200_000,
            0,
            Some(NetId(net)),
        ))
    }

    fn world() -> Rc<Node> {
        let mut n = Node::new();
        n.add(seg(0, 0, 10_000_000, 0, 1));
        n.add(seg(0, 400_000, 10_000_000, 400_000, 2));
        Rc::new(n)
    }

    #[test]
    fn detects_clearance_violation_between_nets() {
        let w = world();
        let query = seg(0, 0, 10_000_000, 0, 1);
        let hits = w.query_colliding(&query, kind::ANY);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].item.net(), Some(NetId(2)));
    }

    #[test]
    fn branch_does_not_touch_parent() {
        let w = world();
        let query = seg(0, 800_000, 10_000_000, 800_000, 7);
        let before = w.query_colliding(&query, kind::ANY).len();

        let mut b = Node::branch(&w);
        b.add(seg(0, 900_000, 10_000_000, 900_000, 5));
        let first = w.items()[0].0;
        assert!(b.remove(first));

        assert_eq!(w.query_colliding(&query, kind::ANY).len(), before);
        assert!(w.contains(first));
        assert!(!b.contains(first));
        assert_eq!(b.query_colliding(&query, kind::ANY).len(), before + 1);
    }

    #[test]
    fn merge_applies_changes() {
        let mut w = world();
        let mut b = Node::branch(&w);
        let first = w.items()[0].0;
        b.remove(first);
        let added = b.add(seg(0, -900_000, 5_000_000, -900_000, 3)).unwrap();
        let changes = b.changes();
        assert_eq!(changes.removed.len(), 1);
        assert_eq!(changes.added.len(), 1);

        Node::merge(&mut w, b);
        assert!(!w.contains(first));
        assert!(w.contains(added));
        assert_eq!(w.item_count(), 2);
        assert!(w.is_root());
    }

    #[test]
    fn empty_merge_is_observationally_identity() {
        let mut w = world();
        let query = seg(0, 200_000, 10_000_000, 200_000, 9);
        let before: Vec<ItemId> = w.query_colliding(&query, kind::ANY).iter().map(|o| o.id).collect();
        let b = Node::branch(&w);
        Node::merge(&mut w, b);
        let after: Vec<ItemId> = w.query_colliding(&query, kind::ANY).iter().map(|o| o.id).collect();
        assert_eq!(before, after);
    }

    #[test]
    #[should_panic(expected = "direct parent")]
    fn merge_into_foreign_node_panics() {
        let w = world();
        let mut other = Rc::new(Node::new());
        let b = Node::branch(&w);
        Node::merge(&mut other, b);
    }

    #[test]
    #[should_panic(expected = "add_line")]
    fn adding_line_as_primitive_panics() {
        let mut n = Node::new();
        let line = Line::new(LineChain::from_points([IPoint::new(0, 0), IPoint::new(10, 0)]), 1, 0, None);
        n.add(Item::Line(line));
    }

    #[test]
    fn add_ignores_degenerate_and_duplicates() {
        let mut n = Node::new();
        assert!(n.add(seg(5, 5, 5, 5, 1)).is_none());
        assert!(n.add(seg(0, 0, 100, 0, 1)).is_some());
        assert!(n.add(seg(100, 0, 0, 0, 1)).is_none());
        assert_eq!(n.item_count(), 1);
    }

    #[test]
    fn joints_and_lines() {
        let mut n = Node::new();
        let mut line = Line::new(
            LineChain::from_points([IPoint::new(0, 0), IPoint::new(1_000, 0), IPoint::new(1_000, 1_000)]),
            100,
            0,
            Some(NetId(1)),
        );
        line.set_via(Some(Via::new(IPoint::new(1_000, 1_000), LayerRange::new(0, 1), 600, 300, Some(NetId(1)))));
        n.add_line(&mut line);
        assert_eq!(line.links().len(), 3);
        assert_eq!(n.joint_links(IPoint::new(1_000, 0)).len(), 2);
        assert_eq!(n.joint_links(IPoint::new(1_000, 1_000)).len(), 2);

        n.remove_line(&line);
        assert_eq!(n.item_count(), 0);
        assert!(n.joint_links(IPoint::new(1_000, 0)).is_empty());
    }

    #[test]
    fn solids_without_copper_never_collide() {
        let mut n = Node::new();
        n.add(Item::Solid(Solid::new(IPoint::new(0, 0), LayerRange::new(0, 1), None, None)));
        assert!(n.query_colliding(&seg(0, 0, 100, 0, 1), kind::ANY).is_empty());
    }
}
