use super::rect::Rect;
use rstar::{AABB, RTree};

/// R-tree over item bounding boxes, keyed by a caller supplied id.
#[derive(Clone, Default)]
pub struct SpatialIndex {
    tree: RTree<IndexedRect>,
}

#[derive(Clone, PartialEq)]
struct IndexedRect {
    rect: Rect,
    id: u32,
}

impl rstar::RTreeObject for IndexedRect {
    type Envelope = AABB<[i64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.rect.min.x, self.rect.min.y],
            [self.rect.max.x, self.rect.max.y],
        )
    }
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    pub fn insert(&mut self, rect: Rect, id: u32) {
        self.tree.insert(IndexedRect { rect, id });
    }

    /// `rect` must be the box the id was inserted with.
    pub fn remove(&mut self, rect: Rect, id: u32) -> bool {
        self.tree.remove(&IndexedRect { rect, id }).is_some()
    }

    pub fn query(&self, rect: Rect) -> Vec<u32> {
        let aabb = AABB::from_corners([rect.min.x, rect.min.y], [rect.max.x, rect.max.y]);
        self.tree
            .locate_in_envelope_intersecting(&aabb)
            .map(|item| item.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
