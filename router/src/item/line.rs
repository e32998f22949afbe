use super::{Item, ItemId, Segment, Via};
use pns_common::db::indices::NetId;
use pns_common::geom::{IPoint, LineChain, Shape};

/// Chain of segments of one width on one layer, optionally ending in a via.
///
/// A line is never stored in a node directly. `Node::add_line` inserts its
/// segments and via and records their ids in `links`; any structural edit
/// drops those links because they no longer describe the edited geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct Line {
    chain: LineChain,
    pub width: i64,
    pub layer: u8,
    pub net: Option<NetId>,
    via: Option<Via>,
    links: Vec<ItemId>,
}

impl Line {
    pub fn new(chain: LineChain, width: i64, layer: u8, net: Option<NetId>) -> Self {
        Self {
            chain,
            width,
            layer,
            net,
            via: None,
            links: Vec::new(),
        }
    }

    pub fn from_segment(seg: &Segment) -> Self {
        Self::new(
            LineChain::from_points([seg.seg.a, seg.seg.b]),
            seg.width,
            seg.layer,
            seg.net,
        )
    }

    pub fn chain(&self) -> &LineChain {
        &self.chain
    }

    pub fn set_chain(&mut self, chain: LineChain) {
        self.chain = chain;
        self.links.clear();
    }

    pub fn via(&self) -> Option<&Via> {
        self.via.as_ref()
    }

    pub fn set_via(&mut self, via: Option<Via>) {
        self.via = via;
        self.links.clear();
    }

    pub fn ends_with_via(&self) -> bool {
        self.via.is_some()
    }

    pub fn start(&self) -> Option<IPoint> {
        self.chain.first()
    }

    pub fn end(&self) -> Option<IPoint> {
        self.chain.last()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.segment_count() == 0
    }

    pub fn segment_count(&self) -> usize {
        self.chain.segment_count()
    }

    pub fn length(&self) -> f64 {
        self.chain.length()
    }

    pub fn shape(&self) -> Shape {
        Shape::Chain {
            chain: self.chain.clone(),
            width: self.width,
        }
    }

    /// Constituent segments in chain order; zero-length pieces are skipped.
    pub fn segments(&self) -> Vec<Segment> {
        self.chain
            .segments()
            .filter(|s| !s.is_degenerate())
            .map(|s| Segment::new(s, self.width, self.layer, self.net))
            .collect()
    }

    /// Segments followed by the terminal via, if any.
    pub fn primitives(&self) -> Vec<Item> {
        let mut out: Vec<Item> = self.segments().into_iter().map(Item::Segment).collect();
        if let Some(v) = &self.via {
            out.push(Item::Via(v.clone()));
        }
        out
    }

    pub fn append(&mut self, p: IPoint) {
        self.chain.append(p);
        self.links.clear();
    }

    /// Keeps vertices `0..=index` and drops the terminal via.
    pub fn truncate(&mut self, index: usize) {
        if index + 1 < self.chain.point_count() {
            self.chain.truncate(index);
            self.via = None;
        }
        self.links.clear();
    }

    /// Makes `p` a vertex of the line if it lies on it.
    pub fn split(&mut self, p: IPoint) -> Option<usize> {
        let idx = self.chain.split(p)?;
        self.links.clear();
        Some(idx)
    }

    pub fn reversed(&self) -> Line {
        Line {
            chain: self.chain.reverse(),
            via: None,
            links: self.links.iter().rev().copied().collect(),
            ..self.clone()
        }
    }

    pub fn links(&self) -> &[ItemId] {
        &self.links
    }

    pub fn is_linked(&self) -> bool {
        !self.links.is_empty()
    }

    pub fn contains_link(&self, id: ItemId) -> bool {
        self.links.contains(&id)
    }

    pub(crate) fn link(&mut self, id: ItemId) {
        self.links.push(id);
    }

    pub(crate) fn set_links(&mut self, links: Vec<ItemId>) {
        self.links = links;
    }

    pub fn clear_links(&mut self) {
        self.links.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> Line {
        Line::new(
            LineChain::from_points([
                IPoint::new(0, 0),
                IPoint::new(1_000, 0),
                IPoint::new(2_000, 1_000),
            ]),
            100,
            0,
            Some(NetId(3)),
        )
    }

    #[test]
    fn segments_follow_chain_order() {
        let segs = line().segments();
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].seg.b, segs[1].seg.a);
        assert!(segs.iter().all(|s| s.net == Some(NetId(3)) && s.width == 100));
    }

    #[test]
    fn edits_drop_links() {
        let mut l = line();
        l.set_links(vec![ItemId(1), ItemId(2)]);
        assert!(l.is_linked());
        l.append(IPoint::new(3_000, 1_000));
        assert!(!l.is_linked());
    }

    #[test]
    fn split_and_truncate() {
        let mut l = line();
        assert_eq!(l.split(IPoint::new(500, 0)), Some(1));
        assert_eq!(l.chain().point_count(), 4);
        l.truncate(1);
        assert_eq!(l.end(), Some(IPoint::new(500, 0)));
        assert_eq!(l.split(IPoint::new(500, 500)), None);
    }
}
