use crate::item::{Item, ItemId, Line, Segment};
use crate::node::Node;
use pns_common::db::indices::NetId;
use pns_common::geom::{IPoint, LineChain};
use std::collections::{BTreeSet, VecDeque};

/// Read-only connectivity queries over a node's joints.
pub struct Topology<'a> {
    node: &'a Node,
}

impl<'a> Topology<'a> {
    pub fn new(node: &'a Node) -> Self {
        Self { node }
    }

    /// Items of `net` terminating at `p` on `layer`.
    pub fn items_at(&self, p: IPoint, net: Option<NetId>, layer: u8) -> Vec<ItemId> {
        self.node
            .joint_links(p)
            .into_iter()
            .filter(|&id| {
                self.node
                    .item(id)
                    .is_some_and(|it| it.net() == net && it.layers().contains(layer))
            })
            .collect()
    }

    /// Items sharing the net of `id`, `id` excluded.
    pub fn same_net_items(&self, id: ItemId) -> Vec<ItemId> {
        let Some(net) = self.node.item(id).and_then(Item::net) else {
            return Vec::new();
        };
        self.node
            .net_items(net)
            .into_iter()
            .filter(|&other| other != id)
            .collect()
    }

    /// Solids and locked items cannot be displaced.
    pub fn is_anchor(&self, id: ItemId) -> bool {
        self.node.item(id).is_some_and(Item::is_locked)
    }

    /// True when nothing but the segment itself ends at `p`.
    pub fn is_free_end(&self, p: IPoint, seg: &Segment) -> bool {
        self.node.joint_links(p).into_iter().all(|id| {
            self.node
                .item(id)
                .is_some_and(|it| it.as_segment().is_some_and(|s| s.same_geometry(seg)))
        })
    }

    pub fn attached_segments(&self, via_id: ItemId) -> Vec<ItemId> {
        let Some(Item::Via(via)) = self.node.item(via_id) else {
            return Vec::new();
        };
        self.node
            .joint_links(via.pos)
            .into_iter()
            .filter(|&id| {
                self.node
                    .item(id)
                    .and_then(Item::as_segment)
                    .is_some_and(|s| s.net == via.net && via.layers.contains(s.layer))
            })
            .collect()
    }

    /// The other segment continuing a trace through `p`, if `p` is a plain
    /// two-segment corner.
    fn corner_neighbour(&self, p: IPoint, current: ItemId, proto: &Segment) -> Option<(ItemId, Segment)> {
        let links = self.node.joint_links(p);
        if links.len() != 2 {
            return None;
        }
        let other = *links.iter().find(|&&id| id != current)?;
        let seg = self.node.item(other)?.as_segment()?;
        (seg.width == proto.width && seg.layer == proto.layer && seg.net == proto.net)
            .then(|| (other, seg.clone()))
    }

    fn walk(&self, from: ItemId, seg: &Segment, towards: IPoint) -> Vec<(ItemId, IPoint)> {
        let mut out = Vec::new();
        let mut current = from;
        let mut cursor = towards;
        let mut visited = BTreeSet::from([from]);
        while let Some((next, s)) = self.corner_neighbour(cursor, current, seg) {
            if !visited.insert(next) {
                break;
            }
            let far = if s.seg.a == cursor { s.seg.b } else { s.seg.a };
            out.push((next, far));
            current = next;
            cursor = far;
        }
        out
    }

    /// Assembles the longest run of equal-width segments through `seg_id`,
    /// stopping at vias, solids, branches and free ends.
    pub fn assemble_line(&self, seg_id: ItemId) -> Option<Line> {
        let seg = self.node.item(seg_id)?.as_segment()?.clone();

        let backward = self.walk(seg_id, &seg, seg.seg.a);
        let forward = self.walk(seg_id, &seg, seg.seg.b);

        let mut points = Vec::with_capacity(backward.len() + forward.len() + 2);
        let mut links = Vec::with_capacity(backward.len() + forward.len() + 1);
        for &(id, p) in backward.iter().rev() {
            points.push(p);
            links.push(id);
        }
        points.push(seg.seg.a);
        points.push(seg.seg.b);
        links.push(seg_id);
        for &(id, p) in &forward {
            points.push(p);
            links.push(id);
        }

        let mut line = Line::new(LineChain::from_points(points), seg.width, seg.layer, seg.net);
        line.set_links(links);
        Some(line)
    }

    /// Everything reachable from `id` through shared joints on the same net.
    pub fn connected_items(&self, id: ItemId) -> Vec<ItemId> {
        let Some(start) = self.node.item(id) else {
            return Vec::new();
        };
        let net = start.net();
        let mut seen = BTreeSet::from([id]);
        let mut queue = VecDeque::from([id]);
        while let Some(cur) = queue.pop_front() {
            let Some(item) = self.node.item(cur) else {
                continue;
            };
            for p in item.anchors() {
                for next in self.node.joint_links(p) {
                    let same_net = self.node.item(next).is_some_and(|it| it.net() == net);
                    if same_net && seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }
        seen.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Solid, Via};
    use pns_common::geom::{LayerRange, Seg, Shape};

    fn add_seg(n: &mut Node, a: (i64, i64), b: (i64, i64)) -> ItemId {
        n.add(Item::Segment(Segment::new(
            Seg::new(IPoint::new(a.0, a.1), IPoint::new(b.0, b.1)),
            100,
            0,
            Some(NetId(1)),
        )))
        .unwrap()
    }

    #[test]
    fn assembles_through_corners_only() {
        let mut n = Node::new();
        let s0 = add_seg(&mut n, (0, 0), (1_000, 0));
        let s1 = add_seg(&mut n, (1_000, 0), (2_000, 1_000));
        let s2 = add_seg(&mut n, (2_000, 1_000), (3_000, 1_000));
        n.add(Item::Via(Via::new(IPoint::new(3_000, 1_000), LayerRange::new(0, 1), 400, 200, Some(NetId(1)))));
        add_seg(&mut n, (3_000, 1_000), (4_000, 1_000));

        let line = Topology::new(&n).assemble_line(s1).unwrap();
        assert_eq!(line.links(), &[s0, s1, s2]);
        assert_eq!(line.start(), Some(IPoint::new(0, 0)));
        assert_eq!(line.end(), Some(IPoint::new(3_000, 1_000)));
    }

    #[test]
    fn anchors_and_free_ends() {
        let mut n = Node::new();
        let s0 = add_seg(&mut n, (0, 0), (1_000, 0));
        let pad = n
            .add(Item::Solid(Solid::new(
                IPoint::new(1_000, 0),
                LayerRange::single(0),
                Some(NetId(1)),
                Some(Shape::Circle { center: IPoint::new(1_000, 0), radius: 300 }),
            )))
            .unwrap();
        let topo = Topology::new(&n);
        assert!(topo.is_anchor(pad));
        assert!(!topo.is_anchor(s0));
        let seg = n.item(s0).and_then(Item::as_segment).unwrap().clone();
        assert!(topo.is_free_end(IPoint::new(0, 0), &seg));
        assert!(!topo.is_free_end(IPoint::new(1_000, 0), &seg));
        assert_eq!(topo.connected_items(s0), vec![s0, pad]);
    }
}
