use crate::algo::walkaround::{translate_out, walkaround_path};
use crate::item::{HULL_MARGIN, Item, ItemId, KindMask, Line, Segment, kind};
use crate::node::{Node, Obstacle};
use crate::topology::Topology;
use pns_common::geom::{IPoint, LineChain, Shape};
use pns_common::util::config::TieBreak;
use priority_queue::PriorityQueue;
use std::cmp::Reverse;
use std::collections::HashSet;
use thiserror::Error;

const OBSTACLE_MASK: KindMask = kind::SEGMENT | kind::VIA | kind::SOLID;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ShoveError {
    #[error("iteration limit of {0} reached")]
    IterationLimit(usize),
    #[error("blocked by a fixed {0}")]
    Anchor(&'static str),
    #[error("cannot move a {0} out of the way")]
    Stuck(&'static str),
}

/// Pushes copper out of the way of one or more pushers, working on a
/// trial node. Every displaced line or via becomes a pusher itself; the
/// total number of displacement steps is capped by the iteration limit.
pub struct Shove<'a> {
    node: &'a mut Node,
    limit: usize,
    tie: TieBreak,
    iterations: usize,
    fixed: HashSet<ItemId>,
}

impl<'a> Shove<'a> {
    pub fn new(node: &'a mut Node, limit: usize, tie: TieBreak) -> Self {
        Self {
            node,
            limit,
            tie,
            iterations: 0,
            fixed: HashSet::new(),
        }
    }

    /// Items that must stay put for this run, e.g. an already placed head.
    pub fn with_fixed(mut self, ids: &[ItemId]) -> Self {
        self.fixed.extend(ids.iter().copied());
        self
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn shove_line(&mut self, head: &Line) -> Result<(), ShoveError> {
        self.run(vec![Item::Line(head.clone())])
    }

    /// `pushers` are processed last-first.
    pub fn shove_items(&mut self, pushers: Vec<Item>) -> Result<(), ShoveError> {
        self.run(pushers)
    }

    fn run(&mut self, mut stack: Vec<Item>) -> Result<(), ShoveError> {
        while let Some(pusher) = stack.last().cloned() {
            self.iterations += 1;
            if self.iterations > self.limit {
                log::debug!("shove: iteration limit {} reached", self.limit);
                return Err(ShoveError::IterationLimit(self.limit));
            }

            let Some(obstacle) = self.nearest(&pusher) else {
                stack.pop();
                continue;
            };
            log::trace!(
                "shove #{}: {} pushes {} {:?}",
                self.iterations,
                pusher.kind().name(),
                obstacle.item.kind().name(),
                obstacle.id
            );

            if obstacle.item.is_locked() || self.fixed.contains(&obstacle.id) {
                return Err(ShoveError::Anchor(obstacle.item.kind().name()));
            }
            match &obstacle.item {
                Item::Segment(_) => {
                    let line = self.shove_segment(&pusher, &obstacle)?;
                    stack.push(Item::Line(line));
                }
                Item::Via(_) => {
                    let moved = self.shove_via(&pusher, &obstacle)?;
                    stack.extend(moved);
                }
                other => return Err(ShoveError::Stuck(other.kind().name())),
            }
        }
        Ok(())
    }

    /// Colliding obstacle closest to where the pusher starts.
    fn nearest(&self, pusher: &Item) -> Option<Obstacle> {
        let origin = pusher.anchors().first().copied()?;
        let tip = Shape::Circle {
            center: origin,
            radius: 0,
        };
        let obstacles = self.node.query_colliding(pusher, OBSTACLE_MASK);
        let mut queue = PriorityQueue::new();
        for (i, obs) in obstacles.iter().enumerate() {
            let dist = obs
                .item
                .shape()
                .map(|s| s.distance(&tip).round() as i64)
                .unwrap_or(i64::MAX);
            queue.push(i, Reverse((dist, obs.id)));
        }
        queue.pop().map(|(i, _)| obstacles[i].clone())
    }

    fn shove_segment(&mut self, pusher: &Item, obstacle: &Obstacle) -> Result<Line, ShoveError> {
        let topo = Topology::new(self.node);
        let old = topo
            .assemble_line(obstacle.id)
            .ok_or(ShoveError::Stuck("segment"))?;
        if old.links().iter().any(|&id| topo.is_anchor(id)) {
            return Err(ShoveError::Anchor("segment"));
        }
        let free_ends = self.line_has_free_ends(&old);

        let hulls = pusher.hulls(obstacle.clearance, old.width);
        let mut chain = old.chain().clone();
        for _ in 0..hulls.len() * 2 + 2 {
            let mut changed = false;
            for hull in &hulls {
                if !touches(&chain, hull) {
                    continue;
                }
                if let Some(walked) = walkaround_path(&chain, hull, self.tie) {
                    chain = walked;
                } else if free_ends {
                    let v = translate_out(&chain, hull).ok_or(ShoveError::Stuck("segment"))?;
                    chain = chain.translate(v);
                } else {
                    return Err(ShoveError::Stuck("segment"));
                }
                changed = true;
            }
            if !changed {
                break;
            }
        }

        let mut new = Line::new(chain, old.width, old.layer, old.net);
        if pusher.collide(&Item::Line(new.clone()), obstacle.clearance) {
            return Err(ShoveError::Stuck("segment"));
        }
        self.node.replace_line(&old, &mut new);
        Ok(new)
    }

    fn line_has_free_ends(&self, line: &Line) -> bool {
        let topo = Topology::new(self.node);
        let segs = line.segments();
        match (segs.first(), segs.last(), line.start(), line.end()) {
            (Some(first), Some(last), Some(a), Some(b)) => {
                topo.is_free_end(a, first) && topo.is_free_end(b, last)
            }
            _ => false,
        }
    }

    fn shove_via(&mut self, pusher: &Item, obstacle: &Obstacle) -> Result<Vec<Item>, ShoveError> {
        let Item::Via(via) = &obstacle.item else {
            return Err(ShoveError::Stuck("via"));
        };
        let topo = Topology::new(self.node);
        let attached = topo.attached_segments(obstacle.id);
        if attached.iter().any(|&id| topo.is_anchor(id)) {
            return Err(ShoveError::Anchor("segment"));
        }

        let nearest = nearest_core_point(pusher, via.pos);
        let mut dir = via.pos - nearest;
        if dir == IPoint::default() {
            dir = fallback_direction(pusher);
        }
        let required = pusher.radius() + via.diameter / 2 + obstacle.clearance + HULL_MARGIN;
        let new_pos = nearest + dir.resize(required + 1);
        let moved_via = via.moved_to(new_pos);

        let segments: Vec<(ItemId, Segment)> = attached
            .iter()
            .filter_map(|&id| Some((id, self.node.item(id)?.as_segment()?.clone())))
            .collect();
        self.node.remove(obstacle.id);
        for (id, _) in &segments {
            self.node.remove(*id);
        }

        let mut pushers = Vec::with_capacity(segments.len() + 1);
        for (_, seg) in segments {
            let mut s = Segment::new(seg.seg, seg.width, seg.layer, seg.net);
            if s.seg.a == via.pos {
                s.seg.a = new_pos;
            }
            if s.seg.b == via.pos {
                s.seg.b = new_pos;
            }
            self.node.add(Item::Segment(s.clone()));
            pushers.push(Item::Line(Line::from_segment(&s)));
        }
        self.node.add(Item::Via(moved_via.clone()));
        pushers.push(Item::Via(moved_via));
        Ok(pushers)
    }
}

/// True when `chain` crosses `hull` or has a vertex inside it.
fn touches(chain: &LineChain, hull: &LineChain) -> bool {
    chain.points().iter().any(|&p| hull.point_inside(p)) || !chain.intersect(hull).is_empty()
}

fn nearest_core_point(item: &Item, p: IPoint) -> IPoint {
    match item {
        Item::Segment(s) => s.seg.nearest_point(p),
        Item::Line(l) => l
            .chain()
            .nearest_segment(p)
            .map(|i| l.chain().segment(i).nearest_point(p))
            .or(l.start())
            .unwrap_or(p),
        Item::Via(v) => v.pos,
        Item::Solid(s) => s.pos,
    }
}

fn fallback_direction(item: &Item) -> IPoint {
    let d = match item {
        Item::Segment(s) => s.seg.direction(),
        Item::Line(l) => l.chain().segments().next().map(|s| s.direction()).unwrap_or_default(),
        _ => IPoint::default(),
    };
    if d == IPoint::default() {
        IPoint::new(0, 1)
    } else {
        d.perpendicular()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Solid, Via};
    use pns_common::db::indices::NetId;
    use pns_common::geom::{LayerRange, Seg};
    use std::rc::Rc;

    const MM: i64 = 1_000_000;

    fn segment(a: (i64, i64), b: (i64, i64), net: u32) -> Segment {
        Segment::new(Seg::new(IPoint::new(a.0, a.1), IPoint::new(b.0, b.1)), 200_000, 0, Some(NetId(net)))
    }

    fn head(a: (i64, i64), b: (i64, i64)) -> Line {
        Line::from_segment(&segment(a, b, 1))
    }

    fn assert_clear(node: &Node, line: &Line) {
        let hits = node.query_colliding(&Item::Line(line.clone()), kind::ANY);
        assert!(hits.is_empty(), "still colliding: {:?}", hits);
    }

    #[test]
    fn crossing_segment_is_walked_around() {
        let mut world = Node::new();
        let mut fixed = Line::new(
            LineChain::from_points([IPoint::new(5 * MM, -3 * MM), IPoint::new(5 * MM, 3 * MM)]),
            200_000,
            0,
            Some(NetId(2)),
        );
        world.add_line(&mut fixed);
        let world = Rc::new(world);

        let mut trial = Node::branch(&world);
        let h = head((0, 0), (10 * MM, 0));
        Shove::new(&mut trial, 50, TieBreak::Shortest).shove_line(&h).unwrap();
        assert_clear(&trial, &h);
        let changes = trial.changes();
        assert_eq!(changes.removed.len(), 1);
        let moved: Vec<_> = changes.added.iter().filter_map(|(_, it)| it.as_segment()).collect();
        assert!(moved.len() > 1);
        assert!(moved.iter().any(|s| s.seg.a == IPoint::new(5 * MM, -3 * MM) || s.seg.b == IPoint::new(5 * MM, -3 * MM)));
    }

    #[test]
    fn free_segment_is_translated() {
        let mut world = Node::new();
        world.add(Item::Segment(segment((3 * MM, 400_000), (9 * MM, 400_000), 2)));
        let world = Rc::new(world);

        let mut trial = Node::branch(&world);
        let h = head((0, 0), (10 * MM, 0));
        Shove::new(&mut trial, 50, TieBreak::Shortest).shove_line(&h).unwrap();
        assert_clear(&trial, &h);
        let (_, moved) = trial.changes().added.into_iter().next().unwrap();
        let s = moved.as_segment().unwrap();
        assert_eq!(s.seg.a.y, s.seg.b.y);
        assert!(s.seg.a.y - 200_000 >= 250_000);
    }

    #[test]
    fn solids_block_the_shove() {
        let mut world = Node::new();
        world.add(Item::Solid(Solid::new(
            IPoint::new(5 * MM, 0),
            LayerRange::single(0),
            Some(NetId(3)),
            Some(Shape::Circle { center: IPoint::new(5 * MM, 0), radius: 500_000 }),
        )));
        let world = Rc::new(world);
        let mut trial = Node::branch(&world);
        let err = Shove::new(&mut trial, 50, TieBreak::Shortest)
            .shove_line(&head((0, 0), (10 * MM, 0)))
            .unwrap_err();
        assert_eq!(err, ShoveError::Anchor("solid"));
    }

    #[test]
    fn fixed_items_are_not_shoved() {
        let mut world = Node::new();
        let id = world
            .add(Item::Segment(segment((3 * MM, 400_000), (9 * MM, 400_000), 2)))
            .unwrap();
        let world = Rc::new(world);
        let mut trial = Node::branch(&world);
        let err = Shove::new(&mut trial, 50, TieBreak::Shortest)
            .with_fixed(&[id])
            .shove_line(&head((0, 0), (10 * MM, 0)))
            .unwrap_err();
        assert_eq!(err, ShoveError::Anchor("segment"));
        assert!(trial.changes().is_empty());
    }

    #[test]
    fn via_is_pushed_with_its_segments() {
        let mut world = Node::new();
        let via_pos = IPoint::new(5 * MM, 300_000);
        world.add(Item::Via(Via::new(via_pos, LayerRange::new(0, 1), 600_000, 300_000, Some(NetId(2)))));
        world.add(Item::Segment(segment((5 * MM, 300_000), (5 * MM, 4 * MM), 2)));
        let world = Rc::new(world);

        let mut trial = Node::branch(&world);
        let h = head((0, 0), (10 * MM, 0));
        Shove::new(&mut trial, 50, TieBreak::Shortest).shove_line(&h).unwrap();
        assert_clear(&trial, &h);
        let via = trial
            .items()
            .into_iter()
            .find_map(|(_, it)| it.as_via().cloned())
            .unwrap();
        assert!(via.pos.y > via_pos.y);
        assert_eq!(trial.joint_links(via.pos).len(), 2);
    }

    #[test]
    fn iteration_limit_bounds_work() {
        let mut world = Node::new();
        for k in 1..6 {
            world.add(Item::Segment(segment((3 * MM, k * 450_000), (7 * MM, k * 450_000), 10 + k as u32)));
        }
        let world = Rc::new(world);
        let mut trial = Node::branch(&world);
        let mut shove = Shove::new(&mut trial, 2, TieBreak::Shortest);
        let res = shove.shove_line(&head((0, 0), (10 * MM, 0)));
        assert_eq!(res, Err(ShoveError::IterationLimit(2)));
        assert!(shove.iterations() <= 3);
    }
}
