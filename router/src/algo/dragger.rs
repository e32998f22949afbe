use crate::algo::shove::Shove;
use crate::algo::{FixOutcome, PlacementAlgo};
use crate::error::Failure;
use crate::item::{Item, ItemId, Line, Segment, Via, kind};
use crate::node::Node;
use crate::topology::Topology;
use pns_common::db::indices::NetId;
use pns_common::geom::{IPoint, Seg};
use pns_common::util::config::{CollisionMode, RoutingConfig};
use std::rc::Rc;

enum Dragged {
    Segment(Segment),
    Via(Via),
}

/// Moves an existing segment or via, keeping it connected and shoving
/// whatever it runs into.
pub struct Dragger {
    settings: RoutingConfig,
    id: ItemId,
    dragged: Dragged,
    origin: IPoint,
    trial: Option<Node>,
    violations: Vec<ItemId>,
}

impl Dragger {
    pub fn start(world: &Rc<Node>, p: IPoint, item: &Item, settings: &RoutingConfig) -> Result<Self, Failure> {
        if item.is_locked() {
            return Err(Failure::NotDraggable(if let Item::Solid(_) = item {
                "pad"
            } else {
                "locked item"
            }));
        }
        let dragged = match item {
            Item::Segment(s) => Dragged::Segment(s.clone()),
            Item::Via(v) => Dragged::Via(v.clone()),
            other => return Err(Failure::NotDraggable(other.kind().name())),
        };
        let id = world
            .find_matching(item)
            .ok_or(Failure::NotDraggable(item.kind().name()))?;
        log::debug!("dragger: {} {:?} from {:?}", item.kind().name(), id, p);
        Ok(Self {
            settings: settings.clone(),
            id,
            dragged,
            origin: p,
            trial: None,
            violations: Vec::new(),
        })
    }

    /// Moves the endpoint `from` of the neighbours of a dragged piece to
    /// `to`. Free ends simply follow; corners drag their other segment
    /// along; anything else gets a new connecting segment.
    fn follow(trial: &mut Node, from: IPoint, to: IPoint, proto: &Segment, pushers: &mut Vec<Item>) -> Result<(), Failure> {
        if from == to {
            return Ok(());
        }
        let links = trial.joint_links(from);
        let corner = match links.as_slice() {
            [only] => trial
                .item(*only)
                .and_then(Item::as_segment)
                .filter(|s| s.layer == proto.layer && s.net == proto.net)
                .map(|s| (*only, s.clone())),
            _ => None,
        };
        match (corner, links.is_empty()) {
            (Some((id, seg)), _) => {
                if seg.locked {
                    return Err(Failure::NotDraggable("locked item"));
                }
                let mut moved = Segment::new(seg.seg, seg.width, seg.layer, seg.net);
                if moved.seg.a == from {
                    moved.seg.a = to;
                } else {
                    moved.seg.b = to;
                }
                trial.remove(id);
                trial.add(Item::Segment(moved.clone()));
                pushers.push(Item::Line(Line::from_segment(&moved)));
            }
            (None, true) => {}
            (None, false) => {
                let mut link = proto.clone();
                link.seg = Seg::new(from, to);
                link.parent = None;
                link.locked = false;
                trial.add(Item::Segment(link.clone()));
                pushers.push(Item::Line(Line::from_segment(&link)));
            }
        }
        Ok(())
    }

    fn drag(&mut self, world: &Rc<Node>, p: IPoint) -> Result<(), Failure> {
        let mut trial = Node::branch(world);
        let mut pushers = Vec::new();

        match &self.dragged {
            Dragged::Segment(seg) => {
                let n = seg.seg.direction().perpendicular();
                let d = p - self.origin;
                let k = d.dot(n) as f64 / n.squared_length().max(1) as f64;
                let off = IPoint::new((n.x as f64 * k).round() as i64, (n.y as f64 * k).round() as i64);

                let mut moved = Segment::new(
                    Seg::new(seg.seg.a + off, seg.seg.b + off),
                    seg.width,
                    seg.layer,
                    seg.net,
                );
                moved.locked = seg.locked;
                trial.remove(self.id);
                Self::follow(&mut trial, seg.seg.a, moved.seg.a, seg, &mut pushers)?;
                Self::follow(&mut trial, seg.seg.b, moved.seg.b, seg, &mut pushers)?;
                trial.add(Item::Segment(moved.clone()));
                pushers.push(Item::Line(Line::from_segment(&moved)));
            }
            Dragged::Via(via) => {
                let target = via.pos + (p - self.origin);
                let attached = Topology::new(&trial).attached_segments(self.id);
                let mut moved_segments = Vec::new();
                for id in attached {
                    let Some(seg) = trial.item(id).and_then(Item::as_segment).cloned() else {
                        continue;
                    };
                    if seg.locked {
                        return Err(Failure::NotDraggable("locked item"));
                    }
                    let mut s = Segment::new(seg.seg, seg.width, seg.layer, seg.net);
                    if s.seg.a == via.pos {
                        s.seg.a = target;
                    }
                    if s.seg.b == via.pos {
                        s.seg.b = target;
                    }
                    trial.remove(id);
                    moved_segments.push(s);
                }
                trial.remove(self.id);
                let moved_via = via.moved_to(target);
                trial.add(Item::Via(moved_via.clone()));
                for s in moved_segments {
                    trial.add(Item::Segment(s.clone()));
                    pushers.push(Item::Line(Line::from_segment(&s)));
                }
                pushers.push(Item::Via(moved_via));
            }
        }

        if self.settings.mode == CollisionMode::Shove {
            Shove::new(&mut trial, self.settings.iteration_limit, self.settings.tie_break)
                .shove_items(pushers.clone())?;
        }
        let mut violations: Vec<ItemId> = pushers
            .iter()
            .flat_map(|it| trial.query_colliding(it, kind::ANY))
            .map(|o| o.id)
            .collect();
        violations.sort();
        violations.dedup();
        if !violations.is_empty() && self.settings.mode == CollisionMode::Shove {
            return Err(Failure::Violations(violations.len()));
        }

        self.violations = violations;
        self.trial = Some(trial);
        Ok(())
    }
}

impl PlacementAlgo for Dragger {
    fn move_to(&mut self, world: &Rc<Node>, p: IPoint, _item: Option<&Item>) -> Result<(), Failure> {
        self.drag(world, p)
    }

    fn fix_route(&mut self, world: &Rc<Node>, p: IPoint, _item: Option<&Item>) -> Result<FixOutcome, Failure> {
        if self.trial.is_none() {
            self.drag(world, p)?;
        }
        if !self.violations.is_empty() && !self.settings.allow_violations {
            return Err(Failure::Violations(self.violations.len()));
        }
        Ok(FixOutcome::Finished)
    }

    fn trial(&self) -> Option<&Node> {
        self.trial.as_ref()
    }

    fn take_trial(&mut self) -> Option<Node> {
        self.trial.take()
    }

    fn restore_trial(&mut self, trial: Node) {
        self.trial = Some(trial);
    }

    fn current_nets(&self) -> Vec<NetId> {
        let net = match &self.dragged {
            Dragged::Segment(s) => s.net,
            Dragged::Via(v) => v.net,
        };
        net.into_iter().collect()
    }

    fn current_layer(&self) -> u8 {
        match &self.dragged {
            Dragged::Segment(s) => s.layer,
            Dragged::Via(v) => v.layers.start(),
        }
    }

    fn violations(&self) -> &[ItemId] {
        &self.violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Solid;
    use pns_common::geom::{LayerRange, LineChain, Shape};

    const MM: i64 = 1_000_000;

    fn seg(a: (i64, i64), b: (i64, i64)) -> Segment {
        Segment::new(Seg::new(IPoint::new(a.0, a.1), IPoint::new(b.0, b.1)), 200_000, 0, Some(NetId(1)))
    }

    #[test]
    fn dragged_segment_drags_corners() {
        let mut n = Node::new();
        let mut line = Line::new(
            LineChain::from_points([
                IPoint::new(0, 0),
                IPoint::new(2 * MM, 2 * MM),
                IPoint::new(6 * MM, 2 * MM),
                IPoint::new(8 * MM, 0),
            ]),
            200_000,
            0,
            Some(NetId(1)),
        );
        n.add_line(&mut line);
        let w = Rc::new(n);
        let middle = Item::Segment(seg((2 * MM, 2 * MM), (6 * MM, 2 * MM)));

        let mut dragger = Dragger::start(&w, IPoint::new(4 * MM, 2 * MM), &middle, &RoutingConfig::default()).unwrap();
        dragger.move_to(&w, IPoint::new(5 * MM, 3 * MM), None).unwrap();
        let trial = dragger.trial().unwrap();
        assert_eq!(trial.joint_links(IPoint::new(2 * MM, 3 * MM)).len(), 2);
        assert_eq!(trial.joint_links(IPoint::new(6 * MM, 3 * MM)).len(), 2);
        assert_eq!(trial.joint_links(IPoint::new(0, 0)).len(), 1);
        assert_eq!(trial.changes().removed.len(), 3);
    }

    #[test]
    fn via_moves_with_attached_segments() {
        let mut n = Node::new();
        let via = Via::new(IPoint::new(2 * MM, 0), LayerRange::new(0, 1), 600_000, 300_000, Some(NetId(1)));
        n.add(Item::Via(via.clone()));
        n.add(Item::Segment(seg((0, 0), (2 * MM, 0))));
        let w = Rc::new(n);

        let mut dragger = Dragger::start(&w, via.pos, &Item::Via(via), &RoutingConfig::default()).unwrap();
        dragger.move_to(&w, IPoint::new(3 * MM, MM), None).unwrap();
        let trial = dragger.trial().unwrap();
        assert_eq!(trial.joint_links(IPoint::new(3 * MM, MM)).len(), 2);
        assert_eq!(dragger.fix_route(&w, IPoint::new(3 * MM, MM), None), Ok(FixOutcome::Finished));
    }

    #[test]
    fn pads_cannot_be_dragged() {
        let w = Rc::new(Node::new());
        let pad = Item::Solid(Solid::new(
            IPoint::new(0, 0),
            LayerRange::single(0),
            None,
            Some(Shape::Circle { center: IPoint::new(0, 0), radius: 100 }),
        ));
        assert!(matches!(
            Dragger::start(&w, IPoint::new(0, 0), &pad, &RoutingConfig::default()),
            Err(Failure::NotDraggable("pad"))
        ));
    }
}
