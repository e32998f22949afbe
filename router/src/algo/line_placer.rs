use crate::algo::shove::Shove;
use crate::algo::walkaround::{WalkStatus, Walkaround};
use crate::algo::{FixOutcome, PlacementAlgo, build_head, build_ortho_head};
use crate::error::Failure;
use crate::item::{Item, ItemId, Line, Segment, Via, kind};
use crate::node::Node;
use crate::sizes::SizesSettings;
use crate::topology::Topology;
use pns_common::db::indices::NetId;
use pns_common::geom::{IPoint, LayerRange, LineChain, Seg};
use pns_common::util::config::{CollisionMode, RoutingConfig};
use std::rc::Rc;

/// Places a single trace: a two-segment head from the start point to the
/// cursor, resolved against the world according to the collision mode.
pub struct LinePlacer {
    settings: RoutingConfig,
    sizes: SizesSettings,
    layer_count: u8,
    net: Option<NetId>,
    layer: u8,
    start: IPoint,
    start_layers: LayerRange,
    diagonal_first: bool,
    place_via: bool,
    cursor: IPoint,
    /// Segment the route starts in the middle of; it is split on every trial.
    split: Option<(ItemId, Segment)>,
    head: Line,
    trial: Option<Node>,
    violations: Vec<ItemId>,
}

impl LinePlacer {
    pub fn start(
        world: &Rc<Node>,
        p: IPoint,
        item: Option<&Item>,
        layer: u8,
        layer_count: u8,
        settings: &RoutingConfig,
        sizes: &SizesSettings,
    ) -> Result<Self, Failure> {
        if layer >= layer_count {
            return Err(Failure::InvalidLayer(layer));
        }
        let mut start_layers = LayerRange::new(0, layer_count - 1);
        let mut split = None;
        if let Some(item) = item {
            if item.shape().is_none() || !item.layers().contains(layer) {
                return Err(Failure::NotConnectable(layer));
            }
            start_layers = item.layers();
            if let Item::Segment(s) = item {
                if p != s.seg.a && p != s.seg.b && s.seg.contains(p) {
                    split = world.find_matching(item).map(|id| (id, s.clone()));
                }
            }
        }
        let net = item.and_then(Item::net);
        log::debug!("line placer: start at {:?} on layer {}, net {:?}", p, layer, net);

        Ok(Self {
            settings: settings.clone(),
            sizes: sizes.clone(),
            layer_count,
            net,
            layer,
            start: p,
            start_layers,
            diagonal_first: settings.start_diagonal,
            place_via: false,
            cursor: p,
            split,
            head: Line::new(LineChain::from_points([p]), sizes.track_width, layer, net),
            trial: None,
            violations: Vec::new(),
        })
    }

    pub fn head(&self) -> &Line {
        &self.head
    }

    fn build(&self, p: IPoint) -> Line {
        let chain = if self.settings.orthogonal {
            build_ortho_head(self.start, p, !self.diagonal_first)
        } else {
            build_head(self.start, p, self.diagonal_first)
        };
        let mut head = Line::new(chain, self.sizes.track_width, self.layer, self.net);
        if self.place_via {
            let mut via = Via::new(
                p,
                LayerRange::new(0, self.layer_count.saturating_sub(1)),
                self.sizes.via_diameter,
                self.sizes.via_drill,
                self.net,
            );
            via.via_type = self.sizes.via_type;
            head.set_via(Some(via));
        }
        head
    }

    fn apply_split(&self, trial: &mut Node) {
        let Some((id, seg)) = &self.split else {
            return;
        };
        if trial.remove(*id) {
            for piece in [Seg::new(seg.seg.a, self.start), Seg::new(self.start, seg.seg.b)] {
                let mut s = seg.clone();
                s.seg = piece;
                s.parent = None;
                trial.add(Item::Segment(s));
            }
        }
    }

    fn route(&mut self, world: &Rc<Node>, p: IPoint) -> Result<(), Failure> {
        self.cursor = p;
        let mut head = self.build(p);
        let mut trial = Node::branch(world);
        self.apply_split(&mut trial);

        match self.settings.mode {
            CollisionMode::Shove => {
                Shove::new(&mut trial, self.settings.iteration_limit, self.settings.tie_break)
                    .shove_line(&head)?;
            }
            CollisionMode::Walkaround => {
                let walker = Walkaround::new(
                    &trial,
                    self.settings.walkaround_iterations,
                    self.settings.tie_break,
                    kind::ANY,
                );
                let (walked, status) = walker.route(&head);
                if status == WalkStatus::Stuck {
                    log::trace!("walkaround stopped short of {:?}", p);
                }
                head = walked;
            }
            CollisionMode::MarkObstacles => {}
        }

        let violations: Vec<ItemId> = trial
            .query_colliding(&Item::Line(head.clone()), kind::ANY)
            .into_iter()
            .map(|o| o.id)
            .collect();
        if !violations.is_empty() && self.settings.mode == CollisionMode::Shove {
            return Err(Failure::Violations(violations.len()));
        }

        trial.add_line(&mut head);
        self.head = head;
        self.violations = violations;
        self.trial = Some(trial);
        Ok(())
    }

    /// True when the head ends on copper of its own net that it did not place.
    fn ends_on_target(&self, world: &Node, item: Option<&Item>) -> bool {
        let Some(end) = self.head.end() else {
            return false;
        };
        if self.head.ends_with_via() || self.net.is_none() || end == self.start {
            return false;
        }
        if let Some(item) = item {
            let on_item = item.shape().is_some_and(|s| s.contains_point(end));
            if on_item && item.net() == self.net && item.layers().contains(self.layer) {
                return true;
            }
        }
        !Topology::new(world)
            .items_at(end, self.net, self.layer)
            .is_empty()
    }
}

impl PlacementAlgo for LinePlacer {
    fn move_to(&mut self, world: &Rc<Node>, p: IPoint, _item: Option<&Item>) -> Result<(), Failure> {
        self.route(world, p)
    }

    fn fix_route(&mut self, world: &Rc<Node>, p: IPoint, item: Option<&Item>) -> Result<FixOutcome, Failure> {
        if p != self.cursor || self.trial.is_none() {
            self.route(world, p)?;
        }
        if self.head.is_empty() {
            return Err(Failure::NothingToFix);
        }
        if !self.violations.is_empty() && !self.settings.allow_violations {
            return Err(Failure::Violations(self.violations.len()));
        }
        Ok(if self.ends_on_target(world, item) {
            FixOutcome::Finished
        } else {
            FixOutcome::Continue
        })
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

    fn continue_from(&mut self, _world: &Rc<Node>) {
        let end = self.head.end().unwrap_or(self.start);
        if let Some(via) = self.head.via() {
            self.layer = if self.layer == via.layers.start() {
                via.layers.end()
            } else {
                via.layers.start()
            };
            self.start_layers = via.layers;
        } else {
            self.start_layers = LayerRange::single(self.layer);
        }
        self.start = end;
        self.cursor = end;
        self.place_via = false;
        self.split = None;
        self.violations.clear();
        self.head = Line::new(LineChain::from_points([end]), self.sizes.track_width, self.layer, self.net);
        log::debug!("line placer: continuing from {:?} on layer {}", end, self.layer);
    }

    fn current_nets(&self) -> Vec<NetId> {
        self.net.into_iter().collect()
    }

    fn current_layer(&self) -> u8 {
        self.layer
    }

    fn violations(&self) -> &[ItemId] {
        &self.violations
    }

    fn flip_posture(&mut self, world: &Rc<Node>) {
        self.diagonal_first = !self.diagonal_first;
        if let Err(e) = self.route(world, self.cursor) {
            log::debug!("posture flip: {}", e);
        }
    }

    fn toggle_via(&mut self, world: &Rc<Node>) -> bool {
        self.place_via = !self.place_via;
        if let Err(e) = self.route(world, self.cursor) {
            log::debug!("via toggle: {}", e);
        }
        true
    }

    fn is_placing_via(&self) -> bool {
        self.place_via
    }

    fn set_layer(&mut self, world: &Rc<Node>, layer: u8) -> Result<(), Failure> {
        if layer >= self.layer_count {
            return Err(Failure::InvalidLayer(layer));
        }
        if !self.start_layers.contains(layer) {
            return Err(Failure::LayerSwitch);
        }
        self.layer = layer;
        self.route(world, self.cursor)
    }

    fn update_sizes(&mut self, sizes: &SizesSettings) {
        self.sizes = sizes.clone();
    }

    fn set_orthogonal(&mut self, orthogonal: bool) {
        self.settings.orthogonal = orthogonal;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Solid;
    use pns_common::geom::Shape;

    const MM: i64 = 1_000_000;

    fn world() -> Rc<Node> {
        let mut n = Node::new();
        n.add(Item::Solid(Solid::new(
            IPoint::new(0, 0),
            LayerRange::new(0, 1),
            Some(NetId(1)),
            Some(Shape::Circle { center: IPoint::new(0, 0), radius: 400_000 }),
        )));
        n.add(Item::Solid(Solid::new(
            IPoint::new(10 * MM, 4 * MM),
            LayerRange::new(0, 1),
            Some(NetId(1)),
            Some(Shape::Circle { center: IPoint::new(10 * MM, 4 * MM), radius: 400_000 }),
        )));
        Rc::new(n)
    }

    fn pad(world: &Node, idx: usize) -> Item {
        world.items()[idx].1.clone()
    }

    #[test]
    fn routes_pad_to_pad() {
        let w = world();
        let start = pad(&w, 0);
        let mut placer = LinePlacer::start(&w, IPoint::new(0, 0), Some(&start), 0, 2, &RoutingConfig::default(), &SizesSettings::default()).unwrap();
        placer.move_to(&w, IPoint::new(10 * MM, 4 * MM), None).unwrap();
        assert_eq!(placer.head().segment_count(), 2);
        let target = pad(&w, 1);
        let outcome = placer.fix_route(&w, IPoint::new(10 * MM, 4 * MM), Some(&target)).unwrap();
        assert_eq!(outcome, FixOutcome::Finished);
        assert_eq!(placer.trial().unwrap().changes().added.len(), 2);
    }

    #[test]
    fn unfinished_route_continues_after_via() {
        let w = world();
        let start = pad(&w, 0);
        let mut placer = LinePlacer::start(&w, IPoint::new(0, 0), Some(&start), 0, 2, &RoutingConfig::default(), &SizesSettings::default()).unwrap();
        placer.move_to(&w, IPoint::new(5 * MM, 0), None).unwrap();
        assert!(placer.toggle_via(&w));
        assert!(placer.head().ends_with_via());
        let outcome = placer.fix_route(&w, IPoint::new(5 * MM, 0), None).unwrap();
        assert_eq!(outcome, FixOutcome::Continue);
        placer.take_trial();
        placer.continue_from(&w);
        assert_eq!(placer.current_layer(), 1);
        assert!(!placer.is_placing_via());
    }

    #[test]
    fn rejects_item_without_copper() {
        let w = world();
        let hole = Item::Solid(Solid::new(IPoint::new(0, 0), LayerRange::new(0, 1), None, None));
        let res = LinePlacer::start(&w, IPoint::new(0, 0), Some(&hole), 0, 2, &RoutingConfig::default(), &SizesSettings::default());
        assert!(matches!(res, Err(Failure::NotConnectable(0))));
    }

    #[test]
    fn starting_mid_segment_splits_it() {
        let mut n = Node::new();
        let seg = Segment::new(Seg::new(IPoint::new(0, 0), IPoint::new(4 * MM, 0)), 250_000, 0, Some(NetId(2)));
        n.add(Item::Segment(seg.clone()));
        let w = Rc::new(n);
        let mut placer = LinePlacer::start(&w, IPoint::new(2 * MM, 0), Some(&Item::Segment(seg)), 0, 2, &RoutingConfig::default(), &SizesSettings::default()).unwrap();
        placer.move_to(&w, IPoint::new(2 * MM, 3 * MM), None).unwrap();
        let changes = placer.trial().unwrap().changes();
        assert_eq!(changes.removed.len(), 1);
        assert_eq!(changes.added.len(), 3);
        assert_eq!(placer.trial().unwrap().joint_links(IPoint::new(2 * MM, 0)).len(), 3);
    }
}
