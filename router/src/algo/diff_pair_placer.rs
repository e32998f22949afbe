use crate::algo::shove::Shove;
use crate::algo::{FixOutcome, PlacementAlgo, build_head, build_ortho_head, offset_chain};
use crate::error::Failure;
use crate::item::{HULL_MARGIN, Item, ItemId, Line, kind};
use crate::node::Node;
use crate::sizes::SizesSettings;
use crate::topology::Topology;
use pns_common::db::indices::NetId;
use pns_common::geom::{IPoint, LineChain};
use pns_common::util::config::{CollisionMode, RoutingConfig};
use std::rc::Rc;

/// Routes both nets of a differential pair along a common centreline,
/// each offset by half the pair pitch.
pub struct DiffPairPlacer {
    settings: RoutingConfig,
    sizes: SizesSettings,
    layer: u8,
    net_p: NetId,
    net_n: NetId,
    anchor_p: IPoint,
    anchor_n: IPoint,
    diagonal_first: bool,
    cursor: IPoint,
    heads: Option<(Line, Line)>,
    trial: Option<Node>,
    violations: Vec<ItemId>,
}

/// Anchor of `net` on `layer` nearest to `p`.
fn nearest_anchor(world: &Node, net: NetId, layer: u8, p: IPoint) -> Option<IPoint> {
    world
        .net_items(net)
        .into_iter()
        .filter_map(|id| world.item(id))
        .filter(|item| item.layers().contains(layer) && item.shape().is_some())
        .flat_map(|item| item.anchors())
        .min_by_key(|a| (*a - p).squared_length())
}

impl DiffPairPlacer {
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
        let item = item.ok_or(Failure::NotDiffPair)?;
        if item.shape().is_none() || !item.layers().contains(layer) {
            return Err(Failure::NotConnectable(layer));
        }
        let rules = world.rules().ok_or(Failure::NotDiffPair)?;
        let (net_p, net_n) = rules.dp_net_pair(item).ok_or(Failure::NotDiffPair)?;
        let on_p = item.net() == Some(net_p);
        let coupled = if on_p { net_n } else { net_p };
        let partner = nearest_anchor(world, coupled, layer, p).ok_or(Failure::NoCoupledAnchor)?;
        let (anchor_p, anchor_n) = if on_p { (p, partner) } else { (partner, p) };
        log::debug!(
            "diff pair: {:?}/{:?} from {:?} and {:?}",
            net_p,
            net_n,
            anchor_p,
            anchor_n
        );

        Ok(Self {
            settings: settings.clone(),
            sizes: sizes.clone(),
            layer,
            net_p,
            net_n,
            anchor_p,
            anchor_n,
            diagonal_first: settings.start_diagonal,
            cursor: p,
            heads: None,
            trial: None,
            violations: Vec::new(),
        })
    }

    fn centre(&self) -> IPoint {
        IPoint::new(
            (self.anchor_p.x + self.anchor_n.x) / 2,
            (self.anchor_p.y + self.anchor_n.y) / 2,
        )
    }

    /// Distance from the centreline to each trace axis.
    fn half_pitch(&self) -> i64 {
        (self.sizes.diff_pair_gap + self.sizes.diff_pair_width + 1) / 2 + HULL_MARGIN
    }

    pub fn heads(&self) -> Option<&(Line, Line)> {
        self.heads.as_ref()
    }

    fn build(&self, p: IPoint) -> Option<(Line, Line)> {
        let centre = self.centre();
        let centreline = if self.settings.orthogonal {
            build_ortho_head(centre, p, !self.diagonal_first)
        } else {
            build_head(centre, p, self.diagonal_first)
        };
        let first = centreline.segments().find(|s| !s.is_degenerate())?;
        let p_left = first.side(self.anchor_p) >= 0;
        let off = self.half_pitch();
        let (off_p, off_n) = if p_left { (off, -off) } else { (-off, off) };

        let make = |anchor: IPoint, offset: i64, net: NetId| {
            let mut chain = LineChain::from_points([anchor]);
            chain.append_chain(&offset_chain(&centreline, offset));
            chain.simplify();
            Line::new(chain, self.sizes.diff_pair_width, self.layer, Some(net))
        };
        Some((
            make(self.anchor_p, off_p, self.net_p),
            make(self.anchor_n, off_n, self.net_n),
        ))
    }

    fn route(&mut self, world: &Rc<Node>, p: IPoint) -> Result<(), Failure> {
        self.cursor = p;
        // a degenerate centreline keeps the last valid pair
        let Some((mut head_p, mut head_n)) = self.build(p) else {
            return Ok(());
        };
        let mut trial = Node::branch(world);
        let shove = self.settings.mode == CollisionMode::Shove;
        let (limit, tie) = (self.settings.iteration_limit, self.settings.tie_break);
        if shove {
            Shove::new(&mut trial, limit, tie).shove_line(&head_p)?;
        }
        trial.add_line(&mut head_p);
        if shove {
            Shove::new(&mut trial, limit, tie)
                .with_fixed(head_p.links())
                .shove_line(&head_n)?;
        }
        trial.add_line(&mut head_n);

        let mut violations: Vec<ItemId> = [&head_p, &head_n]
            .iter()
            .flat_map(|h| trial.query_colliding(&Item::Line((*h).clone()), kind::ANY))
            .map(|o| o.id)
            .collect();
        violations.sort();
        violations.dedup();
        if !violations.is_empty() && self.settings.mode == CollisionMode::Shove {
            return Err(Failure::Violations(violations.len()));
        }

        self.violations = violations;
        self.heads = Some((head_p, head_n));
        self.trial = Some(trial);
        Ok(())
    }
}

impl PlacementAlgo for DiffPairPlacer {
    fn move_to(&mut self, world: &Rc<Node>, p: IPoint, _item: Option<&Item>) -> Result<(), Failure> {
        self.route(world, p)
    }

    fn fix_route(&mut self, world: &Rc<Node>, p: IPoint, _item: Option<&Item>) -> Result<FixOutcome, Failure> {
        if p != self.cursor || self.trial.is_none() {
            self.route(world, p)?;
        }
        let Some((head_p, head_n)) = &self.heads else {
            return Err(Failure::NothingToFix);
        };
        if !self.violations.is_empty() && !self.settings.allow_violations {
            return Err(Failure::Violations(self.violations.len()));
        }
        let topo = Topology::new(world);
        let lands = |head: &Line, net: NetId| {
            head.end()
                .is_some_and(|e| !topo.items_at(e, Some(net), self.layer).is_empty())
        };
        Ok(if lands(head_p, self.net_p) && lands(head_n, self.net_n) {
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
        if let Some((head_p, head_n)) = self.heads.take() {
            self.anchor_p = head_p.end().unwrap_or(self.anchor_p);
            self.anchor_n = head_n.end().unwrap_or(self.anchor_n);
        }
        self.cursor = self.centre();
        self.violations.clear();
    }

    fn current_nets(&self) -> Vec<NetId> {
        vec![self.net_p, self.net_n]
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

    fn update_sizes(&mut self, sizes: &SizesSettings) {
        self.sizes = sizes.clone();
    }

    fn set_orthogonal(&mut self, orthogonal: bool) {
        self.settings.orthogonal = orthogonal;
    }
}
