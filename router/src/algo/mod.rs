pub mod diff_pair_placer;
pub mod dragger;
pub mod line_placer;
pub mod meander_placer;
pub mod shove;
pub mod walkaround;

use crate::error::Failure;
use crate::item::{Item, ItemId};
use crate::node::Node;
use crate::sizes::SizesSettings;
use pns_common::db::indices::NetId;
use pns_common::geom::{IPoint, LineChain, Seg};
use std::rc::Rc;

/// What happens after a successful fix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixOutcome {
    /// The route reached its target; the operation is over.
    Finished,
    /// The placed part was committed and placement continues from its end.
    Continue,
}

/// Length-tuning state of the line being tuned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TuningStatus {
    TooShort,
    Tuned,
    TooLong,
}

/// Interactive operation driven by the router: placing a trace, a
/// differential pair, meanders, or dragging existing copper.
///
/// The algorithm owns at most one trial branch of the world. The router
/// takes it on fix, commits it to the host and merges it, then hands the
/// updated world back through [`PlacementAlgo::continue_from`].
pub trait PlacementAlgo {
    fn move_to(&mut self, world: &Rc<Node>, p: IPoint, item: Option<&Item>) -> Result<(), Failure>;

    fn fix_route(&mut self, world: &Rc<Node>, p: IPoint, item: Option<&Item>) -> Result<FixOutcome, Failure>;

    fn trial(&self) -> Option<&Node>;

    fn take_trial(&mut self) -> Option<Node>;

    fn restore_trial(&mut self, trial: Node);

    /// Restarts after a committed fix that did not finish the route.
    fn continue_from(&mut self, _world: &Rc<Node>) {}

    fn current_nets(&self) -> Vec<NetId>;

    fn current_layer(&self) -> u8;

    /// Items of the trial that violate clearance, for highlighting.
    fn violations(&self) -> &[ItemId] {
        &[]
    }

    fn flip_posture(&mut self, _world: &Rc<Node>) {}

    fn toggle_via(&mut self, _world: &Rc<Node>) -> bool {
        false
    }

    fn is_placing_via(&self) -> bool {
        false
    }

    fn set_layer(&mut self, _world: &Rc<Node>, _layer: u8) -> Result<(), Failure> {
        Err(Failure::LayerSwitch)
    }

    fn update_sizes(&mut self, _sizes: &SizesSettings) {}

    fn set_orthogonal(&mut self, _orthogonal: bool) {}

    fn tuning_status(&self) -> Option<TuningStatus> {
        None
    }
}

fn signum(v: i64) -> i64 {
    v.signum()
}

/// Two-segment trace from `start` to `end` made of one 45° diagonal and
/// one horizontal or vertical piece.
pub fn build_head(start: IPoint, end: IPoint, diagonal_first: bool) -> LineChain {
    let d = end - start;
    let (ax, ay) = (d.x.abs(), d.y.abs());
    if ax == 0 || ay == 0 || ax == ay {
        return LineChain::from_points([start, end]);
    }
    let m = ax.min(ay);
    let diag = IPoint::new(signum(d.x) * m, signum(d.y) * m);
    let corner = if diagonal_first {
        start + diag
    } else {
        start + (d - diag)
    };
    LineChain::from_points([start, corner, end])
}

/// L-shaped trace from `start` to `end`.
pub fn build_ortho_head(start: IPoint, end: IPoint, vertical_first: bool) -> LineChain {
    let corner = if vertical_first {
        IPoint::new(start.x, end.y)
    } else {
        IPoint::new(end.x, start.y)
    };
    LineChain::from_points([start, corner, end])
}

/// Parallel copy of `chain` shifted `dist` to the left of its direction,
/// mitred at the corners.
pub fn offset_chain(chain: &LineChain, dist: i64) -> LineChain {
    let segs: Vec<Seg> = chain
        .segments()
        .filter(|s| !s.is_degenerate())
        .map(|s| s.offset(dist))
        .collect();
    let (Some(first), Some(last)) = (segs.first(), segs.last()) else {
        return chain.clone();
    };
    let mut out = LineChain::new();
    out.append(first.a);
    for pair in segs.windows(2) {
        let corner = pair[0].line_intersection(&pair[1]).unwrap_or(pair[0].b);
        out.append(corner);
    }
    out.append(last.b);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_has_45_degree_corner() {
        let start = IPoint::new(0, 0);
        let end = IPoint::new(10_000, 4_000);
        let diag = build_head(start, end, true);
        assert_eq!(diag.points(), &[start, IPoint::new(4_000, 4_000), end]);
        let straight = build_head(start, end, false);
        assert_eq!(straight.points(), &[start, IPoint::new(6_000, 0), end]);
        assert_eq!(build_head(start, IPoint::new(0, 5), true).point_count(), 2);
    }

    #[test]
    fn offset_keeps_distance() {
        let chain = LineChain::from_points([IPoint::new(0, 0), IPoint::new(10_000, 0)]);
        let off = offset_chain(&chain, 500);
        assert_eq!(off.points(), &[IPoint::new(0, 500), IPoint::new(10_000, 500)]);
    }
}
