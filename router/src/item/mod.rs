pub mod line;
pub mod segment;
pub mod solid;
pub mod via;

pub use line::Line;
pub use segment::Segment;
pub use solid::Solid;
pub use via::Via;

use pns_common::db::indices::{BoardItemRef, NetId};
use pns_common::geom::hull::octagonal_hull;
use pns_common::geom::{IPoint, LayerRange, LineChain, Rect, Shape};
use std::fmt::Debug;

/// Extra distance added to hulls so walked paths clear them after rounding.
pub const HULL_MARGIN: i64 = 10;

/// Identity of an item inside a node tree; stable across branch and merge.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u32);

impl Debug for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ItemId({})", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Solid,
    Segment,
    Via,
    Line,
}

/// Bit set of [`ItemKind`]s used to filter queries.
pub type KindMask = u8;

pub mod kind {
    use super::KindMask;

    pub const SOLID: KindMask = 1;
    pub const SEGMENT: KindMask = 2;
    pub const VIA: KindMask = 4;
    pub const LINE: KindMask = 8;
    pub const ANY: KindMask = 0xff;
}

impl ItemKind {
    pub fn mask(self) -> KindMask {
        match self {
            ItemKind::Solid => kind::SOLID,
            ItemKind::Segment => kind::SEGMENT,
            ItemKind::Via => kind::VIA,
            ItemKind::Line => kind::LINE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ItemKind::Solid => "solid",
            ItemKind::Segment => "segment",
            ItemKind::Via => "via",
            ItemKind::Line => "line",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Item {
    Solid(Solid),
    Segment(Segment),
    Via(Via),
    Line(Line),
}

impl Item {
    pub fn kind(&self) -> ItemKind {
        match self {
            Item::Solid(_) => ItemKind::Solid,
            Item::Segment(_) => ItemKind::Segment,
            Item::Via(_) => ItemKind::Via,
            Item::Line(_) => ItemKind::Line,
        }
    }

    pub fn of_kind(&self, mask: KindMask) -> bool {
        self.kind().mask() & mask != 0
    }

    pub fn layers(&self) -> LayerRange {
        match self {
            Item::Solid(s) => s.layers,
            Item::Segment(s) => LayerRange::single(s.layer),
            Item::Via(v) => v.layers,
            Item::Line(l) => match l.via() {
                Some(v) => v.layers.merge(&LayerRange::single(l.layer)),
                None => LayerRange::single(l.layer),
            },
        }
    }

    pub fn net(&self) -> Option<NetId> {
        match self {
            Item::Solid(s) => s.net,
            Item::Segment(s) => s.net,
            Item::Via(v) => v.net,
            Item::Line(l) => l.net,
        }
    }

    /// Host entity this item was synchronised from or committed to.
    pub fn parent(&self) -> Option<BoardItemRef> {
        match self {
            Item::Solid(s) => s.parent,
            Item::Segment(s) => s.parent,
            Item::Via(v) => v.parent,
            Item::Line(_) => None,
        }
    }

    pub fn set_parent(&mut self, parent: Option<BoardItemRef>) {
        match self {
            Item::Solid(s) => s.parent = parent,
            Item::Segment(s) => s.parent = parent,
            Item::Via(v) => v.parent = parent,
            Item::Line(_) => {}
        }
    }

    pub fn is_locked(&self) -> bool {
        match self {
            Item::Solid(_) => true,
            Item::Segment(s) => s.locked,
            Item::Via(v) => v.locked,
            Item::Line(_) => false,
        }
    }

    /// Copper outline; `None` for items that take no part in collisions.
    pub fn shape(&self) -> Option<Shape> {
        match self {
            Item::Solid(s) => s.shape.clone(),
            Item::Segment(s) => Some(s.shape()),
            Item::Via(v) => Some(v.shape()),
            Item::Line(l) => Some(l.shape()),
        }
    }

    pub fn bbox(&self) -> Option<Rect> {
        let mut b = self.shape()?.bbox();
        if let Some(v) = self.line_via() {
            b = b.merge(&v.shape().bbox());
        }
        Some(b)
    }

    /// Points where the item connects to others.
    pub fn anchors(&self) -> Vec<IPoint> {
        match self {
            Item::Solid(s) => vec![s.pos],
            Item::Segment(s) => vec![s.seg.a, s.seg.b],
            Item::Via(v) => vec![v.pos],
            Item::Line(l) => l.start().into_iter().chain(l.end()).collect(),
        }
    }

    fn collide_simple(&self, other: &Item, clearance: i64) -> bool {
        if let (Some(a), Some(b)) = (self.net(), other.net()) {
            if a == b {
                return false;
            }
        }
        if !self.trace_layers().overlaps(&other.trace_layers()) {
            return false;
        }
        match (self.shape(), other.shape()) {
            (Some(a), Some(b)) => a.collide(&b, clearance),
            _ => false,
        }
    }

    /// Clearance violation test. Items of the same net never collide.
    pub fn collide(&self, other: &Item, clearance: i64) -> bool {
        if self.collide_simple(other, clearance) {
            return true;
        }
        let other_via = other.line_via().map(|v| Item::Via(v.clone()));
        if let Some(ov) = &other_via {
            if self.collide_simple(ov, clearance) {
                return true;
            }
        }
        let Some(own) = self.line_via().map(|v| Item::Via(v.clone())) else {
            return false;
        };
        own.collide_simple(other, clearance)
            || other_via.is_some_and(|ov| own.collide_simple(&ov, clearance))
    }

    /// Layers of the item's own copper, excluding a line's terminal via.
    fn trace_layers(&self) -> LayerRange {
        match self {
            Item::Line(l) => LayerRange::single(l.layer),
            _ => self.layers(),
        }
    }

    fn line_via(&self) -> Option<&Via> {
        match self {
            Item::Line(l) => l.via(),
            _ => None,
        }
    }

    /// Clearance hulls around the item for a path of width `walk_width`.
    pub fn hulls(&self, clearance: i64, walk_width: i64) -> Vec<LineChain> {
        let inflate = clearance + walk_width / 2 + HULL_MARGIN;
        match self {
            Item::Line(l) => {
                let mut hulls: Vec<LineChain> = l
                    .segments()
                    .iter()
                    .map(|s| octagonal_hull(&s.shape(), inflate))
                    .collect();
                if let Some(v) = l.via() {
                    hulls.push(octagonal_hull(&v.shape(), inflate));
                }
                hulls
            }
            _ => self
                .shape()
                .map(|s| vec![octagonal_hull(&s, inflate)])
                .unwrap_or_default(),
        }
    }

    /// Copper radius around the core geometry (half width, via radius).
    pub fn radius(&self) -> i64 {
        match self {
            Item::Solid(_) => 0,
            Item::Segment(s) => s.width / 2,
            Item::Via(v) => v.diameter / 2,
            Item::Line(l) => l.width / 2,
        }
    }

    pub fn as_segment(&self) -> Option<&Segment> {
        match self {
            Item::Segment(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_via(&self) -> Option<&Via> {
        match self {
            Item::Via(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pns_common::geom::Seg;

    fn seg(net: Option<u32>, y: i64) -> Item {
        Item::Segment(Segment::new(
            Seg::new(IPoint::new(0, y), IPoint::new(10_000, y)),
            200,
            0,
            net.map(NetId),
        ))
    }

    #[test]
    fn same_net_never_collides() {
        assert!(!seg(Some(1), 0).collide(&seg(Some(1), 0), 250));
        assert!(seg(Some(1), 0).collide(&seg(Some(2), 400), 250));
    }

    #[test]
    fn netless_items_collide_with_each_other() {
        assert!(seg(None, 0).collide(&seg(None, 300), 250));
    }

    #[test]
    fn layers_must_overlap() {
        let mut b = seg(Some(2), 0);
        if let Item::Segment(s) = &mut b {
            s.layer = 1;
        }
        assert!(!seg(Some(1), 0).collide(&b, 250));
    }

    #[test]
    fn line_with_via_collides_through_via() {
        let mut line = Line::new(
            LineChain::from_points([IPoint::new(0, 0), IPoint::new(1_000, 0)]),
            200,
            0,
            Some(NetId(1)),
        );
        line.set_via(Some(Via::new(
            IPoint::new(1_000, 0),
            LayerRange::new(0, 1),
            800,
            400,
            Some(NetId(1)),
        )));
        let mut other = seg(Some(2), 0);
        if let Item::Segment(s) = &mut other {
            s.layer = 1;
            s.seg = Seg::new(IPoint::new(1_000, 500), IPoint::new(5_000, 500));
        }
        assert!(Item::Line(line).collide(&other, 250));
    }

    fn line_with_via(net: u32, layer: u8, from: IPoint, to: IPoint) -> Line {
        let mut line = Line::new(LineChain::from_points([from, to]), 200, layer, Some(NetId(net)));
        line.set_via(Some(Via::new(to, LayerRange::new(0, 1), 800, 400, Some(NetId(net)))));
        line
    }

    #[test]
    fn own_via_is_checked_when_both_lines_end_in_vias() {
        let a = Item::Line(line_with_via(1, 0, IPoint::new(0, 0), IPoint::new(1_000, 0)));
        let b = Item::Line(line_with_via(2, 1, IPoint::new(1_000, 500), IPoint::new(5_000, 500)));
        assert!(a.collide(&b, 250));
        assert!(b.collide(&a, 250));
    }
}
