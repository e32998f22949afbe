use pns_common::db::indices::{BoardItemRef, NetId};
use pns_common::geom::{Seg, Shape};

/// Straight piece of track on one layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub seg: Seg,
    pub width: i64,
    pub layer: u8,
    pub net: Option<NetId>,
    pub parent: Option<BoardItemRef>,
    pub locked: bool,
}

impl Segment {
    pub fn new(seg: Seg, width: i64, layer: u8, net: Option<NetId>) -> Self {
        Self {
            seg,
            width,
            layer,
            net,
            parent: None,
            locked: false,
        }
    }

    pub fn shape(&self) -> Shape {
        Shape::Segment {
            seg: self.seg,
            width: self.width,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.seg.is_degenerate()
    }

    /// Same endpoints regardless of direction, same width, layer and net.
    pub fn same_geometry(&self, other: &Segment) -> bool {
        (self.seg == other.seg || self.seg == other.seg.reversed())
            && self.width == other.width
            && self.layer == other.layer
            && self.net == other.net
    }
}
