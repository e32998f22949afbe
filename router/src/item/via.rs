use pns_common::db::board::ViaType;
use pns_common::db::indices::{BoardItemRef, NetId};
use pns_common::geom::{IPoint, LayerRange, Shape};

#[derive(Clone, Debug, PartialEq)]
pub struct Via {
    pub pos: IPoint,
    pub layers: LayerRange,
    pub diameter: i64,
    pub drill: i64,
    pub net: Option<NetId>,
    pub via_type: ViaType,
    pub parent: Option<BoardItemRef>,
    pub locked: bool,
}

impl Via {
    pub fn new(
        pos: IPoint,
        layers: LayerRange,
        diameter: i64,
        drill: i64,
        net: Option<NetId>,
    ) -> Self {
        Self {
            pos,
            layers,
            diameter,
            drill,
            net,
            via_type: ViaType::Through,
            parent: None,
            locked: false,
        }
    }

    pub fn shape(&self) -> Shape {
        Shape::Circle {
            center: self.pos,
            radius: self.diameter / 2,
        }
    }

    pub fn moved_to(&self, pos: IPoint) -> Via {
        Via {
            pos,
            parent: None,
            ..self.clone()
        }
    }

    pub fn same_geometry(&self, other: &Via) -> bool {
        self.pos == other.pos
            && self.layers == other.layers
            && self.diameter == other.diameter
            && self.net == other.net
    }
}
