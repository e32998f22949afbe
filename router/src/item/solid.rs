use pns_common::db::indices::{BoardItemRef, NetId};
use pns_common::geom::{IPoint, LayerRange, Shape};

/// Immovable copper such as a pad. A solid without a shape has no copper
/// on the routed layers and never collides.
#[derive(Clone, Debug, PartialEq)]
pub struct Solid {
    pub pos: IPoint,
    pub layers: LayerRange,
    pub net: Option<NetId>,
    pub shape: Option<Shape>,
    pub parent: Option<BoardItemRef>,
}

impl Solid {
    pub fn new(pos: IPoint, layers: LayerRange, net: Option<NetId>, shape: Option<Shape>) -> Self {
        Self {
            pos,
            layers,
            net,
            shape,
            parent: None,
        }
    }

    pub fn has_copper(&self) -> bool {
        self.shape.is_some()
    }
}
