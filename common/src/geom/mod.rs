pub mod coord;
pub mod hull;
pub mod layers;
pub mod line_chain;
pub mod point;
pub mod rect;
pub mod rtree;
pub mod seg;
pub mod shape;

pub use layers::LayerRange;
pub use line_chain::LineChain;
pub use point::{IPoint, Point};
pub use rect::Rect;
pub use seg::Seg;
pub use shape::Shape;
