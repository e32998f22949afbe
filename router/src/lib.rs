pub mod algo;
pub mod error;
pub mod iface;
pub mod item;
pub mod node;
pub mod router;
pub mod rules;
pub mod sizes;
pub mod topology;

pub use error::RouterError;
pub use iface::RouterIface;
pub use iface::board::BoardIface;
pub use item::{Item, ItemId, ItemKind, Line, Segment, Solid, Via};
pub use node::Node;
pub use router::{Router, RouterMode, RouterState};
pub use rules::RuleResolver;
pub use sizes::SizesSettings;
