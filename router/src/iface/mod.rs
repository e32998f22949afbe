pub mod board;
pub mod resolver;

use crate::item::Item;
use crate::node::Node;
use crate::sizes::NetSizes;
use pns_common::db::commit::BoardError;
use pns_common::db::indices::{BoardItemRef, NetId};

/// How a preview item is drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewColor {
    Normal,
    /// The item violates clearance.
    Violation,
}

/// Everything the router needs from its host: the board it edits and the
/// view it draws previews into.
pub trait RouterIface {
    /// Populates an empty root node from the host board, installing the rule
    /// resolver and the maximum clearance.
    fn sync_world(&mut self, world: &mut Node) -> Result<(), BoardError>;

    /// Stages a new board object for `item` and returns its handle.
    fn add_item(&mut self, item: &Item) -> Option<BoardItemRef>;

    /// Stages removal of the board object behind `item`. Items without a
    /// parent are ignored.
    fn remove_item(&mut self, item: &Item);

    /// Applies everything staged since the last commit. On error nothing is
    /// applied.
    fn commit(&mut self) -> Result<(), BoardError>;

    fn display_item(&mut self, item: &Item, color: PreviewColor, clearance: i64);

    /// Hides the board object behind `item` while a trial replaces it.
    fn hide_item(&mut self, item: &Item);

    fn erase_view(&mut self);

    /// Called for each net touched by a commit.
    fn update_net(&mut self, net: NetId) {
        log::trace!("net {:?} changed", net);
    }

    fn layer_count(&self) -> u8;

    /// Net-class sizes of `net`, or `None` when the host has no board.
    fn net_sizes(&self, net: Option<NetId>) -> Option<NetSizes>;
}
