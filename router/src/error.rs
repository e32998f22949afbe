use crate::algo::shove::ShoveError;
use pns_common::db::commit::BoardError;
use thiserror::Error;

/// Host-side failures surfaced to the caller.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("failed to synchronise the world: {0}")]
    Sync(BoardError),
    #[error("host rejected the commit: {0}")]
    Commit(BoardError),
}

/// Why the last routing operation did not succeed. Reported through
/// `Router::failure_reason`; these never abort the session.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Failure {
    #[error("layer {0} is not a routing layer")]
    InvalidLayer(u8),
    #[error("the start item has no copper on layer {0}")]
    NotConnectable(u8),
    #[error("{0} is not supported")]
    UnsupportedMode(&'static str),
    #[error("the net is not part of a differential pair")]
    NotDiffPair,
    #[error("no item of the coupled net to start from")]
    NoCoupledAnchor,
    #[error("a {0} cannot be dragged")]
    NotDraggable(&'static str),
    #[error("length tuning needs a track to start on")]
    NotTunable,
    #[error("no room for meanders on this segment")]
    NoMeanderRoom,
    #[error("the meanders would violate clearance")]
    MeanderCollides,
    #[error("shove failed: {0}")]
    Shove(#[from] ShoveError),
    #[error("the route violates clearance with {0} item(s)")]
    Violations(usize),
    #[error("nothing to fix")]
    NothingToFix,
    #[error("cannot switch layers here")]
    LayerSwitch,
    #[error("the host rejected the commit")]
    CommitRejected,
}
