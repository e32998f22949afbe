use crate::db::board::{Board, Track, Via};
use crate::db::indices::BoardItemRef;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("no board attached")]
    NoBoard,
    #[error("board item {0:?} no longer exists")]
    StaleItem(BoardItemRef),
    #[error("board item {0:?} cannot be removed by the router")]
    NotRemovable(BoardItemRef),
    #[error("layer {layer} is outside the {count} copper layers of the board")]
    InvalidLayer { layer: u8, count: u8 },
}

#[derive(Clone, Debug)]
pub enum StagedItem {
    Track(Track),
    Via(Via),
}

/// Staged additions and removals applied to a board as one transaction.
#[derive(Debug, Default)]
pub struct BoardCommit {
    added: Vec<StagedItem>,
    removed: Vec<BoardItemRef>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub added: usize,
    pub removed: usize,
}

impl BoardCommit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: StagedItem) {
        self.added.push(item);
    }

    pub fn remove(&mut self, item: BoardItemRef) {
        if !self.removed.contains(&item) {
            self.removed.push(item);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Validates everything first, so a rejected commit leaves the board untouched.
    pub fn push(self, board: &mut Board, message: &str) -> Result<CommitSummary, BoardError> {
        for &r in &self.removed {
            if matches!(r, BoardItemRef::Pad(_)) {
                return Err(BoardError::NotRemovable(r));
            }
            if !board.contains(r) {
                return Err(BoardError::StaleItem(r));
            }
        }
        for item in &self.added {
            let layers: &[u8] = match item {
                StagedItem::Track(t) => &[t.layer],
                StagedItem::Via(v) => &[v.top, v.bottom],
            };
            if let Some(&layer) = layers.iter().find(|&&l| l >= board.copper_layers) {
                return Err(BoardError::InvalidLayer {
                    layer,
                    count: board.copper_layers,
                });
            }
        }

        let summary = CommitSummary {
            added: self.added.len(),
            removed: self.removed.len(),
        };
        for r in self.removed {
            board.remove(r);
        }
        for item in self.added {
            match item {
                StagedItem::Track(t) => board.add_track(t),
                StagedItem::Via(v) => board.add_via(v),
            }
        }
        log::info!(
            "{}: +{} / -{} board items",
            message,
            summary.added,
            summary.removed
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::indices::TrackId;
    use crate::geom::point::IPoint;

    fn track(id: u32, layer: u8) -> Track {
        Track {
            id: TrackId(id),
            start: IPoint::new(0, 0),
            end: IPoint::new(100, 0),
            width: 10,
            layer,
            net: None,
            locked: false,
        }
    }

    #[test]
    fn stale_removal_rejects_whole_commit() {
        let mut board = Board::new(2);
        let mut commit = BoardCommit::new();
        commit.add(StagedItem::Track(track(1, 0)));
        commit.remove(BoardItemRef::Track(TrackId(42)));
        let err = commit.push(&mut board, "test").unwrap_err();
        assert_eq!(err, BoardError::StaleItem(BoardItemRef::Track(TrackId(42))));
        assert!(board.tracks.is_empty());
    }

    #[test]
    fn applies_additions_and_removals() {
        let mut board = Board::new(2);
        board.add_track(track(5, 1));
        let mut commit = BoardCommit::new();
        commit.remove(BoardItemRef::Track(TrackId(5)));
        commit.add(StagedItem::Track(track(6, 0)));
        let summary = commit.push(&mut board, "test").unwrap();
        assert_eq!(summary, CommitSummary { added: 1, removed: 1 });
        assert_eq!(board.tracks.len(), 1);
        assert_eq!(board.tracks[0].id, TrackId(6));
    }

    #[test]
    fn rejects_layer_outside_stackup() {
        let mut board = Board::new(2);
        let mut commit = BoardCommit::new();
        commit.add(StagedItem::Track(track(1, 3)));
        assert!(matches!(
            commit.push(&mut board, "test"),
            Err(BoardError::InvalidLayer { layer: 3, count: 2 })
        ));
    }
}
