use crate::db::board::Board;
use anyhow::{Context, Result, ensure};
use std::path::Path;

/// Reads a TOML board and checks that layers and net references are in range.
pub fn load_board(path: &Path) -> Result<Board> {
    let text = std::fs::read_to_string(path)
        .context(format!("Failed to open board file: {}", path.display()))?;
    let board: Board =
        toml::from_str(&text).context(format!("Invalid board syntax in {}", path.display()))?;
    validate(&board)?;
    Ok(board)
}

pub fn save_board(board: &Board, path: &Path) -> Result<()> {
    let text = toml::to_string_pretty(board).context("Failed to serialise board")?;
    std::fs::write(path, text).context(format!("Failed to write board file: {}", path.display()))
}

fn validate(board: &Board) -> Result<()> {
    ensure!(board.copper_layers > 0, "board has no copper layers");
    let nets = board.nets.len();

    for t in &board.tracks {
        ensure!(
            t.layer < board.copper_layers,
            "track {} on layer {} of a {}-layer board",
            t.id.0,
            t.layer,
            board.copper_layers
        );
        ensure!(
            t.net.is_none_or(|n| n.index() < nets),
            "track {} references an unknown net",
            t.id.0
        );
    }
    for v in &board.vias {
        ensure!(
            v.top <= v.bottom && v.bottom < board.copper_layers,
            "via {} spans layers {}-{} of a {}-layer board",
            v.id.0,
            v.top,
            v.bottom,
            board.copper_layers
        );
        ensure!(
            v.net.is_none_or(|n| n.index() < nets),
            "via {} references an unknown net",
            v.id.0
        );
    }
    for (fp, pad) in board.pads() {
        ensure!(
            pad.net.is_none_or(|n| n.index() < nets),
            "pad {}.{} references an unknown net",
            fp.reference,
            pad.name
        );
    }
    Ok(())
}
