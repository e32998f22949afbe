use pns_common::geom::IPoint;
use pns_common::geom::coord::from_mm;
use serde::Deserialize;
use std::path::Path;

/// Recorded interaction session. Coordinates are millimetres.
///
/// ```toml
/// [[step]]
/// action = "route"
/// at = [10.0, 5.0]
///
/// [[step]]
/// action = "fix"
/// at = [20.0, 5.0]
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub step: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Route {
        at: [f64; 2],
        #[serde(default)]
        layer: u8,
    },
    DiffPair {
        at: [f64; 2],
        #[serde(default)]
        layer: u8,
    },
    Tune {
        at: [f64; 2],
    },
    Drag {
        at: [f64; 2],
    },
    Move {
        to: [f64; 2],
    },
    Fix {
        at: [f64; 2],
    },
    Cancel,
    FlipPosture,
    ToggleVia,
    SwitchLayer {
        layer: u8,
    },
}

impl Script {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read script {:?}: {}", path, e))?;
        toml::from_str(&text).map_err(|e| anyhow::anyhow!("Invalid script {:?}: {}", path, e))
    }
}

pub fn to_point(mm: [f64; 2]) -> IPoint {
    IPoint::new(from_mm(mm[0]), from_mm(mm[1]))
}
