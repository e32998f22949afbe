use crate::db::board::ViaType;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub sizes: SizesConfig,
    #[serde(default)]
    pub tuning: TuningConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            routing: RoutingConfig::default(),
            sizes: SizesConfig::default(),
            tuning: TuningConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionMode {
    /// Lay the head as drawn and highlight violations.
    MarkObstacles,
    /// Push colliding copper out of the way.
    Shove,
    /// Bend the head around obstacles.
    Walkaround,
}

/// Which side of a clearance hull a displaced line goes around when both work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    Shortest,
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "default_mode")]
    pub mode: CollisionMode,
    #[serde(default = "default_iteration_limit")]
    pub iteration_limit: usize,
    #[serde(default = "default_walkaround_iterations")]
    pub walkaround_iterations: usize,
    #[serde(default = "default_true")]
    pub snap_to_items: bool,
    #[serde(default = "default_true")]
    pub start_diagonal: bool,
    #[serde(default)]
    pub orthogonal: bool,
    #[serde(default)]
    pub allow_violations: bool,
    #[serde(default = "default_tie_break")]
    pub tie_break: TieBreak,
    #[serde(default = "default_snap_radius")]
    pub snap_radius: i64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            iteration_limit: default_iteration_limit(),
            walkaround_iterations: default_walkaround_iterations(),
            snap_to_items: default_true(),
            start_diagonal: default_true(),
            orthogonal: false,
            allow_violations: false,
            tie_break: default_tie_break(),
            snap_radius: default_snap_radius(),
        }
    }
}

/// Fallback dimensions used when a net has no net class.
#[derive(Debug, Clone, Deserialize)]
pub struct SizesConfig {
    #[serde(default = "default_track_width")]
    pub track_width: i64,
    #[serde(default = "default_via_diameter")]
    pub via_diameter: i64,
    #[serde(default = "default_via_drill")]
    pub via_drill: i64,
    #[serde(default = "default_dp_width")]
    pub diff_pair_width: i64,
    #[serde(default = "default_dp_gap")]
    pub diff_pair_gap: i64,
    #[serde(default)]
    pub via_type: ViaType,
}

impl Default for SizesConfig {
    fn default() -> Self {
        Self {
            track_width: default_track_width(),
            via_diameter: default_via_diameter(),
            via_drill: default_via_drill(),
            diff_pair_width: default_dp_width(),
            diff_pair_gap: default_dp_gap(),
            via_type: ViaType::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TuningConfig {
    #[serde(default = "default_target_length")]
    pub target_length: i64,
    #[serde(default = "default_length_tolerance")]
    pub tolerance: i64,
    #[serde(default = "default_min_amplitude")]
    pub min_amplitude: i64,
    #[serde(default = "default_max_amplitude")]
    pub max_amplitude: i64,
    #[serde(default = "default_meander_spacing")]
    pub spacing: i64,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            target_length: default_target_length(),
            tolerance: default_length_tolerance(),
            min_amplitude: default_min_amplitude(),
            max_amplitude: default_max_amplitude(),
            spacing: default_meander_spacing(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_snapshot_size")]
    pub snapshot_width: u32,
    #[serde(default = "default_snapshot_size")]
    pub snapshot_height: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            snapshot_width: default_snapshot_size(),
            snapshot_height: default_snapshot_size(),
        }
    }
}

fn default_mode() -> CollisionMode {
    CollisionMode::Shove
}

fn default_iteration_limit() -> usize {
    250
}

fn default_walkaround_iterations() -> usize {
    40
}

fn default_true() -> bool {
    true
}

fn default_tie_break() -> TieBreak {
    TieBreak::Shortest
}

fn default_snap_radius() -> i64 {
    500_000
}

fn default_track_width() -> i64 {
    250_000
}

fn default_via_diameter() -> i64 {
    800_000
}

fn default_via_drill() -> i64 {
    400_000
}

fn default_dp_width() -> i64 {
    200_000
}

fn default_dp_gap() -> i64 {
    250_000
}

fn default_target_length() -> i64 {
    20_000_000
}

fn default_length_tolerance() -> i64 {
    100_000
}

fn default_min_amplitude() -> i64 {
    200_000
}

fn default_max_amplitude() -> i64 {
    1_000_000
}

fn default_meander_spacing() -> i64 {
    600_000
}

fn default_snapshot_size() -> u32 {
    1200
}
