use pns_common::db::board::ViaType;
use pns_common::util::config::SizesConfig;

/// Net-class dimensions reported by the host for one net.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetSizes {
    pub clearance: i64,
    pub track_width: i64,
    pub via_diameter: i64,
    pub via_drill: i64,
    pub diff_pair_width: i64,
    pub diff_pair_gap: i64,
}

/// Dimensions used for newly placed copper.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SizesSettings {
    pub track_width: i64,
    pub via_diameter: i64,
    pub via_drill: i64,
    pub via_type: ViaType,
    pub diff_pair_width: i64,
    pub diff_pair_gap: i64,
}

impl From<&SizesConfig> for SizesSettings {
    fn from(cfg: &SizesConfig) -> Self {
        Self {
            track_width: cfg.track_width,
            via_diameter: cfg.via_diameter,
            via_drill: cfg.via_drill,
            via_type: cfg.via_type,
            diff_pair_width: cfg.diff_pair_width,
            diff_pair_gap: cfg.diff_pair_gap,
        }
    }
}

impl Default for SizesSettings {
    fn default() -> Self {
        Self::from(&SizesConfig::default())
    }
}

impl SizesSettings {
    pub fn apply_net_sizes(&mut self, net: &NetSizes) {
        self.track_width = net.track_width;
        self.via_diameter = net.via_diameter;
        self.via_drill = net.via_drill;
        self.diff_pair_width = net.diff_pair_width;
        self.diff_pair_gap = net.diff_pair_gap;
    }
}
