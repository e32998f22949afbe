use crate::item::Item;
use pns_common::db::indices::NetId;

/// Clearance used for netless items and when no resolver is installed.
pub const DEFAULT_CLEARANCE: i64 = 254_000;

/// Clearance and differential-pair policy, built once from a board snapshot.
pub trait RuleResolver {
    /// Minimum gap between two items. Must be symmetric in its arguments.
    fn clearance(&self, a: &Item, b: &Item) -> i64;

    /// Plain net-class clearance of `net`.
    fn net_clearance(&self, net: Option<NetId>) -> i64;

    fn dp_coupled_net(&self, net: NetId) -> Option<NetId>;

    /// +1 for the positive member of a pair, -1 for the negative, 0 otherwise.
    fn dp_net_polarity(&self, net: NetId) -> i32;

    /// `(positive, negative)` nets of the pair `item` belongs to.
    fn dp_net_pair(&self, item: &Item) -> Option<(NetId, NetId)>;
}

/// Splits a differential-pair net name into its base, polarity and the name
/// of the complementary net. Recognises `+`/`-` and `_P`/`_N` suffixes.
pub fn match_dp_suffix(name: &str) -> Option<(&str, i32, String)> {
    const SUFFIXES: [(&str, &str, i32); 4] =
        [("+", "-", 1), ("_P", "_N", 1), ("-", "+", -1), ("_N", "_P", -1)];

    SUFFIXES.iter().find_map(|&(suffix, complement, polarity)| {
        name.strip_suffix(suffix)
            .map(|base| (base, polarity, format!("{}{}", base, complement)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_matching() {
        assert_eq!(match_dp_suffix("CLK_P"), Some(("CLK", 1, "CLK_N".to_string())));
        assert_eq!(match_dp_suffix("USB-"), Some(("USB", -1, "USB+".to_string())));
        assert_eq!(match_dp_suffix("GND"), None);
    }
}
