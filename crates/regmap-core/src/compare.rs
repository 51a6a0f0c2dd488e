//! Address-aligned comparison of two captured register states.

use std::collections::BTreeMap;
use std::fmt;

/// One address of a comparison; a side is `None` when that capture lacks the address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueComparison {
    /// Register address.
    pub address: u32,
    /// Value in the first capture.
    pub left: Option<u64>,
    /// Value in the second capture.
    pub right: Option<u64>,
    /// `true` unless both sides hold the same value.
    pub different: bool,
}

impl fmt::Display for ValueComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |v: Option<u64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:#x}"));
        write!(
            f,
            "{:>6}  {:>18}  {:>18}  {}",
            self.address,
            side(self.left),
            side(self.right),
            if self.different { "*" } else { "" }
        )
    }
}

/// Aligns two `(address, value)` sets and flags differing addresses.
///
/// Produces one row per address present in either set, sorted by address.
/// An address missing on one side always counts as different. When an
/// address repeats within one set, its last value wins.
#[must_use]
pub fn values_comparison(
    left: &[(u32, u64)],
    right: &[(u32, u64)],
) -> Vec<ValueComparison> {
    let mut rows: BTreeMap<u32, (Option<u64>, Option<u64>)> = BTreeMap::new();
    for &(address, value) in left {
        rows.entry(address).or_default().0 = Some(value);
    }
    for &(address, value) in right {
        rows.entry(address).or_default().1 = Some(value);
    }
    rows.into_iter()
        .map(|(address, (left, right))| ValueComparison {
            address,
            left,
            right,
            different: left != right,
        })
        .collect()
}
