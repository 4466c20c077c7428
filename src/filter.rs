//! Appearance filtering for monitor-backed queries.
use std::collections::HashSet;

use web3::types::Address;

use crate::types::{Appearance, BlockRange, Reason};

/// Narrows a monitor's appearance list before a query runs.
///
/// Application order follows the documented pipeline: the list is reversed
/// first when requested, then block bounds and content filters apply, then
/// the record window (`first_record` / `max_records`) slices what is left.
#[derive(Clone, Debug)]
pub struct AppearanceFilter {
    pub block_range: Option<BlockRange>,
    /// Zero-based index of the first surviving record to keep.
    pub first_record: usize,
    pub max_records: usize,
    pub reversed: bool,
    /// When present, only appearances with one of these reasons survive.
    pub reasons: Option<HashSet<Reason>>,
    /// When non-empty, only appearances of these addresses survive.
    pub relevant_to: Vec<Address>,
}

impl Default for AppearanceFilter {
    fn default() -> Self {
        AppearanceFilter {
            block_range: None,
            first_record: 0,
            max_records: usize::MAX,
            reversed: false,
            reasons: None,
            relevant_to: vec![],
        }
    }
}

impl AppearanceFilter {
    pub fn for_blocks(block_range: BlockRange) -> Self {
        AppearanceFilter {
            block_range: Some(block_range),
            ..Default::default()
        }
    }

    pub fn apply(&self, mut apps: Vec<Appearance>) -> Vec<Appearance> {
        if self.reversed {
            apps.reverse();
        }
        let survivors = apps.into_iter().filter(|app| self.admits(app));
        survivors
            .skip(self.first_record)
            .take(self.max_records)
            .collect()
    }

    fn admits(&self, app: &Appearance) -> bool {
        if let Some(range) = &self.block_range {
            if !range.contains(app.block_number) {
                return false;
            }
        }
        if let Some(reasons) = &self.reasons {
            if !reasons.contains(&app.reason) {
                return false;
            }
        }
        if !self.relevant_to.is_empty() && !self.relevant_to.contains(&app.address) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(block: u32, reason: Reason) -> Appearance {
        Appearance {
            block_number: block,
            reason,
            ..Default::default()
        }
    }

    #[test]
    fn block_range_bounds_apply() {
        let filter = AppearanceFilter::for_blocks(BlockRange::new(10, 20).unwrap());
        let out = filter.apply(vec![
            app(5, Reason::From),
            app(10, Reason::From),
            app(20, Reason::From),
            app(21, Reason::From),
        ]);
        let blocks: Vec<u32> = out.iter().map(|a| a.block_number).collect();
        assert_eq!(blocks, vec![10, 20]);
    }

    #[test]
    fn reversal_happens_before_record_window() {
        let filter = AppearanceFilter {
            reversed: true,
            first_record: 1,
            max_records: 2,
            ..Default::default()
        };
        let out = filter.apply(vec![
            app(1, Reason::From),
            app(2, Reason::From),
            app(3, Reason::From),
            app(4, Reason::From),
        ]);
        let blocks: Vec<u32> = out.iter().map(|a| a.block_number).collect();
        // Reversed to 4,3,2,1, then skip one and take two.
        assert_eq!(blocks, vec![3, 2]);
    }

    #[test]
    fn reason_set_filters() {
        let filter = AppearanceFilter {
            reasons: Some(HashSet::from([Reason::Miner])),
            ..Default::default()
        };
        let out = filter.apply(vec![app(1, Reason::Miner), app(2, Reason::From)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].reason, Reason::Miner);
    }
}
