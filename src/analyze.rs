use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::SeqError;

/// Which occurrences of a suspected-missing value count as "it arrived late".
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum ReclassifyScope {
    /// Any occurrence anywhere in the log.
    #[default]
    WholeLog,
    /// Only occurrences after the point where the gap was detected.
    AfterGap,
}

/// A detected discontinuity between `hold[index]` and `hold[index + 1]`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Gap {
    pub index: usize,
    /// First value that should have come next.
    pub expected: u64,
    pub delta: i64,
}

impl Gap {
    pub fn describe(&self) -> String {
        format!("seq gap {}", self.delta)
    }
}

#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct GapAnalysis {
    pub gaps: Vec<Gap>,
    pub out_of_order: Vec<u64>,
}

impl GapAnalysis {
    pub fn gap_index(&self) -> Vec<u64> {
        self.gaps.iter().map(|g| g.expected).collect()
    }

    /// Position → description. A position hit twice keeps the later description.
    pub fn gap_map(&self) -> BTreeMap<u64, String> {
        self.gaps.iter().map(|g| (g.expected, g.describe())).collect()
    }
}

/// Signed difference between neighbours. Values are compared as 64-bit
/// two's complement, so a decrease yields a negative delta.
fn delta(prev: u64, next: u64) -> i64 {
    (next as i64).wrapping_sub(prev as i64)
}

/// Pass 1: every adjacent pair whose delta is not exactly 1.
pub fn find_gaps(hold: &[u64]) -> Vec<Gap> {
    hold.windows(2)
        .enumerate()
        .filter_map(|(index, pair)| {
            let delta = delta(pair[0], pair[1]);
            if delta == 1 {
                None
            } else {
                Some(Gap { index, expected: pair[0].wrapping_add(1), delta })
            }
        })
        .collect()
}

/// Pass 2: gap positions that show up in the log anyway, in gap order.
pub fn reclassify(hold: &[u64], gaps: &[Gap], scope: ReclassifyScope) -> Vec<u64> {
    match scope {
        ReclassifyScope::WholeLog => {
            let seen: HashSet<u64> = hold.iter().copied().collect();
            gaps.iter().map(|g| g.expected).filter(|seq| seen.contains(seq)).collect()
        }
        ReclassifyScope::AfterGap => {
            let mut last_seen: HashMap<u64, usize> = HashMap::with_capacity(hold.len());
            for (i, &seq) in hold.iter().enumerate() {
                last_seen.insert(seq, i);
            }
            gaps.iter()
                .filter(|g| last_seen.get(&g.expected).map_or(false, |&i| i > g.index))
                .map(|g| g.expected)
                .collect()
        }
    }
}

/// Both passes over an ordered sequence log.
pub fn check_gaps(hold: &[u64], scope: ReclassifyScope, cancel: Option<&AtomicBool>) -> Result<GapAnalysis, SeqError> {
    let gaps = find_gaps(hold);
    if cancel.map_or(false, |c| c.load(Ordering::Relaxed)) {
        return Err(SeqError::Cancelled);
    }
    let out_of_order = reclassify(hold, &gaps, scope);
    log::debug!("{} gaps, {} reclassified as out of order", gaps.len(), out_of_order.len());
    Ok(GapAnalysis { gaps, out_of_order })
}
