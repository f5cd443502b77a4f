//! Threshold checks deciding whether a batch commit is published

use serde::Serialize;

/// Both bounds are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub basefee_ceiling: u64,
    pub commit_floor: u64,
}

impl Thresholds {
    pub fn base_fee_acceptable(&self, base_fee: u64) -> bool {
        base_fee < self.basefee_ceiling
    }

    pub fn enough_commits(&self, pending: u64) -> bool {
        pending > self.commit_floor
    }

    /// Decision once the pending count is known. Only meaningful after
    /// `base_fee_acceptable` passed.
    pub fn decide_commits(&self, base_fee: u64, pending: u64) -> Decision {
        if self.enough_commits(pending) {
            Decision::Commit { base_fee, pending }
        } else {
            Decision::NotEnoughSectors { base_fee, pending }
        }
    }
}

/// Outcome of one controller run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    BaseFeeTooHigh { base_fee: u64 },
    NotEnoughSectors { base_fee: u64, pending: u64 },
    Commit { base_fee: u64, pending: u64 },
}

impl Decision {
    pub fn should_commit(&self) -> bool {
        matches!(self, Decision::Commit { .. })
    }

    pub fn base_fee(&self) -> u64 {
        match *self {
            Decision::BaseFeeTooHigh { base_fee }
            | Decision::NotEnoughSectors { base_fee, .. }
            | Decision::Commit { base_fee, .. } => base_fee,
        }
    }

    pub fn pending(&self) -> Option<u64> {
        match *self {
            Decision::BaseFeeTooHigh { .. } => None,
            Decision::NotEnoughSectors { pending, .. } | Decision::Commit { pending, .. } => {
                Some(pending)
            }
        }
    }
}
