//! Branch bookkeeping for fork detection.

use crate::VecClockError;
use atropos_types::{BranchId, Seq};
use serde::{Deserialize, Serialize};

/// Per-branch state of the vector engine.
///
/// Branches `0..validators.len()` are the validators' original branches;
/// every later branch is a fork lane opened the first time a validator's
/// event couldn't extend any of its existing branches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchesInfo {
    /// Last seq seen on each branch.
    pub last_seq: Vec<Seq>,
    /// Validator index owning each branch.
    pub creator_idxs: Vec<usize>,
    /// Branches owned by each validator index.
    pub by_creator: Vec<Vec<BranchId>>,
}

impl BranchesInfo {
    /// One empty branch per validator.
    pub fn new(validators: usize) -> Self {
        Self {
            last_seq: vec![0; validators],
            creator_idxs: (0..validators).collect(),
            by_creator: (0..validators).map(|i| vec![i]).collect(),
        }
    }

    /// Total number of branches.
    pub fn len(&self) -> usize {
        self.creator_idxs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creator_idxs.is_empty()
    }

    /// Whether any validator has more than one branch.
    pub fn at_least_one_fork(&self, validators: usize) -> bool {
        self.len() > validators
    }

    pub fn branches_of(&self, creator_idx: usize) -> &[BranchId] {
        self.by_creator
            .get(creator_idx)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Open a new fork branch for `creator_idx`, starting at `seq`.
    pub fn push_fork(&mut self, creator_idx: usize, seq: Seq) -> BranchId {
        let branch = self.len();
        self.last_seq.push(seq);
        self.creator_idxs.push(creator_idx);
        self.by_creator[creator_idx].push(branch);
        branch
    }

    /// Sanity checks against the current validator count.
    pub fn check(&self, validators: usize) -> Result<(), VecClockError> {
        if self.last_seq.len() != self.creator_idxs.len() {
            return Err(VecClockError::InconsistentBranches(format!(
                "{} last seqs for {} branches",
                self.last_seq.len(),
                self.creator_idxs.len()
            )));
        }
        if self.len() < validators || self.by_creator.len() != validators {
            return Err(VecClockError::InconsistentBranches(format!(
                "{} branches and {} creators for {validators} validators",
                self.len(),
                self.by_creator.len()
            )));
        }
        Ok(())
    }

    pub fn encode(&self) -> Result<Vec<u8>, VecClockError> {
        bincode::serialize(self).map_err(|e| VecClockError::Corrupted(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, VecClockError> {
        bincode::deserialize(bytes).map_err(|e| VecClockError::Corrupted(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_fork() {
        let mut info = BranchesInfo::new(3);
        assert!(!info.at_least_one_fork(3));

        let branch = info.push_fork(1, 4);
        assert_eq!(branch, 3);
        assert_eq!(info.branches_of(1), &[1, 3]);
        assert_eq!(info.creator_idxs[3], 1);
        assert_eq!(info.last_seq[3], 4);
        assert!(info.at_least_one_fork(3));
        assert!(info.check(3).is_ok());
    }

    #[test]
    fn test_check_rejects_mismatched_validators() {
        let info = BranchesInfo::new(2);
        assert!(matches!(
            info.check(3),
            Err(VecClockError::InconsistentBranches(_))
        ));
    }

    #[test]
    fn test_encode_decode() {
        let mut info = BranchesInfo::new(2);
        info.push_fork(0, 2);
        let decoded = BranchesInfo::decode(&info.encode().unwrap()).unwrap();
        assert_eq!(decoded, info);
        assert!(BranchesInfo::decode(&[1, 2]).is_err());
    }
}
