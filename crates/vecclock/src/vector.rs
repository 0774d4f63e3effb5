//! Byte-packed vectors and the encodings the engine is generic over.
//!
//! All vectors are indexed by [`BranchId`] and packed little-endian. Reading
//! past the end returns the empty entry; writing past the end panics, so
//! callers size vectors explicitly with `with_branches`/`resize`.

use crate::VecClockError;
use atropos_types::{BranchId, Event, Seq, Timestamp};
use std::fmt;

/// `min_seq` of the fork sentinel.
pub const FORK_DETECTED_MIN_SEQ: Seq = i32::MAX as Seq;

const BRANCH_SEQ_SIZE: usize = 8;
const SEQ_SIZE: usize = 4;
const TIME_SIZE: usize = 8;

/// HighestBefore entry for one branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BranchSeq {
    /// Highest observed seq.
    pub seq: Seq,
    /// Lowest observed seq. Used only to spot overlapping fork branches.
    pub min_seq: Seq,
}

impl BranchSeq {
    /// Sentinel stored once the branch's creator is observed forking.
    pub const FORK_DETECTED: Self = BranchSeq {
        seq: 0,
        min_seq: FORK_DETECTED_MIN_SEQ,
    };

    pub fn is_fork_detected(&self) -> bool {
        *self == Self::FORK_DETECTED
    }
}

/// Encoding of the HighestBefore vector.
pub trait HighestBeforeVector: Clone + fmt::Debug + Send + Sync + 'static {
    /// Empty vector covering `branches` branches.
    fn with_branches(branches: usize) -> Self;

    fn from_bytes(bytes: &[u8]) -> Result<Self, VecClockError>;

    fn to_bytes(&self) -> Vec<u8>;

    /// Sequence part of the vector.
    fn seqs(&self) -> &HighestBeforeSeq;

    /// Record the event itself on its own branch.
    fn init_with_event(&mut self, branch: BranchId, event: &Event);

    /// Merge a parent's vector over the first `branches` branches: larger
    /// seq, smaller min seq, the fork sentinel wins.
    fn collect_from(&mut self, other: &Self, branches: usize);

    /// Collapse the branches `from` of `other` into the single entry `to`:
    /// the fork sentinel if any of them forked, else the highest one.
    fn gather_from(&mut self, to: BranchId, other: &Self, from: &[BranchId]);

    fn set_fork_detected(&mut self, branch: BranchId);

    fn branches(&self) -> usize {
        self.seqs().branches()
    }

    fn get(&self, branch: BranchId) -> BranchSeq {
        self.seqs().get(branch)
    }

    fn is_fork_detected(&self, branch: BranchId) -> bool {
        self.seqs().get(branch).is_fork_detected()
    }

    /// Nothing observed on the branch (and it isn't forked).
    fn is_empty(&self, branch: BranchId) -> bool {
        let entry = self.seqs().get(branch);
        !entry.is_fork_detected() && entry.seq == 0
    }
}

/// Encoding of the LowestAfter vector.
pub trait LowestAfterVector: Clone + fmt::Debug + Send + Sync + 'static {
    fn with_branches(branches: usize) -> Self;

    fn from_bytes(bytes: &[u8]) -> Result<Self, VecClockError>;

    fn to_bytes(&self) -> Vec<u8>;

    fn get(&self, branch: BranchId) -> Seq;

    /// Grow to at least `branches` entries.
    fn resize(&mut self, branches: usize);

    fn init_with_event(&mut self, branch: BranchId, event: &Event);

    /// Record that `event` on `branch` observes the owner of this vector.
    /// Returns false if the branch was already set.
    fn visit(&mut self, branch: BranchId, event: &Event) -> bool;
}

/// Selects the vector encodings of a [`crate::VectorEngine`].
pub trait VectorScheme: Send + Sync + 'static {
    type HighestBefore: HighestBeforeVector;
    type LowestAfter: LowestAfterVector;
}

/// Sequence numbers only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeqScheme;

impl VectorScheme for SeqScheme {
    type HighestBefore = HighestBeforeSeq;
    type LowestAfter = LowestAfterSeq;
}

/// Sequence numbers plus creation times, for median time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimedScheme;

impl VectorScheme for TimedScheme {
    type HighestBefore = HighestBeforeTimed;
    type LowestAfter = LowestAfterSeq;
}

fn check_len(bytes: &[u8], entry: usize, what: &str) -> Result<(), VecClockError> {
    if bytes.len() % entry != 0 {
        return Err(VecClockError::Corrupted(format!(
            "{what} length {} is not a multiple of {entry}",
            bytes.len()
        )));
    }
    Ok(())
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

/// `{seq: u32, min_seq: u32}` per branch.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct HighestBeforeSeq(Vec<u8>);

impl HighestBeforeSeq {
    pub fn branches(&self) -> usize {
        self.0.len() / BRANCH_SEQ_SIZE
    }

    pub fn get(&self, branch: BranchId) -> BranchSeq {
        if branch >= self.branches() {
            return BranchSeq::default();
        }
        let offset = branch * BRANCH_SEQ_SIZE;
        BranchSeq {
            seq: read_u32(&self.0, offset),
            min_seq: read_u32(&self.0, offset + 4),
        }
    }

    /// # Panics
    ///
    /// Panics if `branch >= self.branches()`.
    pub fn set(&mut self, branch: BranchId, entry: BranchSeq) {
        let offset = branch * BRANCH_SEQ_SIZE;
        self.0[offset..offset + 4].copy_from_slice(&entry.seq.to_le_bytes());
        self.0[offset + 4..offset + 8].copy_from_slice(&entry.min_seq.to_le_bytes());
    }

    /// Merge one entry of another vector. Returns true if its seq was taken.
    fn merge_branch(&mut self, branch: BranchId, his: BranchSeq) -> bool {
        if his.seq == 0 && !his.is_fork_detected() {
            return false;
        }
        let mut mine = self.get(branch);
        if mine.is_fork_detected() {
            return false;
        }
        if his.is_fork_detected() {
            self.set(branch, BranchSeq::FORK_DETECTED);
            return false;
        }
        if mine.seq == 0 || mine.min_seq > his.min_seq {
            mine.min_seq = his.min_seq;
        }
        let taken = mine.seq < his.seq;
        if taken {
            mine.seq = his.seq;
        }
        self.set(branch, mine);
        taken
    }

    /// Highest entry among `from`, or the sentinel if any forked, with the
    /// branch it came from.
    fn highest_of(&self, from: &[BranchId]) -> (BranchSeq, Option<BranchId>) {
        let mut highest = BranchSeq::default();
        let mut source = None;
        for &branch in from {
            let entry = self.get(branch);
            if entry.is_fork_detected() {
                return (entry, Some(branch));
            }
            if entry.seq > highest.seq {
                highest = entry;
                source = Some(branch);
            }
        }
        (highest, source)
    }
}

impl HighestBeforeVector for HighestBeforeSeq {
    fn with_branches(branches: usize) -> Self {
        HighestBeforeSeq(vec![0; branches * BRANCH_SEQ_SIZE])
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, VecClockError> {
        check_len(bytes, BRANCH_SEQ_SIZE, "HighestBefore")?;
        Ok(HighestBeforeSeq(bytes.to_vec()))
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.0.clone()
    }

    fn seqs(&self) -> &HighestBeforeSeq {
        self
    }

    fn init_with_event(&mut self, branch: BranchId, event: &Event) {
        self.set(
            branch,
            BranchSeq {
                seq: event.seq(),
                min_seq: event.seq(),
            },
        );
    }

    fn collect_from(&mut self, other: &Self, branches: usize) {
        for branch in 0..branches {
            self.merge_branch(branch, other.get(branch));
        }
    }

    fn gather_from(&mut self, to: BranchId, other: &Self, from: &[BranchId]) {
        let (highest, _) = other.highest_of(from);
        self.set(to, highest);
    }

    fn set_fork_detected(&mut self, branch: BranchId) {
        self.set(branch, BranchSeq::FORK_DETECTED);
    }
}

impl fmt::Debug for HighestBeforeSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries((0..self.branches()).map(|b| {
                let entry = self.get(b);
                if entry.is_fork_detected() {
                    "fork".to_string()
                } else {
                    format!("{}..{}", entry.min_seq, entry.seq)
                }
            }))
            .finish()
    }
}

/// `{creation_time: u64}` per branch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HighestBeforeTime(Vec<u8>);

impl HighestBeforeTime {
    pub fn with_branches(branches: usize) -> Self {
        HighestBeforeTime(vec![0; branches * TIME_SIZE])
    }

    pub fn branches(&self) -> usize {
        self.0.len() / TIME_SIZE
    }

    pub fn get(&self, branch: BranchId) -> Timestamp {
        if branch >= self.branches() {
            return 0;
        }
        read_u64(&self.0, branch * TIME_SIZE)
    }

    /// # Panics
    ///
    /// Panics if `branch >= self.branches()`.
    pub fn set(&mut self, branch: BranchId, time: Timestamp) {
        let offset = branch * TIME_SIZE;
        self.0[offset..offset + TIME_SIZE].copy_from_slice(&time.to_le_bytes());
    }
}

/// Sequence and creation-time vectors side by side.
///
/// Serialized as the seq bytes followed by the time bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HighestBeforeTimed {
    pub seq: HighestBeforeSeq,
    pub time: HighestBeforeTime,
}

impl HighestBeforeVector for HighestBeforeTimed {
    fn with_branches(branches: usize) -> Self {
        HighestBeforeTimed {
            seq: HighestBeforeSeq::with_branches(branches),
            time: HighestBeforeTime::with_branches(branches),
        }
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, VecClockError> {
        let entry = BRANCH_SEQ_SIZE + TIME_SIZE;
        check_len(bytes, entry, "HighestBeforeTimed")?;
        let split = bytes.len() / entry * BRANCH_SEQ_SIZE;
        Ok(HighestBeforeTimed {
            seq: HighestBeforeSeq(bytes[..split].to_vec()),
            time: HighestBeforeTime(bytes[split..].to_vec()),
        })
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.seq.0.len() + self.time.0.len());
        bytes.extend_from_slice(&self.seq.0);
        bytes.extend_from_slice(&self.time.0);
        bytes
    }

    fn seqs(&self) -> &HighestBeforeSeq {
        &self.seq
    }

    fn init_with_event(&mut self, branch: BranchId, event: &Event) {
        self.seq.init_with_event(branch, event);
        self.time.set(branch, event.creation_time());
    }

    fn collect_from(&mut self, other: &Self, branches: usize) {
        for branch in 0..branches {
            let taken = self.seq.merge_branch(branch, other.seq.get(branch));
            if self.seq.get(branch).is_fork_detected() {
                self.time.set(branch, 0);
            } else if taken {
                self.time.set(branch, other.time.get(branch));
            }
        }
    }

    fn gather_from(&mut self, to: BranchId, other: &Self, from: &[BranchId]) {
        let (highest, source) = other.seq.highest_of(from);
        self.seq.set(to, highest);
        self.time.set(to, source.map_or(0, |b| other.time.get(b)));
    }

    fn set_fork_detected(&mut self, branch: BranchId) {
        self.seq.set(branch, BranchSeq::FORK_DETECTED);
        self.time.set(branch, 0);
    }
}

/// `{seq: u32}` per branch.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct LowestAfterSeq(Vec<u8>);

impl LowestAfterSeq {
    pub fn branches(&self) -> usize {
        self.0.len() / SEQ_SIZE
    }

    /// # Panics
    ///
    /// Panics if `branch >= self.branches()`.
    pub fn set(&mut self, branch: BranchId, seq: Seq) {
        let offset = branch * SEQ_SIZE;
        self.0[offset..offset + SEQ_SIZE].copy_from_slice(&seq.to_le_bytes());
    }
}

impl LowestAfterVector for LowestAfterSeq {
    fn with_branches(branches: usize) -> Self {
        LowestAfterSeq(vec![0; branches * SEQ_SIZE])
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, VecClockError> {
        check_len(bytes, SEQ_SIZE, "LowestAfter")?;
        Ok(LowestAfterSeq(bytes.to_vec()))
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.0.clone()
    }

    fn get(&self, branch: BranchId) -> Seq {
        if branch >= self.branches() {
            return 0;
        }
        read_u32(&self.0, branch * SEQ_SIZE)
    }

    fn resize(&mut self, branches: usize) {
        if branches > self.branches() {
            self.0.resize(branches * SEQ_SIZE, 0);
        }
    }

    fn init_with_event(&mut self, branch: BranchId, event: &Event) {
        self.set(branch, event.seq());
    }

    fn visit(&mut self, branch: BranchId, event: &Event) -> bool {
        if LowestAfterVector::get(self, branch) != 0 {
            return false;
        }
        self.set(branch, event.seq());
        true
    }
}

impl fmt::Debug for LowestAfterSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries((0..self.branches()).map(|b| LowestAfterVector::get(self, b)))
            .finish()
    }
}
