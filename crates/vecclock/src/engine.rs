//! Fork-detecting vector clock engine.

use crate::{
    BranchesInfo, HighestBeforeVector, LowestAfterVector, VecClockError, VectorCache,
    VectorCacheConfig, VectorScheme,
};
use atropos_kvdb::{Flushable, KvStore};
use atropos_types::{
    BranchId, Event, EventId, EventSource, ValidatorId, Validators,
};
use std::sync::Arc;
use tracing::{debug, instrument, trace, warn};

const HIGHEST_BEFORE_PREFIX: u8 = b'h';
const LOWEST_AFTER_PREFIX: u8 = b'l';
const EVENT_BRANCH_PREFIX: u8 = b'b';
const BRANCHES_KEY: &[u8] = b"B";

fn event_key(prefix: u8, id: &EventId) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + id.as_bytes().len());
    key.push(prefix);
    key.extend_from_slice(id.as_bytes());
    key
}

/// Computes and stores the HighestBefore/LowestAfter vectors of every
/// event in the current epoch.
///
/// Writes go through an in-memory overlay: every [`VectorEngine::add`] must
/// be followed by [`VectorEngine::flush`] or
/// [`VectorEngine::drop_not_flushed`].
pub struct VectorEngine<S: VectorScheme> {
    events: Arc<dyn EventSource>,
    cache: VectorCache<S>,
    validators: Validators,
    db: Option<Flushable>,
    branches: BranchesInfo,
}

impl<S: VectorScheme> VectorEngine<S> {
    /// Create an engine. It can't index events until [`VectorEngine::reset`].
    pub fn new(events: Arc<dyn EventSource>, cache_config: VectorCacheConfig) -> Self {
        Self {
            events,
            cache: VectorCache::new(cache_config),
            validators: Validators::new([]),
            db: None,
            branches: BranchesInfo::new(0),
        }
    }

    /// Switch to a new validator set and vector table, e.g. on epoch seal.
    ///
    /// Branches info is loaded from `db`, or initialised with one branch per
    /// validator if the table is fresh.
    #[instrument(level = "debug", skip(self, validators, db), fields(validators = validators.len()))]
    pub fn reset(
        &mut self,
        validators: &Validators,
        db: Arc<dyn KvStore>,
    ) -> Result<(), VecClockError> {
        self.validators = validators.clone();
        self.db = Some(Flushable::new(db));
        self.cache.purge();
        self.branches = self.load_branches()?;
        debug!(branches = self.branches.len(), "Vector engine reset");
        Ok(())
    }

    pub fn validators(&self) -> &Validators {
        &self.validators
    }

    pub fn branches(&self) -> &BranchesInfo {
        &self.branches
    }

    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    /// Whether any validator has been seen forking in this epoch.
    pub fn at_least_one_fork(&self) -> bool {
        self.branches.at_least_one_fork(self.validators.len())
    }

    /// Replace the cache with one of different capacities.
    pub fn resize_cache(&mut self, config: VectorCacheConfig) {
        self.cache.resize(config);
    }

    /// Index an event. Its parents must already be indexed.
    #[instrument(level = "trace", skip(self, event), fields(event = %event.id()))]
    pub fn add(&mut self, event: &Event) -> Result<(), VecClockError> {
        let creator_idx = self
            .validators
            .index_of(event.creator())
            .ok_or(VecClockError::UnknownCreator(event.creator()))?;

        let mut parent_vecs = Vec::with_capacity(event.parents().len());
        for parent in event.parents() {
            let vec = self
                .get_highest_before(parent)?
                .ok_or(VecClockError::ParentNotFound {
                    event: event.id(),
                    parent: *parent,
                })?;
            parent_vecs.push(vec);
        }

        let branch = self.fill_branch(event, creator_idx)?;
        let branch_count = self.branches.len();

        let mut before = S::HighestBefore::with_branches(branch_count);
        let mut after = S::LowestAfter::with_branches(branch_count);
        before.init_with_event(branch, event);
        after.init_with_event(branch, event);

        for parent in &parent_vecs {
            before.collect_from(parent, branch_count);
        }
        if self.at_least_one_fork() {
            self.detect_forks(&mut before);
        }

        self.update_lowest_after(event, branch)?;

        let id = event.id();
        self.set_highest_before(id, before)?;
        self.set_lowest_after(id, after)?;
        self.set_event_branch(id, branch)?;
        trace!(branch, branch_count, "Event indexed");
        Ok(())
    }

    /// Persist everything written since the last flush.
    pub fn flush(&mut self) -> Result<(), VecClockError> {
        let db = self.db()?;
        db.put(BRANCHES_KEY, &self.branches.encode()?)?;
        db.flush()?;
        Ok(())
    }

    /// Forget everything written since the last flush.
    pub fn drop_not_flushed(&mut self) -> Result<(), VecClockError> {
        self.db()?.drop_not_flushed();
        self.cache.purge();
        self.branches = self.load_branches()?;
        Ok(())
    }

    /// Whether `a` forklessly causes `b`.
    ///
    /// Fails with [`VecClockError::NotIndexed`] if either event has no vectors.
    pub fn forkless_cause(&self, a: &EventId, b: &EventId) -> Result<bool, VecClockError> {
        if let Some(cached) = self.cache.forkless_cause.get(&(*a, *b)) {
            return Ok(cached);
        }
        let result = self.compute_forkless_cause(a, b)?;
        self.cache.forkless_cause.insert((*a, *b), result);
        Ok(result)
    }

    fn compute_forkless_cause(&self, a: &EventId, b: &EventId) -> Result<bool, VecClockError> {
        let a_before = self
            .get_highest_before(a)?
            .ok_or(VecClockError::NotIndexed(*a))?;

        // A must not observe B's creator forking
        if self.at_least_one_fork() {
            let b_branch = self
                .get_event_branch(b)?
                .ok_or(VecClockError::NotIndexed(*b))?;
            if a_before.is_fork_detected(b_branch) {
                return Ok(false);
            }
        }

        let b_after = self
            .get_lowest_after(b)?
            .ok_or(VecClockError::NotIndexed(*b))?;

        // A creator may be counted through several branches, but only once
        let mut yes = self.validators.counter();
        for (branch, &creator_idx) in self.branches.creator_idxs.iter().enumerate() {
            let lowest_after = b_after.get(branch);
            let highest_before = a_before.get(branch);
            if lowest_after != 0
                && lowest_after <= highest_before.seq
                && !highest_before.is_fork_detected()
            {
                yes.count_by_index(creator_idx);
            }
        }
        Ok(yes.has_quorum())
    }

    /// HighestBefore of `id` with each validator's branches collapsed into
    /// one entry, indexed by validator index.
    pub fn merged_highest_before(
        &self,
        id: &EventId,
    ) -> Result<S::HighestBefore, VecClockError> {
        let before = self
            .get_highest_before(id)?
            .ok_or(VecClockError::NotIndexed(*id))?;
        if !self.at_least_one_fork() {
            return Ok(before.as_ref().clone());
        }
        let mut merged = S::HighestBefore::with_branches(self.validators.len());
        for (creator_idx, branches) in self.branches.by_creator.iter().enumerate() {
            merged.gather_from(creator_idx, &before, branches);
        }
        Ok(merged)
    }

    /// Validators observed forking by `id`, in validator index order.
    pub fn cheaters(&self, id: &EventId) -> Result<Vec<ValidatorId>, VecClockError> {
        let merged = self.merged_highest_before(id)?;
        Ok(self
            .validators
            .sorted_ids()
            .iter()
            .enumerate()
            .filter(|(idx, _)| merged.is_fork_detected(*idx))
            .map(|(_, id)| *id)
            .collect())
    }

    /// Branch an indexed event was assigned to.
    pub fn event_branch(&self, id: &EventId) -> Result<Option<BranchId>, VecClockError> {
        self.get_event_branch(id)
    }

    pub fn get_highest_before(
        &self,
        id: &EventId,
    ) -> Result<Option<Arc<S::HighestBefore>>, VecClockError> {
        if let Some(cached) = self.cache.highest_before.get(id) {
            return Ok(Some(cached));
        }
        let Some(bytes) = self.db()?.get(&event_key(HIGHEST_BEFORE_PREFIX, id))? else {
            return Ok(None);
        };
        let vec = Arc::new(S::HighestBefore::from_bytes(&bytes)?);
        self.cache.highest_before.insert(*id, vec.clone());
        Ok(Some(vec))
    }

    pub fn get_lowest_after(
        &self,
        id: &EventId,
    ) -> Result<Option<Arc<S::LowestAfter>>, VecClockError> {
        if let Some(cached) = self.cache.lowest_after.get(id) {
            return Ok(Some(cached));
        }
        let Some(bytes) = self.db()?.get(&event_key(LOWEST_AFTER_PREFIX, id))? else {
            return Ok(None);
        };
        let vec = Arc::new(S::LowestAfter::from_bytes(&bytes)?);
        self.cache.lowest_after.insert(*id, vec.clone());
        Ok(Some(vec))
    }

    fn get_event_branch(&self, id: &EventId) -> Result<Option<BranchId>, VecClockError> {
        if let Some(cached) = self.cache.event_branch.get(id) {
            return Ok(Some(cached));
        }
        let Some(bytes) = self.db()?.get(&event_key(EVENT_BRANCH_PREFIX, id))? else {
            return Ok(None);
        };
        let raw: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
            VecClockError::Corrupted(format!("branch of {id} has {} bytes", bytes.len()))
        })?;
        let branch = u32::from_be_bytes(raw) as BranchId;
        self.cache.event_branch.insert(*id, branch);
        Ok(Some(branch))
    }

    fn set_highest_before(
        &self,
        id: EventId,
        vec: S::HighestBefore,
    ) -> Result<(), VecClockError> {
        self.db()?
            .put(&event_key(HIGHEST_BEFORE_PREFIX, &id), &vec.to_bytes())?;
        self.cache.highest_before.insert(id, Arc::new(vec));
        Ok(())
    }

    fn set_lowest_after(&self, id: EventId, vec: S::LowestAfter) -> Result<(), VecClockError> {
        self.db()?
            .put(&event_key(LOWEST_AFTER_PREFIX, &id), &vec.to_bytes())?;
        self.cache.lowest_after.insert(id, Arc::new(vec));
        Ok(())
    }

    fn set_event_branch(&self, id: EventId, branch: BranchId) -> Result<(), VecClockError> {
        self.db()?.put(
            &event_key(EVENT_BRANCH_PREFIX, &id),
            &(branch as u32).to_be_bytes(),
        )?;
        self.cache.event_branch.insert(id, branch);
        Ok(())
    }

    fn db(&self) -> Result<&Flushable, VecClockError> {
        self.db.as_ref().ok_or(VecClockError::NotReset)
    }

    fn load_branches(&self) -> Result<BranchesInfo, VecClockError> {
        match self.db()?.get(BRANCHES_KEY)? {
            Some(bytes) => BranchesInfo::decode(&bytes),
            None => Ok(BranchesInfo::new(self.validators.len())),
        }
    }

    /// Resolve the global branch of a new event.
    fn fill_branch(&mut self, event: &Event, creator_idx: usize) -> Result<BranchId, VecClockError> {
        self.branches.check(self.validators.len())?;

        match event.self_parent() {
            None => {
                if self.branches.last_seq[creator_idx] == 0 {
                    self.branches.last_seq[creator_idx] = event.seq();
                    return Ok(creator_idx);
                }
            }
            Some(self_parent) => {
                let sp_branch = self.get_event_branch(&self_parent)?.ok_or_else(|| {
                    VecClockError::InconsistentBranches(format!(
                        "self-parent {self_parent} has no branch"
                    ))
                })?;
                let owner = self
                    .branches
                    .creator_idxs
                    .get(sp_branch)
                    .copied()
                    .ok_or_else(|| {
                        VecClockError::InconsistentBranches(format!(
                            "branch {sp_branch} of {self_parent} is unknown"
                        ))
                    })?;
                if owner != creator_idx {
                    return Err(VecClockError::MisbehavingSelfParent {
                        event: event.id(),
                        self_parent,
                    });
                }
                if self.branches.last_seq[sp_branch].checked_add(1) == Some(event.seq()) {
                    self.branches.last_seq[sp_branch] = event.seq();
                    return Ok(sp_branch);
                }
            }
        }

        let branch = self.branches.push_fork(creator_idx, event.seq());
        warn!(
            event = %event.id(),
            creator = %event.creator(),
            branch,
            "Fork observed, new branch opened"
        );
        Ok(branch)
    }

    /// Mark forks the parents didn't already report.
    fn detect_forks(&self, before: &mut S::HighestBefore) {
        // One forked branch taints the whole creator
        for creator_idx in 0..self.validators.len() {
            let branches = self.branches.branches_of(creator_idx);
            if branches.len() <= 1 {
                continue;
            }
            if branches.iter().any(|&b| before.is_fork_detected(b)) {
                self.set_fork_detected(before, creator_idx);
            }
        }

        'next_creator: for creator_idx in 0..self.branches.by_creator.len() {
            if before.is_fork_detected(creator_idx) {
                continue;
            }
            let branches = self.branches.branches_of(creator_idx);
            for &a in branches {
                for &b in branches {
                    if a == b || before.is_empty(a) || before.is_empty(b) {
                        continue;
                    }
                    let (ea, eb) = (before.get(a), before.get(b));
                    if ea.min_seq <= eb.seq && eb.min_seq <= ea.seq {
                        self.set_fork_detected(before, creator_idx);
                        continue 'next_creator;
                    }
                }
            }
        }
    }

    fn set_fork_detected(&self, before: &mut S::HighestBefore, creator_idx: usize) {
        for &branch in self.branches.branches_of(creator_idx) {
            before.set_fork_detected(branch);
        }
    }

    /// Walk the ancestors of `event` (excluding it) and record the event's
    /// branch in their LowestAfter where unset.
    fn update_lowest_after(&self, event: &Event, branch: BranchId) -> Result<(), VecClockError> {
        let branch_count = self.branches.len();
        let mut stack: Vec<EventId> = event.parents().to_vec();
        while let Some(id) = stack.pop() {
            let walked = self
                .events
                .get_event(&id)
                .ok_or(VecClockError::EventNotFound(id))?;
            let mut after = match self.get_lowest_after(&id)? {
                Some(after) => after.as_ref().clone(),
                None => S::LowestAfter::with_branches(branch_count),
            };
            after.resize(branch_count);
            if after.visit(branch, event) {
                self.set_lowest_after(id, after)?;
                stack.extend_from_slice(walked.parents());
            }
        }
        Ok(())
    }
}

impl<S: VectorScheme> std::fmt::Debug for VectorEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorEngine")
            .field("validators", &self.validators.len())
            .field("branches", &self.branches.len())
            .field("cache", &self.cache)
            .finish()
    }
}
