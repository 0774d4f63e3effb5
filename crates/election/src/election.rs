//! Election state machine.

use crate::{ElectionError, RootAndSlot};
use atropos_types::{EventId, Frame, ValidatorId, Validators};
use std::collections::HashMap;
use tracing::{debug, instrument, trace};

/// DAG queries the election needs.
pub trait ElectionContext {
    fn forkless_cause(&self, a: &EventId, b: &EventId) -> Result<bool, ElectionError>;

    /// All known roots of `frame`, in a deterministic order.
    fn frame_roots(&self, frame: Frame) -> Result<Vec<RootAndSlot>, ElectionError>;
}

/// A decided frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElectionResult {
    pub frame: Frame,
    pub atropos: EventId,
}

#[derive(Debug, Clone, Copy, Default)]
struct Vote {
    yes: bool,
    decided: bool,
    /// Subject's root the yes vote is about.
    observed_root: Option<EventId>,
}

/// Election of the Atropos of one frame.
#[derive(Debug)]
pub struct Election {
    validators: Validators,
    frame_to_decide: Frame,
    /// Votes by `(voter root, subject validator)`.
    votes: HashMap<(EventId, ValidatorId), Vote>,
    decided: HashMap<ValidatorId, Vote>,
}

impl Election {
    pub fn new(validators: Validators, frame_to_decide: Frame) -> Self {
        Self {
            validators,
            frame_to_decide,
            votes: HashMap::new(),
            decided: HashMap::new(),
        }
    }

    /// Discard all votes and start deciding `frame_to_decide`.
    pub fn reset(&mut self, validators: Validators, frame_to_decide: Frame) {
        self.validators = validators;
        self.frame_to_decide = frame_to_decide;
        self.votes.clear();
        self.decided.clear();
    }

    pub fn frame_to_decide(&self) -> Frame {
        self.frame_to_decide
    }

    pub fn validators(&self) -> &Validators {
        &self.validators
    }

    /// Let a new root vote. Returns the decision once the frame is decided.
    ///
    /// Roots must be processed in frame order: every root of frame `f` before
    /// any root of `f + 1`.
    #[instrument(level = "trace", skip(self, ctx), fields(
        root = %root.id,
        frame = root.slot.frame.0,
        frame_to_decide = self.frame_to_decide.0
    ))]
    pub fn process_root(
        &mut self,
        root: &RootAndSlot,
        ctx: &dyn ElectionContext,
    ) -> Result<Option<ElectionResult>, ElectionError> {
        if let Some(decided) = self.choose_atropos()? {
            return Ok(Some(decided));
        }
        if root.slot.frame <= self.frame_to_decide {
            return Ok(None);
        }
        let round = root.slot.frame.0 - self.frame_to_decide.0;
        let prev_frame = root.slot.frame.prev();

        let mut observed: Vec<RootAndSlot> = Vec::new();
        for prev in ctx.frame_roots(prev_frame)? {
            if ctx.forkless_cause(&root.id, &prev.id)? {
                observed.push(prev);
            }
        }

        let not_decided: Vec<ValidatorId> = self
            .validators
            .sorted_ids()
            .iter()
            .filter(|id| !self.decided.contains_key(*id))
            .copied()
            .collect();

        for subject in not_decided {
            let vote = if round == 1 {
                // Last observed root wins if the subject forked
                let observed_root = observed
                    .iter()
                    .rev()
                    .find(|prev| prev.slot.validator == subject)
                    .map(|prev| prev.id);
                Vote {
                    yes: observed_root.is_some(),
                    decided: false,
                    observed_root,
                }
            } else {
                self.aggregate_votes(root, subject, &observed)?
            };

            trace!(
                subject = %subject,
                yes = vote.yes,
                decided = vote.decided,
                "Vote"
            );
            if vote.decided {
                self.decided.insert(subject, vote);
            }
            self.votes.insert((root.id, subject), vote);
        }

        if self.decided.len() == self.validators.len() {
            return self.choose_atropos();
        }
        Ok(None)
    }

    /// Majority of the votes of `observed` about `subject`.
    fn aggregate_votes(
        &self,
        root: &RootAndSlot,
        subject: ValidatorId,
        observed: &[RootAndSlot],
    ) -> Result<Vote, ElectionError> {
        let mut yes_votes = self.validators.counter();
        let mut no_votes = self.validators.counter();
        let mut all_votes = self.validators.counter();
        let mut subject_root: Option<EventId> = None;

        for voter in observed {
            let vote = self.votes.get(&(voter.id, subject)).ok_or(
                ElectionError::RootsOutOfOrder {
                    root: root.id,
                    reason: "every root must vote for every not decided subject",
                },
            )?;

            if vote.yes {
                if subject_root.is_some() && subject_root != vote.observed_root {
                    return Err(ElectionError::ByzantineQuorum {
                        frame: self.frame_to_decide,
                        validator: Some(subject),
                        reason: "forkless caused by 2 fork roots",
                    });
                }
                subject_root = vote.observed_root;
                yes_votes.count(voter.slot.validator);
            } else {
                no_votes.count(voter.slot.validator);
            }
            if !all_votes.count(voter.slot.validator) {
                return Err(ElectionError::ByzantineQuorum {
                    frame: self.frame_to_decide,
                    validator: Some(subject),
                    reason: "one validator voted twice",
                });
            }
        }

        if !all_votes.has_quorum() {
            return Err(ElectionError::RootsOutOfOrder {
                root: root.id,
                reason: "root must be forkless caused by at least 2/3W of previous roots",
            });
        }

        let yes = yes_votes.sum() >= no_votes.sum();
        Ok(Vote {
            yes,
            decided: yes_votes.has_quorum() || no_votes.has_quorum(),
            observed_root: if yes { subject_root } else { None },
        })
    }

    /// The first decided-yes validator's root, once every validator before it
    /// in index order is decided.
    fn choose_atropos(&self) -> Result<Option<ElectionResult>, ElectionError> {
        for validator in self.validators.sorted_ids() {
            let Some(vote) = self.decided.get(validator) else {
                return Ok(None);
            };
            if vote.yes {
                let atropos = vote.observed_root.ok_or(ElectionError::ByzantineQuorum {
                    frame: self.frame_to_decide,
                    validator: Some(*validator),
                    reason: "decided yes without an observed root",
                })?;
                debug!(
                    frame = self.frame_to_decide.0,
                    atropos = %atropos,
                    validator = %validator,
                    "Frame decided"
                );
                return Ok(Some(ElectionResult {
                    frame: self.frame_to_decide,
                    atropos,
                }));
            }
        }
        Err(ElectionError::ByzantineQuorum {
            frame: self.frame_to_decide,
            validator: None,
            reason: "all the roots are decided as 'no'",
        })
    }
}
