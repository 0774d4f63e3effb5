//! Frame assignment, election driving and epoch sealing.

use crate::{AbftError, OrdererCallbacks, OrdererView, Store};
use atropos_election::{Election, ElectionContext, ElectionError, ElectionResult, RootAndSlot};
use atropos_types::{
    CritHandler, Epoch, Event, EventError, EventId, EventSource, Frame, LastDecidedState,
    MutableEvent, Validators,
};
use atropos_vecclock::DagIndexer;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Election queries answered from the store and the DAG index.
struct RootsContext<'a> {
    store: &'a Store,
    indexer: &'a dyn DagIndexer,
}

impl ElectionContext for RootsContext<'_> {
    fn forkless_cause(&self, a: &EventId, b: &EventId) -> Result<bool, ElectionError> {
        self.indexer
            .forkless_cause(a, b)
            .map_err(|e| ElectionError::ForklessCause {
                a: *a,
                b: *b,
                reason: e.to_string(),
            })
    }

    fn frame_roots(&self, frame: Frame) -> Result<Vec<RootAndSlot>, ElectionError> {
        self.store
            .frame_roots(frame)
            .map_err(|e| ElectionError::FrameRoots {
                frame,
                reason: e.to_string(),
            })
    }
}

/// Frame assignment for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameInfo {
    self_parent_frame: Frame,
    frame: Frame,
    is_root: bool,
}

/// Consensus driver.
///
/// Owns the store, the DAG index and the election. Events passed to
/// [`Orderer::process`] and [`Orderer::build`] must already be added to the
/// index; [`crate::IndexedLachesis`] takes care of that.
///
/// After a fatal error the crit handler is invoked once and every later call
/// returns [`AbftError::Halted`].
pub struct Orderer {
    store: Store,
    input: Arc<dyn EventSource>,
    indexer: Box<dyn DagIndexer>,
    crit: CritHandler,
    election: Option<Election>,
    callbacks: Option<Box<dyn OrdererCallbacks>>,
    halted: bool,
}

impl Orderer {
    pub fn new(
        store: Store,
        input: Arc<dyn EventSource>,
        indexer: Box<dyn DagIndexer>,
        crit: CritHandler,
    ) -> Self {
        Self {
            store,
            input,
            indexer,
            crit,
            election: None,
            callbacks: None,
            halted: false,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn indexer(&self) -> &dyn DagIndexer {
        self.indexer.as_ref()
    }

    pub(crate) fn indexer_mut(&mut self) -> &mut dyn DagIndexer {
        self.indexer.as_mut()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.election.is_some()
    }

    /// Frame the election is currently deciding.
    pub fn frame_to_decide(&self) -> Option<Frame> {
        self.election.as_ref().map(Election::frame_to_decide)
    }

    /// Open the current epoch and replay the election over stored roots.
    pub fn bootstrap(&mut self, callbacks: Box<dyn OrdererCallbacks>) -> Result<(), AbftError> {
        if self.halted {
            return Err(AbftError::Halted);
        }
        if self.election.is_some() {
            return Err(AbftError::AlreadyBootstrapped);
        }
        self.callbacks = Some(callbacks);
        let result = self.bootstrap_inner();
        result.map_err(|e| self.fail(e))
    }

    fn bootstrap_inner(&mut self) -> Result<(), AbftError> {
        let epoch = self.store.epoch()?;
        self.store.open_epoch_db(epoch)?;
        self.load_epoch_indexer(epoch)?;

        let validators = self.store.validators()?.clone();
        let last_decided = self.store.last_decided_frame()?;
        self.election = Some(Election::new(validators, last_decided.next()));
        info!(
            epoch = epoch.0,
            last_decided_frame = last_decided.0,
            "Consensus bootstrapped"
        );

        self.process_known_roots()?;
        Ok(())
    }

    /// Validate an indexed event's frame and root flag, store it if it's a
    /// root and let it vote.
    #[instrument(skip(self, event), fields(
        event = %event.id(),
        frame = event.frame().0,
        is_root = event.is_root()
    ))]
    pub fn process(&mut self, event: &Event) -> Result<(), AbftError> {
        self.ensure_running()?;
        let result = self
            .check_and_save(event)
            .and_then(|self_parent_frame| self.handle_election(self_parent_frame, event));
        result.map_err(|e| self.fail(e))
    }

    /// Assign frame and root flag to a draft whose current form is indexed.
    pub fn build(&mut self, event: &mut MutableEvent) -> Result<(), AbftError> {
        self.ensure_running()?;
        let draft = event.build();
        let result = self.check_unindexed(&draft).and_then(|()| {
            self.check_cheaters(&draft)?;
            self.calc_frame(&draft, false)
        });
        match result {
            Ok(info) => {
                event.set_frame(info.frame);
                event.set_is_root(info.is_root);
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Drop the current epoch and start `epoch` from its first frame.
    pub fn reset(&mut self, epoch: Epoch, validators: Validators) -> Result<(), AbftError> {
        self.ensure_running()?;
        let result = self.reset_inner(epoch, validators);
        result.map_err(|e| self.fail(e))
    }

    fn reset_inner(&mut self, epoch: Epoch, validators: Validators) -> Result<(), AbftError> {
        if validators.is_empty() {
            return Err(AbftError::EmptyValidators);
        }
        info!(epoch = epoch.0, validators = validators.len(), "Resetting epoch");
        self.store.apply_epoch_start(epoch, validators.clone())?;
        self.reset_epoch_store(epoch)?;
        if let Some(election) = self.election.as_mut() {
            election.reset(validators, Frame::FIRST);
        }
        Ok(())
    }

    pub(crate) fn ensure_running(&self) -> Result<(), AbftError> {
        if self.halted {
            return Err(AbftError::Halted);
        }
        if self.election.is_none() {
            return Err(AbftError::NotBootstrapped);
        }
        Ok(())
    }

    /// Report a fatal error and halt. Rejections pass through untouched.
    pub(crate) fn fail(&mut self, err: AbftError) -> AbftError {
        if err.is_fatal() && !self.halted {
            (self.crit)(&err);
            self.halted = true;
        } else if !err.is_fatal() {
            debug!(error = %err, "Event rejected");
        }
        err
    }

    fn parent(&self, event: &Event, parent: &EventId) -> Result<Arc<Event>, AbftError> {
        self.input
            .get_event(parent)
            .ok_or(AbftError::ParentNotFound {
                event: event.id(),
                parent: *parent,
            })
    }

    /// Checks that don't need the event's vectors. They run before the
    /// event is indexed, so a malformed event never reaches the DAG index.
    pub(crate) fn check_unindexed(&self, event: &Event) -> Result<(), AbftError> {
        event.validate_structure()?;
        self.check_event_origin(event)?;
        self.check_self_parent(event)
    }

    fn check_event_origin(&self, event: &Event) -> Result<(), AbftError> {
        let expected = self.store.epoch()?;
        if event.epoch() != expected {
            return Err(AbftError::WrongEpoch {
                event: event.id(),
                expected,
                got: event.epoch(),
            });
        }
        if !self.store.validators()?.exists(event.creator()) {
            return Err(AbftError::UnknownCreator(event.creator()));
        }
        Ok(())
    }

    fn check_self_parent(&self, event: &Event) -> Result<(), AbftError> {
        let Some(self_parent) = event.self_parent() else {
            return Ok(());
        };
        let creator = self.parent(event, &self_parent)?.creator();
        if creator != event.creator() {
            return Err(EventError::ForeignSelfParent {
                id: event.id(),
                self_parent,
                creator,
            }
            .into());
        }
        Ok(())
    }

    fn check_lamport(&self, event: &Event) -> Result<(), AbftError> {
        let lamports = event
            .parents()
            .iter()
            .map(|p| self.parent(event, p).map(|parent| parent.lamport()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(event.validate_lamport(&lamports)?)
    }

    /// Refuse parents created by validators the self-parent saw forking.
    fn check_cheaters(&self, event: &Event) -> Result<(), AbftError> {
        let Some(self_parent) = event.self_parent() else {
            return Ok(());
        };
        let cheaters = self.indexer.cheaters(&self_parent)?;
        if cheaters.is_empty() {
            return Ok(());
        }
        for parent in event.parents().iter().skip(1) {
            let creator = self.parent(event, parent)?.creator();
            if cheaters.contains(&creator) {
                return Err(AbftError::CheatersObserved {
                    event: event.id(),
                    cheater: creator,
                });
            }
        }
        Ok(())
    }

    fn check_and_save(&mut self, event: &Event) -> Result<Frame, AbftError> {
        self.check_unindexed(event)?;
        self.check_lamport(event)?;
        self.check_cheaters(event)?;

        let info = self.calc_frame(event, true)?;
        if event.is_root() != info.is_root {
            return Err(AbftError::WrongIsRoot {
                event: event.id(),
                claimed: event.is_root(),
            });
        }
        if event.frame() != info.frame {
            return Err(AbftError::WrongFrame {
                event: event.id(),
                claimed: event.frame(),
                calculated: info.frame,
            });
        }
        if event.is_root() {
            self.store.add_root(info.self_parent_frame, event)?;
        }
        Ok(info.self_parent_frame)
    }

    /// Frame of an event.
    ///
    /// When building, the event becomes a root of `spf + 1` iff it forklessly
    /// causes a quorum of the roots of its self-parent frame `spf`. When
    /// checking, a claimed root must sit exactly at `spf + 1` and pass the
    /// same test; a non-root must stay at `spf`.
    fn calc_frame(&self, event: &Event, check_only: bool) -> Result<FrameInfo, AbftError> {
        let Some(self_parent) = event.self_parent() else {
            return Ok(FrameInfo {
                self_parent_frame: Frame::ZERO,
                frame: Frame::FIRST,
                is_root: true,
            });
        };
        let spf = self.parent(event, &self_parent)?.frame();
        let info = |frame, is_root| FrameInfo {
            self_parent_frame: spf,
            frame,
            is_root,
        };

        if !check_only {
            return Ok(if self.forkless_caused_by_quorum_on(event, spf)? {
                info(spf.next(), true)
            } else {
                info(spf, false)
            });
        }

        let claimed = event.frame();
        if !event.is_root() || claimed <= spf {
            return Ok(info(spf, false));
        }
        // Skipping frames would let up to 1/3W of invisible roots stall
        // frame progress.
        if claimed > spf.next() {
            return Ok(info(spf.next(), false));
        }
        if self.forkless_caused_by_quorum_on(event, claimed.prev())? {
            Ok(info(claimed, true))
        } else {
            Ok(info(claimed.prev(), false))
        }
    }

    fn forkless_caused_by_quorum_on(&self, event: &Event, frame: Frame) -> Result<bool, AbftError> {
        let validators = self.store.validators()?;
        let mut counter = validators.counter();
        for root in self.store.frame_roots(frame)? {
            if self.indexer.forkless_cause(&event.id(), &root.id)? {
                counter.count(root.slot.validator);
                if counter.has_quorum() {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn process_root(&mut self, root: &RootAndSlot) -> Result<Option<ElectionResult>, AbftError> {
        let election = self.election.as_mut().ok_or(AbftError::NotBootstrapped)?;
        let ctx = RootsContext {
            store: &self.store,
            indexer: self.indexer.as_ref(),
        };
        Ok(election.process_root(root, &ctx)?)
    }

    fn handle_election(&mut self, self_parent_frame: Frame, root: &Event) -> Result<(), AbftError> {
        if !root.is_root() {
            return Ok(());
        }
        let mut frame = self_parent_frame.next();
        while frame <= root.frame() {
            let slot = RootAndSlot::new(root.id(), frame, root.creator());
            if let Some(decision) = self.process_root(&slot)? {
                if self.on_frame_decided(decision)? {
                    return Ok(());
                }
                // Later frames may already hold enough votes.
                self.process_known_roots()?;
                return Ok(());
            }
            frame = frame.next();
        }
        Ok(())
    }

    /// Replay stored roots from the first undecided frame until no decision
    /// comes out. Returns true if the epoch got sealed.
    fn process_known_roots(&mut self) -> Result<bool, AbftError> {
        'restart: loop {
            let mut frame = self.store.last_decided_frame()?.next();
            loop {
                let roots = self.store.frame_roots(frame)?;
                if roots.is_empty() {
                    return Ok(false);
                }
                for root in &roots {
                    if let Some(decision) = self.process_root(root)? {
                        if self.on_frame_decided(decision)? {
                            return Ok(true);
                        }
                        continue 'restart;
                    }
                }
                frame = frame.next();
            }
        }
    }

    /// Apply a decided frame. Returns true if the epoch got sealed.
    fn on_frame_decided(&mut self, decision: ElectionResult) -> Result<bool, AbftError> {
        info!(
            frame = decision.frame.0,
            atropos = %decision.atropos,
            "Frame decided"
        );
        let callbacks = self
            .callbacks
            .as_mut()
            .ok_or(AbftError::NotBootstrapped)?;
        let view = OrdererView {
            store: &self.store,
            indexer: self.indexer.as_ref(),
            events: self.input.as_ref(),
        };
        let new_validators = callbacks.apply_atropos(&view, decision.frame, decision.atropos)?;

        let previous = self.store.last_decided_state()?;
        let (last_decided_frame, sealed) = match new_validators {
            Some(validators) => {
                if validators.is_empty() {
                    return Err(AbftError::EmptyValidators);
                }
                self.seal_epoch(validators)?;
                (Frame::ZERO, true)
            }
            None => {
                let validators = self.store.validators()?.clone();
                if let Some(election) = self.election.as_mut() {
                    election.reset(validators, decision.frame.next());
                }
                (decision.frame, false)
            }
        };
        self.store.set_last_decided_state(LastDecidedState {
            last_decided_frame,
            last_block_n: previous.last_block_n + 1,
            last_atropos: decision.atropos,
        })?;
        Ok(sealed)
    }

    fn seal_epoch(&mut self, validators: Validators) -> Result<(), AbftError> {
        let mut state = self.store.epoch_state()?.clone();
        state.epoch = state.epoch.next();
        state.validators = validators.clone();
        let epoch = state.epoch;
        info!(epoch = epoch.0, validators = validators.len(), "Epoch sealed");

        self.store.set_epoch_state(state)?;
        self.reset_epoch_store(epoch)?;
        if let Some(election) = self.election.as_mut() {
            election.reset(validators, Frame::FIRST);
        }
        Ok(())
    }

    fn reset_epoch_store(&mut self, epoch: Epoch) -> Result<(), AbftError> {
        self.store.drop_epoch_db()?;
        self.store.open_epoch_db(epoch)?;
        self.load_epoch_indexer(epoch)
    }

    fn load_epoch_indexer(&mut self, epoch: Epoch) -> Result<(), AbftError> {
        if let Some(callbacks) = self.callbacks.as_mut() {
            callbacks.epoch_db_loaded(epoch);
        }
        let validators = self.store.validators()?.clone();
        self.indexer.reset(&validators, self.store.vector_table()?)?;
        Ok(())
    }
}

impl std::fmt::Debug for Orderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orderer")
            .field("store", &self.store)
            .field("frame_to_decide", &self.frame_to_decide().map(|f| f.0))
            .field("halted", &self.halted)
            .finish()
    }
}
