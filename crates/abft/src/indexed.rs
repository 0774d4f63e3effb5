//! [`Lachesis`] that keeps its own DAG index.

use crate::{AbftConfig, AbftError, Consensus, ConsensusCallbacks, Lachesis, Store};
use atropos_kvdb::DbProducer;
use atropos_types::{CritHandler, Epoch, Event, EventSource, MutableEvent, Validators};
use atropos_vecclock::{DagIndexer, SeqScheme, VectorEngine};
use std::sync::Arc;

/// Consensus entry point for a node.
///
/// Every processed event is added to the index first; its vectors are
/// flushed only if consensus accepts it and dropped otherwise, so a rejected
/// event leaves no trace.
#[derive(Debug)]
pub struct IndexedLachesis {
    lachesis: Lachesis,
}

impl IndexedLachesis {
    pub fn new(
        store: Store,
        input: Arc<dyn EventSource>,
        indexer: Box<dyn DagIndexer>,
        crit: CritHandler,
    ) -> Self {
        Self {
            lachesis: Lachesis::new(store, input, indexer, crit),
        }
    }

    /// Open the store on `producer` with a sequence-number vector engine.
    pub fn open(
        producer: Arc<dyn DbProducer>,
        input: Arc<dyn EventSource>,
        crit: CritHandler,
        config: &AbftConfig,
    ) -> Result<Self, AbftError> {
        let store = Store::open(producer, config.store.clone())?;
        let engine = VectorEngine::<SeqScheme>::new(input.clone(), config.vector_cache.clone());
        Ok(Self::new(store, input, Box::new(engine), crit))
    }

    pub fn bootstrap(&mut self, callbacks: Box<dyn ConsensusCallbacks>) -> Result<(), AbftError> {
        self.lachesis.bootstrap(callbacks)
    }

    pub fn store(&self) -> &Store {
        self.lachesis.store()
    }

    pub fn indexer(&self) -> &dyn DagIndexer {
        self.lachesis.orderer().indexer()
    }

    pub fn is_halted(&self) -> bool {
        self.lachesis.orderer().is_halted()
    }

    /// Drop unflushed vectors, reporting a failure as fatal.
    fn discard_draft(&mut self) {
        let orderer = self.lachesis.orderer_mut();
        if let Err(err) = orderer.indexer_mut().drop_not_flushed() {
            orderer.fail(err.into());
        }
    }
}

impl Consensus for IndexedLachesis {
    fn process(&mut self, event: &Event) -> Result<(), AbftError> {
        self.lachesis.orderer().ensure_running()?;

        let orderer = self.lachesis.orderer_mut();
        if let Err(err) = orderer.check_unindexed(event) {
            return Err(orderer.fail(err));
        }
        if let Err(err) = orderer.indexer_mut().add(event) {
            let err = orderer.fail(err.into());
            self.discard_draft();
            return Err(err);
        }

        match self.lachesis.process(event) {
            Ok(()) => {
                let orderer = self.lachesis.orderer_mut();
                orderer
                    .indexer_mut()
                    .flush()
                    .map_err(|e| orderer.fail(e.into()))
            }
            Err(err) => {
                self.discard_draft();
                Err(err)
            }
        }
    }

    fn build(&mut self, event: &mut MutableEvent) -> Result<(), AbftError> {
        self.lachesis.orderer().ensure_running()?;

        let draft = event.build();
        let orderer = self.lachesis.orderer_mut();
        if let Err(err) = orderer.check_unindexed(&draft) {
            return Err(orderer.fail(err));
        }
        let result = match orderer.indexer_mut().add(&draft) {
            Ok(()) => self.lachesis.build(event),
            Err(err) => Err(orderer.fail(err.into())),
        };
        self.discard_draft();
        result
    }

    fn reset(&mut self, epoch: Epoch, validators: Validators) -> Result<(), AbftError> {
        self.lachesis.reset(epoch, validators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{epoch_db_name, BlockCallbacks, StoreConfig};
    use atropos_kvdb::{KvStore, MemDbProducer};
    use atropos_types::test_utils::{for_each_scheme_event, scheme_validators};
    use atropos_types::{
        panic_crit, Block, EventError, EventId, EventStore, Frame, Genesis, LastDecidedState,
        ValidatorId,
    };
    use atropos_vecclock::VecClockError;
    use parking_lot::Mutex;
    use std::cell::RefCell;
    use std::collections::{BTreeMap, HashSet};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tracing_test::traced_test;

    type Blocks = Arc<Mutex<Vec<(Block, Vec<EventId>)>>>;

    /// Records blocks; optionally answers the n-th block with new validators.
    #[derive(Default)]
    struct Recorder {
        blocks: Blocks,
        seal_at: Option<(usize, Validators)>,
    }

    struct RecordingBlock<'a> {
        recorder: &'a mut Recorder,
        block: Block,
        events: Vec<EventId>,
    }

    impl ConsensusCallbacks for Recorder {
        fn begin_block<'a>(&'a mut self, block: &Block) -> Box<dyn BlockCallbacks + 'a> {
            Box::new(RecordingBlock {
                recorder: self,
                block: block.clone(),
                events: Vec::new(),
            })
        }
    }

    impl BlockCallbacks for RecordingBlock<'_> {
        fn apply_event(&mut self, event: &Event) {
            self.events.push(event.id());
        }

        fn end_block(self: Box<Self>) -> Option<Validators> {
            let RecordingBlock {
                recorder,
                block,
                events,
            } = *self;
            let mut blocks = recorder.blocks.lock();
            blocks.push((block, events));
            match &recorder.seal_at {
                Some((at, validators)) if *at == blocks.len() => Some(validators.clone()),
                _ => None,
            }
        }
    }

    struct TestNode {
        lachesis: RefCell<IndexedLachesis>,
        events: EventStore,
        producer: MemDbProducer,
        blocks: Blocks,
    }

    impl TestNode {
        fn with_genesis(validators: Validators, seal_at: Option<(usize, Validators)>) -> Self {
            let producer = MemDbProducer::new();
            let mut store =
                Store::open(Arc::new(producer.clone()), StoreConfig::default()).unwrap();
            store
                .apply_genesis(&Genesis {
                    epoch: Epoch::FIRST,
                    validators,
                })
                .unwrap();
            Self::open(producer, EventStore::new(), seal_at, panic_crit())
        }

        fn open(
            producer: MemDbProducer,
            events: EventStore,
            seal_at: Option<(usize, Validators)>,
            crit: CritHandler,
        ) -> Self {
            let mut lachesis = IndexedLachesis::open(
                Arc::new(producer.clone()),
                Arc::new(events.clone()),
                crit,
                &AbftConfig::default(),
            )
            .unwrap();
            let recorder = Recorder {
                blocks: Blocks::default(),
                seal_at,
            };
            let blocks = recorder.blocks.clone();
            lachesis.bootstrap(Box::new(recorder)).unwrap();
            Self {
                lachesis: RefCell::new(lachesis),
                events,
                producer,
                blocks,
            }
        }

        fn process(&self, event: &Event) -> Result<(), AbftError> {
            self.events.insert(event.clone());
            self.lachesis.borrow_mut().process(event)
        }

        /// Build and process every event of `scheme`, expecting success.
        fn run_scheme(&self, scheme: &str) -> BTreeMap<String, Event> {
            for_each_scheme_event(
                scheme,
                Epoch::FIRST,
                |draft, _| self.lachesis.borrow_mut().build(draft).unwrap(),
                |event, _| self.process(event).unwrap(),
            )
        }

        fn blocks(&self) -> Vec<(Block, Vec<EventId>)> {
            self.blocks.lock().clone()
        }
    }

    /// Every validator creates one event per round, citing all events of
    /// the previous round.
    fn mesh_scheme(creators: &str, rounds: u32) -> String {
        let mut scheme = String::new();
        for round in 1..=rounds {
            for creator in creators.chars() {
                if round == 1 {
                    scheme.push_str(&format!("{creator}1\n"));
                    continue;
                }
                let parents: Vec<String> = creators
                    .chars()
                    .map(|p| format!("{p}{}", round - 1))
                    .collect();
                scheme.push_str(&format!("{creator}{round} <- {}\n", parents.join(" ")));
            }
        }
        scheme
    }

    fn ids(named: &BTreeMap<String, Event>, names: &[&str]) -> HashSet<EventId> {
        names.iter().map(|name| named[*name].id()).collect()
    }

    #[traced_test]
    #[test]
    fn test_mesh_decides_frames() {
        let scheme = mesh_scheme("abcd", 7);
        let node = TestNode::with_genesis(scheme_validators(&scheme), None);
        let named = node.run_scheme(&scheme);

        for (name, frame, is_root) in [
            ("a1", 1, true),
            ("c2", 1, false),
            ("b3", 2, true),
            ("d4", 2, false),
            ("a5", 3, true),
            ("c7", 4, true),
        ] {
            assert_eq!(named[name].frame(), Frame(frame), "{name}");
            assert_eq!(named[name].is_root(), is_root, "{name}");
        }

        let blocks = node.blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].0.atropos, named["a1"].id());
        assert_eq!(blocks[0].1, vec![named["a1"].id()]);
        assert!(blocks[0].0.cheaters.is_empty());

        assert_eq!(blocks[1].0.atropos, named["a3"].id());
        assert_eq!(blocks[1].1[0], named["a3"].id());
        assert_eq!(
            blocks[1].1.iter().copied().collect::<HashSet<_>>(),
            ids(&named, &["a3", "a2", "b2", "c2", "d2", "b1", "c1", "d1"])
        );

        let lachesis = node.lachesis.borrow();
        assert_eq!(
            lachesis.store().last_decided_state().unwrap(),
            LastDecidedState {
                last_decided_frame: Frame(2),
                last_block_n: 2,
                last_atropos: named["a3"].id(),
            }
        );
        // Without forks every validator has at most one root per frame
        for frame in 1..=4 {
            let roots = lachesis.store().frame_roots(Frame(frame)).unwrap();
            assert!(!roots.is_empty(), "frame {frame}");
            let validators: HashSet<ValidatorId> =
                roots.iter().map(|root| root.slot.validator).collect();
            assert_eq!(validators.len(), roots.len(), "frame {frame}");
        }
        assert_eq!(
            lachesis.store().event_confirmed_on(&named["d1"].id()).unwrap(),
            Frame(2)
        );
        assert_eq!(
            lachesis.store().event_confirmed_on(&named["a4"].id()).unwrap(),
            Frame::ZERO
        );
        assert!(logs_contain("Frame decided"));
    }

    #[test]
    fn test_restart_continues_election() {
        let scheme = mesh_scheme("abcd", 7);
        let node = TestNode::with_genesis(scheme_validators(&scheme), None);
        let snapshot = RefCell::new(None);
        let named = for_each_scheme_event(
            &scheme,
            Epoch::FIRST,
            |draft, _| node.lachesis.borrow_mut().build(draft).unwrap(),
            |event, name| {
                node.process(event).unwrap();
                if name == "d6" {
                    *snapshot.borrow_mut() =
                        Some((node.producer.snapshot(), node.events.snapshot()));
                }
            },
        );
        let (producer, events) = snapshot.into_inner().unwrap();

        let restarted = TestNode::open(producer, events, None, panic_crit());
        assert!(restarted.blocks().is_empty());
        assert_eq!(
            restarted
                .lachesis
                .borrow()
                .store()
                .last_decided_frame()
                .unwrap(),
            Frame(1)
        );
        for name in ["a7", "b7", "c7", "d7"] {
            restarted.process(&named[name]).unwrap();
        }

        let original = node.blocks();
        assert_eq!(restarted.blocks(), original[1..].to_vec());
    }

    #[test]
    fn test_rejected_events_leave_no_trace() {
        let scheme = mesh_scheme("abcd", 2);
        let node = TestNode::with_genesis(scheme_validators(&scheme), None);
        let named = node.run_scheme(&scheme);

        let lonely = |frame: u32, is_root: bool| {
            MutableEvent {
                epoch: Epoch::FIRST,
                seq: 3,
                frame: Frame(frame),
                is_root,
                creator: ValidatorId(1),
                lamport: 3,
                parents: vec![named["a2"].id()],
                ..Default::default()
            }
            .build()
        };

        let wrong_frame = lonely(2, false);
        assert_eq!(
            node.process(&wrong_frame),
            Err(AbftError::WrongFrame {
                event: wrong_frame.id(),
                claimed: Frame(2),
                calculated: Frame(1),
            })
        );

        let wrong_root = lonely(2, true);
        assert_eq!(
            node.process(&wrong_root),
            Err(AbftError::WrongIsRoot {
                event: wrong_root.id(),
                claimed: true,
            })
        );

        let mut other_epoch = named["b1"].to_mutable();
        other_epoch.epoch = Epoch(2);
        let other_epoch = other_epoch.build();
        assert!(matches!(
            node.process(&other_epoch),
            Err(AbftError::WrongEpoch { .. })
        ));

        let mut stranger = named["b1"].to_mutable();
        stranger.creator = ValidatorId(9);
        assert_eq!(
            node.process(&stranger.build()),
            Err(AbftError::UnknownCreator(ValidatorId(9)))
        );

        let mut orphan = named["b2"].to_mutable();
        orphan.seq = 3;
        orphan.parents = vec![named["b2"].id(), EventId([7; 32])];
        let orphan = orphan.build();
        assert_eq!(
            node.process(&orphan),
            Err(AbftError::ParentNotFound {
                event: orphan.id(),
                parent: EventId([7; 32]),
            })
        );

        // The rejected events left no vectors behind: the real round goes on.
        assert!(!node.lachesis.borrow().is_halted());
        let mut a3 = MutableEvent {
            epoch: Epoch::FIRST,
            seq: 3,
            creator: ValidatorId(1),
            lamport: 3,
            parents: ["a2", "b2", "c2", "d2"]
                .iter()
                .map(|name| named[*name].id())
                .collect(),
            ..Default::default()
        };
        node.lachesis.borrow_mut().build(&mut a3).unwrap();
        assert_eq!((a3.frame, a3.is_root), (Frame(2), true));
        node.process(&a3.build()).unwrap();
    }

    #[test]
    fn test_foreign_self_parent_refused() {
        let scheme = mesh_scheme("abcd", 1);
        let node = TestNode::with_genesis(scheme_validators(&scheme), None);
        let named = node.run_scheme(&scheme);

        // seq 2 claims b1 as a's previous event
        let forged = MutableEvent {
            epoch: Epoch::FIRST,
            seq: 2,
            frame: Frame(1),
            creator: ValidatorId(1),
            lamport: 2,
            parents: vec![named["b1"].id(), named["a1"].id()],
            ..Default::default()
        }
        .build();
        assert_eq!(
            node.process(&forged),
            Err(AbftError::InvalidEvent(EventError::ForeignSelfParent {
                id: forged.id(),
                self_parent: named["b1"].id(),
                creator: ValidatorId(2),
            }))
        );

        let mut draft = forged.to_mutable();
        let draft_id = draft.id();
        assert_eq!(
            node.lachesis.borrow_mut().build(&mut draft),
            Err(AbftError::InvalidEvent(EventError::ForeignSelfParent {
                id: draft_id,
                self_parent: named["b1"].id(),
                creator: ValidatorId(2),
            }))
        );
        assert!(!node.lachesis.borrow().is_halted());
        assert_eq!(node.lachesis.borrow().indexer().branch_count(), 4);

        let mut a2 = MutableEvent {
            epoch: Epoch::FIRST,
            seq: 2,
            creator: ValidatorId(1),
            lamport: 2,
            parents: ["a1", "b1", "c1", "d1"]
                .iter()
                .map(|name| named[*name].id())
                .collect(),
            ..Default::default()
        };
        node.lachesis.borrow_mut().build(&mut a2).unwrap();
        node.process(&a2.build()).unwrap();
    }

    #[test]
    fn test_wrong_lamport_refused() {
        let scheme = mesh_scheme("abcd", 2);
        let node = TestNode::with_genesis(scheme_validators(&scheme), None);
        let named = node.run_scheme(&scheme);

        let a3 = |lamport| {
            let mut draft = MutableEvent {
                epoch: Epoch::FIRST,
                seq: 3,
                creator: ValidatorId(1),
                lamport,
                parents: ["a2", "b2", "c2", "d2"]
                    .iter()
                    .map(|name| named[*name].id())
                    .collect(),
                ..Default::default()
            };
            node.lachesis.borrow_mut().build(&mut draft).unwrap();
            draft.build()
        };

        let skewed = a3(5);
        assert_eq!(
            node.process(&skewed),
            Err(AbftError::InvalidEvent(EventError::WrongLamport {
                id: skewed.id(),
                got: 5,
                expected: 3,
            }))
        );
        assert!(!node.lachesis.borrow().is_halted());
        node.process(&a3(3)).unwrap();
    }

    #[test]
    fn test_cheater_parent_refused() {
        let scheme = "
            a1 b1 c1 d1
            a2 <- a1
            ax <- a1
            c2 <- c1 ax
            b2 <- b1 a2 c2
            a3 <- a2
        ";
        let node = TestNode::with_genesis(scheme_validators(scheme), None);
        let named = node.run_scheme(scheme);

        let mut b3 = MutableEvent {
            epoch: Epoch::FIRST,
            seq: 3,
            creator: ValidatorId(2),
            lamport: named["b2"].lamport().max(named["a3"].lamport()) + 1,
            parents: vec![named["b2"].id(), named["a3"].id()],
            ..Default::default()
        };
        let draft_id = b3.id();
        assert_eq!(
            node.lachesis.borrow_mut().build(&mut b3),
            Err(AbftError::CheatersObserved {
                event: draft_id,
                cheater: ValidatorId(1),
            })
        );

        b3.set_frame(Frame(1));
        let b3 = b3.build();
        assert_eq!(
            node.process(&b3),
            Err(AbftError::CheatersObserved {
                event: b3.id(),
                cheater: ValidatorId(1),
            })
        );
        assert!(!node.lachesis.borrow().is_halted());
    }

    #[test]
    fn test_new_validators_seal_epoch() {
        let scheme = format!("{}a5 <- a4 b4 c4 d4\n", mesh_scheme("abcd", 4));
        let next_validators = Validators::equal((1..=3).map(ValidatorId));
        let node = TestNode::with_genesis(
            scheme_validators(&scheme),
            Some((1, next_validators.clone())),
        );
        let named = node.run_scheme(&scheme);

        assert_eq!(node.blocks().len(), 1);
        {
            let lachesis = node.lachesis.borrow();
            let store = lachesis.store();
            assert_eq!(store.epoch().unwrap(), Epoch(2));
            assert_eq!(store.validators().unwrap(), &next_validators);
            assert_eq!(
                store.last_decided_state().unwrap(),
                LastDecidedState {
                    last_decided_frame: Frame::ZERO,
                    last_block_n: 1,
                    last_atropos: node.blocks()[0].0.atropos,
                }
            );
            assert_eq!(lachesis.indexer().branch_count(), 3);
        }
        let names = node.producer.names();
        assert!(names.contains(&epoch_db_name(Epoch(2))));
        assert!(!names.contains(&epoch_db_name(Epoch::FIRST)));

        assert!(matches!(
            node.process(&named["b4"]),
            Err(AbftError::WrongEpoch { .. })
        ));

        let mut first = MutableEvent {
            epoch: Epoch(2),
            seq: 1,
            creator: ValidatorId(2),
            lamport: 1,
            ..Default::default()
        };
        node.lachesis.borrow_mut().build(&mut first).unwrap();
        assert_eq!((first.frame, first.is_root), (Frame(1), true));
        node.process(&first.build()).unwrap();
    }

    #[test]
    fn test_fatal_error_halts() {
        let scheme = format!("{}a5 <- a4 b4 c4 d4\n", mesh_scheme("abcd", 4));
        let producer = MemDbProducer::new();
        let mut store = Store::open(Arc::new(producer.clone()), StoreConfig::default()).unwrap();
        store
            .apply_genesis(&Genesis {
                epoch: Epoch::FIRST,
                validators: scheme_validators(&scheme),
            })
            .unwrap();
        drop(store);

        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = reported.clone();
        let crit: CritHandler = Arc::new(move |err: &dyn std::error::Error| {
            sink.lock().push(err.to_string());
        });
        let node = TestNode::open(
            producer,
            EventStore::new(),
            Some((1, Validators::equal([]))),
            crit,
        );

        let named = for_each_scheme_event(
            &scheme,
            Epoch::FIRST,
            |draft, _| node.lachesis.borrow_mut().build(draft).unwrap(),
            |event, name| {
                let result = node.process(event);
                if name == "a5" {
                    assert_eq!(result, Err(AbftError::EmptyValidators));
                } else {
                    result.unwrap();
                }
            },
        );

        assert_eq!(reported.lock().len(), 1);
        assert!(node.lachesis.borrow().is_halted());
        assert_eq!(node.process(&named["b4"]), Err(AbftError::Halted));
        let mut draft = named["b4"].to_mutable();
        assert_eq!(
            node.lachesis.borrow_mut().build(&mut draft),
            Err(AbftError::Halted)
        );
    }

    /// Vector engine whose forkless-cause lookups fail once `broken` is set.
    struct BreakableIndexer {
        inner: VectorEngine<SeqScheme>,
        broken: Arc<AtomicBool>,
    }

    impl DagIndexer for BreakableIndexer {
        fn reset(
            &mut self,
            validators: &Validators,
            db: Arc<dyn KvStore>,
        ) -> Result<(), VecClockError> {
            self.inner.reset(validators, db)
        }

        fn add(&mut self, event: &Event) -> Result<(), VecClockError> {
            self.inner.add(event)
        }

        fn flush(&mut self) -> Result<(), VecClockError> {
            self.inner.flush()
        }

        fn drop_not_flushed(&mut self) -> Result<(), VecClockError> {
            self.inner.drop_not_flushed()
        }

        fn forkless_cause(&self, a: &EventId, b: &EventId) -> Result<bool, VecClockError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(VecClockError::NotIndexed(*a));
            }
            self.inner.forkless_cause(a, b)
        }

        fn cheaters(&self, id: &EventId) -> Result<Vec<ValidatorId>, VecClockError> {
            self.inner.cheaters(id)
        }

        fn branch_count(&self) -> usize {
            self.inner.branch_count()
        }
    }

    #[test]
    fn test_forkless_cause_failure_halts() {
        let scheme = mesh_scheme("abcd", 1);
        let producer = MemDbProducer::new();
        let mut store = Store::open(Arc::new(producer), StoreConfig::default()).unwrap();
        store
            .apply_genesis(&Genesis {
                epoch: Epoch::FIRST,
                validators: scheme_validators(&scheme),
            })
            .unwrap();

        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = reported.clone();
        let crit: CritHandler = Arc::new(move |err: &dyn std::error::Error| {
            sink.lock().push(err.to_string());
        });
        let events = EventStore::new();
        let broken = Arc::new(AtomicBool::new(false));
        let lachesis = RefCell::new(IndexedLachesis::new(
            store,
            Arc::new(events.clone()),
            Box::new(BreakableIndexer {
                inner: VectorEngine::new(Arc::new(events.clone()), Default::default()),
                broken: broken.clone(),
            }),
            crit,
        ));
        lachesis
            .borrow_mut()
            .bootstrap(Box::new(Recorder::default()))
            .unwrap();
        let named = for_each_scheme_event(
            &scheme,
            Epoch::FIRST,
            |draft, _| lachesis.borrow_mut().build(draft).unwrap(),
            |event, _| {
                events.insert(event.clone());
                lachesis.borrow_mut().process(event).unwrap();
            },
        );

        broken.store(true, Ordering::SeqCst);
        let mut a2 = MutableEvent {
            epoch: Epoch::FIRST,
            seq: 2,
            creator: ValidatorId(1),
            lamport: 2,
            parents: ["a1", "b1", "c1", "d1"]
                .iter()
                .map(|name| named[*name].id())
                .collect(),
            ..Default::default()
        };
        let draft_id = a2.id();
        let mut lachesis = lachesis.into_inner();
        assert_eq!(
            lachesis.build(&mut a2),
            Err(AbftError::VecClock(VecClockError::NotIndexed(draft_id)))
        );
        assert_eq!(reported.lock().len(), 1);
        assert!(lachesis.is_halted());
        assert_eq!(lachesis.process(&named["a1"]), Err(AbftError::Halted));
    }

    #[test]
    fn test_requires_bootstrap() {
        let producer = MemDbProducer::new();
        let mut store = Store::open(Arc::new(producer.clone()), StoreConfig::default()).unwrap();
        store
            .apply_genesis(&Genesis {
                epoch: Epoch::FIRST,
                validators: Validators::equal([ValidatorId(1)]),
            })
            .unwrap();
        let events = EventStore::new();
        let mut lachesis = IndexedLachesis::new(
            store,
            Arc::new(events.clone()),
            Box::new(VectorEngine::<SeqScheme>::new(
                Arc::new(events),
                Default::default(),
            )),
            panic_crit(),
        );

        let event = MutableEvent {
            epoch: Epoch::FIRST,
            seq: 1,
            frame: Frame(1),
            is_root: true,
            creator: ValidatorId(1),
            lamport: 1,
            ..Default::default()
        }
        .build();
        assert_eq!(lachesis.process(&event), Err(AbftError::NotBootstrapped));

        lachesis.bootstrap(Box::new(Recorder::default())).unwrap();
        assert_eq!(
            lachesis.bootstrap(Box::new(Recorder::default())),
            Err(AbftError::AlreadyBootstrapped)
        );
    }
}
