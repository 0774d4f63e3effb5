//! Persistent consensus state.
//!
//! The main database holds the epoch state (table `e`) and the last decided
//! frame (table `c`). Everything else lives in a per-epoch database that is
//! dropped when the epoch is sealed:
//!
//! | table | key                                        | value       |
//! |-------|--------------------------------------------|-------------|
//! | `r`   | frame (4B BE) ‖ validator index (4B BE) ‖ id | empty       |
//! | `v`   | owned by the vector engine                 |             |
//! | `C`   | event id                                   | frame (4B BE) |

use crate::{AbftError, StoreConfig};
use atropos_election::RootAndSlot;
use atropos_kvdb::{DbProducer, KvStore, Table};
use atropos_types::{
    Epoch, EpochState, Event, EventId, Frame, Genesis, LastDecidedState, Validators, EVENT_ID_LEN,
};
use moka::sync::Cache;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Name of the database holding the cross-epoch state.
pub const MAIN_DB_NAME: &str = "atropos";

const STATE_KEY: &[u8] = b"s";
const ROOT_KEY_LEN: usize = 4 + 4 + EVENT_ID_LEN;

/// Name of the per-epoch database.
pub fn epoch_db_name(epoch: Epoch) -> String {
    format!("atropos-epoch-{}", epoch.0)
}

struct EpochTables {
    name: String,
    roots: Table,
    vectors: Table,
    confirmed: Table,
}

/// Consensus store over a [`DbProducer`].
///
/// Epoch and last-decided states are cached in memory and written through.
pub struct Store {
    config: StoreConfig,
    producer: Arc<dyn DbProducer>,
    last_decided_table: Table,
    epoch_state_table: Table,
    last_decided: Option<LastDecidedState>,
    epoch_state: Option<EpochState>,
    epoch_db: Option<EpochTables>,
    roots_cache: Cache<Frame, Arc<Vec<RootAndSlot>>>,
}

impl Store {
    /// Open the main database and load whatever state it already holds.
    pub fn open(producer: Arc<dyn DbProducer>, config: StoreConfig) -> Result<Self, AbftError> {
        let main_db = producer.open_db(MAIN_DB_NAME)?;
        let last_decided_table = Table::new(main_db.clone(), b"c");
        let epoch_state_table = Table::new(main_db, b"e");

        let last_decided = read_value(&last_decided_table, STATE_KEY)?;
        let epoch_state = read_value(&epoch_state_table, STATE_KEY)?;

        Ok(Self {
            roots_cache: Cache::new(config.roots_cache_frames),
            config,
            producer,
            last_decided_table,
            epoch_state_table,
            last_decided,
            epoch_state,
            epoch_db: None,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Whether a genesis (or a reset) has been applied.
    pub fn is_initialized(&self) -> bool {
        self.epoch_state.is_some()
    }

    /// Initialize an empty store.
    pub fn apply_genesis(&mut self, genesis: &Genesis) -> Result<(), AbftError> {
        if genesis.validators.is_empty() {
            return Err(AbftError::InvalidGenesis("validator set is empty"));
        }
        if genesis.epoch < Epoch::FIRST {
            return Err(AbftError::InvalidGenesis("epoch must be positive"));
        }
        if self.last_decided_table.has(STATE_KEY)? {
            return Err(AbftError::GenesisAlreadyApplied);
        }
        info!(
            epoch = genesis.epoch.0,
            validators = genesis.validators.len(),
            "Applying genesis"
        );
        self.apply_epoch_start(genesis.epoch, genesis.validators.clone())
    }

    /// Overwrite both states so that `epoch` starts from its first frame.
    pub(crate) fn apply_epoch_start(
        &mut self,
        epoch: Epoch,
        validators: Validators,
    ) -> Result<(), AbftError> {
        self.set_epoch_state(EpochState { epoch, validators })?;
        let previous = self.last_decided.unwrap_or_default();
        self.set_last_decided_state(LastDecidedState {
            last_decided_frame: Frame::ZERO,
            ..previous
        })
    }

    pub fn set_epoch_state(&mut self, state: EpochState) -> Result<(), AbftError> {
        write_value(&self.epoch_state_table, STATE_KEY, &state)?;
        self.epoch_state = Some(state);
        Ok(())
    }

    pub fn epoch_state(&self) -> Result<&EpochState, AbftError> {
        self.epoch_state
            .as_ref()
            .ok_or(AbftError::MissingState("epoch state"))
    }

    pub fn epoch(&self) -> Result<Epoch, AbftError> {
        Ok(self.epoch_state()?.epoch)
    }

    pub fn validators(&self) -> Result<&Validators, AbftError> {
        Ok(&self.epoch_state()?.validators)
    }

    pub fn set_last_decided_state(&mut self, state: LastDecidedState) -> Result<(), AbftError> {
        write_value(&self.last_decided_table, STATE_KEY, &state)?;
        self.last_decided = Some(state);
        Ok(())
    }

    pub fn last_decided_state(&self) -> Result<LastDecidedState, AbftError> {
        self.last_decided
            .ok_or(AbftError::MissingState("last decided state"))
    }

    pub fn last_decided_frame(&self) -> Result<Frame, AbftError> {
        Ok(self.last_decided_state()?.last_decided_frame)
    }

    /// Open the database of `epoch`, replacing any open one.
    pub fn open_epoch_db(&mut self, epoch: Epoch) -> Result<(), AbftError> {
        let name = epoch_db_name(epoch);
        let db = self.producer.open_db(&name)?;
        debug!(name = %name, "Opened epoch database");
        self.epoch_db = Some(EpochTables {
            roots: Table::new(db.clone(), b"r"),
            vectors: Table::new(db.clone(), b"v"),
            confirmed: Table::new(db, b"C"),
            name,
        });
        self.roots_cache.invalidate_all();
        Ok(())
    }

    /// Drop the current epoch's database. No-op if none is open.
    pub fn drop_epoch_db(&mut self) -> Result<(), AbftError> {
        if let Some(tables) = self.epoch_db.take() {
            self.producer.drop_db(&tables.name)?;
            debug!(name = %tables.name, "Dropped epoch database");
        }
        self.roots_cache.invalidate_all();
        Ok(())
    }

    fn epoch_tables(&self) -> Result<&EpochTables, AbftError> {
        self.epoch_db
            .as_ref()
            .ok_or(AbftError::MissingState("epoch database"))
    }

    /// Table handed to the vector engine.
    pub fn vector_table(&self) -> Result<Arc<dyn KvStore>, AbftError> {
        Ok(Arc::new(self.epoch_tables()?.vectors.clone()))
    }

    /// Record `root` in every frame from `self_parent_frame + 1` to its own.
    pub fn add_root(&self, self_parent_frame: Frame, root: &Event) -> Result<(), AbftError> {
        let index = self
            .validators()?
            .index_of(root.creator())
            .ok_or(AbftError::UnknownCreator(root.creator()))?;
        let roots = &self.epoch_tables()?.roots;

        let mut frame = self_parent_frame.next();
        while frame <= root.frame() {
            let mut key = Vec::with_capacity(ROOT_KEY_LEN);
            key.extend_from_slice(&frame.to_bytes());
            key.extend_from_slice(&(index as u32).to_be_bytes());
            key.extend_from_slice(root.id().as_bytes());
            roots.put(&key, &[])?;
            self.roots_cache.invalidate(&frame);
            frame = frame.next();
        }
        Ok(())
    }

    /// Roots of `frame`, in validator index order.
    pub fn frame_roots(&self, frame: Frame) -> Result<Vec<RootAndSlot>, AbftError> {
        if let Some(cached) = self.roots_cache.get(&frame) {
            return Ok(cached.as_ref().clone());
        }
        let validators = self.validators()?;
        let pairs = self.epoch_tables()?.roots.iter_prefix(&frame.to_bytes())?;

        let mut roots = Vec::with_capacity(pairs.len());
        for (key, _) in pairs {
            if key.len() != ROOT_KEY_LEN {
                return Err(AbftError::Corrupted(format!(
                    "root key of length {}",
                    key.len()
                )));
            }
            let index = u32::from_be_bytes([key[4], key[5], key[6], key[7]]) as usize;
            let validator = validators.id_at(index).ok_or_else(|| {
                AbftError::Corrupted(format!("root of unknown validator index {index}"))
            })?;
            let id = EventId::from_slice(&key[8..])
                .ok_or_else(|| AbftError::Corrupted("root id".to_string()))?;
            roots.push(RootAndSlot::new(id, frame, validator));
        }

        let roots = Arc::new(roots);
        self.roots_cache.insert(frame, roots.clone());
        Ok(roots.as_ref().clone())
    }

    /// Frame whose Atropos confirmed the event, or `Frame::ZERO`.
    pub fn event_confirmed_on(&self, id: &EventId) -> Result<Frame, AbftError> {
        match self.epoch_tables()?.confirmed.get(id.as_bytes())? {
            None => Ok(Frame::ZERO),
            Some(bytes) => {
                let array: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
                    AbftError::Corrupted(format!("confirmation of {id} has {} bytes", bytes.len()))
                })?;
                Ok(Frame::from_bytes(array))
            }
        }
    }

    pub fn set_event_confirmed_on(&self, id: &EventId, frame: Frame) -> Result<(), AbftError> {
        self.epoch_tables()?
            .confirmed
            .put(id.as_bytes(), &frame.to_bytes())?;
        Ok(())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("epoch", &self.epoch_state.as_ref().map(|s| s.epoch.0))
            .field(
                "last_decided_frame",
                &self.last_decided.map(|s| s.last_decided_frame.0),
            )
            .field(
                "epoch_db",
                &self.epoch_db.as_ref().map(|tables| tables.name.as_str()),
            )
            .finish()
    }
}

fn read_value<T: DeserializeOwned>(table: &Table, key: &[u8]) -> Result<Option<T>, AbftError> {
    match table.get(key)? {
        None => Ok(None),
        Some(bytes) => bincode::deserialize(&bytes)
            .map(Some)
            .map_err(|e| AbftError::Corrupted(e.to_string())),
    }
}

fn write_value<T: Serialize>(table: &Table, key: &[u8], value: &T) -> Result<(), AbftError> {
    let bytes = bincode::serialize(value).map_err(|e| AbftError::Corrupted(e.to_string()))?;
    table.put(key, &bytes)?;
    Ok(())
}
