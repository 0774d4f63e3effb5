//! aBFT ordering of DAG events.
//!
//! The [`Orderer`] validates the frame every event claims, records roots and
//! feeds them to the Atropos election. Each decision becomes a [`Block`]:
//! the Atropos and every not yet confirmed ancestor, handed to the
//! application through [`ConsensusCallbacks`]. When the application answers
//! a block with a new validator set, the epoch is sealed and the next one
//! starts from frame 1 on a fresh per-epoch database.
//!
//! # Layers
//!
//! | type               | adds                                              |
//! |--------------------|---------------------------------------------------|
//! | [`Orderer`]        | frames, election, epoch switches                  |
//! | [`Lachesis`]       | blocks and confirmation marks                     |
//! | [`IndexedLachesis`]| vector indexing with rollback of rejected events  |
//!
//! # Errors
//!
//! Rejections ([`AbftError::is_fatal`] is false) refuse one event. Fatal
//! errors go to the [`CritHandler`] once, after which everything returns
//! [`AbftError::Halted`].
//!
//! [`Block`]: atropos_types::Block
//! [`CritHandler`]: atropos_types::CritHandler

mod callbacks;
mod config;
mod error;
mod indexed;
mod lachesis;
mod orderer;
mod store;

pub use callbacks::{BlockCallbacks, Consensus, ConsensusCallbacks, OrdererCallbacks, OrdererView};
pub use config::{AbftConfig, StoreConfig};
pub use error::AbftError;
pub use indexed::IndexedLachesis;
pub use lachesis::Lachesis;
pub use orderer::Orderer;
pub use store::{epoch_db_name, Store, MAIN_DB_NAME};
