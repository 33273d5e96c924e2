//! Storage engine and addressing model for the Gink versioned data store.
//!
//! Bundles a safe LMDB wrapper ([`Environment`], [`Transaction`], [`Cursor`])
//! with the gink-specific layer built on top of it: global addresses
//! ([`Muid`]), entry-table keys ([`EntryKey`]), the chain tracker, and the
//! engine itself ([`LmdbStore`]) that ties ingestion, point/range queries, and
//! the reset-diff generator together.

pub use bundle_info::BundleInfo;
pub use chain::{Chain, ChainTracker};
pub use cursor::{Cursor, RoCursor, RwCursor};
pub use database::Database;
pub use engine::{FoundEntry, LmdbStore, ResetChange, StoreOptions};
pub use entry_key::{EntryKey, MiddleKey, MiddleKeyKind};
pub use environment::{Environment, EnvironmentBuilder};
pub use error::{Error, GinkError, GinkResult, Result};
pub use flags::*;
pub use muid::{Muid, RelativeMuid};
pub use transaction::{RoTransaction, RwTransaction, Transaction, TransactionExt};
pub use wire::{Behavior, Bundle, Change, EntryChange, EntryValue, RelativeMiddleKey};

mod bundle_info;
mod chain;
mod cursor;
mod database;
mod engine;
mod entry_key;
mod environment;
mod error;
mod flags;
mod muid;
mod transaction;
mod wire;
