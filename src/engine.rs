//! The storage engine: ingestion, point/range queries over live entries, and the
//! reset-diff generator. Owns the five ordered tables and the chain-acceptance
//! and reset invariants. Grounded on `danburkert-lmdb-rs`'s own
//! `Environment`/`Transaction`/`Cursor` wrapper, used here as the backend
//! rather than as the deliverable.

use std::collections::HashSet;
use std::io::Cursor as IoCursor;
use std::path::PathBuf;

use log::{debug, info, trace, warn};

use crate::bundle_info::BundleInfo;
use crate::chain::{Chain, ChainTracker};
use crate::cursor::Cursor;
use crate::database::Database;
use crate::entry_key::{EntryKey, MiddleKey, MiddleKeyKind};
use crate::environment::Environment;
use crate::error::{GinkError, GinkResult};
use crate::flags::{DatabaseFlags, EnvironmentFlags, WriteFlags};
use crate::muid::{Muid, RelativeMuid};
use crate::transaction::{Transaction as _, TransactionExt};
use crate::wire::{self, Behavior, Bundle, Change, EntryValue, RelativeMiddleKey};

const BUNDLES: &str = "bundles";
const CHAIN_INFOS: &str = "chain-infos";
const CLAIMED_CHAINS: &str = "claimed-chains";
const ENTRIES: &str = "entries";
const CONTAINER_DEFS: &str = "container-defs";

/// Configuration for opening an [`LmdbStore`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    path: PathBuf,
    reset: bool,
    map_size: Option<usize>,
    max_dbs: Option<u32>,
    max_readers: Option<u32>,
}

impl StoreOptions {
    pub fn new(path: impl Into<PathBuf>) -> StoreOptions {
        StoreOptions { path: path.into(), reset: false, map_size: None, max_dbs: None, max_readers: None }
    }

    /// Truncate all five tables on open without deleting the backing file.
    pub fn reset(mut self, reset: bool) -> StoreOptions {
        self.reset = reset;
        self
    }

    pub fn map_size(mut self, map_size: usize) -> StoreOptions {
        self.map_size = Some(map_size);
        self
    }

    pub fn max_dbs(mut self, max_dbs: u32) -> StoreOptions {
        self.max_dbs = Some(max_dbs);
        self
    }

    pub fn max_readers(mut self, max_readers: u32) -> StoreOptions {
        self.max_readers = Some(max_readers);
        self
    }
}

/// Entry information returned by point and range queries: the address at which it was
/// addressed (never relative — the address may itself be a muid relative to some bundle that
/// isn't the caller's), plus its decoded value.
pub type FoundEntry = (Muid, EntryValue);

/// A change that would move a live view back towards a historical instant, produced by
/// [`LmdbStore::get_reset_changes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetChange {
    /// Restore `(container, middle_key)` to the given entry payload.
    Entry { container: Muid, middle_key: MiddleKey, value: EntryValue },
    /// `(container, middle_key)` did not exist at the target instant; emitting this as a new
    /// bundle would delete it.
    Tombstone { container: Muid, middle_key: MiddleKey },
}

/// The gink storage engine, backed by a single-file LMDB environment.
pub struct LmdbStore {
    env: Environment,
    bundles: Database,
    chain_infos: Database,
    claimed_chains: Database,
    entries: Database,
    container_defs: Database,
}

impl LmdbStore {
    /// Opens (creating if necessary) the store at `options.path`. The environment is opened
    /// `MDB_NOSUBDIR` so that the configured path names a single file, not a directory.
    pub fn open(options: StoreOptions) -> GinkResult<LmdbStore> {
        let mut builder = Environment::new();
        builder.set_flags(EnvironmentFlags::MDB_NOSUBDIR);
        builder.set_max_dbs(options.max_dbs.unwrap_or(5));
        if let Some(max_readers) = options.max_readers {
            builder.set_max_readers(max_readers);
        }
        if let Some(map_size) = options.map_size {
            builder.set_map_size(map_size);
        }
        let env = builder.open(&options.path)?;

        let bundles = env.create_db(Some(BUNDLES), DatabaseFlags::empty())?;
        let chain_infos = env.create_db(Some(CHAIN_INFOS), DatabaseFlags::empty())?;
        let claimed_chains = env.create_db(Some(CLAIMED_CHAINS), DatabaseFlags::empty())?;
        let entries = env.create_db(Some(ENTRIES), DatabaseFlags::empty())?;
        let container_defs = env.create_db(Some(CONTAINER_DEFS), DatabaseFlags::empty())?;

        let store = LmdbStore { env, bundles, chain_infos, claimed_chains, entries, container_defs };

        if options.reset {
            store.env.clear_db(store.bundles)?;
            store.env.clear_db(store.chain_infos)?;
            store.env.clear_db(store.claimed_chains)?;
            store.env.clear_db(store.entries)?;
            store.env.clear_db(store.container_defs)?;
            info!(target: "gink_store::engine", "opened store at {} (reset)", options.path.display());
        } else {
            info!(target: "gink_store::engine", "opened store at {}", options.path.display());
        }

        Ok(store)
    }

    /// Flushes outstanding writes and releases the environment handle.
    pub fn close(self) {
        info!(target: "gink_store::engine", "closing store");
    }

    // -- Ingestion -----------------------------------------------------

    /// Decodes `bytes`, chain-validates it against `chain-infos`, and if accepted, writes the
    /// bundle, its chain-info head, and every change it carries atomically.
    pub fn add_bundle(&self, bytes: &[u8]) -> GinkResult<(BundleInfo, bool)> {
        let bundle = Bundle::from_bytes(bytes)
            .map_err(|e| GinkError::CorruptBundle(format!("could not decode bundle: {e}")))?;
        let info = bundle.info(bytes);
        let chain = info.chain();

        let txn = self.env.begin_rw_txn()?;

        let prev = match txn.get(self.chain_infos, &chain_key(&chain)) {
            Ok(bytes) => Some(BundleInfo::from_bytes(bytes)),
            Err(crate::error::Error::NotFound) => None,
            Err(e) => {
                txn.abort();
                return Err(e.into());
            }
        };

        let accepted = match &prev {
            None => info.prior_time == 0 && info.timestamp == info.chain_start,
            Some(prev) => info.prior_time == prev.timestamp && info.timestamp > prev.timestamp,
        };

        if !accepted {
            txn.abort();
            debug!(
                target: "gink_store::ingest",
                "rejected bundle t={} medallion={} chain_start={} prior_time={}",
                info.timestamp, info.medallion, info.chain_start, info.prior_time
            );
            return Ok((info, false));
        }

        let info_bytes = info.to_bytes();
        txn.put(self.bundles, &info_bytes, bytes, WriteFlags::empty())?;
        txn.put(self.chain_infos, &chain_key(&chain), &info_bytes, WriteFlags::empty())?;

        for (offset, change) in &bundle.changes {
            match change {
                Change::ContainerDef { behavior, definition } => {
                    let muid = Muid::create(RelativeMuid::at_offset(*offset), &info, None)?;
                    let value = wire::encode_container_def(*behavior, definition);
                    txn.put(self.container_defs, &muid.to_bytes(), &value, WriteFlags::empty())?;
                }
                Change::Entry(entry) => {
                    let container = Muid::create(entry.container, &info, None)?;
                    let entry_muid = Muid::create(RelativeMuid::at_offset(*offset), &info, Some(*offset))?;
                    let middle_key = resolve_middle_key(&entry.middle_key, &info)?;
                    let key = EntryKey::new(container, middle_key, entry_muid, entry.expiry);
                    let value = resolve_entry_value(&entry.value, &info)?;
                    let mut buf = Vec::new();
                    wire::encode_entry_value(&mut buf, &value);
                    txn.put(self.entries, &key.to_bytes(), &buf, WriteFlags::empty())?;
                }
            }
        }

        txn.commit()?;
        info!(
            target: "gink_store::ingest",
            "accepted bundle t={} medallion={} chain_start={}",
            info.timestamp, info.medallion, info.chain_start
        );
        Ok((info, true))
    }

    // -- Point / range queries over entries ------------------------------

    /// The newest entry for `(container, key)` with entry-muid timestamp ≤ `as_of`.
    pub fn get_entry(
        &self,
        container: Muid,
        key: Option<&[u8]>,
        as_of: i64,
    ) -> GinkResult<Option<FoundEntry>> {
        let middle_key = key.map(|k| MiddleKey::Directory(k.to_vec())).unwrap_or(MiddleKey::None);
        let kind = middle_key_kind(&middle_key);
        let txn = self.env.begin_ro_txn()?;
        let mut cursor = txn.open_ro_cursor(self.entries)?;
        Ok(seek_live_entry(&mut cursor, container, &middle_key, kind, as_of)?)
    }

    /// Every distinct middle-key under `container`, with its newest entry at or before `as_of`.
    pub fn get_keyed_entries(&self, container: Muid, as_of: i64) -> GinkResult<Vec<FoundEntry>> {
        let kind = self.behavior_kind_of(container)?;
        let txn = self.env.begin_ro_txn()?;
        let mut cursor = txn.open_ro_cursor(self.entries)?;
        let mut out = Vec::new();

        let prefix = container.to_bytes();
        let mut pos = cursor.seek_to_first_key_ge(&prefix)?;
        loop {
            let (key, _) = match pos {
                Some(kv) if kv.0.starts_with(&prefix) => kv,
                _ => break,
            };
            let parsed = EntryKey::parse(key, kind);
            let middle_key = parsed.middle_key.clone();

            if let Some((muid, value)) = seek_live_entry(&mut cursor, container, &middle_key, kind, as_of)? {
                out.push((muid, value));
            }

            let past = EntryKey::seek_past_all(container, &middle_key);
            cursor.seek_to_first_key_ge(&past)?;
            pos = cursor.next()?;
        }

        Ok(out)
    }

    // -- Reset diff --------------------------------------------------------

    /// Produces the entries that, applied as a new bundle, would move the live view back to
    /// `to_time`.
    pub fn get_reset_changes(
        &self,
        to_time: i64,
        container: Option<Muid>,
        key: Option<&[u8]>,
        recursive: bool,
    ) -> GinkResult<Vec<ResetChange>> {
        if container.is_none() && key.is_some() {
            return Err(GinkError::InvalidArgument(
                "get_reset_changes: key given without container".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut out = Vec::new();

        match (container, key) {
            (None, None) => {
                for muid in self.all_container_muids(to_time)? {
                    self.reset_container(muid, None, to_time, false, &mut seen, &mut out)?;
                }
            }
            (Some(c), None) => {
                self.reset_container(c, None, to_time, recursive, &mut seen, &mut out)?;
            }
            (Some(c), Some(k)) => {
                self.reset_container(c, Some(k), to_time, recursive, &mut seen, &mut out)?;
            }
            (None, Some(_)) => unreachable!("checked above"),
        }

        debug!(
            target: "gink_store::reset",
            "reset diff to_time={} container={:?} recursive={} produced {} change(s)",
            to_time, container, recursive, out.len()
        );
        Ok(out)
    }

    fn reset_container(
        &self,
        container: Muid,
        only_key: Option<&[u8]>,
        to_time: i64,
        recursive: bool,
        seen: &mut HashSet<Muid>,
        out: &mut Vec<ResetChange>,
    ) -> GinkResult<()> {
        if !seen.insert(container) {
            trace!(target: "gink_store::reset", "skipping already-visited container {}", container);
            return Ok(());
        }

        trace!(target: "gink_store::reset", "walking container {} to_time={}", container, to_time);
        let kind = self.behavior_kind_of(container)?;
        let txn = self.env.begin_ro_txn()?;
        let mut cursor = txn.open_ro_cursor(self.entries)?;

        let prefix = container.to_bytes();
        let mut pos = cursor.seek_to_first_key_ge(&prefix)?;
        let mut children = Vec::new();

        loop {
            let (raw_key, _) = match pos {
                Some(kv) if kv.0.starts_with(&prefix) => kv,
                _ => break,
            };
            let parsed = EntryKey::parse(raw_key, kind);
            let middle_key = parsed.middle_key.clone();

            if let Some(k) = only_key {
                if middle_key != MiddleKey::Directory(k.to_vec()) {
                    let past = EntryKey::seek_past_all(container, &middle_key);
                    cursor.seek_to_first_key_ge(&past)?;
                    pos = cursor.next()?;
                    continue;
                }
            }

            let now = seek_live_entry(&mut cursor, container, &middle_key, kind, i64::MAX)?;
            let now_ts = now.as_ref().map(|(m, _)| m.timestamp).unwrap_or(i64::MIN);

            // `then` is the entry this key held at `to_time`: re-seek if it changed since, or
            // reuse `now` unchanged otherwise. Recursion follows `then`'s pointee regardless of
            // whether the entry itself changed, because a child container's own entries may have
            // changed even when the pointer to it did not.
            let then = if now_ts > to_time {
                let then = seek_live_entry(&mut cursor, container, &middle_key, kind, to_time)?;
                match &then {
                    None => {
                        trace!(
                            target: "gink_store::reset",
                            "container {} key {:?} absent at to_time, emitting tombstone",
                            container, middle_key
                        );
                        out.push(ResetChange::Tombstone { container, middle_key: middle_key.clone() });
                    }
                    Some((_, then_value)) => {
                        let equivalent = now.as_ref().map(|(_, v)| v == then_value).unwrap_or(false);
                        if !equivalent {
                            trace!(
                                target: "gink_store::reset",
                                "container {} key {:?} differs from to_time value, emitting restore",
                                container, middle_key
                            );
                            out.push(ResetChange::Entry {
                                container,
                                middle_key: middle_key.clone(),
                                value: then_value.clone(),
                            });
                        }
                    }
                }
                then
            } else {
                now.clone()
            };

            if recursive {
                if let Some((_, EntryValue::Pointee(child))) = &then {
                    children.push(Muid::new(child.timestamp, child.medallion, child.offset));
                }
            }

            let past = EntryKey::seek_past_all(container, &middle_key);
            cursor.seek_to_first_key_ge(&past)?;
            pos = cursor.next()?;
        }

        drop(cursor);
        drop(txn);

        for child in children {
            self.reset_container(child, None, to_time, recursive, seen, out)?;
        }

        Ok(())
    }

    fn all_container_muids(&self, to_time: i64) -> GinkResult<Vec<Muid>> {
        let txn = self.env.begin_ro_txn()?;
        let mut cursor = txn.open_ro_cursor(self.container_defs)?;
        let mut out = Vec::new();
        let mut pos = cursor.first()?;
        while let Some((key, _)) = pos {
            let muid = Muid::from_bytes(key);
            if muid.timestamp <= to_time {
                out.push(muid);
            }
            pos = cursor.next()?;
        }
        Ok(out)
    }

    fn behavior_kind_of(&self, container: Muid) -> GinkResult<MiddleKeyKind> {
        let txn = self.env.begin_ro_txn()?;
        let def = txn.get(self.container_defs, &container.to_bytes())?;
        let (behavior, _) = wire::decode_container_def(def)
            .map_err(|e| GinkError::CorruptBundle(format!("bad container def: {e}")))?;
        Ok(match behavior {
            Behavior::Directory => MiddleKeyKind::Directory,
            Behavior::Sequence => MiddleKeyKind::Sequence,
            Behavior::Property => MiddleKeyKind::None,
        })
    }

    // -- Replay and chain bookkeeping --------------------------------------

    /// Scans the `bundles` table in stored (timestamp-major) order, invoking `callback` with
    /// each bundle's raw bytes and its info.
    pub fn get_bundles(&self, mut callback: impl FnMut(&[u8], &BundleInfo)) -> GinkResult<()> {
        let txn = self.env.begin_ro_txn()?;
        let mut cursor = txn.open_ro_cursor(self.bundles)?;
        let mut pos = cursor.first()?;
        while let Some((key, value)) = pos {
            let info = BundleInfo::from_bytes(key);
            callback(value, &info);
            pos = cursor.next()?;
        }
        Ok(())
    }

    /// Scans `chain-infos` and returns a fresh tracker populated with every head info.
    pub fn get_chain_tracker(&self) -> GinkResult<ChainTracker> {
        let txn = self.env.begin_ro_txn()?;
        let mut cursor = txn.open_ro_cursor(self.chain_infos)?;
        let mut tracker = ChainTracker::new();
        let mut pos = cursor.first()?;
        while let Some((_, value)) = pos {
            tracker.mark_as_having(BundleInfo::from_bytes(value));
            pos = cursor.next()?;
        }
        Ok(tracker)
    }

    /// Claims `chain` for this node to append to. The engine enforces no semantics on claims;
    /// concurrent claims of the same chain from separate processes is a caller error.
    pub fn claim_chain(&self, chain: Chain) -> GinkResult<()> {
        let txn = self.env.begin_rw_txn()?;
        let med_key = chain.medallion.to_be_bytes();
        let start_val = chain.chain_start.to_be_bytes();
        txn.put(self.claimed_chains, &med_key, &start_val, WriteFlags::empty())?;
        txn.commit()?;
        warn!(target: "gink_store::engine", "claimed chain medallion={} chain_start={}", chain.medallion, chain.chain_start);
        Ok(())
    }

    /// Enumerates every claimed chain.
    pub fn get_claimed_chains(&self) -> GinkResult<Vec<Chain>> {
        let txn = self.env.begin_ro_txn()?;
        let mut cursor = txn.open_ro_cursor(self.claimed_chains)?;
        let mut out = Vec::new();
        let mut pos = cursor.first()?;
        while let Some((key, value)) = pos {
            let medallion = i64::from_be_bytes(key.try_into().unwrap());
            let chain_start = i64::from_be_bytes(value.try_into().unwrap());
            out.push(Chain::new(medallion, chain_start));
            pos = cursor.next()?;
        }
        Ok(out)
    }
}

fn chain_key(chain: &Chain) -> [u8; 16] {
    let mut buf = [0u8; 16];
    buf[..8].copy_from_slice(&chain.medallion.to_be_bytes());
    buf[8..].copy_from_slice(&chain.chain_start.to_be_bytes());
    buf
}

fn middle_key_kind(middle_key: &MiddleKey) -> MiddleKeyKind {
    match middle_key {
        MiddleKey::Directory(_) => MiddleKeyKind::Directory,
        MiddleKey::Sequence { .. } => MiddleKeyKind::Sequence,
        MiddleKey::None => MiddleKeyKind::None,
    }
}

fn resolve_middle_key(relative: &RelativeMiddleKey, context: &BundleInfo) -> GinkResult<MiddleKey> {
    Ok(match relative {
        RelativeMiddleKey::Directory(bytes) => MiddleKey::Directory(bytes.clone()),
        RelativeMiddleKey::Sequence { effective_time, move_muid } => MiddleKey::Sequence {
            effective_time: *effective_time,
            move_muid: Muid::create(*move_muid, context, None)?,
        },
        RelativeMiddleKey::None => MiddleKey::None,
    })
}

fn resolve_entry_value(value: &EntryValue, context: &BundleInfo) -> GinkResult<EntryValue> {
    Ok(match value {
        EntryValue::Value(bytes) => EntryValue::Value(bytes.clone()),
        EntryValue::Tombstone => EntryValue::Tombstone,
        EntryValue::Pointee(relative) => {
            let resolved = Muid::create(*relative, context, None)?;
            EntryValue::Pointee(RelativeMuid::new(resolved.timestamp, resolved.medallion, resolved.offset))
        }
    })
}

/// Positions `cursor` on the newest entry of `(container, middle_key)` with entry-muid
/// timestamp ≤ `as_of`, decoding its value. Returns `None` if the seek lands outside the
/// `(container, middle_key)` prefix.
fn seek_live_entry<'txn>(
    cursor: &mut impl Cursor<'txn>,
    container: Muid,
    middle_key: &MiddleKey,
    kind: MiddleKeyKind,
    as_of: i64,
) -> GinkResult<Option<FoundEntry>> {
    let prefix = EntryKey::prefix(container, middle_key);
    let target = EntryKey::seek_at_or_before(container, middle_key, as_of);
    let landed = cursor.seek_to_first_key_ge(&target)?;
    match landed {
        Some((key, value)) if key.starts_with(&prefix) => {
            let parsed = EntryKey::parse(key, kind);
            let mut io_cursor = IoCursor::new(value);
            let decoded = wire::decode_entry_value(&mut io_cursor)
                .map_err(|e| GinkError::CorruptBundle(format!("bad entry value: {e}")))?;
            Ok(Some((parsed.entry_muid, decoded)))
        }
        _ => Ok(None),
    }
}
